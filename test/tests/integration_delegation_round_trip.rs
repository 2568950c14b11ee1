//! Delegated authority end to end: an owning client's writes travel up,
//! apply on the server, and fan back out to everyone except their author.
//! Covers the granted-mask confinement, revocation, and disconnect cleanup.

use replink::{AspectMask, ChannelId, EntityId, NetEntityId, SpawnParams};
use replink_test::{connect, exchange, exchange_n_times, LocalWire, Peer};

const CLIENT_A: ChannelId = ChannelId(2);
const CLIENT_B: ChannelId = ChannelId(3);

struct Rig {
    server: Peer,
    client_a: Peer,
    client_b: Peer,
    pawn: EntityId,
    local_a: EntityId,
    local_b: EntityId,
}

/// Server plus two clients with an established pawn whose aspect 1 holds 10,
/// authority over `granted` handed to client A, and every log drained.
fn delegated_rig(granted: AspectMask) -> Rig {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    let mut client_b = Peer::client(&wire, CLIENT_B);
    connect(&mut server, &mut client_a);
    connect(&mut server, &mut client_b);

    let pawn = EntityId(7);
    server.game.set_aspect(pawn, 1, 10);
    server
        .session
        .bind_entity(pawn, SpawnParams::new("pawn", "Pawn"));
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);

    // the initial value has to land everywhere before authority moves,
    // because the owner stops receiving its own delegated bits afterwards
    server.session.delegate_authority(pawn, CLIENT_A, granted);
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);

    let local_a = client_a.session.net_to_local(NetEntityId(7));
    let local_b = client_b.session.net_to_local(NetEntityId(7));
    server.game.take_log();
    client_a.game.take_log();
    client_b.game.take_log();

    Rig {
        server,
        client_a,
        client_b,
        pawn,
        local_a,
        local_b,
    }
}

#[test]
fn owner_authored_state_round_trips_without_echo() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();

    let mut rig = delegated_rig(AspectMask::single(1));

    let replica_a = rig.client_a.session.replica(NetEntityId(7)).expect("replica");
    assert!(replica_a.has_client_authority());
    assert_eq!(replica_a.owner_channel(), CLIENT_A);
    let replica_b = rig.client_b.session.replica(NetEntityId(7)).expect("replica");
    assert!(!replica_b.has_client_authority());
    assert_eq!(replica_b.owner_channel(), CLIENT_A);

    // the owner authors a new value
    rig.client_a.game.set_aspect(rig.local_a, 1, 77);
    rig.client_a
        .session
        .changed_aspects(rig.local_a, AspectMask::single(1));
    exchange_n_times(2, &mut rig.server, &mut [&mut rig.client_a, &mut rig.client_b]);

    assert_eq!(rig.server.game.aspect(rig.pawn, 1), Some(77));
    assert_eq!(
        rig.server.game.take_log(),
        vec!["aspect 1 of 7 = 77".to_string()]
    );
    assert_eq!(rig.client_b.game.aspect(rig.local_b, 1), Some(77));
    assert_eq!(
        rig.client_b.game.take_log(),
        vec!["aspect 1 of 400 = 77".to_string()]
    );
    // no echo: the author never hears its own value back
    assert!(rig.client_a.game.take_log().is_empty());

    // after revocation the same call is a silent no-op
    rig.server.session.revoke_authority(rig.pawn);
    exchange(&mut rig.server, &mut [&mut rig.client_a, &mut rig.client_b]);
    let replica_a = rig.client_a.session.replica(NetEntityId(7)).expect("replica");
    assert!(!replica_a.has_client_authority());

    rig.client_a.game.set_aspect(rig.local_a, 1, 99);
    rig.client_a
        .session
        .changed_aspects(rig.local_a, AspectMask::single(1));
    exchange_n_times(2, &mut rig.server, &mut [&mut rig.client_a, &mut rig.client_b]);

    assert_eq!(rig.server.game.aspect(rig.pawn, 1), Some(77));
    assert_eq!(rig.client_b.game.aspect(rig.local_b, 1), Some(77));
}

#[test]
fn uploads_stay_inside_the_granted_mask() {
    let mut rig = delegated_rig(AspectMask::single(1));

    rig.client_a.game.set_aspect(rig.local_a, 1, 77);
    rig.client_a.game.set_aspect(rig.local_a, 2, 55);
    let mut marked = AspectMask::single(1);
    marked.or(AspectMask::single(2));
    rig.client_a.session.changed_aspects(rig.local_a, marked);
    exchange_n_times(2, &mut rig.server, &mut [&mut rig.client_a, &mut rig.client_b]);

    // only the granted bit crossed the wire
    assert_eq!(rig.server.game.aspect(rig.pawn, 1), Some(77));
    assert_eq!(rig.server.game.aspect(rig.pawn, 2), None);
    assert_eq!(rig.client_b.game.aspect(rig.local_b, 1), Some(77));
    assert_eq!(rig.client_b.game.aspect(rig.local_b, 2), None);
    assert_eq!(
        rig.client_b.game.take_log(),
        vec!["aspect 1 of 400 = 77".to_string()]
    );
}

#[test]
fn a_disconnect_revokes_standing_delegation() {
    let mut rig = delegated_rig(AspectMask::single(1));

    rig.client_a.game.set_aspect(rig.local_a, 1, 77);
    rig.client_a
        .session
        .changed_aspects(rig.local_a, AspectMask::single(1));
    exchange_n_times(2, &mut rig.server, &mut [&mut rig.client_a, &mut rig.client_b]);
    assert_eq!(rig.server.game.aspect(rig.pawn, 1), Some(77));

    rig.server.session.channel_disconnected(CLIENT_A);
    let replica = rig.server.session.replica(NetEntityId(7)).expect("replica");
    assert!(replica.client_delegated_aspects().is_empty());

    // the revocation reaches the survivors on the next frame
    exchange(&mut rig.server, &mut [&mut rig.client_b]);
    let replica_b = rig.client_b.session.replica(NetEntityId(7)).expect("replica");
    assert!(replica_b.client_delegated_aspects().is_empty());
    assert_eq!(replica_b.owner_channel(), CLIENT_A);

    // the departed client never heard about the revocation; its uploads are
    // dropped at the accept mask
    rig.client_a.game.set_aspect(rig.local_a, 1, 99);
    rig.client_a
        .session
        .changed_aspects(rig.local_a, AspectMask::single(1));
    rig.client_a.pump();
    exchange(&mut rig.server, &mut [&mut rig.client_b]);

    assert_eq!(rig.server.game.aspect(rig.pawn, 1), Some(77));
    assert_eq!(rig.client_b.game.aspect(rig.local_b, 1), Some(77));
}
