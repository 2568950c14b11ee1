//! End-to-end replication over the in-memory wire: a server-bound entity
//! reaches two clients, establishes, tracks later changes, and tears down;
//! a late joiner converges from the connection snapshot alone.

use replink::{AspectMask, ChannelId, EntityId, NetEntityId, SpawnParams};
use replink_test::{connect, exchange, exchange_n_times, LocalWire, Peer};

const CLIENT_A: ChannelId = ChannelId(2);
const CLIENT_B: ChannelId = ChannelId(3);

#[test]
fn an_entity_reaches_every_client_and_tracks_updates() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();

    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    let mut client_b = Peer::client(&wire, CLIENT_B);
    connect(&mut server, &mut client_a);
    connect(&mut server, &mut client_b);

    let turret = EntityId(7);
    server.game.set_aspect(turret, 0, 42);
    server
        .session
        .bind_entity(turret, SpawnParams::new("turret", "Turret"));

    // first exchange carries the spawn and the first gathered state;
    // the proxies establish and apply on the second
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);

    let local_a = client_a.game.entity_named("turret").expect("established on A");
    let local_b = client_b.game.entity_named("turret").expect("established on B");
    assert_eq!(local_a, EntityId(300));
    assert_eq!(local_b, EntityId(400));
    assert_eq!(client_a.session.net_to_local(NetEntityId(7)), local_a);
    assert_eq!(client_a.game.aspect(local_a, 0), Some(42));
    assert_eq!(client_b.game.aspect(local_b, 0), Some(42));

    // a change to an established entity lands within one exchange
    server.game.set_aspect(turret, 0, 43);
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);
    assert_eq!(client_a.game.aspect(local_a, 0), Some(43));
    assert_eq!(client_b.game.aspect(local_b, 0), Some(43));

    // an unchanged master is polled but produces no traffic
    server.pump();
    assert_eq!(wire.pending(CLIENT_A), 0);
    assert_eq!(wire.pending(CLIENT_B), 0);

    server.session.despawn_entity(turret);
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);
    assert_eq!(server.session.replica_count(), 0);
    assert_eq!(client_a.session.replica_count(), 0);
    assert_eq!(client_b.session.replica_count(), 0);
    assert!(client_a.game.log().contains(&"release 300".to_string()));
    assert!(client_a.game.entity_named("turret").is_none());
}

#[test]
fn a_late_joiner_catches_up_from_the_connection_snapshot() {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    connect(&mut server, &mut client_a);

    let pawn = EntityId(7);
    server.game.set_aspect(pawn, 0, 11);
    server.game.set_aspect(pawn, 5, 12);
    server
        .session
        .bind_entity(pawn, SpawnParams::new("pawn", "Pawn"));
    server
        .session
        .delegate_authority(pawn, CLIENT_A, AspectMask::single(5));
    exchange_n_times(2, &mut server, &mut [&mut client_a]);

    // B connects after the entity has state and a standing delegation
    let mut client_b = Peer::client(&wire, CLIENT_B);
    connect(&mut server, &mut client_b);
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);

    let local_b = client_b.game.entity_named("pawn").expect("established on B");
    assert_eq!(client_b.game.aspect(local_b, 0), Some(11));
    assert_eq!(client_b.game.aspect(local_b, 5), Some(12));

    let replica = client_b.session.replica(NetEntityId(7)).expect("replica on B");
    assert_eq!(replica.owner_channel(), CLIENT_A);
    assert_eq!(replica.client_delegated_aspects(), AspectMask::single(5));
    assert!(!replica.has_client_authority());
}
