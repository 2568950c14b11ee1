//! RMI routing over the wire: queued invocations reach exactly the peers
//! their selector names, arrivals on an unestablished proxy replay at
//! establishment, and script calls carry the server stamp.

use replink::{
    ActorRmi, AspectMask, ChannelId, EntityId, LegacyRmi, NetEntityId, RepId, RmiTarget,
    ScriptRmi, SpawnParams,
};
use replink_test::{connect, exchange, exchange_n_times, LocalWire, Peer};

const CLIENT_A: ChannelId = ChannelId(2);
const CLIENT_B: ChannelId = ChannelId(3);
const NO_FILTER: ChannelId = ChannelId::INVALID;

/// Server plus two connected clients with one established entity between
/// them, logs drained, ready for invocations.
fn established_topology() -> (LocalWire, Peer, Peer, Peer, EntityId) {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    let mut client_b = Peer::client(&wire, CLIENT_B);
    connect(&mut server, &mut client_a);
    connect(&mut server, &mut client_b);

    let entity = EntityId(7);
    server
        .session
        .bind_entity(entity, SpawnParams::new("pawn", "Pawn"));
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);
    server.game.take_log();
    client_a.game.take_log();
    client_b.game.take_log();

    (wire, server, client_a, client_b, entity)
}

#[test]
fn a_client_call_reaches_the_server_and_nobody_else() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();

    let (_wire, mut server, mut client_a, mut client_b, _entity) = established_topology();

    let local_a = client_a.session.net_to_local(NetEntityId(7));
    client_a.session.invoke_legacy_rmi(
        local_a,
        LegacyRmi::new(RmiTarget::TO_SERVER, NO_FILTER, RepId(5), &[]),
    );
    // the call leaves on the client's own frame; the server runs it on the
    // following exchange
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);

    assert_eq!(server.game.take_log(), vec!["legacy 5 on 7".to_string()]);
    assert!(client_a.game.take_log().is_empty());
    assert!(client_b.game.take_log().is_empty());
}

#[test]
fn owner_directed_calls_select_the_owning_channel() {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    let mut client_b = Peer::client(&wire, CLIENT_B);
    connect(&mut server, &mut client_a);
    connect(&mut server, &mut client_b);

    // the delegation travels with the spawn, so the owner already knows it
    // is the owner when the call arrives
    let entity = EntityId(7);
    server
        .session
        .bind_entity(entity, SpawnParams::new("pawn", "Pawn"));
    server
        .session
        .delegate_authority(entity, CLIENT_A, AspectMask::single(0));
    exchange_n_times(2, &mut server, &mut [&mut client_a, &mut client_b]);
    client_a.game.take_log();
    client_b.game.take_log();

    server.session.invoke_legacy_rmi(
        entity,
        LegacyRmi::new(RmiTarget::TO_OWNING_CLIENT, NO_FILTER, RepId(9), &[]),
    );
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);

    assert_eq!(client_a.game.take_log(), vec!["legacy 9 on 300".to_string()]);
    assert!(client_b.game.take_log().is_empty());
    assert!(server.game.take_log().is_empty());
}

#[test]
fn filtered_fanout_skips_the_filtered_channel() {
    let (_wire, mut server, mut client_a, mut client_b, entity) = established_topology();

    server.session.invoke_legacy_rmi(
        entity,
        LegacyRmi::new(
            RmiTarget::TO_OTHER_REMOTE_CLIENTS,
            CLIENT_A,
            RepId(3),
            &[0xAA],
        ),
    );
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);

    assert!(client_a.game.take_log().is_empty());
    assert_eq!(client_b.game.take_log(), vec!["legacy 3 on 400".to_string()]);
}

#[test]
fn calls_queued_before_establishment_replay_in_arrival_order() {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client_a = Peer::client(&wire, CLIENT_A);
    connect(&mut server, &mut client_a);
    let rep_id = RepId(4);
    client_a
        .session
        .actor_reps_mut()
        .register_at(rep_id, client_a.game.actor_rep());

    // bind and invoke in the same server frame; the client has not even
    // seen the spawn when the calls go out
    let entity = EntityId(7);
    server
        .session
        .bind_entity(entity, SpawnParams::new("pawn", "Pawn"));
    server.session.invoke_legacy_rmi(
        entity,
        LegacyRmi::new(RmiTarget::TO_ALL_CLIENTS, NO_FILTER, RepId(8), &[]),
    );
    server.session.invoke_actor_rmi(
        entity,
        ActorRmi::new(RmiTarget::TO_ALL_CLIENTS, NO_FILTER, rep_id, 2, &[1, 2, 3]),
    );
    server.session.invoke_legacy_rmi(
        entity,
        LegacyRmi::new(RmiTarget::TO_ALL_CLIENTS, NO_FILTER, RepId(9), &[]),
    );

    exchange(&mut server, &mut [&mut client_a]);
    // everything arrived in one frame, after the establishment step ran
    let replica = client_a.session.replica(NetEntityId(7)).expect("proxy");
    assert!(!replica.is_established());
    assert_eq!(replica.pending_rmi_count(), 3);
    assert!(client_a.game.log().is_empty());

    exchange(&mut server, &mut [&mut client_a]);
    // legacies replay in arrival order, then actors
    assert_eq!(
        client_a.game.take_log(),
        vec![
            "spawn pawn as 300".to_string(),
            "legacy 8 on 300".to_string(),
            "legacy 9 on 300".to_string(),
            "actor ext 2 on 300 params [1, 2, 3]".to_string(),
        ]
    );
    let replica = client_a.session.replica(NetEntityId(7)).expect("proxy");
    assert_eq!(replica.pending_rmi_count(), 0);
}

#[test]
fn script_calls_cross_the_wire_with_the_server_stamp() {
    let (_wire, mut server, mut client_a, mut client_b, entity) = established_topology();

    server.session.invoke_script_rmi(
        entity,
        ScriptRmi::new(RmiTarget::TO_ALL_CLIENTS, NO_FILTER, NO_FILTER, &[7, 7]),
    );
    exchange(&mut server, &mut [&mut client_a, &mut client_b]);

    assert_eq!(
        client_a.game.take_log(),
        vec!["script on 300 from server".to_string()]
    );
    assert_eq!(
        client_b.game.take_log(),
        vec!["script on 400 from server".to_string()]
    );
    assert!(server.game.take_log().is_empty());
}
