//! Establishment gating on the game-rules singleton: a client configured to
//! wait holds every proxy until the rules entity establishes, releases them
//! in arrival order afterwards, and closes the gate again when the rules
//! entity despawns.

use replink::{spawn_flags, ChannelId, EntityId, SessionConfig, SpawnParams};
use replink_test::{connect, exchange, exchange_n_times, LocalWire, Peer};

const CLIENT_A: ChannelId = ChannelId(2);

/// A client that keeps the default `wait_for_game_rules` gate enabled.
fn gated_client(wire: &LocalWire, channel: ChannelId) -> Peer {
    Peer::with_config(wire, SessionConfig::client(channel), channel.0 * 100 + 100)
}

fn rules_params() -> SpawnParams {
    let mut params = SpawnParams::new("rules", "GameRules");
    params.flags |= spawn_flags::GAME_RULES;
    params
}

#[test]
fn proxies_hold_until_the_rules_singleton_lands() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();

    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client = gated_client(&wire, CLIENT_A);
    connect(&mut server, &mut client);

    let turret = EntityId(7);
    server.game.set_aspect(turret, 0, 42);
    server
        .session
        .bind_entity(turret, SpawnParams::new("turret", "Turret"));
    exchange_n_times(3, &mut server, &mut [&mut client]);

    // no rules entity yet, so the proxy sits in the pending set
    assert_eq!(client.session.pending_proxy_count(), 1);
    assert_eq!(client.game.entity_named("turret"), None);

    let rules = EntityId(8);
    server.session.bind_entity(rules, rules_params());
    exchange(&mut server, &mut [&mut client]);
    // the rules spawn lands after this frame's establishment pass already ran
    assert_eq!(client.session.pending_proxy_count(), 2);

    exchange(&mut server, &mut [&mut client]);
    // the turret precedes the rules proxy in arrival order, so it misses the
    // pass in which the rules entity establishes
    assert_eq!(client.game.entity_named("rules"), Some(EntityId(300)));
    assert_eq!(client.game.entity_named("turret"), None);
    assert_eq!(client.session.pending_proxy_count(), 1);

    exchange(&mut server, &mut [&mut client]);
    // establishment also applies the aspect image buffered while pending
    let local_turret = client.game.entity_named("turret").expect("established");
    assert_eq!(local_turret, EntityId(301));
    assert_eq!(client.game.aspect(local_turret, 0), Some(42));
    assert_eq!(client.session.pending_proxy_count(), 0);

    // losing the rules entity closes the gate for everything that follows
    client.game.take_log();
    server.session.despawn_entity(rules);
    exchange(&mut server, &mut [&mut client]);
    assert_eq!(client.game.take_log(), vec!["release 300".to_string()]);

    let door = EntityId(9);
    server
        .session
        .bind_entity(door, SpawnParams::new("door", "Door"));
    exchange_n_times(2, &mut server, &mut [&mut client]);
    assert_eq!(client.session.pending_proxy_count(), 1);
    assert_eq!(client.game.entity_named("door"), None);
}

#[test]
fn a_leading_rules_spawn_unblocks_the_same_pass() {
    let wire = LocalWire::new();
    let mut server = Peer::server(&wire);
    let mut client = gated_client(&wire, CLIENT_A);
    connect(&mut server, &mut client);

    // arrival order, not entity id order, decides who establishes when
    server.session.bind_entity(EntityId(1), rules_params());
    server
        .session
        .bind_entity(EntityId(7), SpawnParams::new("turret", "Turret"));
    exchange_n_times(2, &mut server, &mut [&mut client]);

    assert_eq!(
        client.game.take_log(),
        vec![
            "spawn rules as 300".to_string(),
            "spawn turret as 301".to_string(),
        ]
    );
    assert_eq!(client.session.pending_proxy_count(), 0);
    assert_eq!(client.game.entity_named("rules"), Some(EntityId(300)));
    assert_eq!(client.game.entity_named("turret"), Some(EntityId(301)));
}
