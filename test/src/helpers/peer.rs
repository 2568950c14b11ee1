use replink::{ChannelId, NetworkSession, SessionConfig};

use crate::{
    local_wire::{LocalCarrier, LocalWire},
    test_game::TestGame,
};

/// One end of a replicated session: the session itself, its endpoint on the
/// shared wire, and the scripted game behind it.
pub struct Peer {
    pub session: NetworkSession,
    pub carrier: LocalCarrier,
    pub game: TestGame,
}

impl Peer {
    pub fn server(wire: &LocalWire) -> Peer {
        Peer::with_config(wire, SessionConfig::server(), 1000)
    }

    /// A client peer with the game-rules gate off, which is what most
    /// scenarios want. Gate tests build their config through `with_config`.
    pub fn client(wire: &LocalWire, channel: ChannelId) -> Peer {
        let mut config = SessionConfig::client(channel);
        config.wait_for_game_rules = false;
        Peer::with_config(wire, config, channel.0 * 100 + 100)
    }

    pub fn with_config(wire: &LocalWire, config: SessionConfig, first_entity: u32) -> Peer {
        let carrier = wire.attach(config.local_channel);
        Peer {
            session: NetworkSession::new(config),
            carrier,
            game: TestGame::new(first_entity),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.session.config().local_channel
    }

    /// Runs one frame. The factory and IO halves are clones of the same
    /// game state.
    pub fn pump(&mut self) {
        let mut factory = self.game.clone();
        let mut io = self.game.clone();
        self.session.pump(&mut self.carrier, &mut factory, &mut io);
    }
}
