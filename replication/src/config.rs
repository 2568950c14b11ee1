use crate::{
    aspect::mask::AspectMask,
    types::{ChannelId, HostRole},
};

/// Session-wide settings, fixed for the session's lifetime.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub role: HostRole,
    /// This process's own channel id.
    pub local_channel: ChannelId,
    /// Where clients send server-bound traffic.
    pub server_channel: ChannelId,
    /// The global gate on which aspects may ever be client-delegated.
    /// Per-entity delegation is further restricted by each replica's own
    /// delegated mask.
    pub delegatable_aspects: AspectMask,
    /// Hold proxy establishment until the game-rules singleton is live.
    pub wait_for_game_rules: bool,
}

impl SessionConfig {
    pub fn server() -> SessionConfig {
        SessionConfig {
            role: HostRole::Server,
            local_channel: ChannelId::SERVER,
            server_channel: ChannelId::SERVER,
            delegatable_aspects: AspectMask::ALL,
            wait_for_game_rules: true,
        }
    }

    pub fn client(local_channel: ChannelId) -> SessionConfig {
        SessionConfig {
            role: HostRole::Client,
            local_channel,
            server_channel: ChannelId::SERVER,
            delegatable_aspects: AspectMask::ALL,
            wait_for_game_rules: true,
        }
    }

    pub fn is_server(&self) -> bool {
        self.role.is_server()
    }
}
