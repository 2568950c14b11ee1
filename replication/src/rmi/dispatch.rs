//! Pure topology-routing decisions for queued invocations.
//!
//! Both predicates are free of session state so the full flag/role/channel
//! matrix can be exercised in isolation. The session resolves the owning
//! channel from the target replica before calling in.

use crate::{
    rmi::{invocation::RmiInvocation, target::RmiTarget},
    types::ChannelId,
};

/// Everything about the local process and the target entity that routing
/// needs. `owner_channel` is `ChannelId::INVALID` for unowned entities.
#[derive(Clone, Copy, Debug)]
pub struct RouteContext {
    pub is_server: bool,
    pub local_channel: ChannelId,
    pub owner_channel: ChannelId,
}

/// Whether this process must run the invocation in-process.
///
/// Clause order is load-bearing: the server-side to-server check wins even
/// when the call carries no-local-calls, and the no-local-calls suppression
/// overrides every client-direction clause after it.
pub fn should_invoke_locally(
    target: RmiTarget,
    origin: ChannelId,
    filter: ChannelId,
    ctx: &RouteContext,
) -> bool {
    if target.contains(RmiTarget::TO_SERVER) && ctx.is_server {
        return true;
    }
    if target.contains(RmiTarget::NO_LOCAL_CALLS) && origin == ctx.local_channel {
        return false;
    }

    let is_client = !ctx.is_server;
    if target.contains(RmiTarget::TO_OWNING_CLIENT)
        && is_client
        && ctx.owner_channel == ctx.local_channel
    {
        return true;
    }
    if target.contains(RmiTarget::TO_OTHER_CLIENTS) && is_client && ctx.local_channel != filter {
        return true;
    }
    if target.contains(RmiTarget::TO_ALL_CLIENTS) && is_client {
        return true;
    }
    if target.contains(RmiTarget::TO_REMOTE_CLIENTS) && ctx.local_channel != origin {
        return true;
    }
    if target.contains(RmiTarget::TO_OTHER_REMOTE_CLIENTS)
        && ctx.local_channel != origin
        && ctx.local_channel != filter
    {
        return true;
    }
    if target.contains(RmiTarget::TO_CLIENT_CHANNEL) && ctx.local_channel == filter {
        return true;
    }
    false
}

/// Whether this process must also hand the invocation to the carrier.
///
/// Clients forward only their own to-server calls; the server forwards
/// anything with a client-direction bit.
pub fn should_dispatch(target: RmiTarget, origin: ChannelId, ctx: &RouteContext) -> bool {
    if !ctx.is_server && ctx.local_channel == origin && target.contains(RmiTarget::TO_SERVER) {
        return true;
    }
    if target.has_client_direction() && ctx.is_server {
        return true;
    }
    false
}

/// The per-entity RPC endpoint an outbound invocation rides: legacy or
/// actor, crossed with direction. Script calls share the legacy endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RmiChannel {
    LegacyToServer,
    LegacyToClients,
    ActorToServer,
    ActorToClients,
}

/// Selects the endpoint from the invocation kind and the to-server flag.
/// Validation already rejected mixed-direction selectors, so the flag alone
/// decides the direction.
pub fn dispatch_channel(invocation: &RmiInvocation) -> RmiChannel {
    let to_server = invocation.target().contains(RmiTarget::TO_SERVER);
    match (invocation, to_server) {
        (RmiInvocation::Actor(_), true) => RmiChannel::ActorToServer,
        (RmiInvocation::Actor(_), false) => RmiChannel::ActorToClients,
        (_, true) => RmiChannel::LegacyToServer,
        (_, false) => RmiChannel::LegacyToClients,
    }
}
