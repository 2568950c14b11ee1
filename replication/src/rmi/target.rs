use std::ops::BitOr;

use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

use crate::{rmi::error::RmiError, types::ChannelId};

/// Topology bitmask selecting which peers an RMI is delivered to.
///
/// Exactly one client-direction flag may be set, and never together with
/// [`TO_SERVER`](RmiTarget::TO_SERVER). [`NO_LOCAL_CALLS`](RmiTarget::NO_LOCAL_CALLS)
/// is a modifier suppressing execution on the originating process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RmiTarget(u16);

impl RmiTarget {
    pub const NONE: RmiTarget = RmiTarget(0);
    /// Deliver to one specific client channel; requires a filter.
    pub const TO_CLIENT_CHANNEL: RmiTarget = RmiTarget(0x0001);
    /// Deliver to the client that owns the target entity.
    pub const TO_OWNING_CLIENT: RmiTarget = RmiTarget(0x0002);
    /// Deliver to every client except the filter channel; requires a filter.
    pub const TO_OTHER_CLIENTS: RmiTarget = RmiTarget(0x0004);
    /// Deliver to every client except the filter channel and the origin;
    /// requires a filter.
    pub const TO_OTHER_REMOTE_CLIENTS: RmiTarget = RmiTarget(0x0008);
    /// Deliver to every connected client.
    pub const TO_ALL_CLIENTS: RmiTarget = RmiTarget(0x0010);
    /// Deliver to the server (client-to-server direction).
    pub const TO_SERVER: RmiTarget = RmiTarget(0x0100);
    /// Modifier: never execute on the process that originated the call.
    pub const NO_LOCAL_CALLS: RmiTarget = RmiTarget(0x0200);
    /// Every client except the originating process.
    pub const TO_REMOTE_CLIENTS: RmiTarget =
        RmiTarget(Self::TO_ALL_CLIENTS.0 | Self::NO_LOCAL_CALLS.0);

    const CLIENT_DIRECTION: RmiTarget = RmiTarget(
        Self::TO_CLIENT_CHANNEL.0
            | Self::TO_OWNING_CLIENT.0
            | Self::TO_OTHER_CLIENTS.0
            | Self::TO_OTHER_REMOTE_CLIENTS.0
            | Self::TO_ALL_CLIENTS.0,
    );

    const FILTERED: RmiTarget = RmiTarget(
        Self::TO_CLIENT_CHANNEL.0 | Self::TO_OTHER_CLIENTS.0 | Self::TO_OTHER_REMOTE_CLIENTS.0,
    );

    pub fn from_bits(bits: u16) -> RmiTarget {
        RmiTarget(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Returns whether every bit of `flags` is set in `self`.
    pub fn contains(&self, flags: RmiTarget) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// Returns whether any bit of `flags` is set in `self`.
    pub fn intersects(&self, flags: RmiTarget) -> bool {
        self.0 & flags.0 != 0
    }

    /// Returns whether any client-direction flag is set.
    pub fn has_client_direction(&self) -> bool {
        self.intersects(Self::CLIENT_DIRECTION)
    }

    /// Whether the wire image carries an origin channel for this selector.
    /// Origin matters to routing only for the remote-exclusion flags.
    pub fn requires_origin(&self) -> bool {
        self.intersects(RmiTarget(
            Self::NO_LOCAL_CALLS.0 | Self::TO_OTHER_REMOTE_CLIENTS.0,
        ))
    }

    /// Whether the selector needs a channel filter value.
    pub fn requires_filter(&self) -> bool {
        self.intersects(Self::FILTERED)
    }

    /// Checks the selector invariants against the supplied filter.
    ///
    /// # Panics
    ///
    /// Panics if the combination is invalid. Topology misconfiguration is a
    /// programmer error caught at the call site; use `try_validate` for the
    /// non-panicking form.
    pub fn validate(&self, filter: ChannelId) {
        if let Err(error) = self.try_validate(filter) {
            panic!("invalid RMI target: {}", error);
        }
    }

    /// Checks the selector invariants against the supplied filter.
    pub fn try_validate(&self, filter: ChannelId) -> Result<(), RmiError> {
        if self.has_client_direction() && self.contains(Self::TO_SERVER) {
            return Err(RmiError::ConflictingDirection { selector: self.0 });
        }
        if (self.0 & Self::CLIENT_DIRECTION.0).count_ones() > 1 {
            return Err(RmiError::MultipleClientTargets { selector: self.0 });
        }
        if self.requires_filter() && !filter.is_valid() {
            return Err(RmiError::MissingChannelFilter { selector: self.0 });
        }
        Ok(())
    }
}

impl BitOr for RmiTarget {
    type Output = RmiTarget;

    fn bitor(self, rhs: RmiTarget) -> RmiTarget {
        RmiTarget(self.0 | rhs.0)
    }
}

impl Serde for RmiTarget {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u16(self.0);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(RmiTarget(reader.read_u16()?))
    }
}
