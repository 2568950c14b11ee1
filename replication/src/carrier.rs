use crate::types::ChannelId;

/// The transport seam. The session hands fully framed envelope payloads to
/// the carrier and drains whatever arrived since the last frame; reliability
/// and packet framing live below this trait.
pub trait Carrier {
    fn send(&mut self, channel: ChannelId, payload: &[u8]);

    /// The next pending inbound payload with its sending channel, if any.
    fn receive(&mut self) -> Option<(ChannelId, Vec<u8>)>;

    /// Drives the underlying transport (socket IO, timers). Called through
    /// the shared pump lock, never directly by two threads at once.
    fn pump(&mut self);
}
