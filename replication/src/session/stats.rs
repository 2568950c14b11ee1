use std::collections::HashMap;

use crate::types::ChannelId;

/// Byte and packet counters for one peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub received_packets: u64,
    pub received_bytes: u64,
}

/// Per-channel traffic accounting, plus a running total.
#[derive(Default)]
pub struct TrafficStats {
    channels: HashMap<ChannelId, ChannelStats>,
    total: ChannelStats,
}

impl TrafficStats {
    pub fn new() -> TrafficStats {
        TrafficStats::default()
    }

    pub fn record_sent(&mut self, channel: ChannelId, bytes: usize) {
        let entry = self.channels.entry(channel).or_default();
        entry.sent_packets += 1;
        entry.sent_bytes += bytes as u64;
        self.total.sent_packets += 1;
        self.total.sent_bytes += bytes as u64;
    }

    pub fn record_received(&mut self, channel: ChannelId, bytes: usize) {
        let entry = self.channels.entry(channel).or_default();
        entry.received_packets += 1;
        entry.received_bytes += bytes as u64;
        self.total.received_packets += 1;
        self.total.received_bytes += bytes as u64;
    }

    pub fn channel(&self, channel: ChannelId) -> ChannelStats {
        self.channels.get(&channel).copied().unwrap_or_default()
    }

    pub fn total(&self) -> ChannelStats {
        self.total
    }

    pub fn forget_channel(&mut self, channel: ChannelId) {
        self.channels.remove(&channel);
    }
}
