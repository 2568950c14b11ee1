/// In-memory carrier implementation for E2E testing.
/// Routes payloads between any number of peers without network I/O.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use replink::{Carrier, ChannelId};

type Inboxes = Arc<Mutex<HashMap<ChannelId, VecDeque<(ChannelId, Vec<u8>)>>>>;

/// Shared hub every peer attaches to. Each attached channel gets an inbox;
/// a send to a channel nobody attached is dropped, like a datagram to a
/// port with no listener.
#[derive(Clone, Default)]
pub struct LocalWire {
    inboxes: Inboxes,
}

impl LocalWire {
    pub fn new() -> LocalWire {
        LocalWire::default()
    }

    pub fn attach(&self, channel: ChannelId) -> LocalCarrier {
        self.inboxes.lock().unwrap().entry(channel).or_default();
        LocalCarrier {
            local: channel,
            inboxes: self.inboxes.clone(),
        }
    }

    /// Payloads sitting undelivered in a channel's inbox. Lets tests assert
    /// silence without pumping the receiving peer.
    pub fn pending(&self, channel: ChannelId) -> usize {
        self.inboxes
            .lock()
            .unwrap()
            .get(&channel)
            .map_or(0, VecDeque::len)
    }
}

/// One peer's endpoint on the hub. Sends stamp the sender's channel so the
/// receiving session sees where each payload came from.
pub struct LocalCarrier {
    local: ChannelId,
    inboxes: Inboxes,
}

impl Carrier for LocalCarrier {
    fn send(&mut self, channel: ChannelId, payload: &[u8]) {
        let mut inboxes = self.inboxes.lock().unwrap();
        if let Some(inbox) = inboxes.get_mut(&channel) {
            inbox.push_back((self.local, payload.to_vec()));
        }
    }

    fn receive(&mut self) -> Option<(ChannelId, Vec<u8>)> {
        self.inboxes.lock().unwrap().get_mut(&self.local)?.pop_front()
    }

    fn pump(&mut self) {}
}
