use replink::ChannelId;

use crate::helpers::peer::Peer;

/// Registers the client on the server's connected set and the server on the
/// client's, as a handshake layer would.
pub fn connect(server: &mut Peer, client: &mut Peer) {
    let channel = client.channel();
    server.session.channel_connected(channel);
    client.session.channel_connected(ChannelId::SERVER);
}

/// One frame across the whole topology: the server pumps first, then every
/// client, so server output of this frame reaches clients within the same
/// exchange and client output waits for the next one.
pub fn exchange(server: &mut Peer, clients: &mut [&mut Peer]) {
    server.pump();
    for client in clients.iter_mut() {
        client.pump();
    }
}

pub fn exchange_n_times(n: usize, server: &mut Peer, clients: &mut [&mut Peer]) {
    for _ in 0..n {
        exchange(server, clients);
    }
}
