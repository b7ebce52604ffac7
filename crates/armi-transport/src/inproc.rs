//! In-process adapter over a pair of unbounded channels, bypassing the length-prefix framer
//! entirely: every `Vec<u8>` sent through an `mpsc` channel already arrives as one message, so
//! there is nothing for [`crate::framer`] to delimit. This is the adapter a context configured
//! with `Config { framing: false, .. }` is meant for — `tcp`/`duplex` wrap a raw byte stream
//! and always need the framer, this one never does.

use std::sync::Arc;

use tokio::sync::mpsc;

use armi::client::ClientContext;
use armi::error::{Error, ErrorKind};
use armi::server::ServerContext;
use armi::transport::ChannelWriter;
use armi::types::ChannelId;
use armi::wire::Codec;

struct MpscWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelWriter for MpscWriter {
    fn send(&self, frame: Vec<u8>) -> Result<(), Error> {
        self.tx
            .send(frame)
            .map_err(|_| Error::new(ErrorKind::TransportClosed))
    }
}

/// Wires `client` and `server` together directly over a pair of `mpsc` channels and returns
/// `(client_channel_id, server_channel_id)`. Each request is dispatched in its own task, same
/// as the byte-stream adapters, so a slow method stub cannot stall delivery of the next frame.
pub fn connect<C, T>(
    client: Arc<ClientContext<C>>,
    server: Arc<ServerContext<C, T>>,
) -> (ChannelId, ChannelId)
where
    C: Codec,
    T: ?Sized + Send + Sync + 'static,
{
    let (c2s_tx, mut c2s_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (s2c_tx, mut s2c_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let server_channel_id = server.add_channel(Arc::new(MpscWriter { tx: s2c_tx }));
    let client_channel_id = client.add_channel(Arc::new(MpscWriter { tx: c2s_tx }));

    let reader_server = server.clone();
    tokio::spawn(async move {
        while let Some(frame) = c2s_rx.recv().await {
            let server = reader_server.clone();
            tokio::spawn(async move {
                server.handle_request(server_channel_id, frame).await;
            });
        }
        reader_server.close_channel(server_channel_id);
    });

    let reader_client = client.clone();
    tokio::spawn(async move {
        while let Some(frame) = s2c_rx.recv().await {
            reader_client.handle_reply(&frame);
        }
        reader_client.cancel_channel_requests(client_channel_id, Error::new(ErrorKind::TransportClosed));
    });

    (client_channel_id, server_channel_id)
}
