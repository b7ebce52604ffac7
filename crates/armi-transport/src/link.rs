//! Binds a context to a split async byte stream: spawns a writer task draining an unbounded
//! channel onto the stream, and a reader task pumping framed reads into the context — the
//! same writer-task/reader-task split used around a child process's stdio pipes.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::warn;

use armi::client::ClientContext;
use armi::error::{Error, ErrorKind};
use armi::server::ServerContext;
use armi::transport::ChannelWriter;
use armi::types::ChannelId;
use armi::wire::Codec;

use crate::framer;

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

async fn writer_task<W: AsyncWrite + Unpin>(mut write_half: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        if let Err(err) = framer::write_frame(&mut write_half, &frame).await {
            warn!(error = %err, "write failed, closing writer task");
            break;
        }
    }
}

async fn reader_loop<R: AsyncRead + Unpin>(
    mut read_half: R,
    max_frame_bytes: usize,
    mut on_frame: impl FnMut(Vec<u8>),
) {
    loop {
        match framer::read_frame(&mut read_half, max_frame_bytes).await {
            Ok(Some(frame)) => on_frame(frame),
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "closing channel after a frame read error");
                break;
            }
        }
    }
}

/// Registers a new channel on `client` backed by `read_half`/`write_half` and spawns its
/// reader/writer tasks. The channel is torn down (every pending request on it rejected) once
/// the peer disconnects or a frame fails to decode.
pub fn spawn_client_channel<C, R, W>(
    client: Arc<ClientContext<C>>,
    read_half: R,
    write_half: W,
    max_frame_bytes: usize,
) -> ChannelId
where
    C: Codec,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let channel_id = client.add_channel(Arc::new(MpscWriter { tx }));

    tokio::spawn(writer_task(write_half, rx));

    let reader_client = client.clone();
    tokio::spawn(async move {
        reader_loop(read_half, max_frame_bytes, |frame| reader_client.handle_reply(&frame)).await;
        reader_client.cancel_channel_requests(channel_id, Error::new(ErrorKind::TransportClosed));
    });

    channel_id
}

/// Registers a new channel on `server` backed by `read_half`/`write_half` and spawns its
/// reader/writer tasks. The channel is removed once the peer disconnects or a frame fails to
/// decode; in-flight requests on a dropped channel simply have nowhere to send their reply.
pub fn spawn_server_channel<C, T, R, W>(
    server: Arc<ServerContext<C, T>>,
    read_half: R,
    write_half: W,
    max_frame_bytes: usize,
) -> ChannelId
where
    C: Codec,
    T: ?Sized + Send + Sync + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let channel_id = server.add_channel(Arc::new(MpscWriter { tx }));

    tokio::spawn(writer_task(write_half, rx));

    let reader_server = server.clone();
    tokio::spawn(async move {
        // Each request is dispatched in its own task: `ServerContext::handle_request` may
        // suspend inside a method stub, and the reader loop must keep reading the next frame
        // while an earlier request is still in flight.
        reader_loop(read_half, max_frame_bytes, |frame| {
            let server = reader_server.clone();
            tokio::spawn(async move {
                server.handle_request(channel_id, frame).await;
            });
        })
        .await;
        reader_server.close_channel(channel_id);
    });

    channel_id
}
