//! In-memory duplex transport: wires a client and server context together in one process,
//! without a socket. Used by tests and by the counter demo's in-process mode.

use std::sync::Arc;

use armi::client::ClientContext;
use armi::server::ServerContext;
use armi::types::ChannelId;
use armi::wire::Codec;

use crate::link;

/// Bytes buffered in each direction before a writer blocks. 64 KiB comfortably holds a
/// handful of in-flight frames for the sizes this runtime deals in.
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

/// Connects `client` and `server` over an in-memory duplex pipe and returns
/// `(client_channel_id, server_channel_id)`.
pub fn connect<C, T>(
    client: Arc<ClientContext<C>>,
    server: Arc<ServerContext<C, T>>,
    max_frame_bytes: usize,
) -> (ChannelId, ChannelId)
where
    C: Codec,
    T: ?Sized + Send + Sync + 'static,
{
    let (client_side, server_side) = tokio::io::duplex(DEFAULT_BUFFER_BYTES);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, server_write) = tokio::io::split(server_side);

    let client_channel_id = link::spawn_client_channel(client, client_read, client_write, max_frame_bytes);
    let server_channel_id = link::spawn_server_channel(server, server_read, server_write, max_frame_bytes);

    (client_channel_id, server_channel_id)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use armi::category::CategoryRegistry;
    use armi::server::InterfaceStub;
    use armi::types::RequestId;
    use armi_codec::TaggedCodec;
    use async_trait::async_trait;

    use super::*;

    struct Counter {
        value: AtomicI64,
    }

    struct CounterStub;

    #[async_trait]
    impl InterfaceStub<TaggedCodec, Counter> for CounterStub {
        async fn process(
            &self,
            codec: &TaggedCodec,
            _registry: &CategoryRegistry,
            target: &Counter,
            request_id: RequestId,
            _method_id: u32,
            _args: &[u8],
            _arg_count: u32,
        ) -> Vec<u8> {
            let v = target.value.fetch_add(1, Ordering::SeqCst) + 1;
            armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
        }
    }

    #[tokio::test]
    async fn client_calls_server_over_in_memory_duplex() {
        let codec = Arc::new(TaggedCodec);
        let server = Arc::new(
            ServerContext::builder(codec.clone())
                .interface(Arc::new(CounterStub))
                .build(|_channel_id| {
                    Some(Arc::new(Counter {
                        value: AtomicI64::new(0),
                    }))
                }),
        );
        let client = ClientContext::builder(codec).build();

        let (channel_id, _server_channel_id) = connect(client.clone(), server, 1 << 16);

        let value: i64 = client
            .call(channel_id, 0, 0, 0, Vec::new(), Some(Duration::from_secs(5)), |codec, bytes| {
                codec.decode_value::<i64>(bytes)
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
