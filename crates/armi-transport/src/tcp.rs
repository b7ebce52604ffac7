//! TCP adapter: binds a [`armi::client::ClientContext`] or [`armi::server::ServerContext`] to
//! a `tokio::net::TcpStream`, length-prefix-framed by [`crate::framer`].

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use armi::client::ClientContext;
use armi::error::Error;
use armi::server::ServerContext;
use armi::types::ChannelId;
use armi::wire::Codec;

use crate::config::TransportConfig;
use crate::link;

/// Dials `addr` and registers the connection as a new channel on `client`.
pub async fn connect<C: Codec>(
    addr: impl ToSocketAddrs,
    client: Arc<ClientContext<C>>,
    max_frame_bytes: usize,
) -> Result<ChannelId, Error> {
    let stream = TcpStream::connect(addr).await.map_err(Error::Io)?;
    stream.set_nodelay(true).map_err(Error::Io)?;
    let (read_half, write_half) = tokio::io::split(stream);
    Ok(link::spawn_client_channel(client, read_half, write_half, max_frame_bytes))
}

/// Listens on `addr`, accepting connections one at a time and binding each as a new channel
/// on `server`. Runs until the listener errors; callers that want concurrent acceptance
/// should spawn this in its own task.
pub async fn serve<C, T>(
    addr: impl ToSocketAddrs,
    server: Arc<ServerContext<C, T>>,
    max_frame_bytes: usize,
) -> Result<(), Error>
where
    C: Codec,
    T: ?Sized + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await.map_err(Error::Io)?;
    loop {
        let (stream, _peer) = listener.accept().await.map_err(Error::Io)?;
        stream.set_nodelay(true).map_err(Error::Io)?;
        let (read_half, write_half) = tokio::io::split(stream);
        link::spawn_server_channel(server.clone(), read_half, write_half, max_frame_bytes);
    }
}

/// Dials the address and frame bound named in `config`.
pub async fn connect_with_config<C: Codec>(
    config: &TransportConfig,
    client: Arc<ClientContext<C>>,
) -> Result<ChannelId, Error> {
    connect(config.bind_addr.clone(), client, config.max_frame_bytes).await
}

/// Listens on the address and frame bound named in `config`.
pub async fn serve_with_config<C, T>(
    config: &TransportConfig,
    server: Arc<ServerContext<C, T>>,
) -> Result<(), Error>
where
    C: Codec,
    T: ?Sized + Send + Sync + 'static,
{
    serve(config.bind_addr.clone(), server, config.max_frame_bytes).await
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
    async fn client_calls_server_over_tcp_loopback() {
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

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn({
            let server = server.clone();
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let (r, w) = tokio::io::split(stream);
                    link::spawn_server_channel(server.clone(), r, w, 1 << 20);
                }
            }
        });

        let client = ClientContext::builder(codec).build();
        let channel_id = connect(addr, client.clone(), 1 << 20).await.unwrap();

        let value: i64 = client
            .call(channel_id, 0, 0, 0, Vec::new(), Some(Duration::from_secs(5)), |codec, bytes| {
                codec.decode_value::<i64>(bytes)
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
