//! A hand-written proxy/stub pair for one interface, playing the part a code generator would
//! normally fill in: the dispatch engine itself (`armi-core`) never sees typed arguments or
//! return values, only interface/method ids and raw bytes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use armi::category::CategoryRegistry;
use armi::client::ClientContext;
use armi::error::Error;
use armi::reply;
use armi::server::InterfaceStub;
use armi::types::{ChannelId, RequestId};
use armi::wire::Codec;
use async_trait::async_trait;

pub const INTERFACE_COUNTER: u32 = 0;

const METHOD_INCREMENT: u32 = 0;
const METHOD_DECREMENT: u32 = 1;
const METHOD_GET_VALUE: u32 = 2;
const METHOD_RESET: u32 = 3;
const METHOD_INCREMENT_BY: u32 = 4;

/// The server-side state one interface instance is bound to.
#[derive(Default)]
pub struct Counter {
    value: AtomicI64,
}

/// Dispatch table for [`Counter`]. Every method but `increment_by` is niladic; `increment_by`
/// decodes a single `i64` argument before touching the target.
pub struct CounterStub;

#[async_trait]
impl<C: Codec> InterfaceStub<C, Counter> for CounterStub {
    async fn process(
        &self,
        codec: &C,
        registry: &CategoryRegistry,
        target: &Counter,
        request_id: RequestId,
        method_id: u32,
        args: &[u8],
        arg_count: u32,
    ) -> Vec<u8> {
        let fail = |kind| reply::encode_fail_reply(codec, registry, request_id, &Error::new(kind));

        match method_id {
            METHOD_INCREMENT if arg_count == 0 => {
                let v = target.value.fetch_add(1, Ordering::SeqCst) + 1;
                reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_DECREMENT if arg_count == 0 => {
                let v = target.value.fetch_sub(1, Ordering::SeqCst) - 1;
                reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_GET_VALUE if arg_count == 0 => {
                let v = target.value.load(Ordering::SeqCst);
                reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_RESET if arg_count == 0 => {
                target.value.store(0, Ordering::SeqCst);
                reply::encode_void_reply(codec, request_id)
            }
            METHOD_INCREMENT_BY if arg_count == 1 => match codec.decode_value::<i64>(args) {
                Ok(n) => {
                    let v = target.value.fetch_add(n, Ordering::SeqCst) + n;
                    reply::encode_normal_reply(codec, request_id, &v).unwrap()
                }
                Err(_) => fail(armi::ErrorKind::InvalidArgumentType),
            },
            METHOD_INCREMENT | METHOD_DECREMENT | METHOD_GET_VALUE | METHOD_RESET | METHOD_INCREMENT_BY => {
                fail(armi::ErrorKind::InvalidArgumentCount)
            }
            _ => fail(armi::ErrorKind::InvalidMethodId),
        }
    }
}

/// Client-side handle a generator would emit: one typed method per remote method, each a thin
/// wrapper over [`ClientContext::call`].
pub struct CounterProxy<C: Codec> {
    client: Arc<ClientContext<C>>,
    channel_id: ChannelId,
    timeout: Option<Duration>,
}

impl<C: Codec> CounterProxy<C> {
    pub fn new(client: Arc<ClientContext<C>>, channel_id: ChannelId, timeout: Option<Duration>) -> Self {
        Self {
            client,
            channel_id,
            timeout,
        }
    }

    async fn call_niladic(&self, method_id: u32) -> Result<i64, Error> {
        self.client
            .call(
                self.channel_id,
                INTERFACE_COUNTER,
                method_id,
                0,
                Vec::new(),
                self.timeout,
                |codec, bytes| codec.decode_value::<i64>(bytes),
            )
            .await
    }

    pub async fn increment(&self) -> Result<i64, Error> {
        self.call_niladic(METHOD_INCREMENT).await
    }

    pub async fn decrement(&self) -> Result<i64, Error> {
        self.call_niladic(METHOD_DECREMENT).await
    }

    pub async fn get_value(&self) -> Result<i64, Error> {
        self.call_niladic(METHOD_GET_VALUE).await
    }

    pub async fn increment_by(&self, n: i64) -> Result<i64, Error> {
        let args = self.client.codec().encode_value(&n)?;
        self.client
            .call(
                self.channel_id,
                INTERFACE_COUNTER,
                METHOD_INCREMENT_BY,
                1,
                args,
                self.timeout,
                |codec, bytes| codec.decode_value::<i64>(bytes),
            )
            .await
    }

    pub async fn reset(&self) -> Result<(), Error> {
        self.client
            .call(
                self.channel_id,
                INTERFACE_COUNTER,
                METHOD_RESET,
                0,
                Vec::new(),
                self.timeout,
                |_codec, _bytes| Ok(()),
            )
            .await
    }
}
