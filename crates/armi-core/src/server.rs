//! Server context: decodes incoming requests, dispatches to the bound interface stub, and
//! sends back replies through the adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::category::CategoryRegistry;
use crate::channel_manager::ChannelManager;
use crate::error::{Error, ErrorKind};
use crate::reply::encode_fail_reply;
use crate::transport::ChannelWriter;
use crate::types::{ChannelId, MethodId, RequestId};
use crate::wire::Codec;

/// One interface's method table, implemented by generated (or hand-written) server code.
///
/// `process` is the method stub's dispatch: it decodes its arguments, invokes the target
/// method, and itself serializes the resulting normal or fail reply frame (header + payload).
/// It is `async` so a method implementation may suspend before its reply is known — on a
/// nested call, a timer, or any other `.await` — rather than requiring its return value to
/// already be resolved by the time dispatch calls it.
#[async_trait]
pub trait InterfaceStub<C: Codec, T: ?Sized>: Send + Sync {
    async fn process(
        &self,
        codec: &C,
        registry: &CategoryRegistry,
        target: &T,
        request_id: RequestId,
        method_id: MethodId,
        args: &[u8],
        arg_count: u32,
    ) -> Vec<u8>;
}

pub struct ServerContextBuilder<C: Codec, T: ?Sized> {
    codec: Arc<C>,
    stubs: Vec<Arc<dyn InterfaceStub<C, T>>>,
    category_registry: Option<Arc<CategoryRegistry>>,
}

impl<C: Codec, T: ?Sized + Send + Sync + 'static> ServerContextBuilder<C, T> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            stubs: Vec::new(),
            category_registry: None,
        }
    }

    /// Registers the next interface; its index in this table is its wire `interface_id`.
    pub fn interface(mut self, stub: Arc<dyn InterfaceStub<C, T>>) -> Self {
        self.stubs.push(stub);
        self
    }

    pub fn category_registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.category_registry = Some(registry);
        self
    }

    pub fn build(
        self,
        target_binder: impl Fn(ChannelId) -> Option<Arc<T>> + Send + Sync + 'static,
    ) -> ServerContext<C, T> {
        ServerContext {
            codec: self.codec,
            stubs: self.stubs,
            channels: ChannelManager::new(),
            target_binder: Box::new(target_binder),
            category_registry: self
                .category_registry
                .unwrap_or_else(|| Arc::new(CategoryRegistry::new())),
        }
    }
}

pub struct ServerContext<C: Codec, T: ?Sized> {
    codec: Arc<C>,
    stubs: Vec<Arc<dyn InterfaceStub<C, T>>>,
    channels: ChannelManager<Arc<dyn ChannelWriter>>,
    target_binder: Box<dyn Fn(ChannelId) -> Option<Arc<T>> + Send + Sync>,
    category_registry: Arc<CategoryRegistry>,
}

impl<C: Codec, T: ?Sized + Send + Sync + 'static> ServerContext<C, T> {
    pub fn builder(codec: Arc<C>) -> ServerContextBuilder<C, T> {
        ServerContextBuilder::new(codec)
    }

    pub fn add_channel(&self, writer: Arc<dyn ChannelWriter>) -> ChannelId {
        self.channels.new_channel(writer)
    }

    /// Marks the channel closing before dropping it, so a send racing this close sees an
    /// invalid channel rather than slipping through between the two steps.
    pub fn close_channel(&self, channel_id: ChannelId) {
        self.channels.mark_closing(channel_id);
        self.channels.remove(channel_id);
    }

    /// Entry point for every inbound request frame, called by the adapter. `async` because
    /// dispatch itself may suspend inside the target method's stub (see [`InterfaceStub`]);
    /// the adapter is expected to run each call in its own task so one slow request cannot
    /// stall the channel's reader loop.
    pub async fn handle_request(&self, channel_id: ChannelId, buffer: Vec<u8>) {
        let (header, rest) = match self.codec.decode_request_header(&buffer) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, channel_id, "dropping malformed request frame");
                return;
            }
        };

        let reply_frame = if header.interface_id as usize >= self.stubs.len() {
            encode_fail_reply(
                &self.codec,
                &self.category_registry,
                header.request_id,
                &Error::new(ErrorKind::InvalidInterfaceId),
            )
        } else {
            match (self.target_binder)(channel_id) {
                None => encode_fail_reply(
                    &self.codec,
                    &self.category_registry,
                    header.request_id,
                    &Error::new(ErrorKind::NoTargetProvided),
                ),
                Some(target) => {
                    let stub = &self.stubs[header.interface_id as usize];
                    stub.process(
                        &self.codec,
                        &self.category_registry,
                        target.as_ref(),
                        header.request_id,
                        header.method_id,
                        rest,
                        header.arg_count,
                    )
                    .await
                }
            }
        };

        self.send_reply(channel_id, reply_frame);
    }

    fn send_reply(&self, channel_id: ChannelId, frame: Vec<u8>) {
        match self.channels.get(channel_id) {
            Some(writer) => {
                if let Err(err) = writer.send(frame) {
                    warn!(error = %err, channel_id, "failed to send reply, closing channel");
                    self.channels.remove(channel_id);
                }
            }
            None => warn!(channel_id, "dropped reply for unknown or closed channel"),
        }
    }
}
