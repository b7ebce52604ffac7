//! Client context: issues requests, correlates replies, enforces per-call timeouts, and
//! routes cancellation on channel loss or context close.
//!
//! Reply correlation follows the same shape as a JSON-RPC transport's pending-request table
//! (`PendingRequests: HashMap<RequestId, oneshot::Sender<...>>`, `next_id: AtomicU64`), with
//! the request/reply bodies treated as opaque bytes instead of `serde_json::Value` so the
//! context stays codec-agnostic (the generated proxy, not the context, knows the concrete
//! argument/return types).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::category::CategoryRegistry;
use crate::channel_manager::ChannelManager;
use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::transport::{ChannelWriter, Scheduler};
use crate::types::{ChannelId, RawReply, ReplyKind, RequestHeader, RequestId};
use crate::wire::Codec;

struct PendingEntry {
    channel_id: ChannelId,
    sender: oneshot::Sender<Result<RawReply, Error>>,
}

/// Builder for [`ClientContext`]: a typed builder struct rather than a constructor with a
/// long optional-argument list.
pub struct ClientContextBuilder<C: Codec> {
    codec: Arc<C>,
    scheduler: Option<Arc<dyn Scheduler>>,
    category_registry: Option<Arc<CategoryRegistry>>,
    config: Option<Config>,
}

impl<C: Codec> ClientContextBuilder<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            scheduler: None,
            category_registry: None,
            config: None,
        }
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn category_registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.category_registry = Some(registry);
        self
    }

    /// Recognised options: `default_timeout` (applied when a call omits its own timeout) and
    /// `transient_timeout` (consumed by the next call only). `framing` is read by the
    /// transport adapter that wires this context up, not by the context itself.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Arc<ClientContext<C>> {
        Arc::new(ClientContext {
            codec: self.codec,
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(BTreeMap::new()),
            channel_requests: Mutex::new(HashMap::new()),
            channels: ChannelManager::new(),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Arc::new(crate::transport::TokioScheduler)),
            category_registry: self
                .category_registry
                .unwrap_or_else(|| Arc::new(CategoryRegistry::new())),
            config: Mutex::new(self.config.unwrap_or_default()),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct ClientContext<C: Codec> {
    codec: Arc<C>,
    next_request_id: AtomicU64,
    pending: Mutex<BTreeMap<RequestId, PendingEntry>>,
    channel_requests: Mutex<HashMap<ChannelId, BTreeSet<RequestId>>>,
    channels: ChannelManager<Arc<dyn ChannelWriter>>,
    scheduler: Arc<dyn Scheduler>,
    category_registry: Arc<CategoryRegistry>,
    config: Mutex<Config>,
    closed: AtomicBool,
}

impl<C: Codec> ClientContext<C> {
    pub fn builder(codec: Arc<C>) -> ClientContextBuilder<C> {
        ClientContextBuilder::new(codec)
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    pub fn category_registry(&self) -> &Arc<CategoryRegistry> {
        &self.category_registry
    }

    /// Registers a new channel (typically called by the adapter once a connection completes).
    pub fn add_channel(&self, writer: Arc<dyn ChannelWriter>) -> ChannelId {
        self.channels.new_channel(writer)
    }

    pub fn is_channel_valid(&self, channel_id: ChannelId) -> bool {
        self.channels.is_valid(channel_id)
    }

    pub fn next_request_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Overrides the timeout applied to the next call that doesn't set its own, consuming the
    /// override after that one call (falls back to `default_timeout` after that).
    pub fn set_transient_timeout(&self, timeout: Duration) {
        self.config.lock().unwrap().transient_timeout = Some(timeout);
    }

    /// Removes `request_id` from its channel's index, dropping the channel's entry entirely
    /// once its last request is gone rather than leaving an empty set behind.
    fn untrack(&self, channel_id: ChannelId, request_id: RequestId) {
        let mut channel_requests = self.channel_requests.lock().unwrap();
        if let Some(set) = channel_requests.get_mut(&channel_id) {
            set.remove(&request_id);
            if set.is_empty() {
                channel_requests.remove(&channel_id);
            }
        }
    }

    /// Registers a pending continuation for `request_id` on `channel_id`.
    fn register(
        &self,
        request_id: RequestId,
        channel_id: ChannelId,
    ) -> Result<oneshot::Receiver<Result<RawReply, Error>>, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::ContextClosed));
        }
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(
            request_id,
            PendingEntry {
                channel_id,
                sender: tx,
            },
        );
        self.channel_requests
            .lock()
            .unwrap()
            .entry(channel_id)
            .or_default()
            .insert(request_id);
        Ok(rx)
    }

    /// Issues a request carrying already-encoded argument bytes and awaits a typed reply.
    ///
    /// `timeout` of `None`/zero means unbounded, matching the `default_timeout = 0` config
    /// default. On success with a value reply, `decode` is applied to the raw payload.
    pub async fn call<T>(
        self: &Arc<Self>,
        channel_id: ChannelId,
        interface_id: u32,
        method_id: u32,
        arg_count: u32,
        args: Vec<u8>,
        timeout: Option<Duration>,
        decode: impl FnOnce(&C, &[u8]) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let request_id = self.next_request_id();
        let rx = self.register(request_id, channel_id)?;

        let timeout = timeout.or_else(|| self.config.lock().unwrap().take_effective_timeout());

        let header = RequestHeader {
            request_id,
            interface_id,
            method_id,
            arg_count,
        };
        let mut frame = self.codec.encode_request_header(&header);
        frame.extend(args);

        if let Err(err) = self.send_frame(channel_id, frame) {
            self.cancel_request(request_id, err.clone());
            return Err(err);
        }

        if let Some(delay) = timeout.filter(|d| !d.is_zero()) {
            let this = Arc::clone(self);
            self.scheduler.schedule_after(
                delay,
                Box::new(move || {
                    this.cancel_request(request_id, Error::new(ErrorKind::TimedOut));
                }),
            );
        }

        let raw = rx
            .await
            .map_err(|_| Error::new(ErrorKind::ChannelClosed))??;

        match raw.reply_kind {
            ReplyKind::Normal => decode(&self.codec, &raw.payload),
            ReplyKind::Fail => {
                let (category, code, message) = self.codec.decode_error(&raw.payload)?;
                let mut err = self.category_registry.decode(category, code);
                if let Error::Remote { message: m, .. } = &mut err {
                    *m = message;
                }
                Err(err)
            }
        }
    }

    fn send_frame(&self, channel_id: ChannelId, frame: Vec<u8>) -> Result<(), Error> {
        let writer = self
            .channels
            .get(channel_id)
            .ok_or_else(|| Error::new(ErrorKind::InvalidChannelId))?;
        writer.send(frame)
    }

    /// Entry point for every inbound frame on this context, called by the adapter.
    pub fn handle_reply(&self, buffer: &[u8]) {
        let (header, rest) = match self.codec.decode_reply_header(buffer) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "dropping malformed reply frame");
                return;
            }
        };

        let entry = self.pending.lock().unwrap().remove(&header.request_id);
        let Some(entry) = entry else {
            debug!(request_id = header.request_id, "reply for unknown request dropped");
            return;
        };
        self.untrack(entry.channel_id, header.request_id);

        let raw = RawReply {
            reply_kind: header.reply_kind,
            payload: rest.to_vec(),
        };
        // The continuation is a task awaiting the oneshot receiver; if the receiver has
        // already been dropped (the caller gave up, e.g. after cancellation), the reply is
        // simply discarded rather than treated as exception_thrown_by_reply_handler, which
        // covers a panic inside the awaiting task itself.
        let _ = entry.sender.send(Ok(raw));
    }

    pub fn cancel_request(&self, request_id: RequestId, err: Error) {
        let entry = self.pending.lock().unwrap().remove(&request_id);
        if let Some(entry) = entry {
            self.untrack(entry.channel_id, request_id);
            let _ = entry.sender.send(Err(err));
        }
    }

    /// Rejects every pending request on `channel_id`, in issuance order, then drops the channel.
    pub fn cancel_channel_requests(&self, channel_id: ChannelId, err: Error) {
        // Mark the channel closing first so a send racing this teardown observes an invalid
        // channel rather than handing a frame to a writer about to be torn down.
        self.channels.mark_closing(channel_id);

        let ids: Vec<RequestId> = self
            .channel_requests
            .lock()
            .unwrap()
            .remove(&channel_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for id in ids {
            self.cancel_request(id, err.clone());
        }
        self.channels.remove(channel_id);
    }

    pub fn cancel_all_requests(&self, err: Error) {
        let ids: Vec<RequestId> = self.pending.lock().unwrap().keys().copied().collect();
        for id in ids {
            self.cancel_request(id, err.clone());
        }
    }

    /// Flips the context into a closing state, rejects every outstanding request, and drops
    /// every registered channel.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_all_requests(Error::new(ErrorKind::ContextClosed));
        self.channels.visit_and_remove_all(|_id, _writer| {});
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}
