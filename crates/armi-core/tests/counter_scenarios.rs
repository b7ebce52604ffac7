use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use armi::category::{CategoryRegistry, ErrorCategory};
use armi::client::ClientContext;
use armi::error::{Error, ErrorKind};
use armi::server::{InterfaceStub, ServerContext};
use armi::testutil::{JsonTestCodec, LoopbackWriter};
use armi::types::{ChannelId, RequestId};
use async_trait::async_trait;

const INTERFACE_COUNTER: u32 = 0;
const METHOD_INCREMENT: u32 = 0;
const METHOD_DECREMENT: u32 = 1;
const METHOD_GET_VALUE: u32 = 2;
const METHOD_RESET: u32 = 3;
const METHOD_TRIGGER_ERROR: u32 = 4;
const METHOD_INCREMENT_BY: u32 = 5;
const METHOD_SLOW_GET_VALUE: u32 = 6;

struct Counter {
    value: AtomicI64,
}

/// Dispatch table used by this suite. `increment_by` decodes a single `i64` argument;
/// `slow_get_value` sleeps before replying, so a caller's timeout can legitimately fire
/// before the reply is even produced.
struct CounterStub;

#[async_trait]
impl InterfaceStub<JsonTestCodec, Counter> for CounterStub {
    async fn process(
        &self,
        codec: &JsonTestCodec,
        registry: &CategoryRegistry,
        target: &Counter,
        request_id: RequestId,
        method_id: u32,
        args: &[u8],
        arg_count: u32,
    ) -> Vec<u8> {
        let fail = |kind| armi::reply::encode_fail_reply(codec, registry, request_id, &Error::new(kind));

        match method_id {
            METHOD_INCREMENT if arg_count == 0 => {
                let v = target.value.fetch_add(1, Ordering::SeqCst) + 1;
                armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_DECREMENT if arg_count == 0 => {
                let v = target.value.fetch_sub(1, Ordering::SeqCst) - 1;
                armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_GET_VALUE if arg_count == 0 => {
                let v = target.value.load(Ordering::SeqCst);
                armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_RESET if arg_count == 0 => {
                target.value.store(0, Ordering::SeqCst);
                armi::reply::encode_void_reply(codec, request_id)
            }
            METHOD_TRIGGER_ERROR if arg_count == 0 => armi::reply::encode_fail_reply(
                codec,
                registry,
                request_id,
                &Error::Remote {
                    category: 2,
                    code: 7,
                    message: "aliens invaded".to_string(),
                },
            ),
            METHOD_INCREMENT_BY if arg_count == 1 => match codec.decode_value::<i64>(args) {
                Ok(n) => {
                    let v = target.value.fetch_add(n, Ordering::SeqCst) + n;
                    armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
                }
                Err(_) => fail(ErrorKind::InvalidArgumentType),
            },
            METHOD_SLOW_GET_VALUE if arg_count == 0 => {
                tokio::time::sleep(Duration::from_millis(60)).await;
                let v = target.value.load(Ordering::SeqCst);
                armi::reply::encode_normal_reply(codec, request_id, &v).unwrap()
            }
            METHOD_INCREMENT
            | METHOD_DECREMENT
            | METHOD_GET_VALUE
            | METHOD_RESET
            | METHOD_TRIGGER_ERROR
            | METHOD_INCREMENT_BY
            | METHOD_SLOW_GET_VALUE => fail(ErrorKind::InvalidArgumentCount),
            _ => fail(ErrorKind::InvalidMethodId),
        }
    }
}

struct AliensInvaded;
impl ErrorCategory for AliensInvaded {
    fn name(&self) -> &str {
        "aliens_invaded"
    }
    fn message(&self, value: u32) -> String {
        format!("invasion code {value}")
    }
}

fn wire_up() -> (Arc<ClientContext<JsonTestCodec>>, ChannelId) {
    let codec = Arc::new(JsonTestCodec);

    let mut registry = CategoryRegistry::new();
    registry.register(Arc::new(AliensInvaded));
    let registry = Arc::new(registry);

    let server = Arc::new(
        ServerContext::builder(codec.clone())
            .interface(Arc::new(CounterStub))
            .category_registry(registry.clone())
            .build({
                let counter = Arc::new(Counter {
                    value: AtomicI64::new(0),
                });
                move |_channel_id| Some(counter.clone())
            }),
    );

    let client = ClientContext::builder(codec).category_registry(registry).build();

    // Client -> server: frames written by the client are delivered straight to the server's
    // dispatch, on a channel id the server allocates for this same connection.
    let server_for_client_writer = server.clone();
    let client_weak_for_server_reply = Arc::downgrade(&client);
    let server_channel_id = server.add_channel(Arc::new(LoopbackWriter::new(
        move |frame: Vec<u8>| -> Result<(), Error> {
            if let Some(client) = client_weak_for_server_reply.upgrade() {
                client.handle_reply(&frame);
            }
            Ok(())
        },
    )));

    let channel_id = client.add_channel(Arc::new(LoopbackWriter::new(
        move |frame: Vec<u8>| -> Result<(), Error> {
            // `handle_request` is async and may suspend inside a method stub (e.g. the slow
            // method below); dispatch it on its own task so this `send` call, made from
            // inside `ClientContext::call`, never blocks waiting for a reply to come back.
            let server = server_for_client_writer.clone();
            tokio::spawn(async move {
                server.handle_request(server_channel_id, frame).await;
            });
            Ok(())
        },
    )));

    (client, channel_id)
}

#[tokio::test]
async fn counter_increment_decrement_get_value() {
    let (client, channel_id) = wire_up();

    let inc = |c: Arc<ClientContext<JsonTestCodec>>, ch: ChannelId| async move {
        c.call(
            ch,
            INTERFACE_COUNTER,
            METHOD_INCREMENT,
            0,
            Vec::new(),
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await
    };

    assert_eq!(inc(client.clone(), channel_id).await.unwrap(), 1);
    assert_eq!(inc(client.clone(), channel_id).await.unwrap(), 2);

    let dec: i64 = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_DECREMENT,
            0,
            Vec::new(),
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await
        .unwrap();
    assert_eq!(dec, 1);

    let value: i64 = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_GET_VALUE,
            0,
            Vec::new(),
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await
        .unwrap();
    assert_eq!(value, 1);
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn void_method_resolves_without_value() {
    let (client, channel_id) = wire_up();

    client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_RESET,
            0,
            Vec::new(),
            None,
            |_codec, bytes| {
                assert!(bytes.is_empty());
                Ok(())
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn argument_count_mismatch_fails_and_clears_registry() {
    let (client, channel_id) = wire_up();

    let result: Result<i64, Error> = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_GET_VALUE,
            3,
            Vec::new(),
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidArgumentCount));
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn argument_type_mismatch_fails_with_invalid_argument_type() {
    let (client, channel_id) = wire_up();

    // `increment_by` decodes its single argument as an `i64`; sending a JSON string instead
    // exercises the decode-failure arm of argument dispatch, not just the arg-count check.
    let bad_args = serde_json::to_vec("not a number").unwrap();

    let result: Result<i64, Error> = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_INCREMENT_BY,
            1,
            bad_args,
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::InvalidArgumentType));
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn server_exception_round_trips_application_category() {
    let (client, channel_id) = wire_up();

    let result: Result<i64, Error> = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_TRIGGER_ERROR,
            0,
            Vec::new(),
            None,
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await;

    match result.unwrap_err() {
        Error::Remote { category, code, .. } => {
            assert_eq!(category, 2);
            assert_eq!(code, 7);
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn channel_disconnect_rejects_every_pending_request_in_order() {
    let codec = Arc::new(JsonTestCodec);
    let client = ClientContext::builder(codec).build();

    let recording = armi::testutil::RecordingWriter::default();
    let channel_id = client.add_channel(Arc::new(recording));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .call(
                    channel_id,
                    INTERFACE_COUNTER,
                    METHOD_GET_VALUE,
                    0,
                    Vec::new(),
                    None,
                    |codec, bytes| codec.decode_value::<i64>(bytes),
                )
                .await
        }));
    }

    // Give every spawned call a chance to register before the channel is torn down.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(client.pending_count(), 5);
    client.cancel_channel_requests(channel_id, Error::new(ErrorKind::ChannelClosed));
    assert_eq!(client.pending_count(), 0);
    assert!(!client.is_channel_valid(channel_id));

    for handle in handles {
        let result: Result<i64, Error> = handle.await.unwrap();
        assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::ChannelClosed));
    }
}

#[tokio::test]
async fn timeout_never_delivered_reply_still_fails_the_call() {
    let codec = Arc::new(JsonTestCodec);
    let client = ClientContext::builder(codec).build();

    // A writer that never replies: the request times out deterministically because no frame
    // ever arrives at all.
    let never_replies = Arc::new(StdMutex::new(Vec::<Vec<u8>>::new()));
    let channel_id = client.add_channel(Arc::new(LoopbackWriter::new({
        let never_replies = never_replies.clone();
        move |frame: Vec<u8>| -> Result<(), Error> {
            never_replies.lock().unwrap().push(frame);
            Ok(())
        }
    })));

    let result: Result<i64, Error> = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_GET_VALUE,
            0,
            Vec::new(),
            Some(Duration::from_millis(20)),
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::TimedOut));
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn timeout_races_a_genuine_late_reply() {
    let (client, channel_id) = wire_up();

    // `slow_get_value` sleeps 60ms before replying; a 20ms timeout fires well before the
    // stub even starts building its reply, so this exercises the timeout firing *first*
    // with a real reply still in flight behind it, not merely the "no reply ever" case.
    let result: Result<i64, Error> = client
        .call(
            channel_id,
            INTERFACE_COUNTER,
            METHOD_SLOW_GET_VALUE,
            0,
            Vec::new(),
            Some(Duration::from_millis(20)),
            |codec, bytes| codec.decode_value::<i64>(bytes),
        )
        .await;
    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::TimedOut));
    assert_eq!(client.pending_count(), 0);

    // Let the stub's sleep elapse and its reply actually arrive at the client. The request
    // id was already forgotten when the timeout fired, so `handle_reply` must drop this
    // frame silently rather than resolve (or panic on) a no-longer-pending request.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.pending_count(), 0);
}
