//! Tests for the envelope shape, channel correlation, and debounce.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::channel::RpcChannel;
use crate::debounce::Debouncer;
use crate::debounce::RequestClass;
use crate::envelope::Envelope;
use crate::envelope::Request;
use crate::envelope::Response;
use crate::transport::DuplexTransport;
use crate::transport::FrameTransport;
use crate::worker;
use crate::worker::WorkerHandle;
use crate::worker::WorkerService;

/// Worker that answers every request with Success carrying the request's
/// running count.
struct CountingWorker {
    count: AtomicU32,
}

impl CountingWorker {
    fn new() -> Self {
        Self { count: AtomicU32::new(0) }
    }
}

#[async_trait::async_trait]
impl WorkerService for CountingWorker {
    async fn handle(&self, _request: Request) -> Response {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Response::Success { result: serde_json::json!(n) }
    }
}

fn diagnostics() -> Request {
    Request::GetDiagnostics
}

#[test]
fn envelope_wire_shape() {
    let envelope = Envelope::new(
        3,
        Request::SetDependency {
            version: Some("4.12.0".into()),
            key: "sdk".into(),
            package_id: "Toolchain.Sdk".into(),
            package_folder: "tools".into(),
        },
    );

    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["id"], 3);
    assert_eq!(json["$type"], "SetDependency");
    assert_eq!(json["packageId"], "Toolchain.Sdk");
    assert_eq!(json["packageFolder"], "tools");

    let back: Envelope<Request> = serde_json::from_value(json).unwrap();
    assert_eq!(back, envelope);
}

#[test]
fn envelope_without_id_is_unpaired() {
    let frame = r#"{"$type":"Ready"}"#;
    let envelope: Envelope<Response> = serde_json::from_str(frame).unwrap();
    assert!(envelope.id < 0);
    assert_eq!(envelope.payload, Response::Ready);
}

#[tokio::test]
async fn calls_are_correlated_in_order() {
    let (controller, worker_side) = DuplexTransport::pair();
    let service = Arc::new(CountingWorker::new());
    tokio::spawn(worker::serve(Arc::new(worker_side), service));

    let channel = RpcChannel::new(Arc::new(controller));
    channel.wait_ready().await.unwrap();

    for expected in 1u32..=5 {
        let response = channel.call(diagnostics()).await.unwrap();
        assert_eq!(
            response,
            Response::Success { result: serde_json::json!(expected) }
        );
    }
}

#[tokio::test]
async fn responses_drain_head_first() {
    let (controller, far) = DuplexTransport::pair();
    let far = Arc::new(far);
    let channel = RpcChannel::new(Arc::new(controller));

    // Push responses for ids 1 then 2 directly.
    for id in [1i64, 2] {
        let frame = serde_json::to_vec(&Envelope::new(
            id,
            Response::Success { result: serde_json::json!(id) },
        ))
        .unwrap();
        far.send(&frame).await.unwrap();
    }

    // Awaiting id 2 blocks while id 1 sits at the head.
    let blocked = tokio::time::timeout(Duration::from_millis(50), channel.receive(2)).await;
    assert!(blocked.is_err(), "receive(2) must not complete past an unconsumed head");

    let first = channel.receive(1).await.unwrap();
    assert_eq!(first, Response::Success { result: serde_json::json!(1) });
    let second = channel.receive(2).await.unwrap();
    assert_eq!(second, Response::Success { result: serde_json::json!(2) });
}

#[tokio::test]
async fn request_id_seven_gets_response_seven() {
    let (controller, far) = DuplexTransport::pair();
    let far = Arc::new(far);
    let channel = Arc::new(RpcChannel::new(Arc::new(controller)));

    // Echo worker: reply to each request frame under its own id.
    tokio::spawn({
        let far = far.clone();
        async move {
            while let Ok(Some(frame)) = far.recv().await {
                let envelope: Envelope<Request> = serde_json::from_slice(&frame).unwrap();
                let reply = Envelope::new(
                    envelope.id,
                    Response::Success { result: serde_json::json!(envelope.id) },
                );
                far.send(&serde_json::to_vec(&reply).unwrap()).await.unwrap();
            }
        }
    });

    // Drive ids 1..=7; the seventh call must see id 7's payload.
    let mut last = Response::Empty;
    for _ in 0..7 {
        last = channel.call(diagnostics()).await.unwrap();
    }
    assert_eq!(last, Response::Success { result: serde_json::json!(7) });
}

#[tokio::test]
async fn malformed_and_unpaired_frames_are_skipped() {
    let (controller, far) = DuplexTransport::pair();
    let far = Arc::new(far);
    let channel = RpcChannel::new(Arc::new(controller));

    // Garbage, then an unpaired frame, then a real response.
    far.send(&[0xFF, 0xFF, 0xFF]).await.unwrap();
    let unpaired = Envelope::new(-5, Response::Success { result: serde_json::json!("stray") });
    far.send(&serde_json::to_vec(&unpaired).unwrap()).await.unwrap();
    let real = Envelope::new(1, Response::Empty);
    far.send(&serde_json::to_vec(&real).unwrap()).await.unwrap();

    let response = channel.receive(1).await.unwrap();
    assert_eq!(response, Response::Empty);
}

#[tokio::test]
async fn ready_unblocks_startup() {
    let (controller, far) = DuplexTransport::pair();
    let far = Arc::new(far);
    let channel = RpcChannel::new(Arc::new(controller));

    let pending = tokio::time::timeout(Duration::from_millis(50), channel.wait_ready()).await;
    assert!(pending.is_err(), "ready must not fire before the handshake");

    let ready = Envelope::unpaired(Response::Ready);
    far.send(&serde_json::to_vec(&ready).unwrap()).await.unwrap();
    channel.wait_ready().await.unwrap();
}

#[tokio::test]
async fn closed_transport_fails_waiters() {
    let (controller, far) = DuplexTransport::pair();
    let channel = RpcChannel::new(Arc::new(controller));
    drop(far);

    let err = channel.receive(1).await.unwrap_err();
    assert!(matches!(err, crate::channel::Error::ChannelClosed));
}

#[tokio::test]
async fn local_handle_bypasses_serialization() {
    let handle = WorkerHandle::Local(Arc::new(CountingWorker::new()));
    let response = handle.call(diagnostics()).await.unwrap();
    assert_eq!(response, Response::Success { result: serde_json::json!(1) });
}

#[tokio::test(start_paused = true)]
async fn debounce_superseded_call_returns_fallback() {
    let debouncer = Arc::new(Debouncer::new(Duration::from_millis(500)));
    let ran = Arc::new(AtomicU32::new(0));

    let first = tokio::spawn({
        let debouncer = debouncer.clone();
        let ran = ran.clone();
        async move {
            debouncer
                .debounce(RequestClass::Completion, "fallback", || async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    "first"
                })
                .await
        }
    });

    // Let the first call install its handle before superseding it.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = {
        let debouncer = debouncer.clone();
        let ran = ran.clone();
        debouncer
            .debounce(RequestClass::Completion, "fallback", || async move {
                ran.fetch_add(1, Ordering::SeqCst);
                "second"
            })
            .await
    };

    assert_eq!(first.await.unwrap(), "fallback");
    assert_eq!(second, "second");
    // Only the superseding call's handler ran.
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn debounce_classes_are_independent() {
    let debouncer = Arc::new(Debouncer::new(Duration::from_millis(100)));

    let completion = tokio::spawn({
        let debouncer = debouncer.clone();
        async move {
            debouncer
                .debounce(RequestClass::Completion, 0, || async { 1 })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // A diagnostics call must not cancel the pending completion.
    let diag = debouncer
        .debounce(RequestClass::Diagnostics, 0, || async { 2 })
        .await;

    assert_eq!(completion.await.unwrap(), 1);
    assert_eq!(diag, 2);
}
