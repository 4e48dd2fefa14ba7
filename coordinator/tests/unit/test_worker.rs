//! Request worker and run loop tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coa_protocol::envelope::{RequestEnvelope, ResponseEnvelope, REQUEST_ID_KEY};
use coa_protocol::state::ResultCode;
use coordinator::aggregator::SummaryRegistry;
use coordinator::app::options::{AppOptions, LifecycleOptions};
use coordinator::app::run::run_with_channel;
use coordinator::channel::memory::memory_channel;
use coordinator::channel::EnvelopeChannel;
use coordinator::dispatch::Dispatcher;
use coordinator::errors::CoordinatorError;
use coordinator::workers::requests;
use tokio::sync::{oneshot, Notify};
use tokio_test::{assert_err, assert_ok};

async fn no_sleep(_: Duration) {}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(SummaryRegistry::new()))
}

#[tokio::test]
async fn test_worker_answers_until_peer_leaves() {
    let (mut channel, mut peer) = memory_channel(4);
    let dispatcher = dispatcher();
    let registry = dispatcher.registry().clone();

    let worker = tokio::spawn(async move {
        requests::run(
            &requests::Options::default(),
            &mut channel,
            &dispatcher,
            no_sleep,
            Box::pin(std::future::pending::<()>()),
        )
        .await;
    });

    let response = assert_ok!(
        peer.request(
            RequestEnvelope::new("POST", "summaries/s1")
                .with_metadata(REQUEST_ID_KEY, "req-1")
                .with_parameter("generation", "2"),
        )
        .await
    );
    assert_eq!(response.state, ResultCode::OK);
    assert_eq!(response.request_id(), Some("req-1"));

    let response = assert_ok!(peer.request(RequestEnvelope::new("GET", "summaries/none")).await);
    assert_eq!(response.state, ResultCode::NOT_FOUND);
    assert!(response.request_id().is_some());

    drop(peer);
    assert_ok!(worker.await);
    assert_eq!(registry.get("s1").unwrap().generation, "2");
}

#[tokio::test]
async fn test_malformed_wire_gets_a_response() {
    let (mut channel, mut peer) = memory_channel(4);
    let dispatcher = dispatcher();

    let worker = tokio::spawn(async move {
        requests::run(
            &requests::Options::default(),
            &mut channel,
            &dispatcher,
            no_sleep,
            Box::pin(std::future::pending::<()>()),
        )
        .await;
    });

    assert_ok!(peer.send_wire("{not json").await);
    let response: ResponseEnvelope = peer.recv().await.unwrap();
    assert_eq!(response.state, ResultCode::NOT_FOUND);

    drop(peer);
    assert_ok!(worker.await);
}

#[tokio::test]
async fn test_worker_stops_on_shutdown_signal() {
    let (mut channel, _peer) = memory_channel(4);
    let dispatcher = dispatcher();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let worker = tokio::spawn(async move {
        requests::run(
            &requests::Options::default(),
            &mut channel,
            &dispatcher,
            no_sleep,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });

    assert_ok!(shutdown_tx.send(()));
    assert_ok!(assert_ok!(tokio::time::timeout(Duration::from_secs(5), worker).await));
}

/// Fails a fixed number of receives, then closes
struct FlakyChannel {
    failures_left: u32,
}

#[async_trait]
impl EnvelopeChannel for FlakyChannel {
    async fn receive(&mut self) -> Result<Option<RequestEnvelope>, CoordinatorError> {
        if self.failures_left == 0 {
            return Ok(None);
        }
        self.failures_left -= 1;
        Err(CoordinatorError::ChannelError("broker unavailable".to_string()))
    }

    async fn reply(
        &mut self,
        _request: &RequestEnvelope,
        _response: ResponseEnvelope,
    ) -> Result<(), CoordinatorError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_receive_failures_back_off() {
    let mut channel = FlakyChannel { failures_left: 5 };
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = sleeps.clone();
    let options = requests::Options {
        retry_delay: Duration::from_secs(5),
        max_retry_delay: Duration::from_secs(30),
    };

    requests::run(
        &options,
        &mut channel,
        &dispatcher(),
        move |wait| {
            recorded.lock().unwrap().push(wait);
            async {}
        },
        Box::pin(std::future::pending::<()>()),
    )
    .await;

    let secs: Vec<u64> = sleeps.lock().unwrap().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![5, 10, 20, 30, 30]);
}

#[tokio::test]
async fn test_run_with_channel_serves_and_shuts_down() {
    let (channel, mut peer) = memory_channel(4);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = tokio::spawn(run_with_channel(
        "test".to_string(),
        AppOptions::default(),
        channel,
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    let response = assert_ok!(peer.request(RequestEnvelope::new("POST", "summaries/s1")).await);
    assert_eq!(response.state, ResultCode::OK);
    let response = assert_ok!(peer.request(RequestEnvelope::new("GET", "summaries")).await);
    assert_eq!(response.state, ResultCode::OK);

    assert_ok!(shutdown_tx.send(()));
    assert_ok!(assert_ok!(app.await));
}

/// Hands out one request, then never finishes replying
struct StuckChannel {
    served: bool,
    replying: Arc<Notify>,
}

#[async_trait]
impl EnvelopeChannel for StuckChannel {
    async fn receive(&mut self) -> Result<Option<RequestEnvelope>, CoordinatorError> {
        if self.served {
            std::future::pending::<()>().await;
        }
        self.served = true;
        Ok(Some(RequestEnvelope::new("GET", "summaries")))
    }

    async fn reply(
        &mut self,
        _request: &RequestEnvelope,
        _response: ResponseEnvelope,
    ) -> Result<(), CoordinatorError> {
        self.replying.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_times_out_on_stuck_worker() {
    let replying = Arc::new(Notify::new());
    let channel = StuckChannel {
        served: false,
        replying: replying.clone(),
    };
    let options = AppOptions {
        lifecycle: LifecycleOptions {
            max_shutdown_delay: Duration::from_millis(50),
        },
        ..Default::default()
    };

    let shutdown = async move { replying.notified().await };
    let result = run_with_channel("test".to_string(), options, channel, shutdown).await;
    let err = assert_err!(result);
    assert!(matches!(err, CoordinatorError::ShutdownError(_)));
}
