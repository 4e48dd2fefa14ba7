//! Request worker
//!
//! Pulls envelopes off a channel, dispatches them and sends the responses
//! back until the channel closes or shutdown is signalled.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::channel::EnvelopeChannel;
use crate::dispatch::Dispatcher;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Request worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Wait after the first failed receive, doubled on each consecutive failure
    pub retry_delay: Duration,

    /// Cap on the wait between failed receives
    pub max_retry_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(60),
        }
    }
}

/// Run the request worker
pub async fn run<C, S, F>(
    options: &Options,
    channel: &mut C,
    dispatcher: &Dispatcher,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    C: EnvelopeChannel,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Request worker starting...");

    let cooldown = CooldownOptions {
        base_delay: options.retry_delay,
        max_delay: options.max_retry_delay,
        ..Default::default()
    };
    let mut failures: u32 = 0;

    loop {
        let received = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Request worker shutting down...");
                return;
            }
            received = channel.receive() => received,
        };

        match received {
            Ok(Some(request)) => {
                failures = 0;
                debug!("Received {} {}", request.method, request.route);
                let response = dispatcher.dispatch(&request);
                if let Err(e) = channel.reply(&request, response).await {
                    error!(
                        "Failed to reply to {} {}: {}",
                        request.method, request.route, e
                    );
                }
            }
            Ok(None) => {
                info!("Request channel closed, request worker exiting");
                return;
            }
            Err(e) => {
                let wait = calc_exp_backoff(&cooldown, failures);
                failures = failures.saturating_add(1);
                warn!("Failed to receive request: {}, retrying in {:?}", e, wait);
                tokio::select! {
                    _ = &mut shutdown_signal => {
                        info!("Request worker shutting down...");
                        return;
                    }
                    _ = sleep_fn(wait) => {}
                }
            }
        }
    }
}
