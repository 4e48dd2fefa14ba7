//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::channel::mqtt::MqttChannel;
use crate::channel::EnvelopeChannel;
use crate::errors::CoordinatorError;
use crate::workers::requests;

/// Run the coordinator against the configured MQTT broker
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CoordinatorError> {
    let address = &options.mqtt_channel.address;
    info!("Connecting to MQTT broker {}:{}...", address.host, address.port);
    let channel = MqttChannel::connect(&options.mqtt_channel).await?;
    run_with_channel(version, options, channel, shutdown_signal).await
}

/// Run the coordinator on any envelope channel
pub async fn run_with_channel<C>(
    version: String,
    options: AppOptions,
    channel: C,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CoordinatorError>
where
    C: EnvelopeChannel + 'static,
{
    info!("Initializing COA coordinator {}...", version);

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let app_state = Arc::new(AppState::new(version));
    shutdown_manager.with_app_state(app_state.clone())?;

    let worker_handle = init_request_worker(
        options.request_worker.clone(),
        app_state.clone(),
        channel,
        shutdown_tx.subscribe(),
    );
    shutdown_manager.with_request_worker_handle(worker_handle)?;

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

fn init_request_worker<C>(
    options: requests::Options,
    app_state: Arc<AppState>,
    mut channel: C,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    C: EnvelopeChannel + 'static,
{
    info!("Initializing request worker...");

    tokio::spawn(async move {
        requests::run(
            &options,
            &mut channel,
            &app_state.dispatcher,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    })
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    request_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            request_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), CoordinatorError> {
        if self.app_state.is_some() {
            return Err(CoordinatorError::ShutdownError(
                "app_state already set".to_string(),
            ));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_request_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), CoordinatorError> {
        if self.request_worker_handle.is_some() {
            return Err(CoordinatorError::ShutdownError(
                "request_worker_handle already set".to_string(),
            ));
        }
        self.request_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), CoordinatorError> {
        let _ = self.shutdown_tx.send(());

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Shutdown timed out after {:?}", max_delay);
                if let Some(handle) = self.request_worker_handle.take() {
                    handle.abort();
                }
                Err(CoordinatorError::ShutdownError(format!(
                    "timed out after {:?}",
                    max_delay
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), CoordinatorError> {
        info!("Shutting down COA coordinator...");

        // 1. Request worker
        if let Some(handle) = self.request_worker_handle.as_mut() {
            handle
                .await
                .map_err(|e| CoordinatorError::ShutdownError(e.to_string()))?;
            self.request_worker_handle = None;
        }

        // 2. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown();
        }

        info!("Shutdown complete");
        Ok(())
    }
}
