pub mod config;
pub mod error;
pub mod logging;
pub mod playback;
pub mod request;
pub mod state;
pub mod stream;
pub mod window;

pub use config::{SyncArgs, SyncConfig};
pub use error::SyncError;
pub use playback::{PlaybackClock, PlaybackController, PlaybackSnapshot};
pub use request::{CachedRequestClient, CredentialStore, HttpMethod, RequestOptions};
pub use state::SyncServices;
pub use stream::{
    ConnectionClient, ConnectionOptions, ConnectionState, ConnectionStatusAggregator,
    StreamMessage, Subscription, TelemetryMessage,
};
pub use window::{DataWindow, IngestProgress, Virtualizer};

use tracing::{debug, info};

pub async fn run() -> Result<(), SyncError> {
    logging::init_tracing();
    let services = SyncServices::from_env()?;
    info!(
        api = services.api.base_url(),
        stream = services.config.stream_url.as_deref().unwrap_or("-"),
        "telemetry sync started"
    );

    let _subscription = match services.config.stream_url.as_deref() {
        Some(url) => {
            let stream = services.stream(url)?;
            Some(stream.subscribe(|message: &TelemetryMessage| {
                debug!(
                    driver = message.driver_number(),
                    date = message.date(),
                    record = ?message,
                    "telemetry record"
                );
            }))
        }
        None => None,
    };

    let mut aggregator = services.status_aggregator();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            composite = aggregator.changed() => {
                match composite {
                    Some(state) => info!(%state, "composite stream status"),
                    None => {
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                }
            }
        }
    }

    services.shutdown().await;
    Ok(())
}
