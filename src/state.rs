use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::request::{CachedRequestClient, CredentialStore};
use crate::stream::{ConnectionClient, ConnectionOptions, ConnectionStatusAggregator, TelemetryMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub type TelemetryStream = ConnectionClient<TelemetryMessage>;

pub struct SyncServices {
    pub started_at: Instant,
    pub config: SyncConfig,
    pub credentials: CredentialStore,
    pub api: Arc<CachedRequestClient>,
    streams: Mutex<HashMap<String, Arc<TelemetryStream>>>,
}

impl SyncServices {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let credentials = CredentialStore::new(config.api_token.clone());
        let api = Arc::new(CachedRequestClient::from_config(
            &config,
            credentials.clone(),
        )?);

        Ok(Self {
            started_at: Instant::now(),
            config,
            credentials,
            api,
            streams: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_env() -> Result<Self, SyncError> {
        Self::new(SyncConfig::from_env()?)
    }

    // Memoised per url; a closed client is replaced on the next call.
    pub fn stream(&self, url: &str) -> Result<Arc<TelemetryStream>, SyncError> {
        let url = url.trim();
        let mut streams = self.streams.lock();
        if let Some(existing) = streams.get(url) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing));
            }
        }

        let client = Arc::new(ConnectionClient::new(
            url,
            ConnectionOptions::from_config(&self.config),
        )?);
        client.open()?;
        streams.insert(url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    pub fn default_stream(&self) -> Result<Arc<TelemetryStream>, SyncError> {
        let url = self.config.stream_url.clone().ok_or_else(|| {
            SyncError::Configuration("no stream url configured".to_string())
        })?;
        self.stream(&url)
    }

    pub fn status_aggregator(&self) -> ConnectionStatusAggregator {
        let mut aggregator = ConnectionStatusAggregator::new();
        for (url, client) in self.streams.lock().iter() {
            aggregator.track_client(url.clone(), client.as_ref());
        }
        aggregator
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    pub async fn shutdown(&self) {
        let streams: Vec<Arc<TelemetryStream>> =
            self.streams.lock().drain().map(|(_, client)| client).collect();
        for client in &streams {
            client.shutdown().await;
        }
        self.api.clear_cache();
        info!(
            streams = streams.len(),
            uptime_ms = self.started_at.elapsed().as_millis() as u64,
            "sync services shut down"
        );
    }
}
