use crate::config::{
    validate_stream_url, SyncConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RECONNECT_BASE_MS,
    DEFAULT_RECONNECT_MAX_MS,
};
use crate::error::SyncError;
use crate::stream::backoff::ReconnectPolicy;
use crate::stream::types::{ConnectionState, StreamMessage};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type StreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Handler<M> = Arc<dyn Fn(&M) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    pub connect_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect_base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl ConnectionOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            reconnect_base: config.reconnect_base_delay(),
            reconnect_max: config.reconnect_max_delay(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    closed: bool,
}

struct Subscribers<M> {
    next_id: u64,
    entries: Vec<(u64, Handler<M>)>,
}

impl<M> Default for Subscribers<M> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

struct ClientShared<M> {
    url: String,
    options: ConnectionOptions,
    lifecycle: Mutex<Lifecycle>,
    subscribers: Mutex<Subscribers<M>>,
    status_tx: watch::Sender<ConnectionState>,
    cancel_token: CancellationToken,
}

impl<M: StreamMessage> ClientShared<M> {
    fn transition(&self, state: ConnectionState) -> bool {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.closed {
            return false;
        }
        let previous = self.status_tx.send_replace(state);
        if previous != state {
            debug!(url = %self.url, from = %previous, to = %state, "stream status changed");
        }
        true
    }

    fn is_closed(&self) -> bool {
        self.lifecycle.lock().closed
    }

    fn dispatch_payload(&self, payload: &mut [u8]) -> bool {
        if self.is_closed() {
            return false;
        }

        let message = match M::decode(payload) {
            Ok(message) => message,
            Err(error) => {
                debug!(url = %self.url, %error, "dropping undecodable frame");
                return false;
            }
        };

        let handlers: Vec<Handler<M>> = self
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&message);
        }
        true
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers
            .lock()
            .entries
            .retain(|(entry_id, _)| *entry_id != id);
    }
}

#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub struct ConnectionClient<M: StreamMessage> {
    shared: Arc<ClientShared<M>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<M: StreamMessage> ConnectionClient<M> {
    pub fn new(url: impl Into<String>, options: ConnectionOptions) -> Result<Self, SyncError> {
        let url = url.into().trim().to_string();
        validate_stream_url(&url)?;
        let (status_tx, _) = watch::channel(ConnectionState::Closed);

        Ok(Self {
            shared: Arc::new(ClientShared {
                url,
                options,
                lifecycle: Mutex::new(Lifecycle::default()),
                subscribers: Mutex::new(Subscribers::default()),
                status_tx,
                cancel_token: CancellationToken::new(),
            }),
            task: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn status(&self) -> ConnectionState {
        *self.shared.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.shared.status_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn open(&self) -> Result<(), SyncError> {
        let runtime = Handle::try_current()?;
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.closed {
                warn!(url = %self.shared.url, "open ignored on a closed stream client");
                return Ok(());
            }
            if lifecycle.started {
                return Ok(());
            }
            lifecycle.started = true;
            self.shared.status_tx.send_replace(ConnectionState::Connecting);
        }

        let shared = Arc::clone(&self.shared);
        let handle = runtime.spawn(run_connection_loop(shared));
        *self.task.lock() = Some(handle);
        Ok(())
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = {
            let mut subscribers = self.shared.subscribers.lock();
            let id = subscribers.next_id;
            subscribers.next_id = subscribers.next_id.wrapping_add(1);
            subscribers.entries.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<ClientShared<M>> = Arc::downgrade(&self.shared);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.remove_subscriber(id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().entries.len()
    }

    pub fn close(&self) {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.closed {
                return;
            }
            lifecycle.closed = true;
            self.shared.status_tx.send_replace(ConnectionState::Closed);
        }
        self.shared.cancel_token.cancel();
        info!(url = %self.shared.url, "stream client closed");
    }

    pub async fn shutdown(&self) {
        self.close();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    fn dispatch_for_test(&self, payload: &[u8]) -> bool {
        let mut owned = payload.to_vec();
        self.shared.dispatch_payload(&mut owned)
    }
}

impl<M: StreamMessage> Drop for ConnectionClient<M> {
    fn drop(&mut self) {
        self.close();
    }
}

enum ChannelOutcome {
    Closed,
    Failed,
    Cancelled,
}

async fn connect_stream(url: &str) -> Result<StreamSocket, SyncError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(64 << 20),
        max_frame_size: Some(16 << 20),
        ..Default::default()
    };

    let (stream, _) = connect_async_with_config(url, Some(ws_config), true).await?;
    Ok(stream)
}

async fn run_connection_loop<M: StreamMessage>(shared: Arc<ClientShared<M>>) {
    let mut policy = ReconnectPolicy::new(
        shared.options.reconnect_base,
        shared.options.reconnect_max,
    );

    loop {
        if !shared.transition(ConnectionState::Connecting) {
            break;
        }
        if policy.attempt() == 0 {
            info!(url = %shared.url, "opening stream");
        } else {
            info!(url = %shared.url, attempt = policy.attempt(), "reconnecting stream");
        }

        let connect = tokio::time::timeout(shared.options.connect_timeout, connect_stream(&shared.url));
        let connected = tokio::select! {
            _ = shared.cancel_token.cancelled() => break,
            result = connect => result,
        };

        let next_state = match connected {
            Ok(Ok(stream)) => {
                policy.reset();
                if !shared.transition(ConnectionState::Open) {
                    break;
                }
                info!(url = %shared.url, "stream open");
                match pump_messages(&shared, stream).await {
                    ChannelOutcome::Cancelled => break,
                    ChannelOutcome::Closed => ConnectionState::Closed,
                    ChannelOutcome::Failed => ConnectionState::Error,
                }
            }
            Ok(Err(error)) => {
                warn!(url = %shared.url, %error, "stream connect failed");
                ConnectionState::Error
            }
            Err(_) => {
                warn!(
                    url = %shared.url,
                    timeout_ms = shared.options.connect_timeout.as_millis() as u64,
                    "stream handshake timed out"
                );
                ConnectionState::Error
            }
        };

        if !shared.transition(next_state) {
            break;
        }

        let delay = policy.record_failure();
        info!(
            url = %shared.url,
            attempt = policy.attempt(),
            delay_ms = delay.as_millis() as u64,
            "scheduling stream reconnect"
        );
        tokio::select! {
            _ = shared.cancel_token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(url = %shared.url, "stream loop finished");
}

async fn pump_messages<M: StreamMessage>(
    shared: &ClientShared<M>,
    mut stream: StreamSocket,
) -> ChannelOutcome {
    loop {
        tokio::select! {
            _ = shared.cancel_token.cancelled() => {
                let _ = stream.close(None).await;
                return ChannelOutcome::Cancelled;
            }
            next = stream.next() => {
                match next {
                    Some(Ok(message)) => {
                        if handle_frame(shared, message) {
                            return ChannelOutcome::Closed;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(url = %shared.url, %error, "stream channel failed");
                        return ChannelOutcome::Failed;
                    }
                    None => return ChannelOutcome::Closed,
                }
            }
        }
    }
}

// true when the peer closed the channel
fn handle_frame<M: StreamMessage>(shared: &ClientShared<M>, message: Message) -> bool {
    let mut payload = match message {
        Message::Text(text) => text.into_bytes(),
        Message::Binary(binary) => binary,
        Message::Close(frame) => {
            debug!(url = %shared.url, ?frame, "peer closed stream");
            return true;
        }
        _ => return false,
    };
    shared.dispatch_payload(payload.as_mut_slice());
    false
}
