use crate::stream::client::ConnectionClient;
use crate::stream::types::{ConnectionState, StreamMessage};
use futures_util::future::select_all;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// `error` beats `connecting`, which beats `open`; any other mix is `closed`.
/// An empty set of channels is `closed`.
pub fn composite_status<I>(states: I) -> ConnectionState
where
    I: IntoIterator<Item = ConnectionState>,
{
    let mut any = false;
    let mut any_connecting = false;
    let mut all_open = true;

    for state in states {
        any = true;
        match state {
            ConnectionState::Error => return ConnectionState::Error,
            ConnectionState::Connecting => any_connecting = true,
            ConnectionState::Open => {}
            ConnectionState::Closed => all_open = false,
        }
    }

    if any_connecting {
        ConnectionState::Connecting
    } else if any && all_open {
        ConnectionState::Open
    } else {
        ConnectionState::Closed
    }
}

#[derive(Debug, Default)]
pub struct ConnectionStatusAggregator {
    channels: BTreeMap<String, watch::Receiver<ConnectionState>>,
}

impl ConnectionStatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, name: impl Into<String>, status: watch::Receiver<ConnectionState>) {
        self.channels.insert(name.into(), status);
    }

    pub fn track_client<M: StreamMessage>(
        &mut self,
        name: impl Into<String>,
        client: &ConnectionClient<M>,
    ) {
        self.track(name, client.watch_status());
    }

    pub fn untrack(&mut self, name: &str) -> bool {
        self.channels.remove(name).is_some()
    }

    pub fn channel_status(&self, name: &str) -> Option<ConnectionState> {
        self.channels.get(name).map(|status| *status.borrow())
    }

    pub fn statuses(&self) -> Vec<(String, ConnectionState)> {
        self.channels
            .iter()
            .map(|(name, status)| (name.clone(), *status.borrow()))
            .collect()
    }

    pub fn composite(&self) -> ConnectionState {
        composite_status(self.channels.values().map(|status| *status.borrow()))
    }

    /// Returns `None` when nothing is tracked or a tracked client has been dropped.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        if self.channels.is_empty() {
            return None;
        }

        let waiters = self
            .channels
            .values_mut()
            .map(|status| Box::pin(status.changed()));
        let (result, _, remaining) = select_all(waiters).await;
        drop(remaining);
        result.ok()?;
        Some(self.composite())
    }
}
