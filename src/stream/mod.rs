pub mod backoff;
pub mod client;
pub mod status;
pub mod types;

pub use backoff::ReconnectPolicy;
pub use client::{ConnectionClient, ConnectionOptions, Subscription};
pub use status::{composite_status, ConnectionStatusAggregator};
pub use types::{ConnectionState, StreamMessage, TelemetryMessage};
