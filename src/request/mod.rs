pub mod cache;
pub mod client;
pub mod credentials;

pub use cache::{CacheEntry, ResponseCache};
pub use client::{CachedRequestClient, HttpMethod, RequestOptions};
pub use credentials::CredentialStore;
