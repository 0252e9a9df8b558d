use crate::config::{validate_http_url, SyncConfig, DEFAULT_CACHE_TTL_MS};
use crate::error::SyncError;
use crate::request::cache::ResponseCache;
use crate::request::credentials::CredentialStore;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub cache_key: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            cache_key: None,
            cache_ttl: None,
            auth: true,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.auth = false;
        self
    }
}

fn default_cache_key(method: HttpMethod, url: &str, body: Option<&str>) -> String {
    format!("{} {url} {}", method.as_str(), body.unwrap_or_default())
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, SyncError> {
    let mut owned = payload.to_vec();
    Ok(simd_json::serde::from_slice(owned.as_mut_slice())?)
}

pub struct CachedRequestClient {
    http: Client,
    base_url: String,
    credentials: CredentialStore,
    cache: Mutex<ResponseCache>,
    default_ttl: Duration,
}

impl CachedRequestClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, SyncError> {
        Self::with_credentials(
            base_url,
            CredentialStore::new(token),
            Duration::from_millis(DEFAULT_CACHE_TTL_MS),
        )
    }

    pub fn with_credentials(
        base_url: impl Into<String>,
        credentials: CredentialStore,
        default_ttl: Duration,
    ) -> Result<Self, SyncError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SyncError::Configuration(
                "request client needs a base url".to_string(),
            ));
        }
        validate_http_url(&base_url)?;

        Ok(Self {
            http: Client::new(),
            base_url,
            credentials,
            cache: Mutex::new(ResponseCache::default()),
            default_ttl,
        })
    }

    pub fn from_config(config: &SyncConfig, credentials: CredentialStore) -> Result<Self, SyncError> {
        Self::with_credentials(config.api_base_url.clone(), credentials, config.cache_ttl())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.credentials.set_token(token);
    }

    pub fn clear_token(&self) {
        self.credentials.clear_token();
    }

    pub fn invalidate(&self, cache_key: &str) -> bool {
        self.cache.lock().invalidate(cache_key)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn resolve_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, SyncError> {
        let url = self.resolve_url(endpoint);
        let cacheable = options.method == HttpMethod::Get;
        let cache_key = options
            .cache_key
            .clone()
            .unwrap_or_else(|| default_cache_key(options.method, &url, options.body.as_deref()));

        if cacheable {
            let cached = self.cache.lock().get(&cache_key, Instant::now());
            if let Some(payload) = cached {
                trace!(%cache_key, "serving cached response");
                return decode_payload(&payload);
            }
        }

        let mut builder = self.http.request(options.method.into(), &url);
        let mut has_content_type = false;
        for (name, value) in &options.headers {
            has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
            builder = builder.header(name.as_str(), value.as_str());
        }
        if options.auth {
            if let Some(token) = self.credentials.token() {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = options.body {
            if !has_content_type {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body);
        }

        debug!(method = options.method.as_str(), %url, "issuing request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await?;
        let value = decode_payload(&body)?;

        if cacheable {
            let ttl = options.cache_ttl.unwrap_or(self.default_ttl);
            self.cache
                .lock()
                .insert(cache_key, Arc::from(body.as_ref()), ttl, Instant::now());
        }

        Ok(value)
    }
}
