use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    token: Arc<RwLock<Option<String>>>,
}

impl CredentialStore {
    pub fn new(token: Option<String>) -> Self {
        let store = Self::default();
        if let Some(token) = token {
            store.set_token(token);
        }
        store
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into().trim().to_string();
        *self.token.write() = if token.is_empty() { None } else { Some(token) };
    }

    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_token() {
        let store = CredentialStore::new(None);
        let shared = store.clone();

        store.set_token("abc");
        assert_eq!(shared.token().as_deref(), Some("abc"));

        shared.clear_token();
        assert!(!store.has_token());
    }

    #[test]
    fn blank_tokens_clear_credentials() {
        let store = CredentialStore::new(Some("abc".to_string()));
        store.set_token("   ");
        assert_eq!(store.token(), None);
    }
}
