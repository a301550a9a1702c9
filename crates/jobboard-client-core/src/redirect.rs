use std::sync::Arc;

use crate::store::{KeyValueStore, StoreError};

pub const RETURN_TO_KEY: &str = "redirect_after_login";
pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_LOCATION: &str = "/";

/// Session-scoped "where to go after login" slot. Reads are destructive.
#[derive(Clone)]
pub struct ReturnTo {
    store: Arc<dyn KeyValueStore>,
}

impl ReturnTo {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Records `location` unless it is unsafe to navigate back to.
    pub fn stash(&self, location: &str) -> Result<Option<String>, StoreError> {
        let Some(sanitized) = sanitize_return_to(location) else {
            return Ok(None);
        };
        self.store.set(RETURN_TO_KEY, &sanitized)?;
        Ok(Some(sanitized))
    }

    pub fn peek(&self) -> Result<Option<String>, StoreError> {
        self.store.get(RETURN_TO_KEY)
    }

    /// Reads and clears the stored destination.
    pub fn take(&self) -> Result<Option<String>, StoreError> {
        let value = self.store.get(RETURN_TO_KEY)?;
        if value.is_some() {
            self.store.remove(RETURN_TO_KEY)?;
        }
        Ok(value.and_then(|raw| sanitize_return_to(&raw)))
    }
}

/// Accepts same-origin paths only; the login page itself is never a destination.
#[must_use]
pub fn sanitize_return_to(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') || trimmed.starts_with("//") || trimmed.contains('\\') {
        return None;
    }
    let path = trimmed.split(['?', '#']).next().unwrap_or_default();
    if path == LOGIN_PATH || path.starts_with(&format!("{LOGIN_PATH}/")) {
        return None;
    }
    Some(trimmed.to_string())
}

#[must_use]
pub fn login_redirect_url(return_to: Option<&str>) -> String {
    match return_to.and_then(sanitize_return_to) {
        Some(path) => {
            let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
            format!("{LOGIN_PATH}?next={encoded}")
        }
        None => LOGIN_PATH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn take_is_read_once() {
        let return_to = ReturnTo::new(Arc::new(MemoryStore::new()));
        return_to.stash("/jobs?page=2").expect("stash");
        assert_eq!(return_to.peek().expect("peek"), Some("/jobs?page=2".to_string()));
        assert_eq!(return_to.take().expect("take"), Some("/jobs?page=2".to_string()));
        assert_eq!(return_to.take().expect("second take"), None);
    }

    #[test]
    fn unsafe_destinations_are_not_stashed() {
        let return_to = ReturnTo::new(Arc::new(MemoryStore::new()));
        for raw in ["https://evil.example.com", "//evil.example.com", "jobs", "/login?next=/x", "/\\evil"] {
            assert_eq!(return_to.stash(raw).expect("stash"), None, "{raw}");
        }
        assert_eq!(return_to.peek().expect("peek"), None);
    }

    #[test]
    fn login_redirect_url_encodes_return_path() {
        assert_eq!(
            login_redirect_url(Some("/dashboard/messages?id=3&tab=all")),
            "/login?next=%2Fdashboard%2Fmessages%3Fid%3D3%26tab%3Dall"
        );
        assert_eq!(login_redirect_url(None), "/login");
        assert_eq!(login_redirect_url(Some("https://evil.example.com")), "/login");
    }

    #[test]
    fn login_subpaths_are_rejected_but_lookalikes_are_kept() {
        assert_eq!(sanitize_return_to("/login/reset"), None);
        assert_eq!(sanitize_return_to("/logins"), Some("/logins".to_string()));
    }
}
