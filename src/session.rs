use crate::{
    api::ApiClient,
    error::ApiError,
    models::Identity,
    notify::NotificationSink,
    storage::{KeyValueStore, IDENTITY_KEY, TOKEN_KEY},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;

/// Owns the signed-in identity: restores it at startup, replaces it on
/// login, clears it on logout, and keeps the durable copy in step.
///
/// Construct one per process and share it by `Arc`. Anything that depends on
/// the identity subscribes through [`SessionManager::subscribe`] instead of
/// polling.
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn NotificationSink>,
    identity: watch::Sender<Option<Identity>>,
    loaded: AtomicBool,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            api,
            store,
            sink,
            identity,
            loaded: AtomicBool::new(false),
        }
    }

    /// Load the persisted identity, if any. Never fails: missing or
    /// unreadable data simply means nobody is signed in.
    pub fn restore(&self) {
        let restored = self.store.get(IDENTITY_KEY).and_then(|raw| {
            serde_json::from_str::<Identity>(&raw)
                .map_err(|e| tracing::warn!("Discarding unreadable stored identity: {}", e))
                .ok()
        });

        match &restored {
            Some(identity) => tracing::info!("Restored session for {}", identity.username),
            None => tracing::debug!("No stored session"),
        }

        self.replace(restored);
        self.loaded.store(true, Ordering::SeqCst);
    }

    /// Whether [`restore`](Self::restore) has finished. Until then
    /// `is_authenticated` is not meaningful.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Receiver that wakes on every identity change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Check credentials, then resolve the full identity by username. Only
    /// when both succeed is the identity stored; on failure the user is
    /// notified and the error handed back so the caller can stay on the form.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        match self.authenticate(username, password).await {
            Ok(identity) => {
                self.persist(&identity);
                self.replace(Some(identity.clone()));
                tracing::info!("Signed in as {} (id {})", identity.username, identity.id);
                self.sink.success(&format!("Welcome back, {username}!"));
                Ok(identity)
            }
            Err(e) => {
                tracing::error!("Login failed for {}: {}", username, e);
                self.sink.error(&e.user_message("Login failed"));
                Err(e)
            }
        }
    }

    /// Create an account. Does not sign the new account in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        match self.api.register(username, email, password).await {
            Ok(()) => {
                tracing::info!("Registered account {}", username);
                self.sink.success("Registration successful! Please login.");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Registration failed for {}: {}", username, e);
                self.sink.error(&e.user_message("Registration failed"));
                Err(e)
            }
        }
    }

    /// Forget the identity in memory and on disk. No network involved.
    pub fn logout(&self) {
        for key in [IDENTITY_KEY, TOKEN_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!("Could not clear stored {}: {}", key, e);
            }
        }
        self.replace(None);
        tracing::info!("Signed out");
        self.sink.success("Logged out successfully");
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        self.api.login(username, password).await?;
        self.api.user_by_username(username).await
    }

    fn persist(&self, identity: &Identity) {
        let result = serde_json::to_string(identity)
            .map_err(std::io::Error::other)
            .and_then(|json| self.store.set(IDENTITY_KEY, json));
        if let Err(e) = result {
            // The in-memory session still works for this run.
            tracing::warn!("Could not persist identity: {}", e);
        }
    }

    /// Publish `next`, waking subscribers only when it differs.
    fn replace(&self, next: Option<Identity>) {
        self.identity.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
