use crate::{
    api::ApiClient,
    error::ApiError,
    models::{ActiveTab, CreateLinkRequest, LinkForm, LinkRecord},
    notify::NotificationSink,
    session::SessionManager,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};

/// Shown next to the confirmation when a link was created anonymously.
pub const ANONYMOUS_HINT: &str = "Login to track hits and manage this link.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching,
    Populated,
    /// The last fetch failed; whatever was there before is still shown.
    FetchError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

// ── View state ─────────────────────────────────────────────────────────────

/// Everything the link list renders from. Mutated only through the
/// transition methods below, and only by [`LinkSynchronizer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionView {
    pub owned: Vec<LinkRecord>,
    pub popular: Vec<LinkRecord>,
    /// Most recent successful creation, for one-shot confirmation.
    pub last_created: Option<LinkRecord>,
    pub active_tab: ActiveTab,
    pub owned_state: FetchState,
    pub popular_state: FetchState,
    pub creating: bool,
    /// Identity id `owned` belongs to.
    owner: Option<i64>,
    /// Set once the tab has been switched to "my" for the current owner.
    auto_switched: bool,
}

impl CollectionView {
    pub fn owner(&self) -> Option<i64> {
        self.owner
    }

    /// The collection the list should show right now.
    pub fn visible(&self) -> &[LinkRecord] {
        match (self.active_tab, self.owner) {
            (ActiveTab::My, Some(_)) => &self.owned,
            _ => &self.popular,
        }
    }

    /// Start over for a new (or no) identity: nothing owned, popular tab.
    pub fn reset_owned(&mut self, owner: Option<i64>) {
        self.owned.clear();
        self.owned_state = FetchState::Idle;
        self.owner = owner;
        self.auto_switched = false;
        self.active_tab = ActiveTab::Popular;
    }

    pub fn apply_popular(&mut self, links: Vec<LinkRecord>) {
        self.popular = links;
        self.popular_state = FetchState::Populated;
    }

    /// Install a fetched owned collection. Returns `false`, leaving the view
    /// untouched, when the response belongs to an identity other than the
    /// current owner.
    pub fn apply_owned(&mut self, owner: i64, links: Vec<LinkRecord>) -> bool {
        if self.owner != Some(owner) {
            return false;
        }
        self.owned = links;
        self.owned_state = FetchState::Populated;
        if !self.auto_switched {
            self.active_tab = ActiveTab::My;
            self.auto_switched = true;
        }
        true
    }

    /// Overwrite `hits` on every record with `short_code`, in both
    /// collections. Returns how many records were patched.
    pub fn patch_hits(&mut self, short_code: &str, hits: u64) -> usize {
        let mut patched = 0;
        for link in self.owned.iter_mut().chain(self.popular.iter_mut()) {
            if link.short_code == short_code {
                link.hits = hits;
                patched += 1;
            }
        }
        patched
    }

    /// Manual tab switch. "My" is refused while nobody is signed in.
    pub fn select_tab(&mut self, tab: ActiveTab) -> bool {
        if tab == ActiveTab::My && self.owner.is_none() {
            return false;
        }
        self.active_tab = tab;
        true
    }
}

/// Turn the raw form into a request body. Fails when the URL is missing or
/// the expiry lands past the last representable date; a duration that is
/// not a positive integer is silently dropped.
pub fn build_create_request(
    form: &LinkForm,
    user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<CreateLinkRequest, ApiError> {
    let original_url = form.original_url.trim();
    if original_url.is_empty() {
        return Err(ApiError::Validation("Original URL is required".into()));
    }

    let expire_at = match form.expire_after() {
        Some(after) => Some(after.expire_at(now).ok_or_else(|| {
            ApiError::ExpiryOutOfRange(format!("{} {:?} from {now}", after.value, after.unit))
        })?),
        None => None,
    };

    Ok(CreateLinkRequest {
        original_url: original_url.to_owned(),
        custom_short_code: form.alias().map(str::to_owned),
        user_id,
        expire_at,
    })
}

// ── Synchronizer ───────────────────────────────────────────────────────────

/// Keeps the owned and popular link collections in step with the backend
/// and with whoever is signed in.
///
/// No collection is ever changed optimistically: every mutation goes to the
/// server first and the lists are re-fetched afterwards.
pub struct LinkSynchronizer {
    api: ApiClient,
    session: Arc<SessionManager>,
    sink: Arc<dyn NotificationSink>,
    view: watch::Sender<CollectionView>,
}

impl LinkSynchronizer {
    pub fn new(
        api: ApiClient,
        session: Arc<SessionManager>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (view, _) = watch::channel(CollectionView::default());
        Self {
            api,
            session,
            sink,
            view,
        }
    }

    pub fn view(&self) -> CollectionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionView> {
        self.view.subscribe()
    }

    pub fn select_tab(&self, tab: ActiveTab) -> bool {
        let mut accepted = false;
        self.view.send_if_modified(|view| {
            let before = view.active_tab;
            accepted = view.select_tab(tab);
            view.active_tab != before
        });
        accepted
    }

    /// Re-fetch popular links, and the owned links too when someone is
    /// signed in.
    pub async fn refresh_all(&self) {
        let current = self.session.current().map(|identity| identity.id);
        self.follow_identity(current);

        self.refresh_popular().await;
        if let Some(user_id) = current {
            self.refresh_owned(user_id).await;
        }
    }

    /// Re-run `refresh_all` now and after every identity change, until the
    /// session manager goes away or the returned task is aborted.
    pub fn watch_identity(self: &Arc<Self>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        let mut identity = self.session.subscribe();
        tokio::spawn(async move {
            loop {
                let _ = identity.borrow_and_update();
                sync.refresh_all().await;
                if identity.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Shorten a link. On success the form is cleared and the lists are
    /// refreshed; on failure the form is left as typed so the user can retry.
    pub async fn create(&self, form: &mut LinkForm) -> Result<LinkRecord, ApiError> {
        self.view.send_modify(|view| {
            view.creating = true;
            view.last_created = None;
        });

        let user_id = self.session.current().map(|identity| identity.id);
        let result = match build_create_request(form, user_id, Utc::now()) {
            Ok(body) => self.api.create_link(&body).await,
            Err(e) => Err(e),
        };

        self.view.send_modify(|view| view.creating = false);

        match result {
            Ok(link) => {
                tracing::info!("Created {} -> {}", link.short_code, link.original_url);
                self.view
                    .send_modify(|view| view.last_created = Some(link.clone()));
                form.clear();
                self.sink.success("URL Shortened successfully!");
                self.refresh_all().await;
                Ok(link)
            }
            Err(e) => {
                tracing::error!("Error shortening URL: {}", e);
                self.sink.error(&e.user_message("Failed to shorten URL"));
                Err(e)
            }
        }
    }

    /// Re-read one link's hit counter and patch it wherever it is shown.
    pub async fn refresh_one(&self, short_code: &str) -> Result<u64, ApiError> {
        match self.api.get_link(short_code).await {
            Ok(link) => {
                let mut patched = 0;
                self.view.send_if_modified(|view| {
                    patched = view.patch_hits(short_code, link.hits);
                    patched > 0
                });
                tracing::debug!("{} now at {} hits ({} rows)", short_code, link.hits, patched);
                self.sink.success("Stats updated!");
                Ok(link.hits)
            }
            Err(e) => {
                tracing::error!("Error refreshing stats for {}: {}", short_code, e);
                self.sink.error(&e.user_message("Failed to refresh stats"));
                Err(e)
            }
        }
    }

    /// Delete a link once `confirm` agrees. Collections change only after the
    /// server confirms, via a full refresh.
    pub async fn delete(
        &self,
        id: i64,
        confirm: impl FnOnce() -> bool,
    ) -> Result<DeleteOutcome, ApiError> {
        if !confirm() {
            tracing::debug!("Delete of link {} cancelled", id);
            return Ok(DeleteOutcome::Cancelled);
        }

        match self.api.delete_link(id).await {
            Ok(()) => {
                tracing::info!("Deleted link {}", id);
                self.sink.success("URL deleted");
                self.refresh_all().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                tracing::error!("Failed to delete link {}: {}", id, e);
                self.sink.error(&e.user_message("Failed to delete URL"));
                Err(e)
            }
        }
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    fn follow_identity(&self, current: Option<i64>) {
        self.view.send_if_modified(|view| {
            if view.owner == current {
                return false;
            }
            tracing::debug!("Owner changed {:?} -> {:?}", view.owner, current);
            view.reset_owned(current);
            true
        });
    }

    async fn refresh_popular(&self) {
        self.view
            .send_modify(|view| view.popular_state = FetchState::Fetching);

        match self.api.popular_links().await {
            Ok(links) => self.view.send_modify(|view| view.apply_popular(links)),
            Err(e) => {
                // Non-essential list: log only.
                tracing::error!("Error fetching popular URLs: {}", e);
                self.view
                    .send_modify(|view| view.popular_state = FetchState::FetchError);
            }
        }
    }

    async fn refresh_owned(&self, user_id: i64) {
        tracing::debug!("Fetching URLs for user {}", user_id);
        self.view.send_modify(|view| {
            if view.owner == Some(user_id) {
                view.owned_state = FetchState::Fetching;
            }
        });

        let result = self.api.user_links(user_id).await;

        if self.session.current().map(|identity| identity.id) != Some(user_id) {
            tracing::debug!("Dropping owned-links response for stale user {}", user_id);
            return;
        }

        match result {
            Ok(links) => {
                let mut applied = false;
                self.view.send_if_modified(|view| {
                    applied = view.apply_owned(user_id, links);
                    applied
                });
                if !applied {
                    tracing::debug!("Owned-links response for {} no longer current", user_id);
                }
            }
            Err(e) => {
                tracing::error!("Error fetching user URLs: {}", e);
                self.view.send_modify(|view| {
                    if view.owner == Some(user_id) {
                        view.owned_state = FetchState::FetchError;
                    }
                });
                self.sink.error("Failed to fetch your URLs");
            }
        }
    }
}
