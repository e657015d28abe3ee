//! Past-session list for the signed-in user.

use crate::api::{HistorySessionSummary, SharedBackend};
use crate::auth::UserIdentity;
use crate::error::ClientResult;
use tokio::sync::oneshot;

/// What the panel currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryView {
    /// Nothing fetched (closed, or opened without a signed-in user)
    Blank,
    Loading,
    Loaded(Vec<HistorySessionSummary>),
    NoRecords,
    Failed,
}

/// Read-only panel listing earlier conversations. Never touches identity state.
pub struct HistoryPanel {
    backend: SharedBackend,
    open: bool,
    view: HistoryView,
    pending: Option<oneshot::Receiver<ClientResult<Vec<HistorySessionSummary>>>>,
}

impl HistoryPanel {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            open: false,
            view: HistoryView::Blank,
            pending: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn view(&self) -> &HistoryView {
        &self.view
    }

    /// Flip open/closed. Opening with a user starts one fetch; closing never does.
    pub fn toggle(&mut self, user: Option<&UserIdentity>) {
        if self.open {
            self.open = false;
            return;
        }

        self.open = true;
        let Some(user) = user else {
            self.view = HistoryView::Blank;
            self.pending = None;
            return;
        };

        self.view = HistoryView::Loading;
        let backend = self.backend.clone();
        let user_id = user.id.clone();
        let token = user.token.clone();
        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);

        tracing::debug!(user_id = %user_id, "fetching session history");
        tokio::spawn(async move {
            let result = backend.sessions(&user_id, Some(&token)).await;
            let _ = tx.send(result);
        });
    }

    /// Apply a finished fetch, if any. Returns whether the view changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = self.pending.as_mut() else {
            return false;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(crate::error::ClientError::transport("history fetch was dropped"))
            }
        };
        self.pending = None;
        self.apply(result);
        true
    }

    /// Wait for the in-flight fetch, if any
    pub async fn wait(&mut self) {
        if let Some(rx) = self.pending.take() {
            let result = rx.await.unwrap_or_else(|_| {
                Err(crate::error::ClientError::transport("history fetch was dropped"))
            });
            self.apply(result);
        }
    }

    fn apply(&mut self, result: ClientResult<Vec<HistorySessionSummary>>) {
        self.view = match result {
            Ok(sessions) if sessions.is_empty() => HistoryView::NoRecords,
            Ok(sessions) => HistoryView::Loaded(sessions),
            Err(err) => {
                tracing::warn!(error = %err, "session history fetch failed");
                HistoryView::Failed
            }
        };
    }
}
