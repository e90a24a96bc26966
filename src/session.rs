//! Session state: one loaded spreadsheet per interaction.
//!
//! A session is created on upload and replaced wholesale by the next
//! upload; nothing survives across uploads, so a failed query can never
//! leak state into the next one. The server holds at most one live
//! session.

use uuid::Uuid;

use crate::query::{QueryPlan, RowSelection};
use crate::sheet::LoadedSheet;

/// The last query that ran in a session, kept so the export endpoint
/// can serialize the matched rows on demand.
#[derive(Debug, Clone)]
pub struct QueryRun {
    /// The question as asked.
    pub question: String,
    /// The plan that ran.
    pub plan: QueryPlan,
    /// Matched analysis positions; `None` after a no-match or chart
    /// query, which have nothing to export.
    pub selection: Option<RowSelection>,
}

/// One upload's worth of state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier, minted on upload.
    pub id: Uuid,
    /// The loaded spreadsheet, both views.
    pub sheet: LoadedSheet,
    /// The most recent query, when one has run.
    pub last_run: Option<QueryRun>,
}

impl Session {
    /// Start a session around a freshly loaded sheet.
    pub fn new(sheet: LoadedSheet) -> Self {
        Self {
            id: Uuid::new_v4(),
            sheet,
            last_run: None,
        }
    }

    /// Record a query run, replacing any previous one.
    pub fn record_run(&mut self, run: QueryRun) {
        self.last_run = Some(run);
    }

    /// The selection available for export, when the last query matched.
    pub fn exportable_selection(&self) -> Option<&RowSelection> {
        self.last_run
            .as_ref()
            .and_then(|run| run.selection.as_ref())
            .filter(|s| !s.is_empty())
    }
}

/// Holder for the single live session.
#[derive(Default)]
pub struct SessionStore {
    current: tokio::sync::Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live session (an upload discards the previous one).
    pub async fn replace(&self, session: Session) -> Uuid {
        let id = session.id;
        let mut guard = self.current.lock().await;
        *guard = Some(session);
        id
    }

    /// Run a closure over the live session, if any.
    pub async fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut guard = self.current.lock().await;
        guard.as_mut().map(f)
    }
}
