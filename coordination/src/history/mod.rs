//! Routing History Store
//!
//! Append-only audit tables shared by the coordinator (writer) and the
//! accuracy analyzer (reader):
//!
//! - routing history: one [`RouteRecord`] per routed request, plus
//!   [`FeedbackRecord`] rows that set `accepted` exactly once
//! - override patterns: one [`OverrideRecord`] per manual override
//!
//! Rows are never rewritten or deleted. Feedback is folded into its route on
//! read; the first feedback row for a route wins.

pub mod error;
pub mod memory;
pub mod store;
pub mod types;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use error::{HistoryError, HistoryResult};
pub use memory::MemoryHistoryStore;
pub use store::{JsonlHistoryStore, OVERRIDE_FILE, ROUTING_FILE};
pub use types::{FeedbackRecord, HistoryLine, OverrideRecord, RouteRecord};

/// Append-only routing audit store.
///
/// Implementations serialize their own writes; readers never block writers.
pub trait HistoryStore: Send + Sync {
    fn append_route(&self, record: &RouteRecord) -> HistoryResult<()>;

    /// Set `accepted` for a route. Fails on an unknown route or when the
    /// route already has feedback.
    fn append_feedback(&self, feedback: &FeedbackRecord) -> HistoryResult<()>;

    fn append_override(&self, record: &OverrideRecord) -> HistoryResult<()>;

    /// Routes at or after `since` (all when `None`), feedback applied, in
    /// append order.
    fn load_routes(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<RouteRecord>>;

    fn load_overrides(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<OverrideRecord>>;

    /// Look up one route by id.
    fn find_route(&self, id: Uuid) -> HistoryResult<Option<RouteRecord>> {
        Ok(self.load_routes(None)?.into_iter().find(|r| r.id == id))
    }
}

/// Fold history lines into routes: feedback sets `accepted` on the first
/// occurrence only, feedback for unknown routes is dropped.
pub(crate) fn fold_lines(lines: impl IntoIterator<Item = HistoryLine>) -> Vec<RouteRecord> {
    let mut routes: Vec<RouteRecord> = Vec::new();
    let mut index: std::collections::HashMap<Uuid, usize> = std::collections::HashMap::new();
    for line in lines {
        match line {
            HistoryLine::Route(record) => {
                index.insert(record.id, routes.len());
                routes.push(record);
            }
            HistoryLine::Feedback(feedback) => {
                if let Some(&i) = index.get(&feedback.route_id) {
                    if routes[i].accepted.is_none() {
                        routes[i].accepted = Some(feedback.accepted);
                    }
                }
            }
        }
    }
    routes
}
