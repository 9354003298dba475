//! In-memory history store for tests and embedders.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::error::{HistoryError, HistoryResult};
use super::types::{FeedbackRecord, HistoryLine, OverrideRecord, RouteRecord};
use super::{fold_lines, HistoryStore};

#[derive(Debug, Default)]
struct Tables {
    routing: Vec<HistoryLine>,
    overrides: Vec<OverrideRecord>,
}

/// Same append-only semantics as the JSONL store, kept in memory.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    tables: RwLock<Tables>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with pre-built routes (feedback already applied).
    pub fn with_routes(routes: impl IntoIterator<Item = RouteRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.write() {
            for route in routes {
                let feedback = route.accepted.map(|accepted| FeedbackRecord {
                    route_id: route.id,
                    accepted,
                    timestamp: route.timestamp,
                });
                let mut pending = route;
                pending.accepted = None;
                tables.routing.push(HistoryLine::Route(pending));
                if let Some(f) = feedback {
                    tables.routing.push(HistoryLine::Feedback(f));
                }
            }
        }
        store
    }

    /// Number of raw rows in the routing table (routes and feedback).
    pub fn routing_rows(&self) -> usize {
        self.tables.read().map(|t| t.routing.len()).unwrap_or(0)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append_route(&self, record: &RouteRecord) -> HistoryResult<()> {
        let mut tables = self.tables.write().map_err(|_| HistoryError::LockPoisoned)?;
        tables.routing.push(HistoryLine::Route(record.clone()));
        Ok(())
    }

    fn append_feedback(&self, feedback: &FeedbackRecord) -> HistoryResult<()> {
        let mut tables = self.tables.write().map_err(|_| HistoryError::LockPoisoned)?;
        let routes = fold_lines(tables.routing.iter().cloned());
        match routes.iter().find(|r| r.id == feedback.route_id) {
            None => return Err(HistoryError::UnknownRoute(feedback.route_id)),
            Some(r) if r.accepted.is_some() => {
                return Err(HistoryError::DuplicateFeedback(feedback.route_id))
            }
            Some(_) => {}
        }
        tables.routing.push(HistoryLine::Feedback(feedback.clone()));
        Ok(())
    }

    fn append_override(&self, record: &OverrideRecord) -> HistoryResult<()> {
        let mut tables = self.tables.write().map_err(|_| HistoryError::LockPoisoned)?;
        tables.overrides.push(record.clone());
        Ok(())
    }

    fn load_routes(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<RouteRecord>> {
        let tables = self.tables.read().map_err(|_| HistoryError::LockPoisoned)?;
        Ok(fold_lines(tables.routing.iter().cloned())
            .into_iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .collect())
    }

    fn load_overrides(&self, since: Option<DateTime<Utc>>) -> HistoryResult<Vec<OverrideRecord>> {
        let tables = self.tables.read().map_err(|_| HistoryError::LockPoisoned)?;
        Ok(tables
            .overrides
            .iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .cloned()
            .collect())
    }
}
