//! Multi-row writes (spec.md §4.1: "a transactional handle is provided for
//! multi-row changes, e.g. a service update that writes the service row and
//! creates a new deployment task set").
//!
//! Each substore commits its own write immediately (one JSON file per
//! entity kind, fsync'd on every mutation), so there's no shared WAL to
//! join. `StoreTransaction` instead accumulates a compensating action per
//! step; if a later step fails, `abort` replays the compensations in
//! reverse order so a half-applied multi-row change doesn't stick.

use std::future::Future;
use std::pin::Pin;

type Undo = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
pub struct StoreTransaction {
    undo: Vec<Undo>,
}

impl StoreTransaction {
    pub fn new() -> Self {
        StoreTransaction { undo: Vec::new() }
    }

    /// Records the action that undoes a step just committed, in case a
    /// later step in the same transaction fails.
    pub fn on_abort<F>(&mut self, undo: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.undo.push(Box::pin(undo));
    }

    /// All steps succeeded; nothing to replay.
    pub fn commit(self) {}

    /// Replays compensating actions in reverse order.
    pub async fn abort(self) {
        for undo in self.undo.into_iter().rev() {
            undo.await;
        }
    }
}
