//! Threaded interface for submitting and controlling search batches.
//!
//! Each submitted batch runs on its own background thread against a shared
//! [`Searcher`]. Cancellation is cooperative: the engine looks at the token
//! between requests, so a request already running finishes first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, SearchError};
use crate::request::{ResultBag, SearchRequests};
use crate::search::Searcher;

/// Cancellation flag shared between a caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Opaque search identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchId(u64);

/// Handle to a running or completed search.
pub struct SearchHandle {
    pub id: SearchId,
    cancel: CancelToken,
    started: Instant,
    join: JoinHandle<Result<ResultBag>>,
}
impl SearchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    /// Waits for the batch and hands back its outcome.
    pub fn join(self) -> Result<ResultBag> {
        self.join
            .join()
            .unwrap_or_else(|_| Err(SearchError::Lock("search thread panicked".into())))
    }
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

type Active = Arc<Mutex<HashMap<SearchId, CancelToken>>>;

/// Keeps track of running searches so they can be cancelled by id.
pub struct SearchInterface {
    searcher: Arc<Searcher>,
    next_id: AtomicU64,
    active: Active,
}

impl SearchInterface {
    pub fn new(searcher: Arc<Searcher>) -> Self {
        Self { searcher, next_id: AtomicU64::new(1), active: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Runs the batch on a background thread.
    pub fn start_search(&self, batch: SearchRequests, requester_id: i64) -> Result<SearchHandle> {
        let id = SearchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancelToken::new();
        self.active
            .lock()
            .map_err(|e| SearchError::Lock(e.to_string()))?
            .insert(id, cancel.clone());

        let searcher = Arc::clone(&self.searcher);
        let active = Arc::clone(&self.active);
        let token = cancel.clone();
        let join = std::thread::spawn(move || {
            let outcome = searcher.search_with_cancel(&batch, requester_id, &token);
            if let Ok(mut active) = active.lock() {
                active.remove(&id);
            }
            debug!(search = id.0, ok = outcome.is_ok(), "background search finished");
            outcome
        });
        Ok(SearchHandle { id, cancel, started: Instant::now(), join })
    }

    /// Runs the batch on the calling thread.
    pub fn run_sync(&self, batch: &SearchRequests, requester_id: i64) -> Result<ResultBag> {
        self.searcher.search(batch, requester_id)
    }

    /// Cancels a search by id; false when it is unknown or already done.
    pub fn cancel(&self, id: SearchId) -> bool {
        match self.active.lock() {
            Ok(active) => match active.get(&id) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn running(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }
}
