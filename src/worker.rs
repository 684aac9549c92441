//! One-shot background tasks. Each user action that touches the database
//! runs its query on a short-lived thread so the draw loop keeps ticking;
//! the UI polls the returned [`Task`] once per frame.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use rusqlite::Connection;
use tracing::{debug, error};

use crate::db::Database;
use crate::error::{LibraryError, Result};

/// Handle to a running task. Dropping it detaches the thread; the result is
/// simply discarded.
pub struct Task<T> {
    label: &'static str,
    rx: Receiver<Result<T>>,
}

/// Run `job` against the shared connection on a new thread.
pub fn spawn<T, F>(db: &Database, label: &'static str, job: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let db = db.clone();

    let spawned = thread::Builder::new()
        .name(format!("db-{label}"))
        .spawn(move || {
            debug!(task = label, "Background task started");
            let result = db.with_conn(job);
            if let Err(err) = &result {
                error!(task = label, error = %err, "Background task failed");
            }
            // The receiver is gone only if the UI already moved on.
            let _ = tx.send(result);
        });

    if let Err(err) = spawned {
        error!(task = label, error = %err, "Failed to spawn background task");
    }

    Task { label, rx }
}

impl<T> Task<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Non-blocking check for the result.
    pub fn poll(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LibraryError::Worker(self.label))),
        }
    }

    /// Block until the task reports back.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .unwrap_or(Err(LibraryError::Worker(self.label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_books;

    #[test]
    fn result_comes_back_from_worker_thread() {
        let db = Database::in_memory();
        let task = spawn(&db, "count", count_books);
        assert_eq!(task.wait().unwrap(), 0);
    }

    #[test]
    fn errors_are_delivered_not_swallowed() {
        let db = Database::in_memory();
        let task = spawn(&db, "fail", |_conn| -> Result<()> {
            Err(LibraryError::validation("nope"))
        });
        assert!(matches!(task.wait(), Err(LibraryError::Validation(_))));
    }

    #[test]
    fn poll_eventually_yields() {
        let db = Database::in_memory();
        let task = spawn(&db, "ping", |_conn| Ok(7));
        let value = loop {
            if let Some(result) = task.poll() {
                break result.unwrap();
            }
            thread::yield_now();
        };
        assert_eq!(value, 7);
    }
}
