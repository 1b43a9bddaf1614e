#![forbid(unsafe_code)]

use crate::backend::ProcessBackend;
use crate::error::Error;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

/// Serializes halt/operate/resume cycles against one target.
///
/// The backend cannot take overlapping halts, so every cycle holds a lock
/// from before the halt until the resume command has been sent. Resuming
/// happens on a detached task: callers get their result without waiting for
/// the target to run again.
#[derive(Clone)]
pub struct HaltCoordinator {
    backend: Arc<dyn ProcessBackend>,
    lock: Arc<Mutex<()>>,
}

impl HaltCoordinator {
    pub fn new(backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            backend,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ProcessBackend> {
        &self.backend
    }

    /// Halt the target, run `body` against it, then schedule a resume.
    ///
    /// The resume is scheduled on every exit path: success, an error from
    /// `body`, a failed halt, or a panic unwinding out of `body`. A failed
    /// halt fails the call with [`Error::Halt`] without running `body`.
    pub async fn with_halt<T, F>(&self, body: F) -> Result<T, Error>
    where
        F: for<'a> FnOnce(&'a dyn ProcessBackend) -> BoxFuture<'a, Result<T, Error>>,
    {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let mut resume = ResumeOnDrop::new(Arc::clone(&self.backend), guard);

        let state = self.backend.halt().await.map_err(Error::halt)?;
        debug!(?state, "target halted");

        let result = body(self.backend.as_ref()).await;
        resume.fire();
        result
    }

    /// Wait until no cycle is in progress and the last resume was sent.
    pub async fn idle(&self) {
        let _guard = self.lock.lock().await;
    }
}

/// Sends the resume exactly once, at the latest when dropped.
struct ResumeOnDrop {
    pending: Option<(Arc<dyn ProcessBackend>, OwnedMutexGuard<()>)>,
    handle: Handle,
}

impl ResumeOnDrop {
    fn new(backend: Arc<dyn ProcessBackend>, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            pending: Some((backend, guard)),
            handle: Handle::current(),
        }
    }

    fn fire(&mut self) {
        let Some((backend, guard)) = self.pending.take() else {
            return;
        };
        let resume = self.handle.spawn(async move {
            let result = backend.resume().await;
            drop(guard);
            result
        });
        self.handle.spawn(async move {
            match resume.await {
                Ok(Ok(())) => debug!("resume sent"),
                Ok(Err(err)) => warn!(%err, "failed to resume target"),
                Err(err) => error!(%err, "resume task panicked"),
            }
        });
    }
}

impl Drop for ResumeOnDrop {
    fn drop(&mut self) {
        self.fire();
    }
}
