//! Single-flight session refresh
//!
//! However many callers ask at once, at most one `POST /api/auth/refresh` is
//! in flight per coordinator. Late callers await the same shared operation.

use crate::http::{ApiRequest, RequestExecutor};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        generation: u64,
        operation: SharedRefresh,
    },
}

#[derive(Default)]
struct Slot {
    state: RefreshState,
    generation: u64,
}

/// Coordinates session renewal
#[derive(Clone)]
pub struct RefreshCoordinator {
    executor: RequestExecutor,
    refresh_url: String,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    pub fn new(executor: RequestExecutor, auth_base: &str) -> Self {
        Self {
            executor,
            refresh_url: format!("{}/api/auth/refresh", auth_base.trim_end_matches('/')),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Renew the session, joining a refresh that is already underway.
    ///
    /// Returns `false` on any transport error or non-success status.
    pub async fn refresh(&self) -> bool {
        let operation = {
            let mut slot = lock(&self.slot);
            match &slot.state {
                RefreshState::Refreshing { operation, .. } => {
                    debug!("Joining in-flight session refresh");
                    operation.clone()
                }
                RefreshState::Idle => {
                    slot.generation += 1;
                    let generation = slot.generation;
                    let operation = self.start(generation);
                    slot.state = RefreshState::Refreshing {
                        generation,
                        operation: operation.clone(),
                    };
                    operation
                }
            }
        };

        operation.await
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(lock(&self.slot).state, RefreshState::Refreshing { .. })
    }

    fn start(&self, generation: u64) -> SharedRefresh {
        let executor = self.executor.clone();
        let request = ApiRequest::post(self.refresh_url.clone());
        let release = SlotRelease {
            slot: Arc::clone(&self.slot),
            generation,
        };

        async move {
            let _release = release;
            debug!("Refreshing session (attempt {})", generation);
            match executor.execute(&request).await {
                Ok(_) => {
                    info!("Session refreshed");
                    true
                }
                Err(e) => {
                    warn!("Session refresh failed: {}", e);
                    false
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Returns the slot to `Idle` when the refresh future finishes or is dropped
struct SlotRelease {
    slot: Arc<Mutex<Slot>>,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if let RefreshState::Refreshing { generation, .. } = slot.state {
            if generation == self.generation {
                slot.state = RefreshState::Idle;
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
