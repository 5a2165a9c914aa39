// Token refresh coordination
// Single-flight refresh with a FIFO queue of waiting callers

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::manager::SessionManager;
use crate::error::{Result, SessionError};
use crate::navigation::{is_signup_route, Navigator};

type Waiter = oneshot::Sender<Result<ReplayTurn>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

/// What a caller has to do after observing a 401
enum Ticket {
    /// Perform the refresh
    Leader,
    /// Wait for the refresh someone else is performing
    Follower(oneshot::Receiver<Result<ReplayTurn>>),
}

/// A fresh access token plus the caller's place in the replay order
///
/// The caller that ran the refresh goes first, then queued callers in enqueue
/// order. The turn moves on when `pass` is called or the turn is dropped.
#[derive(Debug)]
pub struct ReplayTurn {
    token: String,
    wait: Option<oneshot::Receiver<()>>,
    next: Option<oneshot::Sender<()>>,
}

impl ReplayTurn {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Resolves once every earlier caller has reissued its request
    pub async fn wait(&mut self) {
        if let Some(rx) = self.wait.take() {
            // Err: the predecessor went away without passing
            let _ = rx.await;
        }
    }

    /// Let the next queued caller reissue
    pub fn pass(&mut self) {
        if let Some(tx) = self.next.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ReplayTurn {
    fn drop(&mut self) {
        let Some(next) = self.next.take() else {
            return;
        };
        match (self.wait.take(), tokio::runtime::Handle::try_current()) {
            // Dropped before its own turn: hand over once the turn comes up
            (Some(wait), Ok(handle)) => {
                handle.spawn(async move {
                    let _ = wait.await;
                    let _ = next.send(());
                });
            }
            _ => {
                let _ = next.send(());
            }
        }
    }
}

/// Ensures at most one refresh-token exchange is in flight
///
/// Callers that hit a 401 while a refresh is running are queued and settled
/// in enqueue order once it completes. On success each caller gets a
/// [`ReplayTurn`] so replays reach the transport in that same order.
pub struct RefreshCoordinator {
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(session: Arc<SessionManager>, navigator: Arc<dyn Navigator>, timeout: Duration) -> Self {
        Self {
            session,
            navigator,
            timeout,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of callers waiting on the in-flight refresh
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Get a fresh access token, refreshing at most once across concurrent callers
    pub async fn refreshed_token(&self) -> Result<ReplayTurn> {
        match self.enter() {
            Ticket::Follower(rx) => {
                tracing::debug!("Refresh in progress, queueing request");
                rx.await.unwrap_or(Err(SessionError::RefreshAbandoned))
            }
            Ticket::Leader => self.lead().await,
        }
    }

    /// Check-and-set of the refreshing flag; no await inside
    fn enter(&self) -> Ticket {
        let mut state = self.state.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            Ticket::Follower(rx)
        } else {
            state.refreshing = true;
            Ticket::Leader
        }
    }

    async fn lead(&self) -> Result<ReplayTurn> {
        tracing::info!("Starting token refresh");
        let mut guard = SettleGuard {
            state: &self.state,
            settled: false,
        };

        let outcome = match tokio::time::timeout(self.timeout, self.session.refresh()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Token refresh timed out after {:?}", self.timeout);
                Err(SessionError::RefreshTimeout(self.timeout))
            }
        };

        // Session must be gone before the flag drops and another caller can lead
        if let Err(ref e) = outcome {
            self.force_logout(e);
        }
        let first = guard.settle(&outcome);

        Ok(ReplayTurn {
            token: outcome?,
            wait: None,
            next: first,
        })
    }

    fn force_logout(&self, error: &SessionError) {
        // Already cleared by the facade unless the refresh timed out
        self.session.logout();

        let path = self.navigator.current_path();
        if is_signup_route(&path) {
            tracing::info!("Refresh failed on {} ({}), staying on signup", path, error);
            return;
        }
        self.navigator.redirect_to_login();
    }
}

/// Returns the coordinator to idle on every exit path
///
/// If the refresh future is dropped or panics before settling, queued callers
/// see their sender dropped and fail instead of hanging.
struct SettleGuard<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl SettleGuard<'_> {
    /// Release the queue; on success returns the sender that starts the
    /// queued callers' replay turns
    fn settle(&mut self, outcome: &Result<String>) -> Option<oneshot::Sender<()>> {
        let waiters = self.release();
        self.settled = true;

        match outcome {
            Ok(token) => {
                tracing::debug!(waiters = waiters.len(), "Resolving queued requests");
                let (first, mut wait) = oneshot::channel();
                for waiter in waiters {
                    let (next, following) = oneshot::channel();
                    // A caller that went away drops its turn, which hands it on
                    let _ = waiter.send(Ok(ReplayTurn {
                        token: token.clone(),
                        wait: Some(wait),
                        next: Some(next),
                    }));
                    wait = following;
                }
                Some(first)
            }
            Err(e) => {
                tracing::warn!(waiters = waiters.len(), "Rejecting queued requests");
                for waiter in waiters {
                    let _ = waiter.send(Err(e.clone()));
                }
                None
            }
        }
    }

    fn release(&self) -> VecDeque<Waiter> {
        let mut state = self.state.lock();
        state.refreshing = false;
        std::mem::take(&mut state.queue)
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self.release();
            tracing::warn!(waiters = abandoned.len(), "Token refresh abandoned");
        }
    }
}
