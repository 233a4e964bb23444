use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use super::events::{EndReason, SessionEvent};
use super::expiry::is_token_expired;
use super::renewer::TokenRenewer;
use crate::errors::{RenewalError, StoreError};
use crate::store::{CredentialPair, CredentialStore};
use crate::utils::log_throttle::LogThrottle;

const QUEUED_LOG_WINDOW: Duration = Duration::from_secs(30);
const EVENT_CAPACITY: usize = 16;

type RenewalResult = Result<String, RenewalError>;
type Waiter = oneshot::Sender<RenewalResult>;

/// `Idle` -> `Refreshing` -> `Idle`. The waiter list only exists while a
/// renewal is in flight, so "queue non-empty implies refreshing" holds by
/// construction. Waiters are resolved in the order they were queued.
#[derive(Default)]
enum RenewalState {
    #[default]
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

/// What a caller has to do after looking at the renewal state.
enum Ticket {
    /// No renewal was in flight: this caller starts one, then waits like everyone else.
    Start(oneshot::Receiver<RenewalResult>),
    /// Another caller already started a renewal: wait for its result.
    Wait(oneshot::Receiver<RenewalResult>),
    /// A renewal already finished after the caller's token was rejected.
    Ready(String),
}

/// Owns one authenticated session: the credential store, the renewal
/// endpoint, and the de-duplication state that guarantees at most one
/// renewal call is in flight at a time.
///
/// Create one per client instance. The renewal itself runs on its own task,
/// so it completes for every queued caller even if the caller that started
/// it goes away. The state mutex is never held across an `.await`.
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    renewer: Arc<dyn TokenRenewer>,
    state: Mutex<RenewalState>,
    events: broadcast::Sender<SessionEvent>,
    log_throttle: LogThrottle,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, renewer: Arc<dyn TokenRenewer>) -> Self {
        info!(
            "Creating session coordinator (store='{}', renewer='{}')",
            store.get_name(),
            renewer.get_name()
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                renewer,
                state: Mutex::new(RenewalState::Idle),
                events,
                log_throttle: LogThrottle::new(QUEUED_LOG_WINDOW),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn has_session(&self) -> bool {
        self.inner.store.has_session()
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), RenewalState::Refreshing { .. })
    }

    /// Number of callers suspended behind the in-flight renewal, including
    /// the one that started it.
    pub fn pending_waiters(&self) -> usize {
        match &*self.inner.lock_state() {
            RenewalState::Refreshing { waiters } => waiters.len(),
            RenewalState::Idle => 0,
        }
    }

    /// Store a freshly issued credential pair (login).
    pub fn begin(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.inner.store.set(pair)?;
        info!(
            event_name = "session.started",
            event_domain = "session",
            "session started"
        );
        self.inner.publish(SessionEvent::Started);
        Ok(())
    }

    /// Clear the credentials and tell subscribers the session is over.
    pub fn end_session(&self, reason: EndReason) {
        self.inner.end_session(reason);
    }

    /// Token to attach to an outgoing request. An expired access token is
    /// renewed first (joining a renewal already in flight); no token at all
    /// means the request goes out unauthenticated.
    pub async fn preflight_token(&self) -> Result<Option<String>, RenewalError> {
        match self.inner.store.access() {
            Some(token) if is_token_expired(Some(&token)) => {
                debug!("Stored access token expired; renewing before sending");
                self.recover(Some(&token)).await.map(Some)
            }
            token => Ok(token),
        }
    }

    /// Single renewal round-trip without any de-duplication: read the refresh
    /// token, exchange it, persist the new access token.
    pub async fn renew_once(&self) -> RenewalResult {
        self.inner.renew_once().await
    }

    /// De-duplicated renewal: joins the renewal in flight or starts one.
    pub async fn renew(&self) -> RenewalResult {
        let ticket = self.inner.enter(None);
        self.redeem(ticket).await
    }

    /// Obtain a token to replay a request whose `rejected` token got a 401.
    ///
    /// If a renewal completed while that request was on the wire, the stored
    /// token already differs from `rejected` and is returned as is.
    pub async fn recover(&self, rejected: Option<&str>) -> RenewalResult {
        let ticket = self.inner.enter(Some(rejected));
        self.redeem(ticket).await
    }

    async fn redeem(&self, ticket: Ticket) -> RenewalResult {
        let rx = match ticket {
            Ticket::Ready(token) => return Ok(token),
            Ticket::Wait(rx) => rx,
            Ticket::Start(rx) => {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.lead().await });
                rx
            }
        };
        rx.await.unwrap_or(Err(RenewalError::Abandoned))
    }
}

impl Inner {
    async fn renew_once(&self) -> RenewalResult {
        let refresh = self.store.refresh().ok_or(RenewalError::NoRefreshToken)?;
        let access = self.renewer.exchange(&refresh).await?;
        self.store
            .set_access(&access)
            .map_err(|e| RenewalError::Store(e.to_string()))?;
        Ok(access)
    }

    fn enter(&self, rejected: Option<Option<&str>>) -> Ticket {
        let mut state = self.lock_state();
        match &mut *state {
            RenewalState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                if let Some(suppressed_count) = self.log_throttle.should_emit("session.renewal.queued")
                {
                    debug!(
                        event_name = "session.renewal.queued",
                        event_domain = "session",
                        queue_depth = waiters.len(),
                        suppressed_count,
                        "request queued behind in-flight renewal"
                    );
                }
                Ticket::Wait(rx)
            }
            RenewalState::Idle => {
                if let Some(rejected) = rejected {
                    if let Some(current) = self.store.access() {
                        if rejected != Some(current.as_str()) {
                            debug!("Access token changed since the request was sent; replaying");
                            return Ticket::Ready(current);
                        }
                    }
                }
                let (tx, rx) = oneshot::channel();
                *state = RenewalState::Refreshing { waiters: vec![tx] };
                Ticket::Start(rx)
            }
        }
    }

    async fn lead(self: Arc<Self>) {
        let guard = RenewalGuard {
            inner: &self,
            finished: false,
        };
        info!(
            event_name = "session.renewal.started",
            event_domain = "session",
            renewer = self.renewer.get_name(),
            "renewing access token"
        );
        let result = self.renew_once().await;
        guard.finish(&result);
    }

    fn end_session(&self, reason: EndReason) {
        let had_credentials = self.store.access().is_some() || self.store.refresh().is_some();
        if let Err(e) = self.store.clear() {
            error!("Failed to clear credentials: {}", e);
        }
        if !had_credentials {
            debug!("end_session called without stored credentials; nothing to announce");
            return;
        }
        match &reason {
            EndReason::LoggedOut => info!(
                event_name = "session.ended",
                event_domain = "session",
                reason = "logged_out",
                "session ended"
            ),
            EndReason::RenewalFailed(e) => warn!(
                event_name = "session.ended",
                event_domain = "session",
                reason = "renewal_failed",
                error = %e,
                "session ended"
            ),
        }
        self.publish(SessionEvent::Ended { reason });
    }

    /// Back to `Idle`, handing out the waiters that were queued.
    fn reset(&self) -> Vec<Waiter> {
        match mem::take(&mut *self.lock_state()) {
            RenewalState::Refreshing { waiters } => waiters,
            RenewalState::Idle => Vec::new(),
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the state if the renewal task dies mid-flight (runtime shutdown, a
/// panicking renewer), so waiters see `Abandoned` instead of hanging.
struct RenewalGuard<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl RenewalGuard<'_> {
    fn finish(mut self, result: &RenewalResult) {
        self.finished = true;
        let inner = self.inner;

        // Credentials are cleared before any waiter wakes up.
        if let Err(e) = result {
            if e.ends_session() {
                inner.end_session(EndReason::RenewalFailed(e.clone()));
            }
        }

        let waiters = inner.reset();
        let resumed = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(result.clone());
        }

        match result {
            Ok(_) => {
                info!(
                    event_name = "session.renewal.succeeded",
                    event_domain = "session",
                    resumed,
                    "access token renewed"
                );
                inner.publish(SessionEvent::Renewed);
            }
            Err(e) => warn!(
                event_name = "session.renewal.failed",
                event_domain = "session",
                resumed,
                error = %e,
                "access token renewal failed"
            ),
        }
    }
}

impl Drop for RenewalGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let waiters = self.inner.reset();
        warn!(
            event_name = "session.renewal.abandoned",
            event_domain = "session",
            abandoned = waiters.len(),
            "renewal dropped before completion"
        );
    }
}
