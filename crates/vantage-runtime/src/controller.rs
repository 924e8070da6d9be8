//! The session controller: executes reducer commands, owns the push
//! subscription and the countdown ticker, and tears both down
//! deterministically.
//!
//! # Concurrency
//!
//! Every fetch, the channel's message wait, and the countdown tick are
//! independent suspension points. Two guards keep arbitrary
//! interleavings safe:
//!
//! - a **generation counter**: shutdown and the post-payment restart
//!   bump it, and any fetch that completes under an older generation is
//!   discarded rather than applied to disposed state;
//! - an **in-flight flag** around the push-triggered preview fetch, so
//!   racing readiness signals cannot produce duplicate fetches.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vantage_core::assemble;
use vantage_core::config::ControllerConfig;
use vantage_core::countdown::{CountdownSnapshot, UnlockCountdown};
use vantage_core::credentials::{CredentialStoreError, ReportAccessToken, TokenStore};
use vantage_core::gate::AccessGate;
use vantage_core::payment::{
    CheckoutOutcome, InitiateResponse, PaymentError, PaymentRequest, VerifyRequest,
};
use vantage_core::session::{
    Command, ControllerPhase, EntryAction, SessionEvent, SessionReducer,
};

use crate::backend::ReportBackend;
use crate::checkout::CheckoutProvider;
use crate::http::HttpBackend;
use crate::push::PushChannel;

/// Result of one `pay` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The backend reported the intake as already paid; no order was
    /// created and the full artifact fetch was triggered directly.
    AlreadyPaid,
    /// Checkout completed and verification succeeded; the controller
    /// restarted its fetch path from scratch.
    Verified,
    /// The widget was dismissed without paying; initiate stays enabled.
    Dismissed,
}

#[derive(Default)]
struct Tasks {
    push: Option<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
}

struct Inner {
    intake_id: String,
    backend: Arc<dyn ReportBackend>,
    push: Arc<dyn PushChannel>,
    gate: Arc<AccessGate>,
    tick: Duration,
    vendor_key_fallback: Option<String>,
    reducer: tokio::sync::Mutex<SessionReducer>,
    phase_tx: watch::Sender<ControllerPhase>,
    countdown_tx: watch::Sender<Option<CountdownSnapshot>>,
    tasks: std::sync::Mutex<Tasks>,
    preview_in_flight: AtomicBool,
    generation: AtomicU64,
}

/// Lifecycle controller for one audit session.
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Creates a controller for `intake_id`. Call [`start`] to run the
    /// mount-time status fetch.
    ///
    /// [`start`]: Self::start
    #[must_use]
    pub fn new(
        intake_id: impl Into<String>,
        backend: Arc<dyn ReportBackend>,
        push: Arc<dyn PushChannel>,
        gate: Arc<AccessGate>,
    ) -> Self {
        Self::with_tick(intake_id, backend, push, gate, Duration::from_secs(1))
    }

    /// Same as [`new`], with an explicit countdown tick interval
    /// (shortened in tests).
    ///
    /// [`new`]: Self::new
    #[must_use]
    pub fn with_tick(
        intake_id: impl Into<String>,
        backend: Arc<dyn ReportBackend>,
        push: Arc<dyn PushChannel>,
        gate: Arc<AccessGate>,
        tick: Duration,
    ) -> Self {
        Self::construct(intake_id, backend, push, gate, tick, None)
    }

    /// Builds the production stack from configuration: HTTP backend at
    /// the configured base URL, gate over the given token store, tick
    /// and vendor key fallback from the same section.
    #[must_use]
    pub fn from_config(
        intake_id: impl Into<String>,
        config: &ControllerConfig,
        store: TokenStore,
        push: Arc<dyn PushChannel>,
    ) -> Self {
        let backend = Arc::new(HttpBackend::new(
            reqwest::Client::new(),
            config.backend_base.clone(),
        ));
        let gate = Arc::new(AccessGate::new(store, config.demo_intake_ids.clone()));
        Self::construct(
            intake_id,
            backend,
            push,
            gate,
            Duration::from_millis(config.countdown_tick_ms),
            config.vendor_key_fallback.clone(),
        )
    }

    fn construct(
        intake_id: impl Into<String>,
        backend: Arc<dyn ReportBackend>,
        push: Arc<dyn PushChannel>,
        gate: Arc<AccessGate>,
        tick: Duration,
        vendor_key_fallback: Option<String>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ControllerPhase::Loading);
        let (countdown_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                intake_id: intake_id.into(),
                backend,
                push,
                gate,
                tick,
                vendor_key_fallback,
                reducer: tokio::sync::Mutex::new(SessionReducer::new()),
                phase_tx,
                countdown_tx,
                tasks: std::sync::Mutex::new(Tasks::default()),
                preview_in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Observes the presentation phase.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<ControllerPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Observes the unlock countdown. `None` until the first status
    /// fetch starts it.
    #[must_use]
    pub fn countdown(&self) -> watch::Receiver<Option<CountdownSnapshot>> {
        self.inner.countdown_tx.subscribe()
    }

    /// Runs the mount-time status fetch and whatever entry actions
    /// follow from the returned status.
    pub async fn start(&self) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        dispatch(&self.inner, vec![Command::FetchStatus], generation).await;
    }

    /// Records the token minted by a completed challenge and resumes
    /// the suspended entry action.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store is unavailable; the
    /// controller stays suspended in that case.
    pub async fn complete_challenge(
        &self,
        token: &ReportAccessToken,
    ) -> Result<(), CredentialStoreError> {
        self.inner.gate.complete_challenge(&self.inner.intake_id, token)?;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let commands = self.inner.apply(SessionEvent::ChallengeCompleted).await;
        dispatch(&self.inner, commands, generation).await;
        Ok(())
    }

    /// Runs the payment flow: order creation, checkout handoff, and
    /// verification.
    ///
    /// Calling this on an already-paid intake never creates a second
    /// order; it routes directly to the full-artifact fetch.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::VerificationFailed`] when the signature
    /// is rejected and [`PaymentError::OrderCreation`] when the order
    /// cannot be created; both leave initiate re-enabled.
    pub async fn pay(
        &self,
        request: PaymentRequest,
        checkout: &dyn CheckoutProvider,
    ) -> Result<PaymentOutcome, PaymentError> {
        let inner = &self.inner;
        let reply = inner
            .backend
            .create_order(&inner.intake_id, &request)
            .await
            .map_err(|err| PaymentError::OrderCreation(err.to_string()))?;

        let mut order = match reply {
            InitiateResponse::AlreadyPaid => {
                info!(intake_id = %inner.intake_id, "already paid; skipping checkout");
                let generation = inner.generation.load(Ordering::SeqCst);
                dispatch(
                    inner,
                    vec![Command::FetchFullReport { embedded_artifact: None }],
                    generation,
                )
                .await;
                return Ok(PaymentOutcome::AlreadyPaid);
            },
            InitiateResponse::Order(order) => order,
        };
        if order.vendor_key.is_none() {
            order.vendor_key = inner.vendor_key_fallback.clone();
        }

        let receipt = match checkout.checkout(&order).await? {
            CheckoutOutcome::Completed(receipt) => receipt,
            CheckoutOutcome::Dismissed => {
                debug!(order_id = %order.order_id, "checkout dismissed");
                return Ok(PaymentOutcome::Dismissed);
            },
        };

        let verify = VerifyRequest::from_receipt(&inner.intake_id, request.tier, &receipt);
        let verified = match inner.backend.verify_payment(&verify).await {
            Ok(verified) => verified,
            Err(err) => {
                warn!(
                    order_id = %order.order_id,
                    error = %err,
                    "verification call failed; treating as rejected"
                );
                false
            },
        };
        if !verified {
            warn!(order_id = %order.order_id, "payment verification rejected");
            return Err(PaymentError::VerificationFailed { order_id: order.order_id });
        }

        info!(intake_id = %inner.intake_id, "payment verified; restarting from scratch");
        self.restart().await;
        Ok(PaymentOutcome::Verified)
    }

    /// The reload analogue after successful verification: invalidate
    /// every in-flight fetch, tear down tasks, and re-fetch the
    /// now-authoritative server state from scratch.
    async fn restart(&self) {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.teardown();
        inner.preview_in_flight.store(false, Ordering::SeqCst);
        let commands = inner.apply(SessionEvent::PaymentVerified).await;
        dispatch(inner, commands, generation).await;
    }

    /// Stops all automatic activity: cancels the countdown, closes the
    /// push subscription, and marks in-flight fetches stale so their
    /// results are discarded on arrival.
    pub fn shutdown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.teardown();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Applies one event to the reducer and publishes the new phase.
    async fn apply(&self, event: SessionEvent) -> Vec<Command> {
        let mut reducer = self.reducer.lock().await;
        let commands = reducer.apply(event);
        self.phase_tx.send_replace(reducer.phase().clone());
        commands
    }

    fn token(&self) -> Option<ReportAccessToken> {
        match self.gate.resolve(&self.intake_id, Utc::now()) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "credential store unavailable; proceeding bare");
                None
            },
        }
    }

    async fn fetch_status(&self) -> SessionEvent {
        let token = self.token();
        match self.backend.fetch_session(&self.intake_id, token.as_ref()).await {
            Ok(response) => SessionEvent::StatusFetched(response),
            Err(err) => SessionEvent::FetchFailed {
                during: EntryAction::FetchStatus,
                error: err.classify(&self.gate, &self.intake_id),
            },
        }
    }

    async fn fetch_preview(&self) -> SessionEvent {
        let token = self.token();
        match self.backend.fetch_preview(&self.intake_id, token.as_ref()).await {
            Ok(artifact) => SessionEvent::PreviewFetched { artifact },
            Err(err) => SessionEvent::FetchFailed {
                during: EntryAction::FetchPreview,
                error: err.classify(&self.gate, &self.intake_id),
            },
        }
    }

    async fn fetch_full_report(
        &self,
        embedded_artifact: Option<serde_json::Value>,
    ) -> SessionEvent {
        let token = self.token();
        let report = match self.backend.fetch_report(&self.intake_id, token.as_ref()).await {
            Ok(report) => report,
            Err(err) => {
                return SessionEvent::FetchFailed {
                    during: EntryAction::FetchFullReport,
                    error: err.classify(&self.gate, &self.intake_id),
                };
            },
        };
        let artifact = match embedded_artifact {
            Some(artifact) => artifact,
            None => {
                match self
                    .backend
                    .fetch_full_artifact(&self.intake_id, token.as_ref())
                    .await
                {
                    Ok(artifact) => artifact,
                    Err(err) => {
                        return SessionEvent::FetchFailed {
                            during: EntryAction::FetchFullReport,
                            error: err.classify(&self.gate, &self.intake_id),
                        };
                    },
                }
            },
        };
        let memo = assemble::assemble(&self.intake_id, &report, Some(&artifact));
        SessionEvent::ReportAssembled { memo }
    }

    fn abort_push(&self) {
        let Ok(mut tasks) = self.tasks.lock() else { return };
        if let Some(handle) = tasks.push.take() {
            handle.abort();
        }
    }

    fn abort_countdown(&self) {
        let Ok(mut tasks) = self.tasks.lock() else { return };
        if let Some(handle) = tasks.countdown.take() {
            handle.abort();
        }
        self.countdown_tx.send_replace(None);
    }

    fn teardown(&self) {
        self.abort_push();
        self.abort_countdown();
    }
}

/// Executes commands until the queue drains. Fetch completions feed back
/// through the reducer and may enqueue follow-up commands.
async fn dispatch(inner: &Arc<Inner>, commands: Vec<Command>, generation: u64) {
    let mut queue = VecDeque::from(commands);
    while let Some(command) = queue.pop_front() {
        if inner.stale(generation) {
            debug!(intake_id = %inner.intake_id, "stale generation; discarding commands");
            return;
        }
        match command {
            Command::FetchStatus => {
                let event = inner.fetch_status().await;
                if inner.stale(generation) {
                    return;
                }
                queue.extend(inner.apply(event).await);
            },
            Command::FetchPreview => {
                if inner
                    .preview_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!("preview fetch already in flight; signal suppressed");
                    continue;
                }
                let event = inner.fetch_preview().await;
                inner.preview_in_flight.store(false, Ordering::SeqCst);
                if inner.stale(generation) {
                    return;
                }
                queue.extend(inner.apply(event).await);
            },
            Command::FetchFullReport { embedded_artifact } => {
                let event = inner.fetch_full_report(embedded_artifact).await;
                if inner.stale(generation) {
                    return;
                }
                queue.extend(inner.apply(event).await);
            },
            Command::SubscribePush => spawn_push(inner, generation),
            Command::UnsubscribePush => inner.abort_push(),
            Command::StartCountdown { unlock_at, is_unlocked } => {
                spawn_countdown(inner, generation, unlock_at, is_unlocked);
            },
            Command::StopCountdown => inner.abort_countdown(),
        }
    }
}

/// Opens the push subscription task. Exactly one per intake: a second
/// subscribe while one is live is a no-op.
fn spawn_push(inner: &Arc<Inner>, generation: u64) {
    let Ok(mut tasks) = inner.tasks.lock() else { return };
    if tasks.push.is_some() {
        return;
    }
    let inner = Arc::clone(inner);
    tasks.push = Some(tokio::spawn(async move {
        let mut subscription = match inner.push.subscribe(&inner.intake_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(error = %err, "push subscription failed");
                return;
            },
        };
        info!(intake_id = %inner.intake_id, "push subscription opened");
        while subscription.signaled().await.is_some() {
            if inner.stale(generation) {
                break;
            }
            let commands = inner.apply(SessionEvent::PreviewReadySignaled).await;
            if commands.is_empty() {
                continue;
            }
            // Boxed to keep the dispatch future out of this task's own
            // type.
            let dispatched: Pin<Box<dyn Future<Output = ()> + Send>> =
                Box::pin(dispatch(&inner, commands, generation));
            dispatched.await;
            if !inner.phase_tx.borrow().wants_push() {
                break;
            }
        }
        debug!(intake_id = %inner.intake_id, "push subscription closed");
    }));
}

/// Starts (or restarts, if the server fields changed) the per-tick
/// countdown task.
fn spawn_countdown(
    inner: &Arc<Inner>,
    generation: u64,
    unlock_at: Option<chrono::DateTime<Utc>>,
    is_unlocked: bool,
) {
    let Ok(mut tasks) = inner.tasks.lock() else { return };
    if let Some(previous) = tasks.countdown.take() {
        previous.abort();
    }
    let inner = Arc::clone(inner);
    tasks.countdown = Some(tokio::spawn(async move {
        let mut countdown = UnlockCountdown::new(unlock_at, is_unlocked);
        let mut ticker = tokio::time::interval(inner.tick);
        loop {
            ticker.tick().await;
            if inner.stale(generation) {
                break;
            }
            let snapshot = countdown.tick(Utc::now());
            if snapshot.newly_ready {
                info!(intake_id = %inner.intake_id, "unlock countdown reached zero");
            }
            inner.countdown_tx.send_replace(Some(snapshot));
            if snapshot.ready {
                break;
            }
        }
    }));
}
