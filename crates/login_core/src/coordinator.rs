//! Login flow state machine: `Idle -> LoggingIn -> (LoggedIn | Failed)`, with `Failed`
//! re-entering `LoggingIn` on an explicit retry.
//!
//! Every asynchronous input (status updates, auth completions) is tagged with the generation
//! it was issued under. `deactivate` bumps the generation, so anything arriving afterwards is
//! dropped at the completion boundary instead of touching torn-down state.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use futures::StreamExt;
use shared::domain::{AuthResultCode, Credentials};
use tokio::{
    sync::{broadcast, watch, Mutex, MutexGuard},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};

use crate::{
    error::{ActivateError, LoginFailure, SubmitError},
    types::{Alert, CoordinatorOptions, LoginEvent, LoginSnapshot, LoginState},
    AuthClient, CredentialStore, MissingAuthClient, MissingCredentialStore,
    MissingSessionInitializer, MissingStatusFeed, ServerStatusFeed, SessionInitializer,
};

pub struct CoordinatorDeps {
    pub credential_store: Arc<dyn CredentialStore>,
    pub status_feed: Arc<dyn ServerStatusFeed>,
    pub auth_client: Arc<dyn AuthClient>,
    pub session_initializer: Arc<dyn SessionInitializer>,
}

impl Default for CoordinatorDeps {
    fn default() -> Self {
        Self {
            credential_store: Arc::new(MissingCredentialStore),
            status_feed: Arc::new(MissingStatusFeed),
            auth_client: Arc::new(MissingAuthClient),
            session_initializer: Arc::new(MissingSessionInitializer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Active,
    Deactivated,
}

struct CoordinatorState {
    lifecycle: Lifecycle,
    generation: u64,
    next_attempt_id: u64,
    in_flight: Option<u64>,
    status_task: Option<JoinHandle<()>>,
    snapshot: LoginSnapshot,
}

impl CoordinatorState {
    fn owns_attempt(&self, generation: u64, attempt_id: u64) -> bool {
        self.lifecycle == Lifecycle::Active
            && self.generation == generation
            && self.in_flight == Some(attempt_id)
    }
}

type AttemptOutcome = Result<AuthResultCode, LoginFailure>;

pub struct LoginCoordinator {
    deps: CoordinatorDeps,
    options: CoordinatorOptions,
    inner: Mutex<CoordinatorState>,
    state: watch::Sender<LoginSnapshot>,
    events: broadcast::Sender<LoginEvent>,
}

impl LoginCoordinator {
    pub fn new(deps: CoordinatorDeps, options: CoordinatorOptions) -> Arc<Self> {
        let (state, _) = watch::channel(LoginSnapshot::default());
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            deps,
            options,
            inner: Mutex::new(CoordinatorState {
                lifecycle: Lifecycle::Created,
                generation: 0,
                next_attempt_id: 0,
                in_flight: None,
                status_task: None,
                snapshot: LoginSnapshot::default(),
            }),
            state,
            events,
        })
    }

    pub fn snapshot(&self) -> LoginSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoginSnapshot> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LoginEvent> {
        self.events.subscribe()
    }

    fn publish(&self, guard: &MutexGuard<'_, CoordinatorState>) {
        self.state.send_replace(guard.snapshot.clone());
    }

    fn emit(&self, event: LoginEvent) {
        let _ = self.events.send(event);
    }

    /// Opens the status subscription and loads stored credentials.
    ///
    /// A second call while active is a no-op; the subscription is only ever opened once.
    /// The state lock is released while the store loads.
    pub async fn activate(self: &Arc<Self>) -> Result<(), ActivateError> {
        let mut guard = self.inner.lock().await;
        match guard.lifecycle {
            Lifecycle::Active => {
                debug!("login: activate ignored, already active");
                return Ok(());
            }
            Lifecycle::Deactivated => return Err(ActivateError::Deactivated),
            Lifecycle::Created => {}
        }
        guard.lifecycle = Lifecycle::Active;
        let generation = guard.generation;
        guard.status_task = Some(self.spawn_status_task(generation));
        drop(guard);

        let credentials = match self.deps.credential_store.load().await {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!("login: credential load failed, using defaults: {err:#}");
                Credentials::default()
            }
        };

        let mut guard = self.inner.lock().await;
        if guard.lifecycle != Lifecycle::Active || guard.generation != generation {
            debug!("login: deactivated while loading credentials");
            return Ok(());
        }
        info!(
            username = %credentials.username,
            remember_password = credentials.remember_password,
            "login: coordinator activated"
        );
        guard.snapshot.credentials = credentials;
        self.publish(&guard);
        Ok(())
    }

    fn spawn_status_task(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let mut updates = self.deps.status_feed.subscribe();
        let coordinator = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.deliver_status_update(generation, update).await;
            }
            debug!("login: status feed ended generation={generation}");
        })
    }

    async fn deliver_status_update(&self, generation: u64, text: Option<String>) {
        let mut guard = self.inner.lock().await;
        if guard.lifecycle != Lifecycle::Active || guard.generation != generation {
            debug!("login: dropping stale status update generation={generation}");
            return;
        }
        self.apply_status_update(guard, text);
    }

    /// Replaces the displayed status text. Never touches the login state.
    pub async fn on_status_update(&self, text: Option<String>) {
        let guard = self.inner.lock().await;
        if guard.lifecycle != Lifecycle::Active {
            debug!("login: dropping status update while inactive");
            return;
        }
        self.apply_status_update(guard, text);
    }

    fn apply_status_update(
        &self,
        mut guard: MutexGuard<'_, CoordinatorState>,
        text: Option<String>,
    ) {
        let text = text.unwrap_or_default();
        guard.snapshot.status_text = text.clone();
        self.publish(&guard);
        drop(guard);
        self.emit(LoginEvent::StatusUpdated(text));
    }

    pub async fn set_username(&self, username: impl Into<String>) {
        let username = username.into();
        self.edit_credentials(|credentials| credentials.username = username)
            .await;
    }

    pub async fn set_password(&self, password: impl Into<String>) {
        let password = password.into();
        self.edit_credentials(|credentials| credentials.password = password)
            .await;
    }

    pub async fn set_remember_password(&self, remember_password: bool) {
        self.edit_credentials(|credentials| credentials.remember_password = remember_password)
            .await;
    }

    async fn edit_credentials(&self, edit: impl FnOnce(&mut Credentials)) {
        let mut guard = self.inner.lock().await;
        if guard.lifecycle == Lifecycle::Deactivated {
            debug!("login: ignoring credential edit after deactivation");
            return;
        }
        edit(&mut guard.snapshot.credentials);
        self.publish(&guard);
    }

    /// Starts one authentication attempt with the credentials as currently edited.
    ///
    /// Returns once the state is `LoggingIn`; the outcome is applied later from a background
    /// task. Only one attempt can be outstanding at a time: the attempt id is reserved before
    /// the credentials are staged, and a second submit sees the reservation.
    pub async fn submit_login(self: &Arc<Self>) -> Result<(), SubmitError> {
        let mut guard = self.inner.lock().await;
        if guard.lifecycle != Lifecycle::Active {
            return Err(SubmitError::NotActive);
        }
        if guard.in_flight.is_some() {
            debug!("login: submit rejected, attempt already in flight");
            return Err(SubmitError::AttemptInFlight);
        }
        match guard.snapshot.login_state {
            LoginState::Idle | LoginState::Failed => {}
            LoginState::LoggingIn => return Err(SubmitError::AttemptInFlight),
            LoginState::LoggedIn => return Err(SubmitError::AlreadyLoggedIn),
        }
        if !guard.snapshot.credentials.can_submit() {
            return Err(SubmitError::EmptyUsername);
        }

        let credentials = guard.snapshot.credentials.clone();
        let attempt_id = guard.next_attempt_id;
        guard.next_attempt_id += 1;
        guard.in_flight = Some(attempt_id);
        let generation = guard.generation;
        drop(guard);

        if let Err(err) = self.deps.credential_store.make_current(&credentials).await {
            warn!("login: failed to stage credentials, continuing: {err:#}");
        }

        let mut guard = self.inner.lock().await;
        if !guard.owns_attempt(generation, attempt_id) {
            debug!("login: deactivated while staging attempt {attempt_id}");
            return Err(SubmitError::NotActive);
        }
        guard.snapshot.login_state = LoginState::LoggingIn;
        guard.snapshot.alert = Some(Alert::logging_in());
        guard.snapshot.last_failure = None;
        self.publish(&guard);
        drop(guard);

        info!(username = %credentials.username, attempt_id, "login: attempt started");
        self.emit(LoginEvent::AttemptStarted {
            username: credentials.username.clone(),
        });
        self.spawn_attempt(generation, attempt_id, credentials);
        Ok(())
    }

    fn spawn_attempt(self: &Arc<Self>, generation: u64, attempt_id: u64, credentials: Credentials) {
        let auth_client = Arc::clone(&self.deps.auth_client);
        let coordinator: Weak<Self> = Arc::downgrade(self);
        let login_timeout = self.options.login_timeout;

        tokio::spawn(async move {
            // The attempt runs in its own task so a timeout abandons it without cancelling it.
            let mut attempt =
                tokio::spawn(async move { auth_client.attempt_login(&credentials).await });
            let outcome = match login_timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut attempt).await {
                    Ok(joined) => joined_outcome(joined),
                    Err(_) => Err(timed_out(limit)),
                },
                None => joined_outcome(attempt.await),
            };

            let Some(coordinator) = coordinator.upgrade() else {
                debug!("login: coordinator dropped before attempt {attempt_id} completed");
                return;
            };
            coordinator
                .finish_attempt(generation, attempt_id, outcome)
                .await;
        });
    }

    async fn finish_attempt(&self, generation: u64, attempt_id: u64, outcome: AttemptOutcome) {
        let failure = match outcome {
            Ok(code) if code.is_success() => {
                if !self.inner.lock().await.owns_attempt(generation, attempt_id) {
                    debug!("login: discarding late completion for attempt {attempt_id}");
                    return;
                }
                match self.complete_session().await {
                    Ok(()) => {
                        self.mark_logged_in(generation, attempt_id).await;
                        return;
                    }
                    Err(failure) => failure,
                }
            }
            Ok(code) => LoginFailure::Rejected(code),
            Err(failure) => failure,
        };

        let mut guard = self.inner.lock().await;
        if !guard.owns_attempt(generation, attempt_id) {
            debug!("login: discarding late failure for attempt {attempt_id}");
            return;
        }
        guard.in_flight = None;
        warn!(attempt_id, "login: attempt failed: {failure}");
        guard.snapshot.login_state = LoginState::Failed;
        guard.snapshot.alert = Some(Alert::login_failed(&failure));
        guard.snapshot.last_failure = Some(failure.clone());
        self.publish(&guard);
        drop(guard);
        self.emit(LoginEvent::LoginFailed(failure));
    }

    /// Persists the credentials and sets up the client session. Runs without the lock.
    async fn complete_session(&self) -> Result<(), LoginFailure> {
        if let Err(err) = self.deps.credential_store.save().await {
            warn!("login: credential save failed, ignoring: {err:#}");
        }
        self.deps
            .session_initializer
            .initialize_client()
            .await
            .map_err(|err| LoginFailure::SessionSetup(format!("{err:#}")))
    }

    async fn mark_logged_in(&self, generation: u64, attempt_id: u64) {
        let mut guard = self.inner.lock().await;
        if !guard.owns_attempt(generation, attempt_id) {
            debug!("login: deactivated during session setup for attempt {attempt_id}");
            return;
        }
        guard.in_flight = None;
        guard.snapshot.login_state = LoginState::LoggedIn;
        guard.snapshot.alert = None;
        guard.snapshot.logged_in = true;
        let username = guard.snapshot.credentials.username.clone();
        self.publish(&guard);
        drop(guard);

        info!(username = %username, attempt_id, "login: logged in");
        self.emit(LoginEvent::LoggedIn { username });
    }

    /// Hides a failure alert. The state stays `Failed` so a retry is still possible.
    pub async fn dismiss_alert(&self) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.snapshot.login_state != LoginState::Failed || guard.snapshot.alert.is_none() {
            return false;
        }
        guard.snapshot.alert = None;
        self.publish(&guard);
        true
    }

    /// Closes the status subscription and detaches any in-flight attempt. Safe to repeat.
    pub async fn deactivate(&self) {
        let mut guard = self.inner.lock().await;
        if guard.lifecycle == Lifecycle::Deactivated {
            return;
        }
        let was_active = guard.lifecycle == Lifecycle::Active;
        guard.lifecycle = Lifecycle::Deactivated;
        guard.generation += 1;
        guard.in_flight = None;
        if let Some(task) = guard.status_task.take() {
            task.abort();
        }
        drop(guard);

        if was_active {
            info!("login: coordinator deactivated");
            self.emit(LoginEvent::Deactivated);
        }
    }
}

impl Drop for LoginCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().status_task.take() {
            task.abort();
        }
    }
}

fn joined_outcome(joined: Result<AuthResultCode, JoinError>) -> AttemptOutcome {
    joined.map_err(|err| LoginFailure::AttemptAborted(err.to_string()))
}

fn timed_out(limit: Duration) -> LoginFailure {
    LoginFailure::TimedOut { after: limit }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
