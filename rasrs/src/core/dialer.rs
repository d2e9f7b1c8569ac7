//! Asynchronous connection establishment.
//!
//! A [`Dialer`] runs at most one attempt at a time. The attempt is either
//! blocking ([`Dialer::dial`]) or asynchronous ([`Dialer::dial_async`]). An
//! asynchronous attempt completes through exactly one of:
//!
//! - the native callback reporting [`DialState::Connected`],
//! - the native callback reporting a nonzero error code,
//! - the timeout timer firing,
//! - [`Dialer::cancel`].
//!
//! All of those paths funnel into one completion routine that runs under
//! the dialer lock, so the completion event is raised exactly once.
//!
//! # Callback containment
//!
//! Native notifications arrive on threads owned by the native layer. A
//! panic unwinding back into the native layer would leave its connection
//! state machine corrupted, so every notification is handled inside
//! `catch_unwind` and failures are reported through [`Dialer::on_error`]
//! instead.

use futures::channel::oneshot;
use log::{debug, info, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::api::config::{DialTarget, DialerConfig};
use crate::api::events::{DialCompletedEvent, Handlers, StateChangedEvent};
use crate::api::models::{ConnectionHandle, DialError, DialState, RasError};
use crate::core::attempt::DialAttemptState;
use crate::core::credentials::{PersistContext, resolve_credentials, resolve_eap_user_data};
use crate::core::eap::EapUserDataBuffer;
use crate::core::timer::DialTimer;
use crate::native::{
    CredentialStore, DialCallback, DialExtensions, DialNotification, DialParams, NativeError,
    RasApi,
};
use crate::types::constants::error_code;
use crate::util::utils::{error_message, lock, panic_message};
use crate::Result;

/// Dials connections through the native layer.
///
/// # Example
///
/// ```ignore
/// use rasrs::{DialerConfig, RasClient};
///
/// let client = RasClient::new(native_api);
/// let dialer = client.dialer(DialerConfig::new().with_entry("Office VPN", pbk_path));
///
/// dialer.on_state_changed(|e| println!("{}", e.state));
///
/// let pending = dialer.dial_async()?;
/// let outcome = pending.completed().await;
/// assert!(outcome.connected);
/// ```
///
/// # Re-entry
///
/// Starting a dial while another is in flight fails with
/// [`RasError::DialInProgress`] and never reaches the native layer.
///
/// # Dropping
///
/// Dropping the dialer cancels an asynchronous attempt that is still in
/// flight. The established connection of a completed attempt is left alone.
pub struct Dialer {
    inner: Arc<DialerInner>,
}

/// A started asynchronous dial.
#[derive(Debug)]
pub struct AsyncDial {
    handle: ConnectionHandle,
    completion: oneshot::Receiver<DialCompletedEvent>,
}

impl AsyncDial {
    /// Handle of the connection being dialed.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Waits for the attempt to complete.
    pub async fn completed(self) -> DialCompletedEvent {
        let handle = self.handle;
        self.completion
            .await
            .unwrap_or_else(|_| DialCompletedEvent::cancelled(Some(handle)))
    }

    /// Waits for the attempt to complete and converts the outcome into a
    /// `Result`.
    pub async fn connected(self) -> Result<ConnectionHandle> {
        let handle = self.handle;
        let event = self.completed().await;
        match event.error {
            Some(err) => Err(err.into()),
            None if event.connected => Ok(event.handle.unwrap_or(handle)),
            None => Err(RasError::Cancelled),
        }
    }
}

struct DialerEvents {
    state_changed: Handlers<StateChangedEvent>,
    dial_completed: Handlers<DialCompletedEvent>,
    error: Handlers<RasError>,
}

struct DialerInner {
    api: Arc<dyn RasApi>,
    store: Option<Arc<dyn CredentialStore>>,
    config: Mutex<DialerConfig>,
    state: Mutex<DialAttemptState>,
    /// Built once and handed to every asynchronous attempt.
    callback: Arc<dyn DialCallback>,
    events: DialerEvents,
    state_tx: watch::Sender<Option<DialState>>,
}

#[derive(Debug, Clone, Copy)]
enum DialMode {
    Blocking,
    Async,
}

/// Everything resolved for one attempt before the native call.
struct PreparedAttempt {
    params: DialParams,
    extensions: DialExtensions,
    eap: Option<EapUserDataBuffer>,
    persist: Option<PersistContext>,
}

/// A completion taken out of the attempt state, delivered after the lock
/// is released.
struct Completion {
    sender: Option<oneshot::Sender<DialCompletedEvent>>,
    event: DialCompletedEvent,
    persist_error: Option<RasError>,
}

/// Forwards native notifications to the dialer that owns it.
struct DialTrampoline {
    dialer: Weak<DialerInner>,
}

impl DialCallback for DialTrampoline {
    fn on_notification(&self, notification: &DialNotification) -> bool {
        let Some(inner) = self.dialer.upgrade() else {
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| inner.on_notification(notification))) {
            Ok(keep_going) => keep_going,
            Err(payload) => {
                let err = RasError::CallbackPanicked(panic_message(payload.as_ref()));
                warn!("Contained panic in dial callback: {err}");
                inner.events.error.raise(&err);
                true
            }
        }
    }
}

impl Dialer {
    /// Creates a dialer without a credential store.
    pub fn new(api: Arc<dyn RasApi>, config: DialerConfig) -> Self {
        Self::build(api, None, config)
    }

    /// Creates a dialer that resolves and saves credentials through `store`.
    pub fn with_credential_store(
        api: Arc<dyn RasApi>,
        store: Arc<dyn CredentialStore>,
        config: DialerConfig,
    ) -> Self {
        Self::build(api, Some(store), config)
    }

    pub(crate) fn build(
        api: Arc<dyn RasApi>,
        store: Option<Arc<dyn CredentialStore>>,
        config: DialerConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(None);
        let inner = Arc::new_cyclic(|weak: &Weak<DialerInner>| DialerInner {
            api,
            store,
            config: Mutex::new(config),
            state: Mutex::new(DialAttemptState::default()),
            callback: Arc::new(DialTrampoline {
                dialer: weak.clone(),
            }),
            events: DialerEvents {
                state_changed: Handlers::default(),
                dial_completed: Handlers::default(),
                error: Handlers::default(),
            },
            state_tx,
        });
        Self { inner }
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> DialerConfig {
        lock(&self.inner.config).clone()
    }

    /// Replaces the configuration used by subsequent attempts.
    pub fn set_config(&self, config: DialerConfig) {
        *lock(&self.inner.config) = config;
    }

    /// Dials and blocks until the connection is established or has failed.
    ///
    /// # Errors
    ///
    /// - `RasError::NoDialTarget` / `RasError::InvalidConfig` if the
    ///   configuration does not identify a target
    /// - `RasError::DialInProgress` if an attempt is already running
    /// - `RasError::Dial` if the native layer reports a failure
    pub fn dial(&self) -> Result<ConnectionHandle> {
        Ok(self.inner.attempt(DialMode::Blocking)?.handle)
    }

    /// Starts dialing and returns as soon as the native layer has accepted
    /// the attempt.
    ///
    /// Progress is reported through [`on_state_changed`](Self::on_state_changed);
    /// the outcome through [`on_dial_completed`](Self::on_dial_completed) and
    /// the returned [`AsyncDial`].
    ///
    /// # Errors
    ///
    /// Same as [`dial`](Self::dial), except that native failures after the
    /// attempt started are reported through the completion instead.
    pub fn dial_async(&self) -> Result<AsyncDial> {
        self.inner.attempt(DialMode::Async)
    }

    /// Cancels the in-flight asynchronous attempt, if any.
    ///
    /// The connection is hung up on a best-effort basis and the completion
    /// is raised with `cancelled == true`. Does nothing when no asynchronous
    /// attempt is running.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` while an attempt is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.inner.state).busy
    }

    /// Handle of the in-flight asynchronous attempt.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        lock(&self.inner.state).handle
    }

    /// Subscribes to the most recent state of the current attempt.
    ///
    /// The value resets to `None` when a new asynchronous attempt starts.
    pub fn state_changes(&self) -> watch::Receiver<Option<DialState>> {
        self.inner.state_tx.subscribe()
    }

    /// Registers a handler for per-transition state notifications.
    pub fn on_state_changed<F>(&self, handler: F)
    where
        F: Fn(&StateChangedEvent) + Send + Sync + 'static,
    {
        self.inner.events.state_changed.add(Arc::new(handler));
    }

    /// Registers a handler for attempt completion.
    pub fn on_dial_completed<F>(&self, handler: F)
    where
        F: Fn(&DialCompletedEvent) + Send + Sync + 'static,
    {
        self.inner.events.dial_completed.add(Arc::new(handler));
    }

    /// Registers a handler for errors contained on callback threads.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&RasError) + Send + Sync + 'static,
    {
        self.inner.events.error.add(Arc::new(handler));
    }
}

impl Drop for Dialer {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Dialer")
            .field("busy", &state.busy)
            .field("handle", &state.handle)
            .finish()
    }
}

impl DialerInner {
    /// Runs one attempt. Validation, the busy check and parameter
    /// preparation are shared; only the native call differs by mode.
    ///
    /// A blocking attempt returns an `AsyncDial` that is already complete.
    fn attempt(self: &Arc<Self>, mode: DialMode) -> Result<AsyncDial> {
        let config = lock(&self.config).clone();
        config.validate()?;

        let mut state = lock(&self.state);
        if state.busy {
            return Err(RasError::DialInProgress(state.handle));
        }
        let prepared = self.prepare(&config)?;
        let attempt = state.accept();
        debug!("Accepted {mode:?} dial attempt #{attempt}");

        match mode {
            DialMode::Blocking => {
                // The native call blocks; the lock is not held across it.
                drop(state);
                let result = self.connect_blocking(prepared);
                lock(&self.state).release();

                let handle = result?;
                info!("Dial succeeded: {handle}");

                let (tx, completion) = oneshot::channel();
                let _ = tx.send(DialCompletedEvent::connected(Some(handle)));
                Ok(AsyncDial { handle, completion })
            }
            DialMode::Async => self.connect_async(state, prepared, &config, attempt),
        }
    }

    fn connect_blocking(&self, mut prepared: PreparedAttempt) -> Result<ConnectionHandle> {
        let result = self
            .api
            .begin_connect(&prepared.params, &prepared.extensions, None);

        if let Some(eap) = prepared.eap.as_mut() {
            eap.release();
        }

        let handle = result.map_err(|e| self.dial_failure(e))?;

        if let Some(err) = self.persist_credentials(prepared.persist.as_ref()) {
            self.events.error.raise(&err);
        }
        Ok(handle)
    }

    /// Starts the native attempt. The lock is held across the non-blocking
    /// native call so the handle is recorded before any notification for
    /// this attempt is processed.
    fn connect_async(
        self: &Arc<Self>,
        mut state: MutexGuard<'_, DialAttemptState>,
        mut prepared: PreparedAttempt,
        config: &DialerConfig,
        attempt: u64,
    ) -> Result<AsyncDial> {
        let (completion_tx, completion_rx) = oneshot::channel();
        state.completion = Some(completion_tx);
        state.persist = prepared.persist.take();
        state.eap = prepared.eap.take();
        state.poll_interval = config.hang_up_poll_interval;
        self.state_tx.send_replace(None);

        if let Some(timeout) = config.timeout {
            let weak = Arc::downgrade(self);
            let timer = DialTimer::start(timeout, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timeout(attempt, timeout);
                }
            });
            match timer {
                Ok(timer) => state.timer = Some(timer),
                Err(err) => {
                    state.release();
                    return Err(err);
                }
            }
        }

        let started = self.api.begin_connect(
            &prepared.params,
            &prepared.extensions,
            Some(Arc::clone(&self.callback)),
        );

        match started {
            Ok(handle) => {
                state.handle = Some(handle);
                Ok(AsyncDial {
                    handle,
                    completion: completion_rx,
                })
            }
            Err(err) => {
                state.release();
                Err(self.dial_failure(err))
            }
        }
    }

    fn prepare(&self, config: &DialerConfig) -> Result<PreparedAttempt> {
        let store = self.store.as_deref();
        let credentials = resolve_credentials(config, store)?.unwrap_or_default();

        let mut params = DialParams {
            callback_id: config.callback_id,
            sub_entry_index: config.sub_entry_index,
            username: credentials.username,
            password: credentials.password,
            domain: credentials.domain,
            ..Default::default()
        };
        match &config.target {
            Some(DialTarget::PhoneNumber(number)) => {
                params.phone_number = Some(number.clone());
            }
            Some(DialTarget::Entry { name, phone_book }) => {
                params.entry_name = Some(name.clone());
                params.phone_book_path = Some(phone_book.clone());
            }
            None => return Err(RasError::NoDialTarget),
        }

        let eap = match resolve_eap_user_data(config, store)? {
            Some(data) => Some(EapUserDataBuffer::allocate(Arc::clone(&self.api), &data)?),
            None => None,
        };

        let extensions = DialExtensions {
            options: config.options.to_flags(),
            eap_flags: config.eap_options.to_flags(),
            eap_user_data: eap.as_ref().and_then(EapUserDataBuffer::native),
        };

        debug!("Prepared dial: {params:?} options={:?}", extensions.options);

        Ok(PreparedAttempt {
            params,
            extensions,
            eap,
            persist: PersistContext::from_config(config),
        })
    }

    fn on_notification(&self, n: &DialNotification) -> bool {
        let handle = if n.sub_entry_index > 1 {
            ConnectionHandle::multilink(n.handle)
        } else {
            ConnectionHandle::new(n.handle)
        };

        let attempt = {
            let state = lock(&self.state);
            if !state.is_async_in_flight() {
                debug!("Ignoring dial notification; no attempt in flight");
                return false;
            }
            if state.handle != Some(handle) {
                debug!("Ignoring dial notification for {handle}; not the current attempt");
                return false;
            }
            state.attempt
        };
        let failed = n.error_code != error_code::SUCCESS;
        let message = failed.then(|| error_message(self.api.as_ref(), n.error_code));

        debug!(
            "Dial state changed to: {} (sub-entry {}, error {})",
            n.state, n.sub_entry_index, n.error_code
        );
        self.state_tx.send_replace(Some(n.state));

        let event = StateChangedEvent {
            callback_id: n.callback_id,
            sub_entry_index: n.sub_entry_index,
            handle,
            state: n.state,
            error_code: n.error_code,
            error_message: message.clone(),
            extended_error_code: n.extended_error_code,
        };
        if let Err(err) = self.events.state_changed.emit(&event) {
            self.events.error.raise(&err);
        }

        if failed {
            let error = DialError::Failed {
                code: n.error_code,
                extended_code: n.extended_error_code,
                message: message.unwrap_or_default(),
            };
            warn!("Dial failed: {error}");

            if let Some((completion, current, poll_interval)) =
                self.finish(attempt, |h| DialCompletedEvent::failed(h, error))
            {
                if let Some(current) = current {
                    self.abort(current, poll_interval);
                }
                self.deliver(completion);
            }
            return false;
        }

        if n.state == DialState::Connected {
            let finished = self.finish(attempt, DialCompletedEvent::connected);
            if let Some((completion, _, _)) = finished {
                info!("Dial succeeded: {handle}");
                self.deliver(completion);
            }
        }

        true
    }

    fn on_timeout(&self, attempt: u64, timeout: Duration) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let Some((completion, handle, poll_interval)) = self.finish(attempt, |h| {
                DialCompletedEvent::failed(h, DialError::TimedOut(timeout))
            }) else {
                return;
            };

            warn!("Dial attempt #{attempt} timed out after {timeout:?}");
            if let Some(handle) = handle {
                self.abort(handle, poll_interval);
            }
            self.deliver(completion);
        }));

        match outcome {
            Ok(()) => {}
            Err(payload) => {
                let err = RasError::CallbackPanicked(panic_message(payload.as_ref()));
                self.events.error.raise(&err);
            }
        }
    }

    fn cancel(&self) {
        let (completion, handle, poll_interval) = {
            let mut state = lock(&self.state);
            if !state.is_async_in_flight() {
                debug!("No asynchronous dial in flight; nothing to cancel");
                return;
            }

            debug!("Cancelling dial attempt #{}", state.attempt);
            let (handle, poll_interval) = (state.handle, state.poll_interval);
            let completion = self.complete(&mut state, DialCompletedEvent::cancelled);
            (completion, handle, poll_interval)
        };

        // Later notifications for this handle are ignored once the attempt
        // is no longer in flight.
        if let Some(handle) = handle {
            self.abort(handle, poll_interval);
        }
        if let Some(completion) = completion {
            self.deliver(completion);
        }
    }

    /// Finishes `attempt` if it is still the one in flight. Returns the
    /// completion together with the attempt's own handle and hang-up poll
    /// interval, for an abort after the lock is released.
    fn finish<F>(
        &self,
        attempt: u64,
        build: F,
    ) -> Option<(Completion, Option<ConnectionHandle>, Duration)>
    where
        F: FnOnce(Option<ConnectionHandle>) -> DialCompletedEvent,
    {
        let mut state = lock(&self.state);
        if !state.is_async_in_flight() || state.attempt != attempt {
            return None;
        }
        let (handle, poll_interval) = (state.handle, state.poll_interval);
        let completion = self.complete(&mut state, build)?;
        Some((completion, handle, poll_interval))
    }

    /// Best-effort hang-up of an attempt being abandoned.
    fn abort(&self, handle: ConnectionHandle, poll_interval: Duration) {
        debug!("Aborting connection {handle}");
        match self.api.hang_up(handle, poll_interval, false) {
            Ok(()) => {}
            Err(NativeError::Code { code, .. }) if code == error_code::INVALID_HANDLE => {
                debug!("Connection {handle} already gone");
            }
            Err(e) => warn!("Failed to hang up {handle}: {e}"),
        }
    }

    /// Finishes the attempt. Must be called with the lock held; returns
    /// `None` if another path already finished it.
    fn complete<F>(&self, state: &mut DialAttemptState, build: F) -> Option<Completion>
    where
        F: FnOnce(Option<ConnectionHandle>) -> DialCompletedEvent,
    {
        if !state.busy {
            return None;
        }

        let event = build(state.handle);
        let persist_error = if event.connected {
            self.persist_credentials(state.persist.as_ref())
        } else {
            None
        };
        let sender = state.release();

        Some(Completion {
            sender,
            event,
            persist_error,
        })
    }

    fn deliver(&self, completion: Completion) {
        if let Some(err) = completion.persist_error {
            self.events.error.raise(&err);
        }
        if let Err(err) = self.events.dial_completed.emit(&completion.event) {
            self.events.error.raise(&err);
        }
        if let Some(sender) = completion.sender {
            // The caller may have dropped its `AsyncDial`.
            let _ = sender.send(completion.event);
        }
    }

    /// Saves credentials after a successful dial. Failures are returned for
    /// the error event rather than failing an established connection.
    fn persist_credentials(&self, ctx: Option<&PersistContext>) -> Option<RasError> {
        let (ctx, store) = (ctx?, self.store.as_deref()?);
        match ctx.persist(store) {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to save credentials: {e}");
                Some(e)
            }
        }
    }

    fn dial_failure(&self, err: NativeError) -> RasError {
        match err {
            NativeError::Code {
                code,
                extended_code,
            } => DialError::Failed {
                code,
                extended_code,
                message: error_message(self.api.as_ref(), code),
            }
            .into(),
            other => other.into(),
        }
    }
}
