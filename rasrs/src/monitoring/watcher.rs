//! Watching for connections being established and torn down.
//!
//! A [`ConnectionWatcher`] keeps a baseline snapshot of the active
//! connections. Every native change notification triggers a fresh snapshot
//! which is diffed against the baseline to work out which connection the
//! notification was about.

use log::{debug, info, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;

use crate::api::events::{BandwidthEvent, ConnectionEvent, Handlers};
use crate::api::models::{ChangeCategory, ConnectionHandle, ConnectionSnapshotEntry, RasError};
use crate::monitoring::registrar::{ChangeNotificationRegistrar, Dispatch};
use crate::monitoring::snapshot::{find_added, find_removed};
use crate::native::RasApi;
use crate::util::utils::{lock, panic_message};
use crate::Result;

/// Raises events when connections change.
///
/// The watcher is inert until [`set_enable_raising_events`] turns it on.
/// Scoped to a handle (see [`set_handle`]) it reports the disconnection and
/// bandwidth changes of that connection only; unscoped it reports every
/// disconnection. New connections are always reported.
///
/// Notifications are processed on tokio's blocking pool, one at a time.
/// Enabling the watcher must therefore happen inside a tokio runtime.
///
/// ```ignore
/// let watcher = client.watcher();
/// watcher.on_connected(|e| println!("up: {}", e.connection.entry_name));
/// watcher.on_disconnected(|e| println!("down: {}", e.connection.entry_name));
/// watcher.set_enable_raising_events(true)?;
/// ```
///
/// [`set_enable_raising_events`]: ConnectionWatcher::set_enable_raising_events
/// [`set_handle`]: ConnectionWatcher::set_handle
pub struct ConnectionWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherEvents {
    connected: Handlers<ConnectionEvent>,
    disconnected: Handlers<ConnectionEvent>,
    bandwidth_added: Handlers<BandwidthEvent>,
    bandwidth_removed: Handlers<BandwidthEvent>,
    error: Handlers<RasError>,
}

#[derive(Default)]
struct WatcherState {
    enabled: bool,
    handle: Option<ConnectionHandle>,
    initializing: bool,
    /// A setter changed something while initializing.
    pending: bool,
    running: bool,
    registrar: ChangeNotificationRegistrar,
    baseline: Vec<ConnectionSnapshotEntry>,
    runtime: Option<Handle>,
}

struct WatcherInner {
    api: Arc<dyn RasApi>,
    state: Mutex<WatcherState>,
    /// Serializes dispatch; never taken while `state` is held.
    dispatch_lock: Mutex<()>,
    events: WatcherEvents,
    weak: Weak<WatcherInner>,
}

/// Event to raise once the state lock is released.
enum Raise {
    Connected(ConnectionEvent),
    Disconnected(ConnectionEvent),
    BandwidthAdded(BandwidthEvent),
    BandwidthRemoved(BandwidthEvent),
}

/// Outcome of one notification.
#[derive(Default)]
struct Processed {
    raise: Option<Raise>,
    /// The watched connection ended; registrations fall back to all.
    rescope: bool,
}

impl ConnectionWatcher {
    /// Creates a disabled, unscoped watcher.
    pub fn new(api: Arc<dyn RasApi>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<WatcherInner>| WatcherInner {
            api,
            state: Mutex::new(WatcherState::default()),
            dispatch_lock: Mutex::new(()),
            events: WatcherEvents {
                connected: Handlers::default(),
                disconnected: Handlers::default(),
                bandwidth_added: Handlers::default(),
                bandwidth_removed: Handlers::default(),
                error: Handlers::default(),
            },
            weak: weak.clone(),
        });
        Self { inner }
    }

    /// Turns event raising on or off. Setting the current value is a no-op.
    ///
    /// # Errors
    ///
    /// - `RasError::NotSupported` if the platform cannot deliver change
    ///   notifications
    /// - `RasError::Runtime` if called outside a tokio runtime
    /// - `RasError::Native` if the initial snapshot cannot be taken
    ///
    /// On error the watcher is left disabled with no registrations.
    pub fn set_enable_raising_events(&self, enabled: bool) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if state.enabled == enabled {
            return Ok(());
        }
        state.enabled = enabled;

        if state.initializing {
            state.pending = true;
            return Ok(());
        }

        if enabled {
            self.inner.start(&mut state)
        } else {
            self.inner.stop(&mut state);
            Ok(())
        }
    }

    /// Returns `true` if events are being raised.
    pub fn enable_raising_events(&self) -> bool {
        lock(&self.inner.state).enabled
    }

    /// Scopes the watcher to one connection, or to all with `None`.
    ///
    /// Takes effect immediately when the watcher is running.
    pub fn set_handle(&self, handle: Option<ConnectionHandle>) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if state.handle == handle {
            return Ok(());
        }
        state.handle = handle;

        if state.initializing {
            state.pending = true;
            return Ok(());
        }
        if state.running {
            self.inner.restart(&mut state)?;
        }
        Ok(())
    }

    /// The connection the watcher is scoped to.
    pub fn handle(&self) -> Option<ConnectionHandle> {
        lock(&self.inner.state).handle
    }

    /// Starts a batch of property changes. Registrations are left alone until
    /// [`end_init`](Self::end_init).
    pub fn begin_init(&self) {
        let mut state = lock(&self.inner.state);
        state.initializing = true;
    }

    /// Ends a batch of property changes and applies their net effect.
    pub fn end_init(&self) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if !state.initializing {
            return Ok(());
        }
        state.initializing = false;
        if !std::mem::take(&mut state.pending) {
            return Ok(());
        }

        match (state.enabled, state.running) {
            (true, true) => self.inner.restart(&mut state),
            (true, false) => self.inner.start(&mut state),
            (false, true) => {
                self.inner.stop(&mut state);
                Ok(())
            }
            (false, false) => Ok(()),
        }
    }

    /// Registers a handler for new connections.
    pub fn on_connected<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.inner.events.connected.add(Arc::new(handler));
    }

    /// Registers a handler for terminated connections.
    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.inner.events.disconnected.add(Arc::new(handler));
    }

    /// Registers a handler for links added to the watched connection.
    pub fn on_bandwidth_added<F>(&self, handler: F)
    where
        F: Fn(&BandwidthEvent) + Send + Sync + 'static,
    {
        self.inner.events.bandwidth_added.add(Arc::new(handler));
    }

    /// Registers a handler for links removed from the watched connection.
    pub fn on_bandwidth_removed<F>(&self, handler: F)
    where
        F: Fn(&BandwidthEvent) + Send + Sync + 'static,
    {
        self.inner.events.bandwidth_removed.add(Arc::new(handler));
    }

    /// Registers a handler for errors raised while processing notifications.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&RasError) + Send + Sync + 'static,
    {
        self.inner.events.error.add(Arc::new(handler));
    }
}

impl Drop for ConnectionWatcher {
    fn drop(&mut self) {
        let mut state = lock(&self.inner.state);
        self.inner.stop(&mut state);
    }
}

impl std::fmt::Debug for ConnectionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("ConnectionWatcher")
            .field("enabled", &state.enabled)
            .field("handle", &state.handle)
            .field("registrations", &state.registrar.len())
            .finish()
    }
}

impl WatcherInner {
    fn start(&self, state: &mut WatcherState) -> Result<()> {
        match self.register_all(state) {
            Ok(()) => {
                state.running = true;
                debug!(
                    "Watcher started with {} registration(s)",
                    state.registrar.len()
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start watcher: {e}");
                state.registrar.unregister_all();
                state.running = false;
                state.enabled = false;
                Err(e)
            }
        }
    }

    fn register_all(&self, state: &mut WatcherState) -> Result<()> {
        let runtime = match &state.runtime {
            Some(rt) => rt.clone(),
            None => Handle::try_current().map_err(|e| RasError::Runtime(e.to_string()))?,
        };
        state.runtime = Some(runtime.clone());

        state.baseline = self.api.list_active_connections()?;

        let dispatch: Dispatch = {
            let weak = self.weak.clone();
            Arc::new(move |category| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(category);
                }
            })
        };

        let api = self.api.as_ref();
        let registrar = &mut state.registrar;
        registrar.register(api, None, ChangeCategory::Connection, &runtime, &dispatch)?;

        let handle = state.handle.filter(ConnectionHandle::is_valid);
        for category in [
            ChangeCategory::Disconnection,
            ChangeCategory::BandwidthAdded,
            ChangeCategory::BandwidthRemoved,
        ] {
            if handle.is_none() && category.requires_handle() {
                continue;
            }
            registrar.register(api, handle, category, &runtime, &dispatch)?;
        }
        Ok(())
    }

    fn stop(&self, state: &mut WatcherState) {
        if state.running || !state.registrar.is_empty() {
            state.registrar.unregister_all();
            debug!("Watcher stopped");
        }
        state.running = false;
    }

    fn restart(&self, state: &mut WatcherState) -> Result<()> {
        self.stop(state);
        self.start(state)
    }

    /// Handles one signalled registration. Runs on a blocking pool thread.
    fn dispatch(&self, category: ChangeCategory) {
        let _serialized = lock(&self.dispatch_lock);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.process(category)));
        let Processed { raise, rescope } = match outcome {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                warn!("Failed to process {category} notification: {e}");
                self.events.error.raise(&e);
                return;
            }
            Err(payload) => {
                let e = RasError::CallbackPanicked(panic_message(payload.as_ref()));
                self.events.error.raise(&e);
                return;
            }
        };

        let emitted = match &raise {
            Some(Raise::Connected(e)) => {
                info!("Connection established: {}", e.connection.entry_name);
                self.events.connected.emit(e)
            }
            Some(Raise::Disconnected(e)) => {
                info!("Connection terminated: {}", e.connection.entry_name);
                self.events.disconnected.emit(e)
            }
            Some(Raise::BandwidthAdded(e)) => self.events.bandwidth_added.emit(e),
            Some(Raise::BandwidthRemoved(e)) => self.events.bandwidth_removed.emit(e),
            None => Ok(()),
        };
        if let Err(e) = emitted {
            self.events.error.raise(&e);
        }

        if rescope && let Err(e) = self.rescope() {
            warn!("Failed to rescope watcher: {e}");
            self.events.error.raise(&e);
        }
    }

    /// Re-registers for all connections after the watched one ended, unless
    /// a setter has already moved the watcher on.
    fn rescope(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.handle.is_some() || !state.running {
            return Ok(());
        }
        if state.initializing {
            state.pending = true;
            return Ok(());
        }
        debug!("Watched connection ended; rescoping to all connections");
        self.restart(&mut state)
    }

    /// Works out what a notification was about. The snapshot is taken
    /// without holding the state lock; registrations are not touched here.
    fn process(&self, category: ChangeCategory) -> Result<Processed> {
        if !lock(&self.state).enabled {
            debug!("Ignoring {category} notification; watcher disabled");
            return Ok(Processed::default());
        }

        let current = self.api.list_active_connections()?;
        let mut state = lock(&self.state);
        if !state.enabled {
            return Ok(Processed::default());
        }

        let mut rescope = false;

        let raise = match category {
            ChangeCategory::Connection => {
                let added = find_added(&state.baseline, &current).cloned();
                state.baseline = current;
                added.map(|connection| Raise::Connected(ConnectionEvent { connection }))
            }
            ChangeCategory::Disconnection => {
                let removed = find_removed(&state.baseline, &current).cloned();
                state.baseline = current;

                rescope = state.handle.take().is_some();
                removed.map(|connection| Raise::Disconnected(ConnectionEvent { connection }))
            }
            ChangeCategory::BandwidthAdded | ChangeCategory::BandwidthRemoved => {
                let Some(handle) = state.handle.filter(ConnectionHandle::is_valid) else {
                    return Ok(Processed::default());
                };
                let event = BandwidthEvent {
                    handle,
                    connection: current.into_iter().find(|c| c.handle == handle),
                };
                Some(if category == ChangeCategory::BandwidthAdded {
                    Raise::BandwidthAdded(event)
                } else {
                    Raise::BandwidthRemoved(event)
                })
            }
        };
        Ok(Processed { raise, rescope })
    }
}

