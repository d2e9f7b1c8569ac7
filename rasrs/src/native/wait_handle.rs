use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An auto-reset notification object handed to the native layer.
///
/// The native layer keeps a clone and calls [`signal`](WaitHandle::signal)
/// whenever the change it was registered for happens. Signals that arrive
/// while nobody is waiting are coalesced into one. Once the crate closes
/// the handle, further signals are ignored and the registration is over.
#[derive(Clone)]
pub struct WaitHandle {
    shared: Arc<Shared>,
}

struct Shared {
    id: u64,
    notify: Notify,
    closed: AtomicBool,
}

impl WaitHandle {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique identifier of this wait object.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Wakes the registered waiter. Ignored once closed.
    pub fn signal(&self) {
        if !self.is_closed() {
            self.shared.notify.notify_one();
        }
    }

    /// Returns `true` once the registration backed by this handle is over.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Waits for the next signal. Returns `false` if the handle was closed.
    pub(crate) async fn wait(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.shared.notify.notified().await;
        !self.is_closed()
    }

    /// Closes the handle and wakes any waiter so it can observe the close.
    pub(crate) fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.notify.notify_one();
        }
    }
}

impl PartialEq for WaitHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for WaitHandle {}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("id", &self.shared.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
