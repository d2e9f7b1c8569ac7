//! Native change-notification registrations and their wait tasks.
//!
//! Each registration pairs a [`WaitHandle`] given to the native layer with
//! a task on the watcher's runtime that waits on it forever, dispatching to
//! the blocking pool every time it is signalled. Unregistering aborts the
//! task and closes the handle.

use log::{debug, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::api::models::{ChangeCategory, ConnectionHandle, RasError};
use crate::native::{NativeError, RasApi, WaitHandle};
use crate::Result;

/// Called on a blocking pool thread each time a registration is signalled.
pub(crate) type Dispatch = Arc<dyn Fn(ChangeCategory) + Send + Sync>;

struct ChangeRegistration {
    category: ChangeCategory,
    wait: WaitHandle,
    task: JoinHandle<()>,
}

/// The set of live registrations of one watcher.
#[derive(Default)]
pub(crate) struct ChangeNotificationRegistrar {
    registrations: Vec<ChangeRegistration>,
}

impl ChangeNotificationRegistrar {
    /// Registers for `category` and starts waiting on it.
    ///
    /// Native failures are skipped: the watcher keeps whatever registrations
    /// did succeed. A missing entry point is the exception and is returned
    /// as `RasError::NotSupported`.
    pub(crate) fn register(
        &mut self,
        api: &dyn RasApi,
        handle: Option<ConnectionHandle>,
        category: ChangeCategory,
        runtime: &Handle,
        dispatch: &Dispatch,
    ) -> Result<()> {
        let wait = WaitHandle::new();

        match api.register_change_notification(handle, wait.clone(), category) {
            Ok(()) => {}
            Err(NativeError::EntryPointNotFound(name)) => {
                wait.close();
                return Err(RasError::NotSupported(name));
            }
            Err(e) => {
                wait.close();
                debug!("Skipping {category} registration: {e}");
                return Ok(());
            }
        }

        let waiter = wait.clone();
        let dispatch = Arc::clone(dispatch);
        let task = runtime.spawn(async move {
            while waiter.wait().await {
                let dispatch = Arc::clone(&dispatch);
                if let Err(e) = tokio::task::spawn_blocking(move || dispatch(category)).await {
                    warn!("{category} dispatch did not complete: {e}");
                }
            }
            debug!("Wait loop for {category} ended");
        });

        debug!(
            "Registered for {category} (wait object {}, handle {})",
            wait.id(),
            handle.map_or_else(|| "all".to_string(), |h| h.to_string())
        );
        self.registrations.push(ChangeRegistration {
            category,
            wait,
            task,
        });
        Ok(())
    }

    /// Ends every registration.
    pub(crate) fn unregister_all(&mut self) {
        for reg in self.registrations.drain(..) {
            reg.task.abort();
            reg.wait.close();
            debug!("Unregistered {} (wait object {})", reg.category, reg.wait.id());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Drop for ChangeNotificationRegistrar {
    fn drop(&mut self) {
        self.unregister_all();
    }
}
