//! Mutable state of the dialer's single in-flight attempt.

use futures::channel::oneshot;
use std::time::Duration;

use crate::api::events::DialCompletedEvent;
use crate::api::models::ConnectionHandle;
use crate::core::credentials::PersistContext;
use crate::core::eap::EapUserDataBuffer;
use crate::core::timer::DialTimer;
use crate::types::constants::timeouts;

/// State owned by the dialer for the lifetime of one attempt.
///
/// Always accessed under the dialer's lock. `busy` stays set from the
/// moment an attempt is accepted until [`release`](Self::release) runs on
/// whichever path finishes it.
pub(crate) struct DialAttemptState {
    pub(crate) busy: bool,
    /// Incremented per accepted attempt; stale timers compare against it.
    pub(crate) attempt: u64,
    pub(crate) handle: Option<ConnectionHandle>,
    pub(crate) timer: Option<DialTimer>,
    pub(crate) completion: Option<oneshot::Sender<DialCompletedEvent>>,
    pub(crate) eap: Option<EapUserDataBuffer>,
    pub(crate) persist: Option<PersistContext>,
    pub(crate) poll_interval: Duration,
}

impl Default for DialAttemptState {
    fn default() -> Self {
        Self {
            busy: false,
            attempt: 0,
            handle: None,
            timer: None,
            completion: None,
            eap: None,
            persist: None,
            poll_interval: timeouts::hang_up_poll_interval(),
        }
    }
}

impl DialAttemptState {
    /// Marks a new attempt as accepted and returns its number.
    pub(crate) fn accept(&mut self) -> u64 {
        self.busy = true;
        self.attempt = self.attempt.wrapping_add(1);
        self.attempt
    }

    /// Returns `true` while an asynchronous attempt is waiting on its
    /// callback, timer or cancel.
    pub(crate) fn is_async_in_flight(&self) -> bool {
        self.busy && self.completion.is_some()
    }

    /// Ends the current attempt: frees the EAP buffer, disarms the timer and
    /// clears busy. Returns the completion token for delivery, if the
    /// attempt was asynchronous.
    ///
    /// Idempotent; a second call finds nothing left to release.
    pub(crate) fn release(&mut self) -> Option<oneshot::Sender<DialCompletedEvent>> {
        if let Some(mut eap) = self.eap.take() {
            eap.release();
        }
        if let Some(mut timer) = self.timer.take() {
            timer.disarm();
        }
        self.busy = false;
        self.handle = None;
        self.persist = None;
        self.completion.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_sets_busy_and_counts_attempts() {
        let mut state = DialAttemptState::default();
        assert!(!state.busy);
        assert_eq!(state.accept(), 1);
        assert!(state.busy);
        state.release();
        assert_eq!(state.accept(), 2);
    }

    #[test]
    fn release_is_idempotent() {
        let mut state = DialAttemptState::default();
        state.accept();
        let (tx, _rx) = oneshot::channel();
        state.completion = Some(tx);
        state.handle = Some(ConnectionHandle::new(3));
        assert!(state.is_async_in_flight());

        assert!(state.release().is_some());
        assert!(!state.busy);
        assert!(state.handle.is_none());
        assert!(!state.is_async_in_flight());

        assert!(state.release().is_none());
        assert!(!state.busy);
    }
}
