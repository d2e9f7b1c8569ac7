//! In-memory stand-in for the native remote-access layer.
//!
//! Counts every native call the crate makes and lets tests drive dial
//! callbacks and change notifications by hand.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rasrs::native::{
    CredentialStore, DialCallback, DialExtensions, DialNotification, DialParams, NativeBuffer,
    NativeError, RasApi, WaitHandle,
};
use rasrs::{
    ChangeCategory, ConnectionHandle, ConnectionSnapshotEntry, DeviceDescriptor, DialState,
    NetworkCredential, RasError,
};
use uuid::Uuid;

pub struct Registration {
    pub handle: Option<ConnectionHandle>,
    pub category: ChangeCategory,
    pub wait: WaitHandle,
}

#[derive(Default)]
pub struct FakeRas {
    pub begin_connects: AtomicUsize,
    pub allocs: AtomicUsize,
    pub frees: AtomicUsize,
    pub hang_ups: Mutex<Vec<(ConnectionHandle, bool)>>,
    pub last_params: Mutex<Option<DialParams>>,
    pub last_extensions: Mutex<Option<DialExtensions>>,
    pub callback: Mutex<Option<Arc<dyn DialCallback>>>,
    pub connect_error: Mutex<Option<NativeError>>,
    /// How long a blocking begin-connect takes.
    pub blocking_delay: Mutex<Duration>,
    pub connections: Mutex<Vec<ConnectionSnapshotEntry>>,
    pub registrations: Mutex<Vec<Registration>>,
    pub register_error: Mutex<Option<NativeError>>,
    last_handle: AtomicU64,
}

impl FakeRas {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn begin_connect_count(&self) -> usize {
        self.begin_connects.load(Ordering::SeqCst)
    }

    pub fn hang_up_count(&self) -> usize {
        self.hang_ups.lock().unwrap().len()
    }

    pub fn buffers_balanced(&self) -> bool {
        self.allocs.load(Ordering::SeqCst) == self.frees.load(Ordering::SeqCst)
    }

    pub fn fail_connect_with(&self, err: NativeError) {
        *self.connect_error.lock().unwrap() = Some(err);
    }

    pub fn fail_register_with(&self, err: NativeError) {
        *self.register_error.lock().unwrap() = Some(err);
    }

    pub fn set_connections(&self, connections: Vec<ConnectionSnapshotEntry>) {
        *self.connections.lock().unwrap() = connections;
    }

    /// Delivers a notification for the most recent asynchronous attempt.
    ///
    /// Returns what the callback returned, or `None` if there is no callback.
    pub fn fire(&self, state: DialState, error_code: u32) -> Option<bool> {
        self.fire_on(state, error_code, 1)
    }

    pub fn fire_on(
        &self,
        state: DialState,
        error_code: u32,
        sub_entry_index: u32,
    ) -> Option<bool> {
        let handle = self.last_handle.load(Ordering::SeqCst);
        self.notify(handle, state, error_code, sub_entry_index)
    }

    /// Delivers a notification carrying an explicit native handle.
    pub fn notify(
        &self,
        handle: u64,
        state: DialState,
        error_code: u32,
        sub_entry_index: u32,
    ) -> Option<bool> {
        let callback = self.callback.lock().unwrap().clone()?;
        let notification = DialNotification {
            callback_id: 0,
            sub_entry_index,
            handle,
            message: 0xCCCD,
            state,
            error_code,
            extended_error_code: 0,
        };
        Some(callback.on_notification(&notification))
    }

    /// Signals every open registration of `category`.
    pub fn signal(&self, category: ChangeCategory) {
        for reg in self.registrations.lock().unwrap().iter() {
            if reg.category == category && !reg.wait.is_closed() {
                reg.wait.signal();
            }
        }
    }

    pub fn total_registrations(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub fn live_registrations(&self) -> Vec<(Option<ConnectionHandle>, ChangeCategory)> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.wait.is_closed())
            .map(|r| (r.handle, r.category))
            .collect()
    }
}

impl RasApi for FakeRas {
    fn begin_connect(
        &self,
        params: &DialParams,
        extensions: &DialExtensions,
        callback: Option<Arc<dyn DialCallback>>,
    ) -> Result<ConnectionHandle, NativeError> {
        self.begin_connects.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params.clone());
        *self.last_extensions.lock().unwrap() = Some(*extensions);

        if let Some(err) = self.connect_error.lock().unwrap().clone() {
            return Err(err);
        }

        let handle = 0x100 + self.begin_connect_count() as u64;
        self.last_handle.store(handle, Ordering::SeqCst);

        match callback {
            Some(cb) => *self.callback.lock().unwrap() = Some(cb),
            None => thread::sleep(*self.blocking_delay.lock().unwrap()),
        }
        Ok(ConnectionHandle::new(handle))
    }

    fn hang_up(
        &self,
        handle: ConnectionHandle,
        _poll_interval: Duration,
        close_all_references: bool,
    ) -> Result<(), NativeError> {
        self.hang_ups
            .lock()
            .unwrap()
            .push((handle, close_all_references));
        Ok(())
    }

    fn list_active_connections(&self) -> Result<Vec<ConnectionSnapshotEntry>, NativeError> {
        Ok(self.connections.lock().unwrap().clone())
    }

    fn register_change_notification(
        &self,
        handle: Option<ConnectionHandle>,
        wait: WaitHandle,
        category: ChangeCategory,
    ) -> Result<(), NativeError> {
        if let Some(err) = self.register_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.registrations.lock().unwrap().push(Registration {
            handle,
            category,
            wait,
        });
        Ok(())
    }

    fn error_string(&self, code: u32) -> Option<String> {
        match code {
            691 => Some("The remote connection was denied".to_string()),
            _ => None,
        }
    }

    fn alloc_buffer(&self, data: &[u8]) -> Result<NativeBuffer, NativeError> {
        let n = self.allocs.fetch_add(1, Ordering::SeqCst);
        Ok(NativeBuffer {
            address: 0x8000 + n * 0x100,
            len: data.len(),
        })
    }

    fn free_buffer(&self, _buffer: NativeBuffer) {
        self.frees.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub stored: Mutex<Option<NetworkCredential>>,
    pub eap: Mutex<Option<Vec<u8>>>,
    pub saved: Mutex<Vec<(String, NetworkCredential, bool)>>,
    pub fail_saves: bool,
}

impl CredentialStore for FakeStore {
    fn credentials(
        &self,
        _phone_book: &Path,
        _entry: &str,
    ) -> rasrs::Result<Option<NetworkCredential>> {
        Ok(self.stored.lock().unwrap().clone())
    }

    fn set_credentials(
        &self,
        _phone_book: &Path,
        entry: &str,
        credentials: &NetworkCredential,
        all_users: bool,
    ) -> rasrs::Result<()> {
        if self.fail_saves {
            return Err(RasError::CredentialStore("access denied".into()));
        }
        self.saved
            .lock()
            .unwrap()
            .push((entry.to_string(), credentials.clone(), all_users));
        Ok(())
    }

    fn eap_user_data(&self, _phone_book: &Path, _entry: &str) -> rasrs::Result<Option<Vec<u8>>> {
        Ok(self.eap.lock().unwrap().clone())
    }
}

pub fn connection(name: &str, handle: u64) -> ConnectionSnapshotEntry {
    ConnectionSnapshotEntry {
        handle: ConnectionHandle::new(handle),
        entry_name: name.to_string(),
        phone_book_path: "/etc/ras/rasphone.pbk".into(),
        device: DeviceDescriptor {
            name: "WAN Miniport (SSTP)".into(),
            device_type: "vpn".into(),
        },
        sub_entry_index: 1,
        entry_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
        session_id: None,
        correlation_id: None,
        connection_options: None,
    }
}
