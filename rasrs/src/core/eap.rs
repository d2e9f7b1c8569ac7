//! Lifetime of the EAP identity blob handed to the native layer.

use log::debug;
use std::sync::Arc;

use crate::native::{NativeBuffer, RasApi};
use crate::Result;

/// EAP user data copied into native memory for the duration of one attempt.
///
/// [`release`](EapUserDataBuffer::release) frees the native block at most
/// once no matter how many exit paths call it; dropping the buffer
/// releases it as well.
pub(crate) struct EapUserDataBuffer {
    api: Arc<dyn RasApi>,
    buffer: Option<NativeBuffer>,
}

impl EapUserDataBuffer {
    /// Copies `data` into native memory.
    pub(crate) fn allocate(api: Arc<dyn RasApi>, data: &[u8]) -> Result<Self> {
        let buffer = api.alloc_buffer(data)?;
        debug!("Allocated {} byte EAP buffer", buffer.len);
        Ok(Self {
            api,
            buffer: Some(buffer),
        })
    }

    /// The native block, until released.
    pub(crate) fn native(&self) -> Option<NativeBuffer> {
        self.buffer
    }

    /// Frees the native block. Safe to call any number of times.
    pub(crate) fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            debug!("Releasing {} byte EAP buffer", buffer.len);
            self.api.free_buffer(buffer);
        }
    }
}

impl Drop for EapUserDataBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
