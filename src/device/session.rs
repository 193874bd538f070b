//! Scoped device-access session.
//!
//! A [`Session`] spans exactly one poll. Acquiring it takes a process-wide
//! lock and initializes the library; dropping it shuts the library down and
//! then releases the lock, on every exit path. Two overlapping polls therefore
//! never interleave device-access calls.

use super::{DeviceHandle, DeviceInterface};
use crate::error::{CollectorError, Result};
use parking_lot::{const_mutex, Mutex, MutexGuard};
use tracing::{trace, warn};

static SESSION_LOCK: Mutex<()> = const_mutex(());

/// A device as enumerated by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// 0-based position in this poll's enumeration order.
    pub index: u32,
    /// Library handle, valid while the session is open.
    pub handle: DeviceHandle,
    index_label: String,
}

impl Device {
    fn new(index: u32, handle: DeviceHandle) -> Self {
        Self { index, handle, index_label: index.to_string() }
    }

    /// The ordinal index as a label value.
    #[must_use]
    pub fn index_label(&self) -> &str {
        &self.index_label
    }
}

/// An open device-access session.
pub struct Session<'a> {
    interface: &'a dyn DeviceInterface,
    devices: Option<Vec<Device>>,
    // Dropped after `Drop::drop` has shut the library down.
    _lock: MutexGuard<'static, ()>,
}

impl<'a> Session<'a> {
    /// Opens a session, waiting for any other open session to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Init`] if the library cannot initialize.
    /// Nothing is released in that case.
    pub fn acquire(interface: &'a dyn DeviceInterface) -> Result<Self> {
        let lock = SESSION_LOCK.lock();
        interface.init().map_err(CollectorError::Init)?;
        trace!("device session opened");

        Ok(Self { interface, devices: None, _lock: lock })
    }

    /// The library this session is bound to.
    #[must_use]
    pub fn interface(&self) -> &'a dyn DeviceInterface {
        self.interface
    }

    /// Returns the devices in enumeration order.
    ///
    /// The first call queries the library; later calls return the same list.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Enumeration`] if the count query or any
    /// handle resolution fails. No partial list is kept.
    pub fn enumerate(&mut self) -> Result<&[Device]> {
        if self.devices.is_none() {
            self.devices = Some(self.resolve_devices()?);
        }
        Ok(self.devices.as_deref().unwrap_or_default())
    }

    fn resolve_devices(&self) -> Result<Vec<Device>> {
        let count = self.interface.device_count().map_err(|status| CollectorError::Enumeration {
            message: format!("unable to get device count: {status}"),
        })?;

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let handle =
                self.interface.device_handle(index).map_err(|status| CollectorError::Enumeration {
                    message: format!("unable to get device at index {index}: {status}"),
                })?;
            devices.push(Device::new(index, handle));
        }

        trace!(count, "devices enumerated");
        Ok(devices)
    }

    /// Closes the session now instead of at end of scope.
    #[allow(clippy::needless_pass_by_value)]
    pub fn release(self) {}
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        match self.interface.shutdown() {
            Ok(()) => trace!("device session closed"),
            Err(status) => warn!(error = %CollectorError::Release(status), "device session release failed"),
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("devices", &self.devices).finish_non_exhaustive()
    }
}
