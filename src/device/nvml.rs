//! NVIDIA devices via NVML.
//!
//! Uses the nvml-wrapper crate, which loads `libnvidia-ml.so` at runtime.
//!
//! ## Feature Flag
//!
//! Requires the `nvidia` feature to be enabled.

use super::{DeviceHandle, DeviceInterface, MemoryInfo, QueryResult, Utilization};
use crate::error::Status;
use nvml_wrapper::enum_wrappers::device::{Clock, ClockId, TemperatureSensor};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};
use parking_lot::Mutex;

/// [`DeviceInterface`] backed by the NVML shared library.
///
/// The library is loaded by `init` and unloaded by `shutdown`; between polls
/// no NVML state is held.
#[derive(Default)]
pub struct NvmlInterface {
    nvml: Mutex<Option<Nvml>>,
}

impl NvmlInterface {
    /// Creates an interface with the library not yet loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_nvml<T>(&self, f: impl FnOnce(&Nvml) -> Result<T, NvmlError>) -> QueryResult<T> {
        let guard = self.nvml.lock();
        let nvml = guard.as_ref().ok_or(Status::Uninitialized)?;
        f(nvml).map_err(status_of)
    }

    fn with_device<T>(
        &self,
        handle: DeviceHandle,
        f: impl FnOnce(&Device<'_>) -> Result<T, NvmlError>,
    ) -> QueryResult<T> {
        self.with_nvml(|nvml| {
            let device = nvml.device_by_index(handle.0)?;
            f(&device)
        })
    }
}

impl std::fmt::Debug for NvmlInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvmlInterface").field("initialized", &self.nvml.lock().is_some()).finish()
    }
}

fn status_of(err: NvmlError) -> Status {
    match err {
        NvmlError::Uninitialized => Status::Uninitialized,
        NvmlError::InvalidArg => Status::InvalidArgument,
        NvmlError::NotSupported => Status::NotSupported,
        NvmlError::NoPermission => Status::NoPermission,
        NvmlError::NotFound => Status::NotFound,
        NvmlError::DriverNotLoaded => Status::DriverNotLoaded,
        NvmlError::LibraryNotFound | NvmlError::LibloadingError(_) => Status::LibraryNotFound,
        NvmlError::GpuLost => Status::GpuLost,
        NvmlError::Timeout => Status::Timeout,
        NvmlError::Unknown => Status::Unknown,
        other => Status::Other(other.to_string()),
    }
}

fn clock_of(domain: i32) -> QueryResult<Clock> {
    match domain {
        0 => Ok(Clock::Graphics),
        1 => Ok(Clock::SM),
        2 => Ok(Clock::Memory),
        3 => Ok(Clock::Video),
        _ => Err(Status::InvalidArgument),
    }
}

fn clock_id_of(source: i32) -> QueryResult<ClockId> {
    match source {
        0 => Ok(ClockId::Current),
        1 => Ok(ClockId::TargetAppClock),
        2 => Ok(ClockId::DefaultAppClock),
        3 => Ok(ClockId::CustomerMaxBoost),
        _ => Err(Status::InvalidArgument),
    }
}

fn sensor_of(sensor: i32) -> QueryResult<TemperatureSensor> {
    match sensor {
        0 => Ok(TemperatureSensor::Gpu),
        _ => Err(Status::InvalidArgument),
    }
}

impl DeviceInterface for NvmlInterface {
    fn init(&self) -> QueryResult<()> {
        let nvml = Nvml::init().map_err(status_of)?;
        *self.nvml.lock() = Some(nvml);
        Ok(())
    }

    fn shutdown(&self) -> QueryResult<()> {
        match self.nvml.lock().take() {
            Some(nvml) => nvml.shutdown().map_err(status_of),
            None => Err(Status::Uninitialized),
        }
    }

    fn device_count(&self) -> QueryResult<u32> {
        self.with_nvml(Nvml::device_count)
    }

    fn device_handle(&self, index: u32) -> QueryResult<DeviceHandle> {
        self.with_nvml(|nvml| nvml.device_by_index(index).map(|_| DeviceHandle(index)))
    }

    fn driver_version(&self) -> QueryResult<String> {
        self.with_nvml(Nvml::sys_driver_version)
    }

    fn nvml_version(&self) -> QueryResult<String> {
        self.with_nvml(Nvml::sys_nvml_version)
    }

    fn cuda_driver_version(&self) -> QueryResult<i32> {
        self.with_nvml(Nvml::sys_cuda_driver_version)
    }

    fn uuid(&self, device: DeviceHandle) -> QueryResult<String> {
        self.with_device(device, |d| d.uuid())
    }

    fn name(&self, device: DeviceHandle) -> QueryResult<String> {
        self.with_device(device, |d| d.name())
    }

    fn bus_type(&self, device: DeviceHandle) -> QueryResult<i32> {
        self.with_device(device, |d| d.bus_type().map(|bus| bus.as_c() as i32))
    }

    fn num_fans(&self, device: DeviceHandle) -> QueryResult<u32> {
        self.with_device(device, |d| d.num_fans())
    }

    fn min_max_fan_speed(&self, device: DeviceHandle) -> QueryResult<(u32, u32)> {
        self.with_device(device, |d| d.min_max_fan_speed())
    }

    fn fan_speed(&self, device: DeviceHandle, fan: u32) -> QueryResult<u32> {
        self.with_device(device, |d| d.fan_speed(fan))
    }

    fn temperature(&self, device: DeviceHandle, sensor: i32) -> QueryResult<u32> {
        let sensor = sensor_of(sensor)?;
        self.with_device(device, |d| d.temperature(sensor))
    }

    fn power_usage(&self, device: DeviceHandle) -> QueryResult<u32> {
        self.with_device(device, |d| d.power_usage())
    }

    fn enforced_power_limit(&self, device: DeviceHandle) -> QueryResult<u32> {
        self.with_device(device, |d| d.enforced_power_limit())
    }

    fn memory_info(&self, device: DeviceHandle) -> QueryResult<MemoryInfo> {
        self.with_device(device, |d| {
            d.memory_info().map(|m| MemoryInfo { total: m.total, used: m.used, free: m.free })
        })
    }

    fn applications_clock(&self, device: DeviceHandle, domain: i32) -> QueryResult<u32> {
        let clock = clock_of(domain)?;
        self.with_device(device, |d| d.applications_clock(clock))
    }

    fn clock(&self, device: DeviceHandle, domain: i32, source: i32) -> QueryResult<u32> {
        let clock = clock_of(domain)?;
        let id = clock_id_of(source)?;
        self.with_device(device, |d| d.clock(clock, id))
    }

    fn compute_mode(&self, device: DeviceHandle) -> QueryResult<i32> {
        self.with_device(device, |d| d.compute_mode().map(|mode| mode.as_c() as i32))
    }

    fn performance_state(&self, device: DeviceHandle) -> QueryResult<i32> {
        self.with_device(device, |d| d.performance_state().map(|state| state.as_c() as i32))
    }

    fn persistence_mode(&self, device: DeviceHandle) -> QueryResult<i32> {
        self.with_device(device, |d| d.is_in_persistent_mode().map(i32::from))
    }

    fn utilization_rates(&self, device: DeviceHandle) -> QueryResult<Utilization> {
        self.with_device(device, |d| {
            d.utilization_rates().map(|u| Utilization { gpu: u.gpu, memory: u.memory })
        })
    }
}
