//! Device-access boundary.
//!
//! [`DeviceInterface`] is the capability the collector calls into: library
//! lifecycle, enumeration, and one method per hardware query. Every call
//! returns either its value or the driver [`Status`]. Enum-valued queries
//! return the raw driver code; turning codes into labels is the job of
//! [`crate::mapping`].
//!
//! Backends:
//!
//! - [`NvmlInterface`]: real NVIDIA devices via NVML (`nvidia` feature)
//! - `FakeInterface`: scriptable inventory for tests (`test-util` feature)

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod fake;
pub mod session;

#[cfg(feature = "nvidia")]
#[cfg_attr(docsrs, doc(cfg(feature = "nvidia")))]
pub mod nvml;

pub use crate::error::Status;
#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeDevice, FakeInterface, Op};
pub use session::{Device, Session};

#[cfg(feature = "nvidia")]
pub use nvml::NvmlInterface;

/// Result of a single device-access call.
pub type QueryResult<T> = std::result::Result<T, Status>;

/// Opaque library handle of one device.
///
/// Only meaningful while the session that resolved it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Memory partition sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Installed memory.
    pub total: u64,
    /// Allocated memory.
    pub used: u64,
    /// Unallocated memory.
    pub free: u64,
}

/// Utilization over the driver's last sample period, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utilization {
    /// Compute engine busy percentage.
    pub gpu: u32,
    /// Memory controller busy percentage.
    pub memory: u32,
}

/// The device-access library.
///
/// Implementations are stateful and not reentrant; callers go through
/// [`Session`], which serializes access and brackets every poll with
/// [`init`](Self::init) and [`shutdown`](Self::shutdown).
pub trait DeviceInterface: Send + Sync {
    /// Initializes the library.
    fn init(&self) -> QueryResult<()>;

    /// Releases the library.
    fn shutdown(&self) -> QueryResult<()>;

    /// Number of devices visible to the library.
    fn device_count(&self) -> QueryResult<u32>;

    /// Resolves the handle of the device at `index`.
    fn device_handle(&self, index: u32) -> QueryResult<DeviceHandle>;

    /// Kernel driver version.
    fn driver_version(&self) -> QueryResult<String>;

    /// Library version.
    fn nvml_version(&self) -> QueryResult<String>;

    /// CUDA driver version packed as `1000 * major + 10 * minor`.
    fn cuda_driver_version(&self) -> QueryResult<i32>;

    /// Globally unique identifier.
    fn uuid(&self, device: DeviceHandle) -> QueryResult<String>;

    /// Product name.
    fn name(&self, device: DeviceHandle) -> QueryResult<String>;

    /// Bus type code.
    fn bus_type(&self, device: DeviceHandle) -> QueryResult<i32>;

    /// Number of fans.
    fn num_fans(&self, device: DeviceHandle) -> QueryResult<u32>;

    /// Minimum and maximum fan speed, in percent.
    fn min_max_fan_speed(&self, device: DeviceHandle) -> QueryResult<(u32, u32)>;

    /// Current speed of one fan, in percent of its maximum.
    fn fan_speed(&self, device: DeviceHandle, fan: u32) -> QueryResult<u32>;

    /// Temperature of one sensor, in degrees Celsius.
    fn temperature(&self, device: DeviceHandle, sensor: i32) -> QueryResult<u32>;

    /// Power draw in milliwatts.
    fn power_usage(&self, device: DeviceHandle) -> QueryResult<u32>;

    /// Enforced power limit in milliwatts.
    fn enforced_power_limit(&self, device: DeviceHandle) -> QueryResult<u32>;

    /// Memory partition sizes.
    fn memory_info(&self, device: DeviceHandle) -> QueryResult<MemoryInfo>;

    /// Applications clock of one clock domain, in MHz.
    fn applications_clock(&self, device: DeviceHandle, domain: i32) -> QueryResult<u32>;

    /// Clock of one clock domain as reported by one source, in MHz.
    fn clock(&self, device: DeviceHandle, domain: i32, source: i32) -> QueryResult<u32>;

    /// Compute mode code.
    fn compute_mode(&self, device: DeviceHandle) -> QueryResult<i32>;

    /// Performance state code.
    fn performance_state(&self, device: DeviceHandle) -> QueryResult<i32>;

    /// Persistence mode code (0 disabled, 1 enabled).
    fn persistence_mode(&self, device: DeviceHandle) -> QueryResult<i32>;

    /// Compute engine and memory controller utilization.
    fn utilization_rates(&self, device: DeviceHandle) -> QueryResult<Utilization>;
}
