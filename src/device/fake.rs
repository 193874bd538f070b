//! In-memory device inventory for tests.
//!
//! [`FakeInterface`] answers every query from a list of [`FakeDevice`]s,
//! counts calls per [`Op`], and returns an injected [`Status`] for any
//! operation told to fail. Queries made while the library is not
//! initialized return [`Status::Uninitialized`], like the real library.

use super::{DeviceHandle, DeviceInterface, MemoryInfo, QueryResult, Utilization};
use crate::error::Status;
use crate::mapping::{CLOCK_DOMAINS, CLOCK_SOURCES};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// One device-access operation, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Op {
    Init,
    Shutdown,
    DeviceCount,
    DeviceHandle,
    DriverVersion,
    NvmlVersion,
    CudaDriverVersion,
    Uuid,
    Name,
    BusType,
    NumFans,
    MinMaxFanSpeed,
    FanSpeed,
    Temperature,
    PowerUsage,
    EnforcedPowerLimit,
    MemoryInfo,
    ApplicationsClock,
    Clock,
    ComputeMode,
    PerformanceState,
    PersistenceMode,
    UtilizationRates,
}

impl Op {
    /// Operations that query a single device.
    pub const PER_DEVICE: [Op; 16] = [
        Op::Uuid,
        Op::Name,
        Op::BusType,
        Op::NumFans,
        Op::MinMaxFanSpeed,
        Op::FanSpeed,
        Op::Temperature,
        Op::PowerUsage,
        Op::EnforcedPowerLimit,
        Op::MemoryInfo,
        Op::ApplicationsClock,
        Op::Clock,
        Op::ComputeMode,
        Op::PerformanceState,
        Op::PersistenceMode,
        Op::UtilizationRates,
    ];
}

/// Scripted state of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeDevice {
    /// Unique identifier.
    pub uuid: String,
    /// Product name.
    pub name: String,
    /// Bus type code.
    pub bus_type: i32,
    /// Minimum fan speed.
    pub min_fan_speed: u32,
    /// Maximum fan speed.
    pub max_fan_speed: u32,
    /// Current speed per fan; the length is the fan count.
    pub fan_speeds: Vec<u32>,
    /// Temperature per sensor code.
    pub temperatures: BTreeMap<i32, u32>,
    /// Power draw in milliwatts.
    pub power_usage: u32,
    /// Enforced power limit; `None` reports the query unsupported.
    pub power_limit: Option<u32>,
    /// Memory sizes.
    pub memory: MemoryInfo,
    /// Applications clock per domain; missing domains are unsupported.
    pub app_clocks: BTreeMap<i32, u32>,
    /// Clock per (domain, source); missing pairs are unsupported.
    pub clocks: BTreeMap<(i32, i32), u32>,
    /// Compute mode code.
    pub compute_mode: i32,
    /// Performance state code.
    pub performance_state: i32,
    /// Persistence mode code.
    pub persistence_mode: i32,
    /// Utilization rates.
    pub utilization: Utilization,
}

impl FakeDevice {
    /// A PCIe device with no fans and every clock supported.
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        let app_clocks = CLOCK_DOMAINS.iter().map(|&d| (d, 1000 + d as u32 * 100)).collect();
        let clocks = CLOCK_DOMAINS
            .iter()
            .flat_map(|&d| CLOCK_SOURCES.iter().map(move |&s| ((d, s), 1000 + d as u32 * 100 + s as u32 * 10)))
            .collect();

        Self {
            uuid: uuid.into(),
            name: "NVIDIA Test GPU".to_string(),
            bus_type: 2,
            min_fan_speed: 0,
            max_fan_speed: 100,
            fan_speeds: Vec::new(),
            temperatures: BTreeMap::from([(0, 45)]),
            power_usage: 75_000,
            power_limit: Some(250_000),
            memory: MemoryInfo { total: 8 << 30, used: 2 << 30, free: 6 << 30 },
            app_clocks,
            clocks,
            compute_mode: 0,
            performance_state: 0,
            persistence_mode: 1,
            utilization: Utilization::default(),
        }
    }

    /// Sets the product name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the bus type code.
    #[must_use]
    pub fn with_bus_type(mut self, code: i32) -> Self {
        self.bus_type = code;
        self
    }

    /// Installs fans with the given current speeds.
    #[must_use]
    pub fn with_fans(mut self, min: u32, max: u32, speeds: &[u32]) -> Self {
        self.min_fan_speed = min;
        self.max_fan_speed = max;
        self.fan_speeds = speeds.to_vec();
        self
    }

    /// Sets the temperature of one sensor.
    #[must_use]
    pub fn with_temperature(mut self, sensor: i32, celsius: u32) -> Self {
        self.temperatures.insert(sensor, celsius);
        self
    }

    /// Sets power draw and the enforced limit (`None` = unsupported).
    #[must_use]
    pub fn with_power(mut self, usage: u32, limit: Option<u32>) -> Self {
        self.power_usage = usage;
        self.power_limit = limit;
        self
    }

    /// Sets memory sizes.
    #[must_use]
    pub fn with_memory(mut self, total: u64, used: u64, free: u64) -> Self {
        self.memory = MemoryInfo { total, used, free };
        self
    }

    /// Sets utilization rates.
    #[must_use]
    pub fn with_utilization(mut self, gpu: u32, memory: u32) -> Self {
        self.utilization = Utilization { gpu, memory };
        self
    }

    /// Sets the compute mode, performance state and persistence mode codes.
    #[must_use]
    pub fn with_modes(mut self, compute_mode: i32, performance_state: i32, persistence_mode: i32) -> Self {
        self.compute_mode = compute_mode;
        self.performance_state = performance_state;
        self.persistence_mode = persistence_mode;
        self
    }

    /// Reports the applications clock of `domain` as unsupported.
    #[must_use]
    pub fn without_app_clock(mut self, domain: i32) -> Self {
        self.app_clocks.remove(&domain);
        self
    }

    /// Reports the clock of `(domain, source)` as unsupported.
    #[must_use]
    pub fn without_clock(mut self, domain: i32, source: i32) -> Self {
        self.clocks.remove(&(domain, source));
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    initialized: bool,
    open_sessions: usize,
    max_open_sessions: usize,
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, Status>,
}

/// Scriptable [`DeviceInterface`].
#[derive(Debug)]
pub struct FakeInterface {
    devices: Vec<FakeDevice>,
    driver_version: String,
    nvml_version: String,
    cuda_driver_version: i32,
    state: Mutex<FakeState>,
}

impl FakeInterface {
    /// Creates an inventory of `devices`, enumerated in order.
    #[must_use]
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices,
            driver_version: "535.154.05".to_string(),
            nvml_version: "12.535.154.05".to_string(),
            cuda_driver_version: 12020,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Sets the system-wide version answers.
    #[must_use]
    pub fn with_versions(mut self, driver: impl Into<String>, nvml: impl Into<String>, cuda: i32) -> Self {
        self.driver_version = driver.into();
        self.nvml_version = nvml.into();
        self.cuda_driver_version = cuda;
        self
    }

    /// Makes every call of `op` return `status`.
    #[must_use]
    pub fn with_failure(self, op: Op, status: Status) -> Self {
        self.fail(op, status);
        self
    }

    /// Makes every later call of `op` return `status`.
    pub fn fail(&self, op: Op, status: Status) {
        self.state.lock().failures.insert(op, status);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Number of calls made to `op`.
    #[must_use]
    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of per-device query calls made, across all operations.
    #[must_use]
    pub fn device_query_calls(&self) -> usize {
        let state = self.state.lock();
        Op::PER_DEVICE.iter().map(|op| state.calls.get(op).copied().unwrap_or(0)).sum()
    }

    /// Resets all call counters.
    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns true between a successful `init` and the next `shutdown`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Highest number of sessions that were open at the same time.
    #[must_use]
    pub fn max_open_sessions(&self) -> usize {
        self.state.lock().max_open_sessions
    }

    fn record(&self, op: Op) -> QueryResult<()> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(status) = state.failures.get(&op) {
            return Err(status.clone());
        }
        if op != Op::Init && !state.initialized {
            return Err(Status::Uninitialized);
        }
        Ok(())
    }

    fn device(&self, op: Op, handle: DeviceHandle) -> QueryResult<&FakeDevice> {
        self.record(op)?;
        self.devices.get(handle.0 as usize).ok_or(Status::InvalidArgument)
    }
}

impl DeviceInterface for FakeInterface {
    fn init(&self) -> QueryResult<()> {
        self.record(Op::Init)?;
        let mut state = self.state.lock();
        state.initialized = true;
        state.open_sessions += 1;
        state.max_open_sessions = state.max_open_sessions.max(state.open_sessions);
        Ok(())
    }

    fn shutdown(&self) -> QueryResult<()> {
        let result = self.record(Op::Shutdown);
        let mut state = self.state.lock();
        state.initialized = false;
        state.open_sessions = state.open_sessions.saturating_sub(1);
        result
    }

    fn device_count(&self) -> QueryResult<u32> {
        self.record(Op::DeviceCount)?;
        Ok(self.devices.len() as u32)
    }

    fn device_handle(&self, index: u32) -> QueryResult<DeviceHandle> {
        self.record(Op::DeviceHandle)?;
        if (index as usize) < self.devices.len() {
            Ok(DeviceHandle(index))
        } else {
            Err(Status::InvalidArgument)
        }
    }

    fn driver_version(&self) -> QueryResult<String> {
        self.record(Op::DriverVersion)?;
        Ok(self.driver_version.clone())
    }

    fn nvml_version(&self) -> QueryResult<String> {
        self.record(Op::NvmlVersion)?;
        Ok(self.nvml_version.clone())
    }

    fn cuda_driver_version(&self) -> QueryResult<i32> {
        self.record(Op::CudaDriverVersion)?;
        Ok(self.cuda_driver_version)
    }

    fn uuid(&self, device: DeviceHandle) -> QueryResult<String> {
        Ok(self.device(Op::Uuid, device)?.uuid.clone())
    }

    fn name(&self, device: DeviceHandle) -> QueryResult<String> {
        Ok(self.device(Op::Name, device)?.name.clone())
    }

    fn bus_type(&self, device: DeviceHandle) -> QueryResult<i32> {
        Ok(self.device(Op::BusType, device)?.bus_type)
    }

    fn num_fans(&self, device: DeviceHandle) -> QueryResult<u32> {
        Ok(self.device(Op::NumFans, device)?.fan_speeds.len() as u32)
    }

    fn min_max_fan_speed(&self, device: DeviceHandle) -> QueryResult<(u32, u32)> {
        let d = self.device(Op::MinMaxFanSpeed, device)?;
        Ok((d.min_fan_speed, d.max_fan_speed))
    }

    fn fan_speed(&self, device: DeviceHandle, fan: u32) -> QueryResult<u32> {
        let d = self.device(Op::FanSpeed, device)?;
        d.fan_speeds.get(fan as usize).copied().ok_or(Status::InvalidArgument)
    }

    fn temperature(&self, device: DeviceHandle, sensor: i32) -> QueryResult<u32> {
        let d = self.device(Op::Temperature, device)?;
        d.temperatures.get(&sensor).copied().ok_or(Status::InvalidArgument)
    }

    fn power_usage(&self, device: DeviceHandle) -> QueryResult<u32> {
        Ok(self.device(Op::PowerUsage, device)?.power_usage)
    }

    fn enforced_power_limit(&self, device: DeviceHandle) -> QueryResult<u32> {
        self.device(Op::EnforcedPowerLimit, device)?.power_limit.ok_or(Status::NotSupported)
    }

    fn memory_info(&self, device: DeviceHandle) -> QueryResult<MemoryInfo> {
        Ok(self.device(Op::MemoryInfo, device)?.memory)
    }

    fn applications_clock(&self, device: DeviceHandle, domain: i32) -> QueryResult<u32> {
        let d = self.device(Op::ApplicationsClock, device)?;
        d.app_clocks.get(&domain).copied().ok_or(Status::NotSupported)
    }

    fn clock(&self, device: DeviceHandle, domain: i32, source: i32) -> QueryResult<u32> {
        let d = self.device(Op::Clock, device)?;
        d.clocks.get(&(domain, source)).copied().ok_or(Status::NotSupported)
    }

    fn compute_mode(&self, device: DeviceHandle) -> QueryResult<i32> {
        Ok(self.device(Op::ComputeMode, device)?.compute_mode)
    }

    fn performance_state(&self, device: DeviceHandle) -> QueryResult<i32> {
        Ok(self.device(Op::PerformanceState, device)?.performance_state)
    }

    fn persistence_mode(&self, device: DeviceHandle) -> QueryResult<i32> {
        Ok(self.device(Op::PersistenceMode, device)?.persistence_mode)
    }

    fn utilization_rates(&self, device: DeviceHandle) -> QueryResult<Utilization> {
        Ok(self.device(Op::UtilizationRates, device)?.utilization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_require_init() {
        let lib = FakeInterface::new(vec![FakeDevice::new("GPU-0")]);

        assert_eq!(lib.device_count(), Err(Status::Uninitialized));
        lib.init().unwrap();
        assert_eq!(lib.device_count(), Ok(1));
        lib.shutdown().unwrap();
        assert_eq!(lib.uuid(DeviceHandle(0)), Err(Status::Uninitialized));
    }

    #[test]
    fn test_injected_failure_and_counts() {
        let lib = FakeInterface::new(vec![FakeDevice::new("GPU-0")]).with_failure(Op::Name, Status::GpuLost);
        lib.init().unwrap();

        assert_eq!(lib.name(DeviceHandle(0)), Err(Status::GpuLost));
        assert_eq!(lib.uuid(DeviceHandle(0)), Ok("GPU-0".to_string()));
        assert_eq!(lib.calls(Op::Name), 1);
        assert_eq!(lib.device_query_calls(), 2);

        lib.clear_failures();
        assert!(lib.name(DeviceHandle(0)).is_ok());
    }

    #[test]
    fn test_unsupported_capabilities() {
        let dev = FakeDevice::new("GPU-0").with_power(100, None).without_app_clock(1).without_clock(2, 3);
        let lib = FakeInterface::new(vec![dev]);
        lib.init().unwrap();
        let h = DeviceHandle(0);

        assert_eq!(lib.enforced_power_limit(h), Err(Status::NotSupported));
        assert_eq!(lib.applications_clock(h, 1), Err(Status::NotSupported));
        assert!(lib.applications_clock(h, 0).is_ok());
        assert_eq!(lib.clock(h, 2, 3), Err(Status::NotSupported));
        assert!(lib.clock(h, 2, 2).is_ok());
    }

    #[test]
    fn test_fans() {
        let lib = FakeInterface::new(vec![FakeDevice::new("GPU-0").with_fans(20, 100, &[30, 40])]);
        lib.init().unwrap();
        let h = DeviceHandle(0);

        assert_eq!(lib.num_fans(h), Ok(2));
        assert_eq!(lib.min_max_fan_speed(h), Ok((20, 100)));
        assert_eq!(lib.fan_speed(h, 1), Ok(40));
        assert_eq!(lib.fan_speed(h, 2), Err(Status::InvalidArgument));
    }

    #[test]
    fn test_open_session_tracking() {
        let lib = FakeInterface::new(Vec::new());
        lib.init().unwrap();
        lib.shutdown().unwrap();
        lib.init().unwrap();

        assert_eq!(lib.max_open_sessions(), 1);
        assert!(lib.is_initialized());
    }
}
