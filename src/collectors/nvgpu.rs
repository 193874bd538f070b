//! NVIDIA GPU collector.
//!
//! One [`update`](Collector::update) is one poll:
//!
//! 1. acquire a [`Session`] and enumerate devices
//! 2. emit `sysinfo` if enabled
//! 3. for each device in index order, emit every enabled family
//!
//! A query that fails hard aborts the poll with nothing appended to the
//! caller's batch. A query the device reports unsupported is skipped where
//! the family allows it: applications clocks, clocks and the enforced power
//! limit. The session is released on every path.
//!
//! ## Metrics Collected
//!
//! - `sysinfo`, `gpuinfo`: versions and identity (optional)
//! - `min_fan_speed`, `max_fan_speed`, `fan_speed` (optional)
//! - `appclk`, `clk`: clocks per domain and source (MHz)
//! - `compute_mode`, `perf`, `persis_mode`: mode labels
//! - `util`: compute engine and memory controller busy percent
//! - `temp`: Celsius per sensor
//! - `power_usage`, `power_enforce_limit`: milliwatts
//! - `mem_total`, `mem_used`, `mem_free`: bytes

use crate::config::{Config, NvGpuConfig};
use crate::device::{Device, DeviceHandle, DeviceInterface, QueryResult, Session};
use crate::error::{CollectorError, Result};
use crate::families::{descriptors, Family, MetricDesc};
use crate::mapping::{self, CLOCK_DOMAINS, CLOCK_SOURCES, TEMPERATURE_SENSORS};
use crate::registry::CollectorRegistry;
use crate::types::{BoxedCollector, Collector, Metrics};
use std::sync::Arc;
use tracing::{debug, trace};

/// Registry name of this collector.
pub const COLLECTOR_NAME: &str = "nvgpu";

/// Collector for NVIDIA GPU telemetry.
pub struct NvGpuCollector {
    interface: Arc<dyn DeviceInterface>,
    families: NvGpuConfig,
    descs: Vec<MetricDesc>,
}

impl NvGpuCollector {
    /// Creates a collector over `interface` with the given configuration.
    #[must_use]
    pub fn new(interface: Arc<dyn DeviceInterface>, config: &Config) -> Self {
        Self { interface, families: config.nvgpu, descs: descriptors(&config.namespace) }
    }

    /// The enabled optional families.
    #[must_use]
    pub fn families(&self) -> NvGpuConfig {
        self.families
    }

    fn desc(&self, family: Family) -> &MetricDesc {
        &self.descs[family as usize]
    }

    fn poll(&self, out: &mut Metrics) -> Result<()> {
        let mut session = Session::acquire(self.interface.as_ref())?;
        let lib = session.interface();
        let devices = session.enumerate()?;

        if self.families.sysinfo {
            self.collect_sysinfo(lib, out)?;
        }

        for device in devices {
            self.collect_device(lib, device, out)?;
        }

        trace!(devices = devices.len(), observations = out.len(), "poll complete");
        Ok(())
    }

    fn collect_sysinfo(&self, lib: &dyn DeviceInterface, out: &mut Metrics) -> Result<()> {
        let driver = hard(lib.driver_version(), || "NVIDIA System Driver Version".to_string())?;
        let cuda = hard(lib.cuda_driver_version(), || "NVIDIA CUDA Driver Version".to_string())?;
        let nvml = hard(lib.nvml_version(), || "NVIDIA NVML Version".to_string())?;

        let cuda = mapping::cuda_version_string(cuda);
        out.gauge(self.desc(Family::SysInfo), 1.0, &[driver.as_str(), cuda.as_str(), nvml.as_str()])
    }

    fn collect_device(&self, lib: &dyn DeviceInterface, device: &Device, out: &mut Metrics) -> Result<()> {
        let q = DeviceQuery { lib, handle: device.handle, index: device.index_label() };

        if self.families.gpuinfo {
            self.collect_info(&q, out)?;
        }
        if self.families.faninfo {
            self.collect_fans(&q, out)?;
        }
        self.collect_clocks(&q, out)?;
        self.collect_modes(&q, out)?;
        self.collect_utilization(&q, out)?;
        self.collect_temperatures(&q, out)?;
        self.collect_power(&q, out)?;
        self.collect_memory(&q, out)
    }

    fn collect_info(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let uuid = q.hard(q.lib.uuid(q.handle), "UUID")?;
        let name = q.hard(q.lib.name(q.handle), "NAME")?;
        let bus = q.hard(q.lib.bus_type(q.handle), "BUS Type")?;

        out.gauge(
            self.desc(Family::GpuInfo),
            1.0,
            &[q.index, uuid.as_str(), name.as_str(), mapping::bus_type(bus)],
        )
    }

    fn collect_fans(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let fans = q.hard(q.lib.num_fans(q.handle), "Fan info")?;
        if fans == 0 {
            debug!(index = q.index, "GPU has no fan");
            return Ok(());
        }

        let (min, max) = q.hard(q.lib.min_max_fan_speed(q.handle), "Fan Min/Max Speed")?;
        out.gauge(self.desc(Family::MinFanSpeed), f64::from(min), &[q.index])?;
        out.gauge(self.desc(Family::MaxFanSpeed), f64::from(max), &[q.index])?;

        for fan in 0..fans {
            let speed = q.hard(q.lib.fan_speed(q.handle, fan), &format!("Fan {fan} Speed"))?;
            let fan = fan.to_string();
            out.gauge(self.desc(Family::FanSpeed), f64::from(speed), &[q.index, fan.as_str()])?;
        }
        Ok(())
    }

    fn collect_clocks(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        for domain in CLOCK_DOMAINS {
            let domain_name = mapping::clock_domain(domain);
            let result = q.lib.applications_clock(q.handle, domain);
            if let Some(mhz) = q.soft(result, &format!("{domain_name} Applications Clock"))? {
                out.gauge(self.desc(Family::AppClock), f64::from(mhz), &[q.index, domain_name])?;
            }
        }

        for domain in CLOCK_DOMAINS {
            let domain_name = mapping::clock_domain(domain);
            for source in CLOCK_SOURCES {
                let source_name = mapping::clock_source(source);
                let result = q.lib.clock(q.handle, domain, source);
                if let Some(mhz) = q.soft(result, &format!("{domain_name} {source_name} Clock"))? {
                    out.gauge(self.desc(Family::Clock), f64::from(mhz), &[q.index, domain_name, source_name])?;
                }
            }
        }
        Ok(())
    }

    fn collect_modes(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let compute = q.hard(q.lib.compute_mode(q.handle), "Compute Mode")?;
        out.gauge(self.desc(Family::ComputeMode), 1.0, &[q.index, mapping::compute_mode(compute)])?;

        let perf = q.hard(q.lib.performance_state(q.handle), "Performance State")?;
        out.gauge(self.desc(Family::Perf), 1.0, &[q.index, mapping::performance_state(perf)])?;

        let persistence = q.hard(q.lib.persistence_mode(q.handle), "Persistence Mode")?;
        out.gauge(self.desc(Family::PersistenceMode), 1.0, &[q.index, mapping::persistence_mode(persistence)])
    }

    fn collect_utilization(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let util = q.hard(q.lib.utilization_rates(q.handle), "Utilization Rates")?;
        let desc = self.desc(Family::Util);

        out.gauge(desc, f64::from(util.gpu), &[q.index, mapping::UTILIZATION_GPU])?;
        out.gauge(desc, f64::from(util.memory), &[q.index, mapping::UTILIZATION_MEMORY])
    }

    fn collect_temperatures(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        for sensor in TEMPERATURE_SENSORS {
            let celsius =
                q.hard(q.lib.temperature(q.handle, sensor), &format!("Temperature Sensor {sensor} Value"))?;
            out.gauge(self.desc(Family::Temp), f64::from(celsius), &[q.index, mapping::temperature_sensor(sensor)])?;
        }
        Ok(())
    }

    fn collect_power(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let usage = q.hard(q.lib.power_usage(q.handle), "Power Usage Value")?;
        out.gauge(self.desc(Family::PowerUsage), f64::from(usage), &[q.index])?;

        if let Some(limit) = q.soft(q.lib.enforced_power_limit(q.handle), "Enforced Power Limit")? {
            out.gauge(self.desc(Family::PowerEnforceLimit), f64::from(limit), &[q.index])?;
        }
        Ok(())
    }

    fn collect_memory(&self, q: &DeviceQuery<'_>, out: &mut Metrics) -> Result<()> {
        let mem = q.hard(q.lib.memory_info(q.handle), "Memory Info")?;

        out.gauge(self.desc(Family::MemTotal), mem.total as f64, &[q.index])?;
        out.gauge(self.desc(Family::MemUsed), mem.used as f64, &[q.index])?;
        out.gauge(self.desc(Family::MemFree), mem.free as f64, &[q.index])
    }
}

impl std::fmt::Debug for NvGpuCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvGpuCollector").field("families", &self.families).finish_non_exhaustive()
    }
}

impl Collector for NvGpuCollector {
    fn id(&self) -> &'static str {
        COLLECTOR_NAME
    }

    fn descriptors(&self) -> &[MetricDesc] {
        &self.descs
    }

    fn update(&self, metrics: &mut Metrics) -> Result<()> {
        let mut batch = Metrics::new();
        self.poll(&mut batch)?;
        metrics.append(&mut batch);
        Ok(())
    }

    fn display_name(&self) -> &'static str {
        "NVIDIA GPU"
    }
}

/// Registers the collector as `nvgpu`, disabled unless the host enables it.
pub fn register(registry: &mut CollectorRegistry, interface: Arc<dyn DeviceInterface>) {
    registry.register(COLLECTOR_NAME, false, move |config: &Config| -> Result<BoxedCollector> {
        Ok(Box::new(NvGpuCollector::new(Arc::clone(&interface), config)))
    });
}

fn hard<T>(result: QueryResult<T>, what: impl FnOnce() -> String) -> Result<T> {
    result.map_err(|status| CollectorError::Query { what: what(), status })
}

/// Per-device query context: the library, the handle and the index label.
struct DeviceQuery<'a> {
    lib: &'a dyn DeviceInterface,
    handle: DeviceHandle,
    index: &'a str,
}

impl DeviceQuery<'_> {
    /// Any failure aborts the poll.
    fn hard<T>(&self, result: QueryResult<T>, what: &str) -> Result<T> {
        hard(result, || format!("GPU {} {what}", self.index))
    }

    /// An unsupported capability yields `None`; any other failure aborts the poll.
    fn soft<T>(&self, result: QueryResult<T>, what: &str) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(status) => {
                let err = CollectorError::from_query(format!("GPU {} {what}", self.index), status);
                if err.is_unsupported() {
                    debug!(error = %err, "skipping unsupported metric");
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FakeDevice, FakeInterface, Op, Status};

    fn collector(lib: &Arc<FakeInterface>, config: &Config) -> NvGpuCollector {
        let interface: Arc<dyn DeviceInterface> = lib.clone();
        NvGpuCollector::new(interface, config)
    }

    fn labels(metrics: &Metrics, family: Family) -> Vec<Vec<String>> {
        metrics.of_family(family).map(|o| o.labels.clone()).collect()
    }

    #[test]
    fn test_descriptor_table_is_indexed_by_family() {
        let lib = Arc::new(FakeInterface::new(Vec::new()));
        let c = collector(&lib, &Config::default());

        for family in Family::ALL {
            assert_eq!(c.desc(family).family, family);
        }
    }

    #[test]
    fn test_families_follow_config() {
        let lib = Arc::new(FakeInterface::new(Vec::new()));
        let mut config = Config::default();
        config.nvgpu.gpuinfo = true;

        let families = collector(&lib, &config).families();

        assert!(families.gpuinfo);
        assert!(!families.sysinfo);
        assert!(!families.faninfo);
    }

    #[test]
    fn test_default_config_collects_always_on_families() {
        let lib = Arc::new(FakeInterface::new(vec![FakeDevice::new("GPU-a")]));
        let c = collector(&lib, &Config::default());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        assert_eq!(m.of_family(Family::SysInfo).count(), 0);
        assert_eq!(m.of_family(Family::GpuInfo).count(), 0);
        assert_eq!(m.of_family(Family::FanSpeed).count(), 0);
        assert_eq!(m.of_family(Family::AppClock).count(), 4);
        assert_eq!(m.of_family(Family::Clock).count(), 16);
        assert_eq!(m.of_family(Family::Temp).count(), 1);
        assert_eq!(m.of_family(Family::Util).count(), 2);
        assert_eq!(m.of_family(Family::MemTotal).count(), 1);
        assert_eq!(lib.calls(Op::Uuid), 0);
        assert_eq!(lib.calls(Op::NumFans), 0);
        assert_eq!(lib.calls(Op::DriverVersion), 0);
    }

    #[test]
    fn test_sysinfo_labels() {
        let lib = Arc::new(FakeInterface::new(Vec::new()).with_versions("550.54", "12.550.54", 11070));
        let c = collector(&lib, &Config::new().with_all_families());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        assert_eq!(labels(&m, Family::SysInfo), vec![vec!["550.54", "11.7", "12.550.54"]]);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_gpuinfo_maps_bus_type() {
        let dev = FakeDevice::new("GPU-a").with_name("Tesla T4").with_bus_type(99);
        let lib = Arc::new(FakeInterface::new(vec![dev]));
        let c = collector(&lib, &Config::new().with_all_families());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        assert_eq!(labels(&m, Family::GpuInfo), vec![vec!["0", "GPU-a", "Tesla T4", "UNKNOWN"]]);
    }

    #[test]
    fn test_modes_are_mapped() {
        let dev = FakeDevice::new("GPU-a").with_modes(3, 32, 0);
        let lib = Arc::new(FakeInterface::new(vec![dev]));
        let c = collector(&lib, &Config::default());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        assert_eq!(labels(&m, Family::ComputeMode), vec![vec!["0", "EXCLUSIVE_PROCESS"]]);
        assert_eq!(labels(&m, Family::Perf), vec![vec!["0", "UNKNOWN"]]);
        assert_eq!(labels(&m, Family::PersistenceMode), vec![vec!["0", "DISABLED"]]);
        assert!(m.of_family(Family::Perf).all(|o| o.value == 1.0));
    }

    #[test]
    fn test_unsupported_clocks_are_skipped() {
        let dev = FakeDevice::new("GPU-a").without_app_clock(3).without_clock(0, 3);
        let lib = Arc::new(FakeInterface::new(vec![dev]));
        let c = collector(&lib, &Config::default());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        let app = labels(&m, Family::AppClock);
        assert_eq!(app.len(), 3);
        assert!(!app.contains(&vec!["0".to_string(), "VIDEO".to_string()]));
        assert_eq!(m.of_family(Family::Clock).count(), 15);
        assert_eq!(lib.calls(Op::Clock), 16);
    }

    #[test]
    fn test_clock_hard_error_aborts() {
        let lib = Arc::new(FakeInterface::new(vec![FakeDevice::new("GPU-a")]).with_failure(Op::Clock, Status::GpuLost));
        let c = collector(&lib, &Config::default());
        let mut m = Metrics::new();

        let err = c.update(&mut m).unwrap_err();

        assert!(err.to_string().contains("GPU 0 GRAPHICS CURRENT Clock"), "{err}");
        assert!(m.is_empty());
        assert_eq!(lib.calls(Op::Shutdown), 1);
    }

    #[test]
    fn test_clock_values_labeled_by_domain_and_source() {
        let lib = Arc::new(FakeInterface::new(vec![FakeDevice::new("GPU-a")]));
        let c = collector(&lib, &Config::default());
        let mut m = Metrics::new();

        c.update(&mut m).unwrap();

        let mem_boost = m
            .of_family(Family::Clock)
            .find(|o| o.label("type") == Some("MEM") && o.label("id") == Some("CUSTOMER_BOOST_MAX"))
            .map(|o| o.value);
        assert_eq!(mem_boost, Some(1230.0));
    }
}
