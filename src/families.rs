//! Metric family descriptors.
//!
//! Each [`Family`] is one gauge with a fixed label schema. [`MetricDesc`] binds
//! a family to its fully qualified name under a namespace.

/// Subsystem segment shared by every family name.
pub const SUBSYSTEM: &str = "nvgpu";

/// A named group of same-shaped gauge observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    /// Driver, CUDA and NVML versions.
    SysInfo,
    /// Per-device identity.
    GpuInfo,
    /// Applications clock per clock domain.
    AppClock,
    /// Clock per domain and source.
    Clock,
    /// Compute mode.
    ComputeMode,
    /// Performance state.
    Perf,
    /// Persistence mode.
    PersistenceMode,
    /// Utilization per resource.
    Util,
    /// Minimum fan speed.
    MinFanSpeed,
    /// Maximum fan speed.
    MaxFanSpeed,
    /// Current fan speed per fan.
    FanSpeed,
    /// Temperature per sensor.
    Temp,
    /// Power draw.
    PowerUsage,
    /// Enforced power limit.
    PowerEnforceLimit,
    /// Total memory.
    MemTotal,
    /// Used memory.
    MemUsed,
    /// Free memory.
    MemFree,
}

impl Family {
    /// All families, in descriptor order.
    pub const ALL: [Family; 17] = [
        Family::SysInfo,
        Family::GpuInfo,
        Family::AppClock,
        Family::Clock,
        Family::ComputeMode,
        Family::Perf,
        Family::PersistenceMode,
        Family::Util,
        Family::MinFanSpeed,
        Family::MaxFanSpeed,
        Family::FanSpeed,
        Family::Temp,
        Family::PowerUsage,
        Family::PowerEnforceLimit,
        Family::MemTotal,
        Family::MemUsed,
        Family::MemFree,
    ];

    /// Short family name, the last segment of the metric name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SysInfo => "sysinfo",
            Self::GpuInfo => "gpuinfo",
            Self::AppClock => "appclk",
            Self::Clock => "clk",
            Self::ComputeMode => "compute_mode",
            Self::Perf => "perf",
            Self::PersistenceMode => "persis_mode",
            Self::Util => "util",
            Self::MinFanSpeed => "min_fan_speed",
            Self::MaxFanSpeed => "max_fan_speed",
            Self::FanSpeed => "fan_speed",
            Self::Temp => "temp",
            Self::PowerUsage => "power_usage",
            Self::PowerEnforceLimit => "power_enforce_limit",
            Self::MemTotal => "mem_total",
            Self::MemUsed => "mem_used",
            Self::MemFree => "mem_free",
        }
    }

    /// Help text.
    #[must_use]
    pub fn help(self) -> &'static str {
        match self {
            Self::SysInfo => "System information from nvml.",
            Self::GpuInfo => "GPU information from nvml.",
            Self::AppClock => "GPU applications clock from nvml (MHz).",
            Self::Clock => "GPU clock information from nvml (MHz).",
            Self::ComputeMode => "GPU compute mode from nvml.",
            Self::Perf => "GPU performance state from nvml.",
            Self::PersistenceMode => "GPU persistence mode from nvml.",
            Self::Util => "GPU utilization rates from nvml (percent).",
            Self::MinFanSpeed => "GPU Min Fan Speed from nvml.",
            Self::MaxFanSpeed => "GPU Max Fan Speed from nvml.",
            Self::FanSpeed => {
                "GPU Fan Speed from nvml. It's the percentage of the maximum fan speed, which may exceed 100%"
            }
            Self::Temp => "GPU Temperature information from nvml in Celsius format.",
            Self::PowerUsage => "GPU Power Usage information from nvml (milliwatts).",
            Self::PowerEnforceLimit => "GPU enforced power limit from nvml (milliwatts).",
            Self::MemTotal => "GPU Memory Total from nvml (bytes).",
            Self::MemUsed => "GPU Memory Used from nvml (bytes).",
            Self::MemFree => "GPU Memory Free from nvml (bytes).",
        }
    }

    /// Label names, in the order label values are supplied.
    #[must_use]
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::SysInfo => &["driver_v", "cuda_v", "nvml_v"],
            Self::GpuInfo => &["index", "uuid", "name", "bus_type"],
            Self::AppClock | Self::Util | Self::Temp => &["index", "type"],
            Self::Clock => &["index", "type", "id"],
            Self::ComputeMode | Self::PersistenceMode => &["index", "mode"],
            Self::Perf => &["index", "state"],
            Self::FanSpeed => &["index", "fan"],
            Self::MinFanSpeed
            | Self::MaxFanSpeed
            | Self::PowerUsage
            | Self::PowerEnforceLimit
            | Self::MemTotal
            | Self::MemUsed
            | Self::MemFree => &["index"],
        }
    }
}

/// Joins non-empty name parts with `_`.
#[must_use]
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    let parts: Vec<&str> =
        [namespace, subsystem, name].into_iter().filter(|part| !part.is_empty()).collect();
    parts.join("_")
}

/// Register-time descriptor of one metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    /// The family described.
    pub family: Family,
    /// Fully qualified metric name.
    pub fq_name: String,
}

impl MetricDesc {
    /// Creates the descriptor for `family` under `namespace`.
    #[must_use]
    pub fn new(namespace: &str, family: Family) -> Self {
        Self { family, fq_name: build_fq_name(namespace, SUBSYSTEM, family.name()) }
    }

    /// Help text.
    #[must_use]
    pub fn help(&self) -> &'static str {
        self.family.help()
    }

    /// Label names.
    #[must_use]
    pub fn labels(&self) -> &'static [&'static str] {
        self.family.labels()
    }
}

/// Descriptors for every family, in [`Family::ALL`] order.
#[must_use]
pub fn descriptors(namespace: &str) -> Vec<MetricDesc> {
    Family::ALL.iter().map(|&family| MetricDesc::new(namespace, family)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fq_name() {
        assert_eq!(MetricDesc::new("node", Family::Temp).fq_name, "node_nvgpu_temp");
        assert_eq!(MetricDesc::new("", Family::MemFree).fq_name, "nvgpu_mem_free");
    }

    #[test]
    fn test_build_fq_name_skips_empty_parts() {
        assert_eq!(build_fq_name("a", "", "c"), "a_c");
        assert_eq!(build_fq_name("", "", ""), "");
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Family::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), Family::ALL.len());
    }

    #[test]
    fn test_label_schemas() {
        assert_eq!(Family::SysInfo.labels(), &["driver_v", "cuda_v", "nvml_v"]);
        assert_eq!(Family::GpuInfo.labels(), &["index", "uuid", "name", "bus_type"]);
        assert_eq!(Family::Clock.labels(), &["index", "type", "id"]);
        assert_eq!(Family::Perf.labels(), &["index", "state"]);
        assert_eq!(Family::FanSpeed.labels(), &["index", "fan"]);
        assert_eq!(Family::PowerEnforceLimit.labels(), &["index"]);
    }

    #[test]
    fn test_every_family_has_help() {
        for family in Family::ALL {
            assert!(!family.help().is_empty(), "{family:?} has no help text");
        }
    }

    #[test]
    fn test_descriptors_cover_all_families() {
        let descs = descriptors("node");
        assert_eq!(descs.len(), Family::ALL.len());
        assert!(descs.iter().all(|d| d.fq_name.starts_with("node_nvgpu_")));
    }
}
