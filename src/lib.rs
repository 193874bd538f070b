//! # nvgpu-collector
//!
//! NVIDIA GPU telemetry collector for a host metrics server.
//!
//! The crate answers one question, "give me the current values": each poll
//! opens a device-access session, enumerates devices, queries identity,
//! thermal, power, memory, clock, utilization and fan state, and emits them as
//! labeled gauges. Scheduling, HTTP serving and registry lifecycle belong to
//! the host.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nvgpu_collector::prelude::*;
//! use std::sync::Arc;
//!
//! let config = Config::load_or_default("/etc/nvgpu.yaml");
//! let mut registry = CollectorRegistry::new();
//! register_nvgpu(&mut registry, Arc::new(NvmlInterface::new()));
//!
//! let collector = registry.build("nvgpu", &config)?;
//! let prom = prometheus::Registry::new();
//! prom.register(Box::new(PrometheusCollector::new(collector)?))?;
//! println!("{}", encode_text(&prom)?);
//! ```
//!
//! ## Feature Flags
//!
//! - `nvidia`: NVML backend via nvml-wrapper
//! - `cli`: the `nvgpu-scrape` one-shot binary
//! - `test-util`: `device::FakeInterface`, a scriptable device inventory
//!   for host tests

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Error Types
// ============================================================================

pub mod error;
pub use error::{CollectorError, Result, Status};

// ============================================================================
// Core Types
// ============================================================================

pub mod config;
pub mod families;
pub mod mapping;
pub mod types;

pub use config::{Config, NvGpuConfig};
pub use families::{Family, MetricDesc};
pub use types::{BoxedCollector, Collector, Metrics, Observation};

// ============================================================================
// Device Access
// ============================================================================

pub mod device;

pub use device::{DeviceInterface, Session};

// ============================================================================
// Collectors and Registry
// ============================================================================

pub mod collectors;
pub mod registry;

pub use collectors::{register_nvgpu, NvGpuCollector};
pub use registry::CollectorRegistry;

// ============================================================================
// Exposition
// ============================================================================

pub mod exposition;

pub use exposition::{encode_families, encode_text, PrometheusCollector};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types.
pub mod prelude {
    pub use crate::collectors::{register_nvgpu, NvGpuCollector};
    pub use crate::config::{Config, NvGpuConfig};
    pub use crate::device::DeviceInterface;
    pub use crate::error::{CollectorError, Result, Status};
    pub use crate::exposition::{encode_text, PrometheusCollector};
    pub use crate::families::{Family, MetricDesc};
    pub use crate::registry::CollectorRegistry;
    pub use crate::types::{BoxedCollector, Collector, Metrics, Observation};

    #[cfg(feature = "nvidia")]
    pub use crate::device::NvmlInterface;
}
