//! Metric collectors.
//!
//! - **GPU**: NVIDIA (via the [`DeviceInterface`](crate::device::DeviceInterface) boundary)

pub mod nvgpu;

pub use nvgpu::{register as register_nvgpu, NvGpuCollector, COLLECTOR_NAME as NVGPU};
