//! End-to-end scrapes through a `prometheus::Registry`.
//!
//! Run: cargo test --features test-util --test exposition_test

#![cfg(feature = "test-util")]
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::sync::Arc;

use nvgpu_collector::device::{FakeDevice, FakeInterface, Op};
use nvgpu_collector::prelude::*;

fn scrape(lib: &Arc<FakeInterface>, config: &Config) -> String {
    let mut registry = CollectorRegistry::new();
    register_nvgpu(&mut registry, lib.clone());
    let collector = registry.build("nvgpu", config).unwrap();

    let prom = prometheus::Registry::new();
    prom.register(Box::new(PrometheusCollector::new(collector).unwrap())).unwrap();
    encode_text(&prom).unwrap()
}

#[test]
fn scrape_renders_labeled_gauges() {
    let dev = FakeDevice::new("GPU-7f3a").with_name("Tesla T4").with_utilization(42, 17);
    let lib = Arc::new(FakeInterface::new(vec![dev]));

    let text = scrape(&lib, &Config::new().with_all_families());

    assert!(text.contains("# HELP node_nvgpu_temp GPU Temperature information from nvml in Celsius format."), "{text}");
    assert!(text.contains("# TYPE node_nvgpu_temp gauge"), "{text}");
    assert!(text.contains(r#"node_nvgpu_temp{index="0",type="GPU"} 45"#), "{text}");
    assert!(text.contains(r#"node_nvgpu_util{index="0",type="GPU"} 42"#), "{text}");
    assert!(text.contains(r#"node_nvgpu_util{index="0",type="MEMORY"} 17"#), "{text}");
    assert!(text.contains(r#"uuid="GPU-7f3a""#), "{text}");
    assert!(text.contains(r#"node_nvgpu_persis_mode{index="0",mode="ENABLED"} 1"#), "{text}");
}

#[test]
fn failed_scrape_yields_no_families() {
    let lib = Arc::new(
        FakeInterface::new(vec![FakeDevice::new("GPU-a")]).with_failure(Op::UtilizationRates, Status::GpuLost),
    );

    let text = scrape(&lib, &Config::default());

    assert!(text.is_empty(), "{text}");
    assert_eq!(lib.calls(Op::Shutdown), 1);
}

#[test]
fn config_file_drives_scrape() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "namespace: host").unwrap();
    writeln!(file, "nvgpu:").unwrap();
    writeln!(file, "  sysinfo: true").unwrap();
    let config = Config::load(file.path()).unwrap();
    let lib = Arc::new(FakeInterface::new(vec![FakeDevice::new("GPU-a")]).with_versions("550.54", "12.550.54", 12040));

    let text = scrape(&lib, &config);

    assert!(
        text.contains(r#"host_nvgpu_sysinfo{cuda_v="12.4",driver_v="550.54",nvml_v="12.550.54"} 1"#),
        "{text}"
    );
    assert!(!text.contains("host_nvgpu_gpuinfo"), "{text}");
    assert!(!text.contains("node_nvgpu_"), "{text}");
}
