//! nvgpu-scrape: one-shot NVIDIA GPU scrape
//!
//! Opens an NVML session, polls every device once, and prints the result in
//! the Prometheus text exposition format.
//!
//! Run: `nvgpu-scrape --all`

use anyhow::{Context, Result};
use clap::Parser;
use nvgpu_collector::prelude::*;
use nvgpu_collector::collectors::NVGPU;
use nvgpu_collector::encode_families;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// One-shot NVIDIA GPU scrape in Prometheus text format
#[derive(Parser, Debug)]
#[command(name = "nvgpu-scrape")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Scrape NVIDIA GPU telemetry once and print it", long_about = None)]
struct Cli {
    /// Config file path (YAML)
    #[arg(short, long)]
    config: Option<String>,

    /// Metric namespace prefix
    #[arg(short, long)]
    namespace: Option<String>,

    /// Emit driver, CUDA and NVML versions
    #[arg(long)]
    sysinfo: bool,

    /// Emit per-GPU identity info
    #[arg(long)]
    gpuinfo: bool,

    /// Emit fan speeds
    #[arg(long)]
    faninfo: bool,

    /// Enable every optional family
    #[arg(short, long)]
    all: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("loading config {path}"))?,
            None => Config::default(),
        };

        if let Some(namespace) = &self.namespace {
            config.namespace.clone_from(namespace);
        }
        if self.all {
            config = config.with_all_families();
        }
        config.nvgpu.sysinfo |= self.sysinfo;
        config.nvgpu.gpuinfo |= self.gpuinfo;
        config.nvgpu.faninfo |= self.faninfo;

        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.resolve_config()?;

    let mut registry = CollectorRegistry::new();
    register_nvgpu(&mut registry, Arc::new(NvmlInterface::new()));

    let collector = registry.build(NVGPU, &config)?;
    tracing::debug!(collector = collector.id(), namespace = %config.namespace, "scraping");

    let families = PrometheusCollector::new(collector)?.gather().context("scrape failed")?;
    print!("{}", encode_families(&families)?);

    Ok(())
}
