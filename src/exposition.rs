//! Prometheus exposition adapter.
//!
//! [`PrometheusCollector`] lets a host register any
//! [`Collector`](crate::types::Collector) with a
//! `prometheus::Registry`. Every scrape runs one poll; a failed poll is logged
//! and contributes no metric families to that scrape, so the host keeps
//! serving its other collectors.

use crate::error::{CollectorError, Result};
use crate::families::Family;
use crate::types::{BoxedCollector, Metrics};
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Adapts a [`Collector`](crate::types::Collector) to [`prometheus::core::Collector`].
pub struct PrometheusCollector {
    inner: BoxedCollector,
    descs: Vec<Desc>,
}

impl PrometheusCollector {
    /// Wraps `inner`, building its descriptors once.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is not a valid Prometheus metric.
    pub fn new(inner: BoxedCollector) -> Result<Self> {
        let descs = inner
            .descriptors()
            .iter()
            .map(|d| {
                Desc::new(
                    d.fq_name.clone(),
                    d.help().to_string(),
                    d.labels().iter().map(ToString::to_string).collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self { inner, descs })
    }

    /// Runs one poll and converts it to metric families.
    ///
    /// # Errors
    ///
    /// Returns the poll's error.
    pub fn gather(&self) -> Result<Vec<MetricFamily>> {
        let mut metrics = Metrics::new();
        self.inner.update(&mut metrics)?;
        to_families(&metrics)
    }
}

impl std::fmt::Debug for PrometheusCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusCollector").field("collector", &self.inner.id()).finish_non_exhaustive()
    }
}

impl prometheus::core::Collector for PrometheusCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.gather() {
            Ok(families) => families,
            Err(e) => {
                warn!(collector = self.inner.id(), error = %e, "collector update failed");
                Vec::new()
            }
        }
    }
}

/// Converts a batch to gauge metric families, one per family present.
///
/// # Errors
///
/// Returns an error if a gauge vector cannot be built.
pub fn to_families(metrics: &Metrics) -> Result<Vec<MetricFamily>> {
    let mut vecs: BTreeMap<Family, GaugeVec> = BTreeMap::new();

    for obs in metrics {
        if !vecs.contains_key(&obs.family) {
            let opts = Opts::new(obs.fq_name.clone(), obs.family.help());
            vecs.insert(obs.family, GaugeVec::new(opts, obs.family.labels())?);
        }
        if let Some(vec) = vecs.get(&obs.family) {
            let labels: Vec<&str> = obs.labels.iter().map(String::as_str).collect();
            vec.get_metric_with_label_values(&labels)?.set(obs.value);
        }
    }

    Ok(vecs.values().flat_map(prometheus::core::Collector::collect).collect())
}

/// Renders a registry in the text exposition format.
///
/// # Errors
///
/// Returns [`CollectorError::Exposition`] if encoding fails.
pub fn encode_text(registry: &Registry) -> Result<String> {
    encode_families(&registry.gather())
}

/// Renders metric families in the text exposition format.
///
/// # Errors
///
/// Returns [`CollectorError::Exposition`] if encoding fails.
pub fn encode_families(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| CollectorError::Exposition(format!("metrics are not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::MetricDesc;

    #[test]
    fn test_to_families_groups_by_family() {
        let mut m = Metrics::new();
        let temp = MetricDesc::new("node", Family::Temp);
        let total = MetricDesc::new("node", Family::MemTotal);
        m.gauge(&temp, 40.0, &["0", "GPU"]).unwrap();
        m.gauge(&temp, 50.0, &["1", "GPU"]).unwrap();
        m.gauge(&total, 1024.0, &["0"]).unwrap();

        let families = to_families(&m).unwrap();

        assert_eq!(families.len(), 2);
        let temp = families.iter().find(|f| f.get_name() == "node_nvgpu_temp").unwrap();
        assert_eq!(temp.get_metric().len(), 2);
    }

    #[test]
    fn test_encode_families_text_format() {
        let mut m = Metrics::new();
        m.gauge(&MetricDesc::new("node", Family::PowerUsage), 75000.0, &["0"]).unwrap();

        let text = encode_families(&to_families(&m).unwrap()).unwrap();

        assert!(text.contains("# TYPE node_nvgpu_power_usage gauge"), "{text}");
        assert!(text.contains("node_nvgpu_power_usage{index=\"0\"} 75000"), "{text}");
    }

    #[test]
    fn test_to_families_empty() {
        assert!(to_families(&Metrics::new()).unwrap().is_empty());
    }
}
