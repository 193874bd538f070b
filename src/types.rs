//! Core types shared by collectors and the exposition layer.
//!
//! - [`Observation`]: one gauge value with its label values
//! - [`Metrics`]: the ordered batch of observations produced by one poll
//! - [`Collector`]: trait for metric collection implementations

use crate::error::{CollectorError, Result};
use crate::families::{Family, MetricDesc};

/// One labeled gauge value.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Family the value belongs to.
    pub family: Family,
    /// Fully qualified metric name.
    pub fq_name: String,
    /// Gauge value.
    pub value: f64,
    /// Label values, in the family's label order.
    pub labels: Vec<String>,
}

impl Observation {
    /// Returns the value of the named label, if the family declares it.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        let i = self.family.labels().iter().position(|l| *l == name)?;
        self.labels.get(i).map(String::as_str)
    }
}

/// Observations collected during one poll, in emission order.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    observations: Vec<Observation>,
}

impl Metrics {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a gauge observation.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::LabelCardinality`] if `labels` does not match
    /// the number of labels the family declares.
    pub fn gauge<S: AsRef<str>>(&mut self, desc: &MetricDesc, value: f64, labels: &[S]) -> Result<()> {
        let expected = desc.labels().len();
        if labels.len() != expected {
            return Err(CollectorError::LabelCardinality {
                metric: desc.fq_name.clone(),
                expected,
                actual: labels.len(),
            });
        }

        self.observations.push(Observation {
            family: desc.family,
            fq_name: desc.fq_name.clone(),
            value,
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
        });
        Ok(())
    }

    /// Moves every observation of `other` to the end of this batch.
    pub fn append(&mut self, other: &mut Metrics) {
        self.observations.append(&mut other.observations);
    }

    /// Returns the observations of one family, in emission order.
    pub fn of_family(&self, family: Family) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |o| o.family == family)
    }

    /// Returns the number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns true if there are no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Returns an iterator over all observations.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }
}

impl<'a> IntoIterator for &'a Metrics {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

/// Trait for metric collectors.
///
/// A collector answers "give me the current values" when the host asks. It
/// owns no scheduling and no registry; it must be `Send + Sync` because hosts
/// may scrape from several threads, and `Debug` so built collectors can be
/// logged.
///
/// # Example
///
/// ```rust,ignore
/// use nvgpu_collector::{Collector, Metrics, MetricDesc, Result};
///
/// #[derive(Debug)]
/// struct MyCollector { descs: Vec<MetricDesc> }
///
/// impl Collector for MyCollector {
///     fn id(&self) -> &'static str {
///         "my_collector"
///     }
///
///     fn descriptors(&self) -> &[MetricDesc] {
///         &self.descs
///     }
///
///     fn update(&self, metrics: &mut Metrics) -> Result<()> {
///         metrics.gauge(&self.descs[0], 42.0, &["0"])
///     }
/// }
/// ```
pub trait Collector: Send + Sync + std::fmt::Debug {
    /// Returns the unique identifier for this collector.
    fn id(&self) -> &'static str;

    /// Returns the descriptor of every family this collector may emit.
    fn descriptors(&self) -> &[MetricDesc];

    /// Runs one poll and appends its observations to `metrics`.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure of the poll. On error nothing is
    /// appended.
    fn update(&self, metrics: &mut Metrics) -> Result<()>;

    /// Returns a human-readable name for this collector.
    fn display_name(&self) -> &'static str {
        self.id()
    }
}

/// A boxed collector for dynamic dispatch.
pub type BoxedCollector = Box<dyn Collector>;

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_desc() -> MetricDesc {
        MetricDesc::new("node", Family::Temp)
    }

    #[test]
    fn test_metrics_new() {
        let m = Metrics::new();

        assert!(m.is_empty());
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn test_gauge_records_labels() {
        let mut m = Metrics::new();
        m.gauge(&temp_desc(), 65.0, &["0", "GPU"]).unwrap();

        let obs = m.iter().next().unwrap();
        assert_eq!(obs.fq_name, "node_nvgpu_temp");
        assert_eq!(obs.value, 65.0);
        assert_eq!(obs.label("index"), Some("0"));
        assert_eq!(obs.label("type"), Some("GPU"));
        assert_eq!(obs.label("fan"), None);
    }

    #[test]
    fn test_gauge_rejects_wrong_label_count() {
        let mut m = Metrics::new();
        let err = m.gauge(&temp_desc(), 1.0, &["0"]).unwrap_err();

        assert!(matches!(err, CollectorError::LabelCardinality { expected: 2, actual: 1, .. }));
        assert!(m.is_empty());
    }

    #[test]
    fn test_of_family_preserves_order() {
        let mut m = Metrics::new();
        let total = MetricDesc::new("node", Family::MemTotal);
        m.gauge(&temp_desc(), 1.0, &["0", "GPU"]).unwrap();
        m.gauge(&total, 2.0, &["0"]).unwrap();
        m.gauge(&temp_desc(), 3.0, &["1", "GPU"]).unwrap();

        let temps: Vec<f64> = m.of_family(Family::Temp).map(|o| o.value).collect();
        assert_eq!(temps, vec![1.0, 3.0]);
        assert_eq!(m.of_family(Family::MemTotal).count(), 1);
    }

    #[test]
    fn test_append_moves_observations() {
        let mut a = Metrics::new();
        let mut b = Metrics::new();
        b.gauge(&temp_desc(), 1.0, &["0", "GPU"]).unwrap();

        a.append(&mut b);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[derive(Debug)]
    struct TestCollector {
        descs: Vec<MetricDesc>,
    }

    impl Collector for TestCollector {
        fn id(&self) -> &'static str {
            "test"
        }

        fn descriptors(&self) -> &[MetricDesc] {
            &self.descs
        }

        fn update(&self, metrics: &mut Metrics) -> Result<()> {
            metrics.gauge(&self.descs[0], 42.0, &["0"])
        }
    }

    #[test]
    fn test_collector_trait() {
        let collector = TestCollector { descs: vec![MetricDesc::new("node", Family::PowerUsage)] };
        let mut m = Metrics::new();

        assert_eq!(collector.id(), "test");
        assert_eq!(collector.display_name(), "test");
        collector.update(&mut m).unwrap();
        assert_eq!(m.of_family(Family::PowerUsage).next().map(|o| o.value), Some(42.0));
    }

    #[test]
    fn test_boxed_collector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Collector>();
    }
}
