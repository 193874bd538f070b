//! Collector registry owned by the host.
//!
//! Collectors do not register themselves. The host creates a
//! [`CollectorRegistry`], calls each collector's `register` function, and
//! builds the collectors it wants from its resolved [`Config`].

use crate::config::Config;
use crate::error::{CollectorError, Result};
use crate::types::BoxedCollector;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Builds a collector from the resolved configuration.
pub type CollectorFactory = Box<dyn Fn(&Config) -> Result<BoxedCollector> + Send + Sync>;

struct Registration {
    default_enabled: bool,
    factory: CollectorFactory,
}

/// Named collector factories with their enable-by-default policy.
#[derive(Default)]
pub struct CollectorRegistry {
    entries: BTreeMap<&'static str, Registration>,
}

impl CollectorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: &'static str, default_enabled: bool, factory: F)
    where
        F: Fn(&Config) -> Result<BoxedCollector> + Send + Sync + 'static,
    {
        debug!(collector = name, default_enabled, "collector registered");
        self.entries.insert(name, Registration { default_enabled, factory: Box::new(factory) });
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Whether `name` is enabled when the host does not say otherwise.
    #[must_use]
    pub fn is_default_enabled(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|r| r.default_enabled)
    }

    /// Builds the collector registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::UnknownCollector`] for unregistered names, or
    /// whatever the factory returns.
    pub fn build(&self, name: &str, config: &Config) -> Result<BoxedCollector> {
        let entry = self.entries.get(name).ok_or_else(|| CollectorError::UnknownCollector(name.to_string()))?;
        (entry.factory)(config)
    }

    /// Builds every collector that is enabled, in name order.
    ///
    /// `overrides` maps a collector name to an explicit enable switch; names
    /// without an override use their default.
    ///
    /// # Errors
    ///
    /// Returns an error for an override naming an unregistered collector, or
    /// the first factory failure.
    pub fn build_enabled(&self, config: &Config, overrides: &HashMap<String, bool>) -> Result<Vec<BoxedCollector>> {
        if let Some(unknown) = overrides.keys().find(|name| !self.entries.contains_key(name.as_str())) {
            return Err(CollectorError::UnknownCollector(unknown.clone()));
        }

        let mut collectors = Vec::new();
        for (name, entry) in &self.entries {
            let enabled = overrides.get(*name).copied().unwrap_or(entry.default_enabled);
            if enabled {
                collectors.push((entry.factory)(config)?);
            }
        }
        Ok(collectors)
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(name, r)| (name, r.default_enabled))).finish()
    }
}
