//! Registry assembly from configuration.

use job_sources::{JobSource, SourceRegistry};
use std::sync::Arc;

use crate::config::Config;

/// Assemble the registry this process serves from.
///
/// Adapters are handed in by the binary; `DISABLED_SOURCES` is applied once
/// they are all registered.
pub fn build_registry<I>(config: &Config, adapters: I) -> SourceRegistry
where
    I: IntoIterator<Item = Arc<dyn JobSource>>,
{
    let mut registry = SourceRegistry::new(config.registry_config());
    for adapter in adapters {
        let name = adapter.name().to_string();
        if registry.register_arc(adapter).is_some() {
            tracing::warn!(source = %name, "Duplicate source name; later adapter wins");
        }
    }
    apply_disabled_sources(&registry, config);
    registry
}

/// Apply `DISABLED_SOURCES` to a freshly assembled registry.
///
/// Unknown names are logged and skipped so a stale entry never blocks
/// startup.
pub fn apply_disabled_sources(registry: &SourceRegistry, config: &Config) {
    for name in &config.disabled_sources {
        if registry.set_enabled(name, false) {
            tracing::info!(source = %name, "Source disabled by configuration");
        } else {
            tracing::warn!(source = %name, "DISABLED_SOURCES names an unregistered source");
        }
    }
}
