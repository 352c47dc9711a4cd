use engine_config::{ConfigError, ConfigSource};
use engine_core::{
    error::PluginError,
    plugin::{FilterPlugin, InputPlugin, OutputPlugin, PluginRegistry},
};
use engine_processing::{FileInputRunner, FileOutputRunner};
use std::sync::Arc;
use tracing::debug;

pub struct FilterStageSpec {
    pub plugin: Arc<dyn FilterPlugin>,
    pub config: ConfigSource,
}

/// The plugins a transfer config names, with their config subtrees.
pub struct TransferPlugins {
    pub input: Arc<dyn InputPlugin>,
    pub input_config: ConfigSource,
    pub filters: Vec<FilterStageSpec>,
    pub output: Arc<dyn OutputPlugin>,
    pub output_config: ConfigSource,
}

impl TransferPlugins {
    /// Resolves `in`, `filters` and `out`. A name registered as a plain
    /// input (output) wins, otherwise the name is looked up as a file input
    /// (file output) and composed with its decoders and parser (encoders and
    /// formatter).
    pub fn resolve(registry: &PluginRegistry, config: &ConfigSource) -> Result<Self, PluginError> {
        let input_config = section(config, "in")?;
        let output_config = section(config, "out")?;

        let filters = config
            .nested_list("filters")?
            .into_iter()
            .map(|config| {
                let plugin = registry.filter(&config.require::<String>("type")?)?;
                Ok(FilterStageSpec { plugin, config })
            })
            .collect::<Result<Vec<_>, PluginError>>()?;

        Ok(TransferPlugins {
            input: create_input(registry, &input_config)?,
            input_config,
            filters,
            output: create_output(registry, &output_config)?,
            output_config,
        })
    }
}

fn section(config: &ConfigSource, key: &str) -> Result<ConfigSource, ConfigError> {
    config
        .nested(key)?
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn create_input(
    registry: &PluginRegistry,
    config: &ConfigSource,
) -> Result<Arc<dyn InputPlugin>, PluginError> {
    let name = config.require::<String>("type")?;
    if registry.has_input(&name) {
        return registry.input(&name);
    }
    debug!(name = %name, "Composing file input");
    Ok(Arc::new(FileInputRunner::resolve(registry, config)?))
}

fn create_output(
    registry: &PluginRegistry,
    config: &ConfigSource,
) -> Result<Arc<dyn OutputPlugin>, PluginError> {
    let name = config.require::<String>("type")?;
    if registry.has_output(&name) {
        return registry.output(&name);
    }
    debug!(name = %name, "Composing file output");
    Ok(Arc::new(FileOutputRunner::resolve(registry, config)?))
}
