use async_trait::async_trait;
use engine_config::{ConfigSource, FieldKind, FieldSpec, TaskShape, TaskSource};
use engine_core::{
    error::PluginError,
    plugin::{FilterControl, FilterPlugin, PageOutput},
};
use model::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct RenameTask {
    #[serde(default)]
    columns: BTreeMap<String, String>,
}

impl TaskShape for RenameTask {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::optional("columns", FieldKind::Object)];
}

/// Renames columns. Types and order are kept, so pages pass through as is.
pub struct RenameFilterPlugin;

#[async_trait]
impl FilterPlugin for RenameFilterPlugin {
    async fn transaction(
        &self,
        config: &ConfigSource,
        input_schema: &Schema,
        control: &mut dyn FilterControl,
    ) -> Result<(), PluginError> {
        let task: RenameTask = config.load_config()?;
        for old in task.columns.keys() {
            if input_schema.lookup(old).is_none() {
                warn!(column = %old, "Column to rename not found in input schema");
            }
        }

        let output_schema = input_schema.rename(|name| task.columns.get(name).cloned())?;
        info!(renamed = task.columns.len(), "Renaming columns");
        control.run(TaskSource::dump(&task)?, output_schema).await
    }

    fn open<'a>(
        &self,
        _task: &TaskSource,
        _input_schema: &Schema,
        _output_schema: &Schema,
        output: Box<dyn PageOutput + 'a>,
    ) -> Result<Box<dyn PageOutput + 'a>, PluginError> {
        Ok(output)
    }
}
