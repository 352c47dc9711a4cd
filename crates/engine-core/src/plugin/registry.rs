use crate::{
    error::PluginError,
    plugin::{
        DecoderPlugin, EncoderPlugin, FileInputPlugin, FileOutputPlugin, FilterPlugin,
        FormatterPlugin, InputPlugin, OutputPlugin, ParserPlugin,
    },
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Name to plugin maps, one per plugin kind. Populated by the driver before
/// a transfer starts and read-only afterwards.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    inputs: HashMap<String, Arc<dyn InputPlugin>>,
    file_inputs: HashMap<String, Arc<dyn FileInputPlugin>>,
    decoders: HashMap<String, Arc<dyn DecoderPlugin>>,
    parsers: HashMap<String, Arc<dyn ParserPlugin>>,
    filters: HashMap<String, Arc<dyn FilterPlugin>>,
    outputs: HashMap<String, Arc<dyn OutputPlugin>>,
    file_outputs: HashMap<String, Arc<dyn FileOutputPlugin>>,
    encoders: HashMap<String, Arc<dyn EncoderPlugin>>,
    formatters: HashMap<String, Arc<dyn FormatterPlugin>>,
}

macro_rules! plugin_kind {
    ($register:ident, $lookup:ident, $field:ident, $trait:ident, $kind:literal) => {
        pub fn $register(&mut self, name: impl Into<String>, plugin: Arc<dyn $trait>) -> &mut Self {
            let name = name.into();
            debug!(kind = $kind, name = %name, "Registered plugin");
            self.$field.insert(name, plugin);
            self
        }

        pub fn $lookup(&self, name: &str) -> Result<Arc<dyn $trait>, PluginError> {
            self.$field
                .get(name)
                .cloned()
                .ok_or_else(|| PluginError::UnknownPlugin {
                    kind: $kind,
                    name: name.to_string(),
                })
        }
    };
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    plugin_kind!(register_input, input, inputs, InputPlugin, "input");
    plugin_kind!(register_file_input, file_input, file_inputs, FileInputPlugin, "file input");
    plugin_kind!(register_decoder, decoder, decoders, DecoderPlugin, "decoder");
    plugin_kind!(register_parser, parser, parsers, ParserPlugin, "parser");
    plugin_kind!(register_filter, filter, filters, FilterPlugin, "filter");
    plugin_kind!(register_output, output, outputs, OutputPlugin, "output");
    plugin_kind!(register_file_output, file_output, file_outputs, FileOutputPlugin, "file output");
    plugin_kind!(register_encoder, encoder, encoders, EncoderPlugin, "encoder");
    plugin_kind!(register_formatter, formatter, formatters, FormatterPlugin, "formatter");

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }
}
