use crate::{
    error::{ConfigError, ConfigValidationError},
    task::{FieldKind, TaskShape, kind_of},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{fmt, marker::PhantomData};
use tracing::debug;

/// Marker for user-supplied configuration.
#[derive(Debug)]
pub enum Config {}

/// Marker for frozen per-plugin task configuration.
#[derive(Debug)]
pub enum Task {}

/// Marker for diffs and per-task commit reports.
#[derive(Debug)]
pub enum Diff {}

pub type ConfigSource = DataSource<Config>;
pub type TaskSource = DataSource<Task>;
pub type ConfigDiff = DataSource<Diff>;
pub type TaskReport = DataSource<Diff>;

/// Ordered key/value tree shared by config, task, diff and report values.
///
/// Every operation returns a new value; nothing mutates in place once a tree
/// has been handed to another stage.
pub struct DataSource<K> {
    tree: Map<String, Value>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> DataSource<K> {
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    pub fn from_map(tree: Map<String, Value>) -> Self {
        DataSource {
            tree,
            _kind: PhantomData,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(tree) => Ok(Self::from_map(tree)),
            Value::Null => Ok(Self::new()),
            other => Err(ConfigError::TypeMismatch {
                key: "<root>".to_string(),
                expected: "object".to_string(),
                found: kind_of(&other).to_string(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tree.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tree.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.tree.clone())
    }

    /// Reads `key` as `T`. Absent or null keys give `None`; values that
    /// cannot be coerced to `T` give a type mismatch.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.tree.get(key) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        if let Ok(v) = serde_json::from_value::<T>(value.clone()) {
            return Ok(Some(v));
        }

        coercions(value)
            .into_iter()
            .find_map(|candidate| serde_json::from_value::<T>(candidate).ok())
            .map(Some)
            .ok_or_else(|| ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: short_type_name::<T>().to_string(),
                found: kind_of(value).to_string(),
            })
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.get(key)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tree.insert(key.into(), value.into());
        self
    }

    pub fn set_nested<O>(self, key: impl Into<String>, nested: DataSource<O>) -> Self {
        self.set(key, Value::Object(nested.tree))
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.tree.shift_remove(key);
        self
    }

    /// The object stored at `key`, if present.
    pub fn nested(&self, key: &str) -> Result<Option<Self>, ConfigError> {
        match self.tree.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Self::from_map(map.clone()))),
            Some(_) => Err(ConfigError::NotAnObject(key.to_string())),
        }
    }

    pub fn nested_or_empty(&self, key: &str) -> Result<Self, ConfigError> {
        Ok(self.nested(key)?.unwrap_or_default())
    }

    /// The array of objects stored at `key`; absent keys give an empty list.
    pub fn nested_list(&self, key: &str) -> Result<Vec<Self>, ConfigError> {
        match self.tree.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(Self::from_map(map.clone())),
                    _ => Err(ConfigError::NotAnObject(format!("{key}[{i}]"))),
                })
                .collect(),
            Some(other) => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "array".to_string(),
                found: kind_of(other).to_string(),
            }),
        }
    }

    /// Deep, right-biased merge: keys of `other` overwrite or extend this
    /// tree, nested objects merge recursively and arrays are replaced.
    pub fn merge<O>(&self, other: &DataSource<O>) -> Self {
        let mut tree = self.tree.clone();
        merge_into(&mut tree, &other.tree);
        Self::from_map(tree)
    }

    /// Validates every declared field of `T`, then deserializes the coerced
    /// tree. All violations are reported together.
    pub fn load_config<T: TaskShape>(&self) -> Result<T, ConfigError> {
        let mut tree = self.tree.clone();
        let mut violations = Vec::new();

        for field in T::FIELDS {
            match self.tree.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => match field.kind.coerce(value) {
                    Some(coerced) => {
                        if let Some(Err(reason)) = field.check.map(|check| check(&coerced)) {
                            violations.push(format!("field '{}': {reason}", field.name));
                        }
                        tree.insert(field.name.to_string(), coerced);
                    }
                    None => violations.push(format!(
                        "field '{}' must be {}, found {}",
                        field.name,
                        article(field.kind),
                        kind_of(value)
                    )),
                },
            }
        }

        if !violations.is_empty() {
            debug!(violations = violations.len(), "Config validation failed");
            return Err(ConfigValidationError { violations }.into());
        }

        serde_json::from_value(Value::Object(tree)).map_err(|e| {
            ConfigValidationError {
                violations: vec![e.to_string()],
            }
            .into()
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.tree)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }
}

impl TaskSource {
    /// Freezes a task struct into a task source.
    pub fn dump<T: Serialize>(task: &T) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::to_value(task)?)
    }

    pub fn load_task<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl ConfigDiff {
    /// Folds per-task diffs given in partition order. On conflicting keys the
    /// lowest partition index wins.
    ///
    /// A helper for plugins whose transaction builds one diff per task. The
    /// engine never calls it and the built-in plugins derive their diffs
    /// from counters instead.
    pub fn merge_all<'a, I>(diffs: I) -> ConfigDiff
    where
        I: IntoIterator<Item = &'a ConfigDiff>,
        I::IntoIter: DoubleEndedIterator,
    {
        diffs
            .into_iter()
            .rev()
            .fold(ConfigDiff::new(), |acc, diff| acc.merge(diff))
    }
}

fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn coercions(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            let mut out = Vec::new();
            if let Ok(n) = s.parse::<i64>() {
                out.push(Value::from(n));
            }
            if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                out.push(Value::Number(n));
            }
            match s {
                "true" => out.push(Value::Bool(true)),
                "false" => out.push(Value::Bool(false)),
                _ => {}
            }
            out
        }
        Value::Number(n) => vec![Value::String(n.to_string())],
        Value::Bool(b) => vec![Value::String(b.to_string())],
        _ => Vec::new(),
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn article(kind: FieldKind) -> String {
    match kind {
        FieldKind::Object | FieldKind::Array | FieldKind::Any => format!("an {kind}"),
        _ => format!("a {kind}"),
    }
}

impl<K> Default for DataSource<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for DataSource<K> {
    fn clone(&self) -> Self {
        Self::from_map(self.tree.clone())
    }
}

impl<K> PartialEq for DataSource<K> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K> fmt::Debug for DataSource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.tree, f)
    }
}

impl<K> fmt::Display for DataSource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.tree).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl<K> From<Map<String, Value>> for DataSource<K> {
    fn from(tree: Map<String, Value>) -> Self {
        Self::from_map(tree)
    }
}

impl<K> From<DataSource<K>> for Value {
    fn from(source: DataSource<K>) -> Self {
        Value::Object(source.tree)
    }
}

impl<K> Serialize for DataSource<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tree.serialize(serializer)
    }
}

impl<'de, K> Deserialize<'de> for DataSource<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Map<String, Value>>::deserialize(deserializer)
            .map(|tree| Self::from_map(tree.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FieldSpec;
    use serde_json::json;

    fn source(v: Value) -> ConfigSource {
        ConfigSource::from_value(v).unwrap()
    }

    fn diff(v: Value) -> ConfigDiff {
        ConfigDiff::from_value(v).unwrap()
    }

    #[test]
    fn get_coerces_scalars() {
        let cfg = source(json!({"threads": "4", "flag": "true", "name": 12, "ratio": 1}));

        assert_eq!(cfg.get::<i64>("threads").unwrap(), Some(4));
        assert_eq!(cfg.get::<bool>("flag").unwrap(), Some(true));
        assert_eq!(cfg.get::<String>("name").unwrap(), Some("12".to_string()));
        assert_eq!(cfg.get::<f64>("ratio").unwrap(), Some(1.0));
        assert_eq!(cfg.get::<i64>("absent").unwrap(), None);
        assert_eq!(cfg.get_or("absent", 7i64).unwrap(), 7);
    }

    #[test]
    fn get_reports_type_mismatch() {
        let cfg = source(json!({"threads": "many"}));
        let err = cfg.get::<i64>("threads").unwrap_err();
        match err {
            ConfigError::TypeMismatch {
                key,
                expected,
                found,
            } => {
                assert_eq!(key, "threads");
                assert_eq!(expected, "i64");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn set_returns_a_new_tree() {
        let base = source(json!({"a": 1}));
        let updated = base.clone().set("b", 2);
        assert!(!base.contains_key("b"));
        assert_eq!(updated.get::<i64>("b").unwrap(), Some(2));
    }

    #[test]
    fn merge_is_deep_and_right_biased() {
        let cfg = source(json!({
            "in": {"type": "file", "last_path": "a.txt", "tags": [1, 2]},
            "out": {"type": "file"}
        }));
        let d = diff(json!({
            "in": {"last_path": "b.txt", "tags": [3]},
            "extra": true
        }));

        let merged = cfg.merge(&d);
        assert_eq!(
            merged.to_value(),
            json!({
                "in": {"type": "file", "last_path": "b.txt", "tags": [3]},
                "out": {"type": "file"},
                "extra": true
            })
        );
    }

    #[test]
    fn merge_is_associative() {
        let a = source(json!({"x": {"p": 1, "q": [1]}, "y": 1}));
        let b = diff(json!({"x": {"q": [2], "r": 2}}));
        let c = diff(json!({"x": {"p": 3}, "z": {"k": "v"}}));

        let left = a.merge(&b).merge(&c);
        let right = a.merge(&b.merge(&c));
        assert_eq!(left, right);
    }

    #[test]
    fn merge_all_prefers_lowest_partition() {
        let reports = vec![
            diff(json!({"last_path": "p0", "only0": 1})),
            diff(json!({"last_path": "p1", "only1": 1})),
            diff(json!({"last_path": "p2"})),
        ];
        let merged = ConfigDiff::merge_all(&reports);
        assert_eq!(merged.get::<String>("last_path").unwrap().as_deref(), Some("p0"));
        assert!(merged.contains_key("only0"));
        assert!(merged.contains_key("only1"));
    }

    #[derive(Debug, serde::Deserialize)]
    struct SampleTask {
        path_prefix: String,
        #[serde(default)]
        max_files: Option<i64>,
        #[allow(dead_code)]
        delimiter: String,
    }

    impl TaskShape for SampleTask {
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::required("path_prefix", FieldKind::String),
            FieldSpec::optional("max_files", FieldKind::Long),
            FieldSpec::required("delimiter", FieldKind::String),
        ];
    }

    #[test]
    fn load_config_lists_every_violation() {
        let cfg = source(json!({"max_files": "lots"}));
        let err = cfg.load_config::<SampleTask>().unwrap_err();
        let ConfigError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.violations.len(), 3);
        assert!(validation.violations[0].contains("path_prefix"));
        assert!(validation.violations[1].contains("max_files"));
        assert!(validation.violations[2].contains("delimiter"));
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Append,
        Replace,
    }

    #[derive(Debug, serde::Deserialize)]
    struct Target {
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        width: i64,
    }

    #[derive(Debug, serde::Deserialize)]
    struct TypedTask {
        #[allow(dead_code)]
        table: String,
        mode: Mode,
        targets: Vec<Target>,
    }

    impl TaskShape for TypedTask {
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::required("table", FieldKind::String),
            FieldSpec::required("mode", FieldKind::String).typed::<Mode>(),
            FieldSpec::required("targets", FieldKind::Array).typed::<Vec<Target>>(),
        ];
    }

    #[test]
    fn load_config_checks_enums_and_nested_fields() {
        let cfg = source(json!({
            "mode": "upsert",
            "targets": [{"name": "a", "width": "wide"}],
        }));
        let err = cfg.load_config::<TypedTask>().unwrap_err();
        let ConfigError::Validation(validation) = err else {
            panic!("expected validation error, got {err}");
        };
        let violations = validation.violations;
        assert_eq!(violations.len(), 3, "{violations:?}");
        assert!(violations[0].contains("table"));
        assert!(violations[1].starts_with("field 'mode'"));
        assert!(violations[1].contains("upsert"));
        assert!(violations[2].starts_with("field 'targets'"));

        let task = source(json!({
            "table": "t",
            "mode": "replace",
            "targets": [{"name": "a", "width": 3}],
        }))
        .load_config::<TypedTask>()
        .unwrap();
        assert!(matches!(task.mode, Mode::Replace));
        assert_eq!(task.targets.len(), 1);
    }

    #[test]
    fn load_config_wraps_undeclared_shape_errors() {
        #[derive(Debug, serde::Deserialize)]
        struct Loose {
            #[allow(dead_code)]
            limit: u8,
        }
        impl TaskShape for Loose {
            const FIELDS: &'static [FieldSpec] = &[FieldSpec::required("limit", FieldKind::Long)];
        }
        let err = source(json!({"limit": 4096})).load_config::<Loose>().unwrap_err();
        let ConfigError::Validation(validation) = err else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(validation.violations.len(), 1);
        assert!(validation.violations[0].contains("4096"));
    }

    #[test]
    fn load_config_coerces_before_deserializing() {
        let cfg = source(json!({"path_prefix": 5, "max_files": "3", "delimiter": ","}));
        let task = cfg.load_config::<SampleTask>().unwrap();
        assert_eq!(task.path_prefix, "5");
        assert_eq!(task.max_files, Some(3));
    }

    #[test]
    fn task_source_round_trips_a_task() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Frozen {
            files: Vec<String>,
        }
        let task = Frozen {
            files: vec!["a".into(), "b".into()],
        };
        let source = TaskSource::dump(&task).unwrap();
        assert_eq!(source.load_task::<Frozen>().unwrap(), task);
    }

    #[test]
    fn nested_rejects_scalars() {
        let cfg = source(json!({"parser": "ltsv", "exec": {"max_threads": 2}}));
        assert!(matches!(cfg.nested("parser"), Err(ConfigError::NotAnObject(_))));
        assert_eq!(
            cfg.nested_or_empty("exec").unwrap().get::<i64>("max_threads").unwrap(),
            Some(2)
        );
        assert!(cfg.nested_or_empty("missing").unwrap().is_empty());
    }
}
