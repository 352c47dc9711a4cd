use engine_config::ConfigSource;
use model::core::identifiers::RunId;

/// Deterministic id of a transfer: the same config always maps to the same
/// run, so a resume can tell whether it continues the run it claims to.
pub fn run_id_for(config: &ConfigSource) -> RunId {
    let hash = blake3::hash(config.to_value().to_string().as_bytes()).to_hex();
    RunId::from(format!("run-{}", &hash[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_id_is_stable_per_config() {
        let a = ConfigSource::from_value(json!({"in": {"type": "file"}})).unwrap();
        let b = ConfigSource::from_value(json!({"in": {"type": "other"}})).unwrap();

        assert_eq!(run_id_for(&a), run_id_for(&a.clone()));
        assert_ne!(run_id_for(&a), run_id_for(&b));
        assert!(run_id_for(&a).as_str().starts_with("run-"));
        assert_eq!(run_id_for(&a).as_str().len(), 20);
    }
}
