//! Config hash stability.
//!
//! GREEN when:
//! - the same layers hash identically across calls
//! - key order inside a document does not change the hash
//! - different values produce different hashes
//! - overlays take effect and the merged hash is stable

use sew_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
database:
  url_env: "SEW_DATABASE_URL"
  max_connections: 10
journal:
  enabled: false
  path: "var/journal/transitions.jsonl"
  hash_chain: true
log:
  filter: "info"
"#;

const BASE_YAML_REORDERED: &str = r#"
log:
  filter: "info"
journal:
  hash_chain: true
  path: "var/journal/transitions.jsonl"
  enabled: false
database:
  max_connections: 10
  url_env: "SEW_DATABASE_URL"
"#;

const OVERLAY_YAML: &str = r#"
journal:
  enabled: true
database:
  max_connections: 4
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "log:\n  filter: debug\n"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let enabled = a
        .config_json
        .pointer("/journal/enabled")
        .and_then(|v| v.as_bool())
        .unwrap();
    assert!(enabled, "overlay should enable the journal");

    let pool = a
        .config_json
        .pointer("/database/max_connections")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(pool, 4);

    // untouched sibling survives the merge
    assert_eq!(
        a.config_json.pointer("/journal/path").and_then(|v| v.as_str()),
        Some("var/journal/transitions.jsonl")
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
