use pipecraft_core::{resources, ParameterRecord, PipelineError, ResourceData, ResourceProvider};
use serde_json::json;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn from_json(value: serde_json::Value) -> ResourceData {
    ResourceData::from_value(value).expect("valid resource document")
}

#[test]
fn test_multiple_mode_is_cartesian_product_in_key_order() {
    let data = from_json(json!({
        "ids": ["1", "2"],
        "langs": ["en", "fr", "de"],
    }));

    let records = data.expand().unwrap();

    assert_eq!(records.len(), 6);
    let pairs: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.get("id").unwrap(), r.get("lang").unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("1", "en"),
            ("1", "fr"),
            ("1", "de"),
            ("2", "en"),
            ("2", "fr"),
            ("2", "de"),
        ]
    );
}

#[test]
fn test_keys_lose_only_one_trailing_s() {
    let data = from_json(json!({
        "classes": ["a"],
        "status": ["open"],
        "region": ["eu"],
    }));

    let records = data.expand().unwrap();

    assert_eq!(
        records,
        vec![ParameterRecord::from([
            ("classe", "a"),
            ("statu", "open"),
            ("region", "eu"),
        ])]
    );
}

#[test]
fn test_non_string_values_are_rendered_as_text() {
    let data = from_json(json!({ "pages": [1, 2.5, true, null] }));

    let values: Vec<String> = data
        .expand()
        .unwrap()
        .iter()
        .map(|r| r.get("page").unwrap().to_string())
        .collect();

    assert_eq!(values, vec!["1", "2.5", "true", ""]);
}

#[test]
fn test_empty_list_yields_no_records() {
    let data = from_json(json!({ "ids": ["a", "b"], "langs": [] }));
    assert!(data.expand().unwrap().is_empty());
}

#[test]
fn test_simple_mode_passes_records_through() {
    let data = from_json(json!([
        { "id": "a", "lang": "en" },
        { "id": "b", "extras": 3 },
    ]));

    let records = data.expand().unwrap();

    assert_eq!(
        records,
        vec![
            ParameterRecord::from([("id", "a"), ("lang", "en")]),
            ParameterRecord::from([("id", "b"), ("extras", "3")]),
        ]
    );
}

#[test]
fn test_simple_constructor_keeps_record_order() {
    let data = ResourceData::simple([
        ParameterRecord::from([("id", "z")]),
        ParameterRecord::from([("id", "y")]),
    ]);
    let ids: Vec<String> = data
        .expand()
        .unwrap()
        .iter()
        .map(|r| r.get("id").unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["z", "y"]);
}

#[test]
fn test_validate_rejects_malformed_shapes() {
    let scalar_list = ResourceData::Multiple(
        json!({ "ids": ["a"], "lang": "en" })
            .as_object()
            .cloned()
            .unwrap(),
    );
    assert!(!scalar_list.validate());
    assert!(matches!(
        scalar_list.expand(),
        Err(PipelineError::InvalidResourceData(_))
    ));

    let mixed_records = ResourceData::Simple(vec![json!({ "id": "a" }), json!("b")]);
    assert!(!mixed_records.validate());

    assert!(ResourceData::from_value(json!("just a string")).is_err());
    assert!(ResourceData::from_value(json!(42)).is_err());
}

#[test]
fn test_provider_calls_producer_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = resources(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        ResourceData::multiple([("ids", ["a", "b"])])
    });

    assert!(!provider.is_fetched());
    let first = provider.get_resources().unwrap().clone();
    let second = provider.get_resources().unwrap().clone();

    assert_eq!(first, second);
    assert!(provider.is_fetched());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_data_is_cached_too() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = ResourceProvider::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        ResourceData::Simple(Vec::new())
    });

    provider.get_resources().unwrap();
    provider.get_resources().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invalid_data_is_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = ResourceProvider::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            ResourceData::Simple(vec![json!("not a record")])
        } else {
            ResourceData::simple([ParameterRecord::from([("id", "ok")])])
        }
    });

    assert!(matches!(
        provider.get_resources(),
        Err(PipelineError::InvalidResourceData(_))
    ));
    assert!(!provider.is_fetched());

    let data = provider.get_resources().unwrap();
    assert_eq!(data.expand().unwrap()[0].get("id"), Some("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_provider_from_yaml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resources.yaml");
    fs::write(&path, "regions:\n  - eu\n  - us\nyears:\n  - 2023\n").unwrap();

    let provider = ResourceProvider::from_file(&path);
    let records = provider.get_resources().unwrap().expand().unwrap();

    assert_eq!(
        records,
        vec![
            ParameterRecord::from([("region", "eu"), ("year", "2023")]),
            ParameterRecord::from([("region", "us"), ("year", "2023")]),
        ]
    );
}

#[test]
fn test_provider_from_json_file_in_simple_mode() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resources.json");
    fs::write(&path, r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();

    let provider = ResourceProvider::from_file(&path);
    let data = provider.get_resources().unwrap();

    assert!(matches!(data, ResourceData::Simple(items) if items.len() == 2));
}

#[test]
fn test_provider_from_missing_file_fails() {
    let dir = tempdir().unwrap();
    let provider = ResourceProvider::from_file(dir.path().join("absent.yaml"));

    assert!(matches!(
        provider.get_resources(),
        Err(PipelineError::Configuration(_))
    ));
    assert!(!provider.is_fetched());
}
