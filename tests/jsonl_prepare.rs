//! Prepare tests for the JSON builder: schema widening across files and
//! null handling through the Parquet roundtrip.

mod common;

use std::fs;

use granary::builder::packaged::{load_dataset, JsonBuilder, LoadOptions};
use granary::builder::download_and_prepare;
use granary::config::BuilderConfig;
use granary::splits::Split;
use granary::table::{DataType, Value};

use common::sandboxed_options;

#[test]
fn schema_widens_across_split_files() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    fs::create_dir(&data).expect("mkdir");

    // 'count' is integer in train but fractional in validation: the shared
    // schema must widen to float for both shards.
    fs::write(
        data.join("train.jsonl"),
        "{\"id\": 1, \"count\": 2}\n{\"id\": 2, \"count\": 3}\n",
    )
    .expect("write");
    fs::write(
        data.join("validation.jsonl"),
        "{\"id\": 3, \"count\": 4.5, \"note\": \"x\"}\n",
    )
    .expect("write");

    let builder = JsonBuilder::new(BuilderConfig {
        data_dir: Some(data),
        ..BuilderConfig::default()
    });
    let prepared =
        download_and_prepare(&builder, &sandboxed_options(root.path())).expect("prepare");

    let features = prepared.info.features.as_ref().expect("features");
    assert_eq!(features.field("count").unwrap().data_type, DataType::Float64);
    assert_eq!(features.field("note").unwrap().data_type, DataType::Utf8);

    let train = prepared.load_split(&Split::train()).expect("train");
    assert_eq!(train.len(), 2);
    // Integer counts were widened on write.
    assert_eq!(train.get(0).unwrap().get("count"), Some(&Value::Float(2.0)));
    // 'note' never appears in train rows: nulls fill the column.
    assert_eq!(train.get(0).unwrap().get("note"), Some(&Value::Null));

    let validation = prepared.load_split(&Split::validation()).expect("validation");
    assert_eq!(
        validation.get(0).unwrap().get("note"),
        Some(&Value::Str("x".to_string()))
    );
}

#[test]
fn load_dataset_is_a_one_call_roundtrip() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    fs::create_dir(&data).expect("mkdir");
    fs::write(
        data.join("train.jsonl"),
        "{\"word\": \"hi\", \"n\": 1}\n{\"word\": \"lo\", \"n\": 2}\n",
    )
    .expect("write");

    let splits = load_dataset(
        data.to_str().unwrap(),
        LoadOptions {
            prepare: sandboxed_options(root.path()),
            ..LoadOptions::default()
        },
    )
    .expect("load");

    assert_eq!(splits.len(), 1);
    let train = &splits[&Split::train()];
    assert_eq!(train.len(), 2);
    assert_eq!(
        train.get(1).unwrap().get("word"),
        Some(&Value::Str("lo".to_string()))
    );
}

#[test]
fn json_array_files_prepare_like_jsonl() {
    let root = tempfile::tempdir().expect("tempdir");
    let data = root.path().join("data");
    fs::create_dir(&data).expect("mkdir");
    fs::write(data.join("test.json"), "[{\"a\": true}, {\"a\": false}]").expect("write");

    let builder = JsonBuilder::new(BuilderConfig {
        data_dir: Some(data),
        ..BuilderConfig::default()
    });
    let prepared =
        download_and_prepare(&builder, &sandboxed_options(root.path())).expect("prepare");

    assert_eq!(prepared.info.splits["test"].num_examples, 2);
    let test = prepared.load_split(&Split::test()).expect("test");
    assert_eq!(test.get(0).unwrap().get("a"), Some(&Value::Bool(true)));
}
