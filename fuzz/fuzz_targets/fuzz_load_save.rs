#![no_main]

use jtree_model::{SaveOptions, TreeDocument};
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

fuzz_target!(|data: &[u8]| {
    let mut doc = TreeDocument::new();
    if doc.load(data).is_err() {
        assert!(doc.is_empty(), "failed load left a tree behind");
        assert!(doc.error().is_some(), "failed load retained no error");
        return;
    }

    let options = SaveOptions::new().with_field("version", json!(1));
    let map = doc.save(&options).expect("loaded document saves");
    // A nested `_blob_` would be substituted again on reload.
    if map.get("_blob_").is_some_and(|blob| blob.as_object().is_some_and(|b| !b.is_empty())) {
        return;
    }
    let bytes = serde_json::to_vec(&Value::Object(map)).expect("saved map serializes");

    // A document that loaded once must reload to the same shape.
    let mut again = TreeDocument::new();
    again.load(&bytes).expect("saved document reloads");
    assert_eq!(again.total_count(), doc.total_count(), "node count drifted");
    assert_eq!(again.column_count(), doc.column_count(), "schema drifted");
});
