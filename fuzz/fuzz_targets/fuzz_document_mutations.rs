#![no_main]

use arbitrary::Arbitrary;
use jtree_model::{ModelIndex, TreeDocument};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { row: u8, count: u8 },
    Remove { row: u8, count: u8 },
    Descend { row: u8 },
    Ascend,
    Fetch,
    SetValue { row: u8, column: u8, value: i16 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut doc = TreeDocument::new();
    doc.load_value(json!({
        "version": 1,
        "_headers_": "Name:name:0,Value:value:1",
        "_children_": [{"name": "a"}, {"name": "b", "_children_": [{"name": "b1"}]}]
    }))
    .expect("seed document loads");

    let mut parent: Option<ModelIndex> = doc.index(0, 0, None);
    for op in ops.into_iter().take(256) {
        match op {
            Op::Insert { row, count } => {
                doc.insert_rows(row as usize, (count % 8) as usize, parent);
            }
            Op::Remove { row, count } => {
                doc.remove_rows(row as usize, (count % 8) as usize, parent);
            }
            Op::Descend { row } => {
                if let Some(child) = doc.index(row as usize, 0, parent) {
                    parent = Some(child);
                }
            }
            Op::Ascend => {
                if let Some(current) = parent {
                    parent = doc.parent(current).or(Some(current));
                }
            }
            Op::Fetch => doc.fetch_more(parent),
            Op::SetValue { row, column, value } => {
                if let Some(cell) = doc.index(row as usize, (column % 2) as usize, parent) {
                    doc.set_value(cell, json!(value));
                }
            }
        }
        doc.take_events();

        // Post-conditions: the aggregate count stays exact.
        let top = doc.top_level().expect("top-level node survives");
        assert_eq!(
            doc.total_count(),
            1 + doc.arena().subtree_size(top),
            "aggregate count drifted"
        );
        if let Some(current) = parent {
            let node = doc.node(current.node()).expect("current parent is live");
            assert!(node.fetched_count() <= node.child_count(), "fetched overshoot");
        }
    }
});
