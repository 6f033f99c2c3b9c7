#![no_main]

use jtree_model::HeaderSchema;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(descriptor) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(schema) = HeaderSchema::parse(descriptor) else {
        return;
    };

    // Post-conditions: every column resolves to itself by index, name and tag.
    assert!(!schema.is_empty(), "parsed schema has no columns");
    for column in schema.columns() {
        let by_index = schema.by_index(column.index).expect("column by index");
        assert_eq!(by_index.index, column.index, "index lookup drifted");
        let by_name = schema.by_name(&column.display_name).expect("column by name");
        let by_tag = schema.by_tag(&column.tag).expect("column by tag");
        assert!(std::ptr::eq(by_name, by_index), "name lookup drifted");
        assert!(std::ptr::eq(by_tag, by_index), "tag lookup drifted");
    }
    let mut indexes: Vec<usize> = schema.columns().iter().map(|c| c.index).collect();
    indexes.dedup();
    assert_eq!(indexes.len(), schema.len(), "duplicate column index");
});
