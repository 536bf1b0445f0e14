use roster_engine::{DefinitionAdapter, PaginationCursor, SourceAdapter, SourceProfile};
use roster_sources::{SourceLoader, SourceRegistry};
use std::path::PathBuf;

fn definitions_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../source-definitions")
}

#[test]
fn test_shipped_definitions_build_adapters() {
    let loader = SourceLoader::new(definitions_dir()).expect("definitions directory");
    let registry = SourceRegistry::load_from(&loader).expect("load definitions");
    assert!(registry.count() >= 2);

    for definition in registry.get_all() {
        let source_id = definition.id().clone();
        let partition_kind = definition.source.partition_kinds[0];
        let adapter = DefinitionAdapter::new(definition)
            .unwrap_or_else(|e| panic!("{source_id}: {e}"));

        let partition =
            roster_core::Partition::new(partition_kind, "Ab").expect("partition");
        let cursor = PaginationCursor::new(adapter.page_size_hint(), 2, None);
        adapter
            .build_request(&partition, &cursor)
            .unwrap_or_else(|e| panic!("{source_id}: {e}"));
        assert!(!adapter.extraction_chain().is_empty());
    }
}
