use std::collections::HashSet;

use pandawiki_import_core::contract::{DocNode, DocValue, ParseResponse};
use pandawiki_import_core::flatten::{flatten_parse_result, ItemOverrides};
use pandawiki_import_core::{DisplayText, ItemStatus};

fn node(id: &str, title: &str, file: bool, children: Vec<DocNode>) -> DocNode {
    DocNode {
        value: DocValue {
            id: id.to_string(),
            title: title.to_string(),
            summary: format!("summary of {title}"),
            file,
            file_type: if file { "md".to_string() } else { String::new() },
        },
        children,
    }
}

fn response(root: DocNode) -> ParseResponse {
    ParseResponse {
        id: "platform-1".to_string(),
        docs: Some(root),
    }
}

#[test]
fn test_id_less_node_is_elided_and_children_attach_to_its_parent() {
    // root -> [A(id=1), B(id='') -> [C(id=3)]]
    let tree = node(
        "",
        "root",
        false,
        vec![
            node("1", "A", true, vec![]),
            node("", "B", false, vec![node("3", "C", true, vec![])]),
        ],
    );

    let items = flatten_parse_result(&response(tree), None, &ItemOverrides::default());

    let flat: Vec<_> = items
        .iter()
        .map(|i| (i.id.as_str(), i.parent_id.as_deref()))
        .collect();
    assert_eq!(flat, vec![("1", None), ("3", None)]);
}

#[test]
fn test_children_reference_nearest_ancestor_with_an_id() {
    // F1 -> [D1, (no id) -> [F2 -> [D2]]]
    let tree = node(
        "f1",
        "Folder 1",
        false,
        vec![
            node("d1", "Doc 1", true, vec![]),
            node(
                "",
                "anonymous",
                false,
                vec![node("f2", "Folder 2", false, vec![node("d2", "Doc 2", true, vec![])])],
            ),
        ],
    );

    let items = flatten_parse_result(&response(tree), Some("root-node"), &ItemOverrides::default());

    let flat: Vec<_> = items
        .iter()
        .map(|i| (i.id.as_str(), i.parent_id.as_deref()))
        .collect();
    assert_eq!(
        flat,
        vec![
            ("f1", Some("root-node")),
            ("d1", Some("f1")),
            ("f2", Some("f1")),
            ("d2", Some("f2")),
        ],
        "depth-first, parent-first, linked to the nearest real ancestor id"
    );
}

#[test]
fn test_folders_start_open_and_documents_closed() {
    let tree = node("f", "Folder", false, vec![node("d", "Doc", true, vec![])]);
    let items = flatten_parse_result(&response(tree), None, &ItemOverrides::default());

    assert!(items[0].open, "folder should default to open");
    assert!(!items[0].file);
    assert!(!items[1].open, "document should default to closed");
    assert!(items[1].file);
    assert_eq!(items[1].display, DisplayText::Summary("summary of Doc".to_string()));
    assert_eq!(items[1].file_type, "md");
}

#[test]
fn test_overrides_apply_to_every_item_and_uuids_are_fresh() {
    let tree = node(
        "",
        "root",
        false,
        vec![node("a", "A", true, vec![]), node("b", "B", true, vec![])],
    );
    let overrides = ItemOverrides {
        platform_id: Some("crawl-9".to_string()),
        status: Some(ItemStatus::Parsed),
        space_id: Some("space-1".to_string()),
        ..ItemOverrides::default()
    };

    let items = flatten_parse_result(&response(tree), None, &overrides);

    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item.platform_id, "crawl-9");
        assert_eq!(item.status, ItemStatus::Parsed);
        assert_eq!(item.space_id.as_deref(), Some("space-1"));
    }
    let uuids: HashSet<_> = items.iter().map(|i| i.uuid).collect();
    assert_eq!(uuids.len(), 2, "every item gets its own uuid");
}

#[test]
fn test_missing_docs_produce_nothing() {
    let empty = ParseResponse {
        id: "p".to_string(),
        docs: None,
    };
    assert!(flatten_parse_result(&empty, None, &ItemOverrides::default()).is_empty());
}
