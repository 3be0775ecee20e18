//! Flattening of parse result trees into parent-referencing import items.

use crate::contract::{DocNode, ParseResponse};
use crate::item::{DisplayText, ImportItem, ItemStatus};

/// Fields forced onto every item produced by [`flatten_parse_result`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemOverrides {
    pub platform_id: Option<String>,
    pub status: Option<ItemStatus>,
    pub space_id: Option<String>,
    pub folder_req: Option<bool>,
    pub file_type: Option<String>,
}

impl ItemOverrides {
    fn apply(&self, item: &mut ImportItem) {
        if let Some(platform_id) = &self.platform_id {
            item.platform_id = platform_id.clone();
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(space_id) = &self.space_id {
            item.space_id = Some(space_id.clone());
        }
        if let Some(folder_req) = self.folder_req {
            item.folder_req = Some(folder_req);
        }
        if let Some(file_type) = &self.file_type {
            item.file_type = file_type.clone();
        }
    }
}

/// Turn the `docs` tree of a parse response into a flat, depth-first,
/// parent-first list of items.
///
/// Each produced item gets a fresh `uuid`, and its `parent_id` is the `id` of
/// its nearest ancestor that has one (`parent_id` for top-level nodes).
/// Nodes without an id are skipped, but their children are still emitted and
/// attached to the skipped node's parent. Folders start expanded.
pub fn flatten_parse_result(
    response: &ParseResponse,
    parent_id: Option<&str>,
    overrides: &ItemOverrides,
) -> Vec<ImportItem> {
    let mut items = Vec::new();
    if let Some(root) = &response.docs {
        flatten_node(root, parent_id, overrides, &mut items);
    }
    items
}

fn flatten_node(
    node: &DocNode,
    parent_id: Option<&str>,
    overrides: &ItemOverrides,
    out: &mut Vec<ImportItem>,
) {
    let value = &node.value;

    let children_parent = if value.id.is_empty() {
        parent_id
    } else {
        let mut item = ImportItem::new(value.title.clone());
        item.id = value.id.clone();
        item.parent_id = parent_id.map(str::to_string);
        item.display = DisplayText::Summary(value.summary.clone());
        item.file = value.file;
        item.file_type = value.file_type.clone();
        item.open = !value.file;
        overrides.apply(&mut item);
        out.push(item);
        Some(value.id.as_str())
    };

    for child in &node.children {
        flatten_node(child, children_parent, overrides, out);
    }
}
