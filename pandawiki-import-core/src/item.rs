use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of an [`ImportItem`] in the import state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Common,
    UploadError,
    Parsing,
    Parsed,
    ParseError,
    Importing,
    Imported,
    ImportError,
}

impl ItemStatus {
    /// Allowed status moves. Error states only leave through an explicit retry.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;

        matches!(
            (self, next),
            (Common, Parsing)
                | (Common, UploadError)
                | (UploadError, Common)
                | (Parsing, Parsed)
                | (Parsing, ParseError)
                | (ParseError, Parsing)
                | (Parsed, Importing)
                | (ImportError, Importing)
                | (Importing, Imported)
                | (Importing, ImportError)
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            ItemStatus::UploadError | ItemStatus::ParseError | ItemStatus::ImportError
        )
    }

    /// Items in these states are picked up by the import stage.
    pub fn is_importable(self) -> bool {
        matches!(self, ItemStatus::Parsed | ItemStatus::ImportError)
    }
}

/// Text shown under an item's title: either a content preview or the error
/// that put the item in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DisplayText {
    Summary(String),
    Error(String),
}

impl DisplayText {
    pub fn as_str(&self) -> &str {
        match self {
            DisplayText::Summary(text) | DisplayText::Error(text) => text,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DisplayText::Error(text) => Some(text),
            DisplayText::Summary(_) => None,
        }
    }
}

impl Default for DisplayText {
    fn default() -> Self {
        DisplayText::Summary(String::new())
    }
}

/// One candidate document or folder of an import session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    /// Session-local identity; never changes while the item lives.
    pub uuid: Uuid,
    /// Remote identifier: storage key after upload, platform doc id after parse.
    pub id: String,
    pub platform_id: String,
    pub task_id: Option<String>,
    /// `id` of the parent item, not its `uuid`.
    pub parent_id: Option<String>,
    pub title: String,
    pub display: DisplayText,
    pub file_type: String,
    /// Leaf document (`true`) or folder (`false`).
    pub file: bool,
    #[serde(skip)]
    pub file_data: Option<Bytes>,
    pub open: bool,
    pub progress: u8,
    pub status: ItemStatus,
    /// `Some(false)` marks a folder that was listed but not requested for import.
    pub folder_req: Option<bool>,
    pub space_id: Option<String>,
}

impl ImportItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: String::new(),
            platform_id: String::new(),
            task_id: None,
            parent_id: None,
            title: title.into(),
            display: DisplayText::default(),
            file_type: String::new(),
            file: true,
            file_data: None,
            open: false,
            progress: 0,
            status: ItemStatus::Common,
            folder_req: None,
            space_id: None,
        }
    }

    /// A local file waiting to be uploaded.
    pub fn from_file(filename: impl Into<String>, data: Bytes) -> Self {
        let filename = filename.into();
        let file_type = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            file_type,
            file_data: Some(data),
            ..Self::new(filename)
        }
    }

    /// A URL handed straight to the parser; the URL doubles as the parse key.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            ..Self::new(url)
        }
    }

    /// Whether the import stage should pick this item up.
    pub fn is_import_candidate(&self) -> bool {
        self.status.is_importable() && (self.file || self.folder_req != Some(false))
    }

    pub fn error_message(&self) -> Option<&str> {
        self.display.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_transition() {
        use ItemStatus::*;

        // valid
        assert!(Common.can_transition_to(Parsing));
        assert!(Common.can_transition_to(UploadError));
        assert!(Parsing.can_transition_to(Parsed));
        assert!(Parsing.can_transition_to(ParseError));
        assert!(Parsed.can_transition_to(Importing));
        assert!(Importing.can_transition_to(Imported));
        assert!(Importing.can_transition_to(ImportError));
        assert!(ImportError.can_transition_to(Importing));
        assert!(ParseError.can_transition_to(Parsing));
        assert!(UploadError.can_transition_to(Common));

        // invalid
        assert!(!Imported.can_transition_to(Importing));
        assert!(!Imported.can_transition_to(Common));
        assert!(!Parsed.can_transition_to(Common));
        assert!(!Parsing.can_transition_to(Common));
        assert!(!Common.can_transition_to(Imported));
        assert!(!ParseError.can_transition_to(Importing));
    }

    #[test]
    fn status_serialises_as_kebab_case() {
        let json = serde_json::to_string(&ItemStatus::ImportError).unwrap();
        assert_eq!(json, "\"import-error\"");
    }

    #[test]
    fn folder_not_requested_is_not_imported() {
        let mut folder = ImportItem::new("folder");
        folder.file = false;
        folder.status = ItemStatus::Parsed;
        assert!(folder.is_import_candidate());

        folder.folder_req = Some(false);
        assert!(!folder.is_import_candidate());

        let mut doc = ImportItem::new("doc");
        doc.status = ItemStatus::ImportError;
        doc.folder_req = Some(false);
        assert!(doc.is_import_candidate());
    }

    #[test]
    fn file_item_takes_extension_as_type() {
        let item = ImportItem::from_file("Guide.MD", Bytes::from_static(b"# hi"));
        assert_eq!(item.file_type, "md");
        assert_eq!(item.status, ItemStatus::Common);
        assert!(item.id.is_empty());
    }
}
