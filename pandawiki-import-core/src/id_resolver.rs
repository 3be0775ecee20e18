use std::collections::HashMap;

/// Maps platform ids of already created folders to the node ids the backend
/// assigned them. Unknown ids resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct IdResolver {
    created: HashMap<String, String>,
}

impl IdResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.created.insert(old_id.into(), new_id.into());
    }

    /// Backend id for `old_id`, or `old_id` itself if it was never recorded.
    pub fn resolve<'a>(&'a self, old_id: &'a str) -> &'a str {
        self.created.get(old_id).map(String::as_str).unwrap_or(old_id)
    }

    pub fn contains(&self, old_id: &str) -> bool {
        self.created.contains_key(old_id)
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}
