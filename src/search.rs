//! Multi-criteria filtering over registered records

use crate::models::{ModelRecord, ModelSource, ModelType};
use std::collections::BTreeSet;

/// Conjunction of optional filters
///
/// An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Case-insensitive substring of name, description or id
    pub text: Option<String>,
    pub model_type: Option<ModelType>,
    pub source: Option<ModelSource>,
    /// Every tag listed here must be present on the record
    pub tags: BTreeSet<String>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.is_empty()).then(|| text.to_lowercase());
        self
    }

    pub fn with_type(mut self, model_type: ModelType) -> Self {
        self.model_type = Some(model_type);
        self
    }

    pub fn with_source(mut self, source: ModelSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, record: &ModelRecord) -> bool {
        if let Some(model_type) = self.model_type
            && record.model_type != model_type
        {
            return false;
        }

        if let Some(source) = self.source
            && record.source != source
        {
            return false;
        }

        if !self.tags.is_subset(&record.tags) {
            return false;
        }

        match &self.text {
            None => true,
            Some(text) => {
                record.name.to_lowercase().contains(text.as_str())
                    || record.id.to_lowercase().contains(text.as_str())
                    || record
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(text.as_str()))
            }
        }
    }
}
