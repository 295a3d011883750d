// moodlesync-core/src/domain/plan.rs

use serde::Serialize;
use std::collections::HashSet;

use crate::domain::error::DomainError;
use crate::domain::record::SourceKind;

/// One configured source: a Moodle activity id and the label heading its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpec {
    /// Position in the configured order; also the column group index.
    pub position: usize,
    pub id: String,
    pub label: String,
    pub kind: SourceKind,
}

/// The ordered source configuration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePlan {
    sources: Vec<SourceSpec>,
}

impl SourcePlan {
    /// Pair ids with labels by position.
    ///
    /// Fails on length mismatch, empty lists, blank entries and duplicate labels. This runs
    /// before anything touches the network.
    pub fn pair<S: AsRef<str>>(
        kind: SourceKind,
        ids: &[S],
        labels: &[S],
    ) -> Result<Self, DomainError> {
        let ids: Vec<&str> = ids.iter().map(|s| s.as_ref().trim()).collect();
        let labels: Vec<&str> = labels.iter().map(|s| s.as_ref().trim()).collect();

        if ids.len() != labels.len() {
            return Err(DomainError::SourceMismatch {
                ids: ids.len(),
                labels: labels.len(),
            });
        }
        if ids.is_empty() || (ids.len() == 1 && ids[0].is_empty() && labels[0].is_empty()) {
            return Err(DomainError::NoSources);
        }

        let mut seen_labels = HashSet::new();
        let mut sources = Vec::with_capacity(ids.len());
        for (position, (id, label)) in ids.into_iter().zip(labels).enumerate() {
            if id.is_empty() {
                return Err(DomainError::InvalidSource(format!(
                    "empty id at position {}",
                    position + 1
                )));
            }
            if label.is_empty() {
                return Err(DomainError::InvalidSource(format!(
                    "empty label for source '{}'",
                    id
                )));
            }
            if !seen_labels.insert(label.to_string()) {
                return Err(DomainError::DuplicateLabel(label.to_string()));
            }
            sources.push(SourceSpec {
                position,
                id: id.to_string(),
                label: label.to_string(),
                kind,
            });
        }

        Ok(Self { sources })
    }

    /// Same as [`SourcePlan::pair`] but from raw comma-separated strings.
    pub fn from_lists(kind: SourceKind, ids: &str, labels: &str) -> Result<Self, DomainError> {
        let ids: Vec<&str> = ids.split(',').collect();
        let labels: Vec<&str> = labels.split(',').collect();
        Self::pair(kind, &ids, &labels)
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.label == label)
    }
}
