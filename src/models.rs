//! Core data models used throughout lingest.
//!
//! These types represent the content kinds, groups, and import requests and
//! results that flow through the import pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Only the first few per-item errors are echoed back to the caller;
/// `failed_count` always reflects the true total.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// The three content kinds the importer accepts.
///
/// A collection holds items of exactly one kind; the kind is resolved once
/// at the orchestrator boundary and dispatched from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Word,
    Sentence,
    Shadowing,
}

impl ContentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "WORD" => Some(Self::Word),
            "SENTENCE" => Some(Self::Sentence),
            "SHADOWING" => Some(Self::Shadowing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "WORD",
            Self::Sentence => "SENTENCE",
            Self::Shadowing => "SHADOWING",
        }
    }

    /// Sentence and shadowing items are keyed by an ordinal sequence
    /// position; words are keyed by their text.
    pub fn is_sequenced(&self) -> bool {
        !matches!(self, Self::Word)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a group was formed. An existing group's kind is never overwritten by
/// a later import using the same name (first writer wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Unit,
    Type,
    Size,
    Manual,
    None,
}

impl GroupKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UNIT" => Some(Self::Unit),
            "TYPE" => Some(Self::Type),
            "SIZE" => Some(Self::Size),
            "MANUAL" => Some(Self::Manual),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unit => "UNIT",
            Self::Type => "TYPE",
            Self::Size => "SIZE",
            Self::Manual => "MANUAL",
            Self::None => "NONE",
        }
    }
}

/// Audio generation lifecycle for an item. Every upsert resets the status to
/// `Pending` because the text may have changed under any previously
/// generated audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    Pending,
    Ready,
    Failed,
}

impl AudioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }
}

/// A named subdivision of a collection's items, stored in SQLite.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub collection_id: i64,
    pub name: String,
    pub slug: String,
    pub kind: GroupKind,
    pub ord: i64,
}

/// The single import entry point's request shape. The HTTP body may also be
/// a bare JSON array, which is interpreted as `data`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// Content kind token (`WORD`, `SENTENCE`, `SHADOWING`). Also accepted
    /// as a `type` query parameter on the HTTP surface.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Target collection id. Also accepted as a `setId` query parameter.
    pub set_id: Option<i64>,
    /// Flat array of kind-specific items.
    pub data: Option<Vec<serde_json::Value>>,
    /// Pre-chunked groups, each carrying its own items.
    pub groups: Option<Vec<GroupPayload>>,
    /// Only `SIZE` is recognized; triggers the re-partition pass.
    pub strategy: Option<String>,
    pub size: Option<i64>,
    pub name_pattern: Option<String>,
    pub start_index: Option<i64>,
}

/// One pre-chunked group in an import request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    pub items: Vec<serde_json::Value>,
}

/// Kind-specific fields for a word item. Parsed per item so that one bad
/// row fails alone instead of rejecting the whole request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFields {
    pub word: String,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub phonetic: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "type", default)]
    pub type_tag: Option<String>,
    #[serde(default)]
    pub group_index: Option<i64>,
}

/// Kind-specific fields for a sentence or shadowing item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFields {
    pub text: String,
    /// Explicit sequence position. Defaults to the item's 1-based position
    /// in the submitted array.
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "type", default)]
    pub type_tag: Option<String>,
    #[serde(default)]
    pub group_index: Option<i64>,
}

/// A recorded per-item failure: enough to locate and fix the bad row in the
/// source file without re-running the import blind.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub error: String,
    pub data: serde_json::Value,
}

/// Running success/failure tally, accumulated across all phases and chunks
/// of one import call.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub success_count: u64,
    pub failed_count: u64,
    pub errors: Vec<ItemFailure>,
}

impl ImportOutcome {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, index: usize, error: String, data: serde_json::Value) {
        self.failed_count += 1;
        self.errors.push(ItemFailure { index, error, data });
    }

    pub fn into_summary(mut self, message: String) -> ImportSummary {
        self.errors.truncate(MAX_REPORTED_ERRORS);
        ImportSummary {
            success: self.failed_count == 0,
            message,
            success_count: self.success_count,
            failed_count: self.failed_count,
            errors: self.errors,
        }
    }
}

/// Final result of one import call, returned by the CLI and the HTTP API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success: bool,
    pub message: String,
    pub success_count: u64,
    pub failed_count: u64,
    pub errors: Vec<ItemFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_case_insensitive() {
        assert_eq!(ContentKind::parse("word"), Some(ContentKind::Word));
        assert_eq!(ContentKind::parse("SENTENCE"), Some(ContentKind::Sentence));
        assert_eq!(ContentKind::parse("Shadowing"), Some(ContentKind::Shadowing));
        assert_eq!(ContentKind::parse("AUDIO"), None);
    }

    #[test]
    fn test_outcome_caps_reported_errors() {
        let mut outcome = ImportOutcome::default();
        for i in 0..25 {
            outcome.record_failure(i, "bad".into(), serde_json::json!({}));
        }
        let summary = outcome.into_summary("done".into());
        assert_eq!(summary.failed_count, 25);
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS);
        assert!(!summary.success);
    }

    #[test]
    fn test_bare_request_defaults() {
        let req: ImportRequest = serde_json::from_str(r#"{"type":"WORD","setId":5}"#).unwrap();
        assert_eq!(req.kind.as_deref(), Some("WORD"));
        assert_eq!(req.set_id, Some(5));
        assert!(req.data.is_none());
        assert!(req.groups.is_none());
    }
}
