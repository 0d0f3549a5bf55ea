//! Typed analysis result payload attached to completed jobs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{JsonObject, Timestamp};

/// Final output of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    /// Names of the input files the analysis covered.
    #[serde(default)]
    pub files: Vec<String>,
    pub completion_time: Timestamp,
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
    #[serde(default)]
    pub report_sections: Vec<ReportSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
}

impl AnalysisResult {
    /// A result with only a summary; list fields start empty.
    pub fn new(summary: impl Into<String>, completion_time: Timestamp) -> Self {
        Self {
            summary: summary.into(),
            files: Vec::new(),
            completion_time,
            visualizations: Vec::new(),
            code_blocks: Vec::new(),
            report_sections: Vec::new(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    Chart,
    Graph,
    Table,
    Image,
    Plot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_path: String,
    #[serde(rename = "type")]
    pub kind: VisualizationKind,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub language: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// 1-based display position.
    pub order: u32,
    pub created_at: Timestamp,
}
