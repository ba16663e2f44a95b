//! Wire shapes for the upstream transit-status API. Decoded straight off the
//! HTTP response body; never exposed outside this crate — `client.rs`
//! converts these into `cache_model::{LineRecord, DisruptionRecord}`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LineResponseDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub line_statuses: Vec<LineStatusDto>,
    #[serde(default)]
    pub disruptions: Vec<DisruptionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LineStatusDto {
    pub status_severity_description: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DisruptionDto {
    pub is_planned: bool,
    pub description: String,
    #[serde(default)]
    pub affected_routes: Vec<String>,
}
