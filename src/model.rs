use serde::{Deserialize, Serialize};

use crate::engine::duplicates::DuplicateSummary;
use crate::engine::grading::{GradingResult, PeerRankPolicy, UnmarkedPolicy};
use crate::engine::ingest_state::{IngestState, LoadFailureItem};
use crate::engine::sheet::SheetRecord;
use crate::engine::structure::StructureConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentVerdict {
    pub success: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub aligned_image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeVerdict {
    pub slot: i64,
    pub success: bool,
    #[serde(default)]
    pub decoded_text: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkVerdict {
    pub question: u32,
    pub option: u32,
    pub is_marked: bool,
    #[serde(default)]
    pub average_brightness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVerdicts {
    pub image_id: String,
    pub file_name: String,
    #[serde(default)]
    pub alignment: Option<AlignmentVerdict>,
    #[serde(default)]
    pub barcodes: Vec<BarcodeVerdict>,
    #[serde(default)]
    pub marks: Vec<MarkVerdict>,
    #[serde(default)]
    pub quarantine_override: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictBatch {
    pub batch_id: String,
    pub documents: Vec<DocumentVerdicts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub file_name: String,
    pub image_id: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub scan_count: usize,
    pub scans: Vec<ScanEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetEntry {
    pub record: SheetRecord,
    pub ingest: IngestState,
    pub quarantined: bool,
    pub is_error_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestCounts {
    pub document_count: usize,
    pub scan_count: usize,
    pub quarantined_count: usize,
    #[serde(default)]
    pub missing_file_count: usize,
    #[serde(default)]
    pub unknown_count: usize,
    pub error_count: usize,
    pub duplicate_groups: usize,
    pub duplicate_records: usize,
    pub records_without_combined_id: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub batch_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub structure: StructureConfig,
    pub counts: IngestCounts,
    pub sheets: Vec<SheetEntry>,
    pub review_queue: Vec<String>,
    pub load_failures: Vec<LoadFailureItem>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeCounts {
    pub sheets_in_ingest: usize,
    pub sheets_graded: usize,
    pub quarantined_skipped: usize,
    pub scored_count: usize,
    pub ranked_count: usize,
    pub roster_matched: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub ingest_run_id: String,
    pub generated_at: String,
    pub command: String,
    pub unmarked_policy: UnmarkedPolicy,
    pub rank_policy: PeerRankPolicy,
    pub duplicates: DuplicateSummary,
    pub counts: GradeCounts,
    pub results: Vec<GradingResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRunSnapshot {
    pub run_id: String,
    pub ingest_run_id: String,
    pub generated_at: String,
    pub counts: GradeCounts,
}
