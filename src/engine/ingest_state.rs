use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    AlignFailed,
    BarcodeFailed,
    CombinedIdMissing,
    MissingFile,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlignFailed => "alignment failed",
            Self::BarcodeFailed => "barcode decode failed",
            Self::CombinedIdMissing => "combined id missing",
            Self::MissingFile => "missing file",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureReasons(BTreeSet<FailureReason>);

impl FailureReasons {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reason: FailureReason) {
        self.0.insert(reason);
    }

    pub fn remove(&mut self, reason: FailureReason) {
        self.0.remove(&reason);
    }

    pub fn contains(&self, reason: FailureReason) -> bool {
        self.0.contains(&reason)
    }

    pub fn union(&self, other: &FailureReasons) -> FailureReasons {
        FailureReasons(self.0.union(&other.0).copied().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FailureReason> + '_ {
        self.0.iter().copied()
    }

    pub fn summary(&self) -> String {
        self.iter()
            .map(FailureReason::as_str)
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestState {
    aligned_ok: Option<bool>,
    barcode_ok: Option<bool>,
    combined_id_ok: Option<bool>,
    missing_file: Option<bool>,
    failure_reasons: FailureReasons,
    quarantine_override: Option<bool>,
    #[serde(default)]
    evaluated: bool,
}

impl IngestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_aligned_ok(&mut self, value: Option<bool>) {
        self.aligned_ok = value;
        self.apply(FailureReason::AlignFailed, value.map(|ok| !ok));
    }

    pub fn set_barcode_ok(&mut self, value: Option<bool>) {
        self.barcode_ok = value;
        self.apply(FailureReason::BarcodeFailed, value.map(|ok| !ok));
    }

    pub fn set_combined_id_ok(&mut self, value: Option<bool>) {
        self.combined_id_ok = value;
        self.apply(FailureReason::CombinedIdMissing, value.map(|ok| !ok));
    }

    /// `Some(true)` means the source file is missing.
    pub fn set_missing_file(&mut self, value: Option<bool>) {
        self.missing_file = value;
        self.apply(FailureReason::MissingFile, value);
    }

    pub fn set_quarantine_override(&mut self, value: Option<bool>) {
        self.quarantine_override = value;
    }

    fn apply(&mut self, reason: FailureReason, failed: Option<bool>) {
        match failed {
            Some(true) => self.failure_reasons.insert(reason),
            Some(false) => self.failure_reasons.remove(reason),
            None => return,
        }
        self.evaluated = true;
    }

    pub fn aligned_ok(&self) -> Option<bool> {
        self.aligned_ok
    }

    pub fn barcode_ok(&self) -> Option<bool> {
        self.barcode_ok
    }

    pub fn combined_id_ok(&self) -> Option<bool> {
        self.combined_id_ok
    }

    pub fn missing_file(&self) -> Option<bool> {
        self.missing_file
    }

    pub fn quarantine_override(&self) -> Option<bool> {
        self.quarantine_override
    }

    pub fn failure_reasons(&self) -> &FailureReasons {
        &self.failure_reasons
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantine_override
            .unwrap_or_else(|| !self.failure_reasons.is_empty())
    }

    pub fn is_unknown(&self) -> bool {
        !self.evaluated
            && self.aligned_ok.is_none()
            && self.barcode_ok.is_none()
            && self.combined_id_ok.is_none()
            && self.missing_file.is_none()
            && self.failure_reasons.is_empty()
            && self.quarantine_override.is_none()
    }

    pub fn load_failure_item(&self, image_id: &str, file_name: &str) -> LoadFailureItem {
        LoadFailureItem {
            image_id: image_id.to_string(),
            file_name: file_name.to_string(),
            failure_reasons: self.failure_reasons.clone(),
            failure_reason_summary: self.failure_reasons.summary(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailureItem {
    pub image_id: String,
    pub file_name: String,
    pub failure_reasons: FailureReasons,
    pub failure_reason_summary: String,
}
