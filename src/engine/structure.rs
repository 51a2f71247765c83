use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{OmrError, OmrResult};
use crate::util::read_json;

pub const STUDENT_ID_FIELD: &str = "StudentId";
pub const INTERVIEW_ID_FIELD: &str = "InterviewId";

pub const QUESTION_COUNT_RANGE: (usize, usize) = (1, 20);
pub const OPTIONS_PER_QUESTION_RANGE: (usize, usize) = (2, 26);
pub const TIMING_MARK_COUNT_RANGE: (usize, usize) = (3, 10);
pub const BARCODE_SLOT_COUNT_RANGE: (usize, usize) = (1, 5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureConfig {
    pub question_count: usize,
    pub options_per_question: usize,
    pub timing_mark_count: usize,
    pub barcode_slot_count: usize,
    #[serde(default)]
    pub barcode_semantics: BTreeMap<usize, String>,
}

impl Default for StructureConfig {
    fn default() -> Self {
        let mut barcode_semantics = BTreeMap::new();
        barcode_semantics.insert(0, STUDENT_ID_FIELD.to_string());
        barcode_semantics.insert(1, INTERVIEW_ID_FIELD.to_string());

        Self {
            question_count: 4,
            options_per_question: 12,
            timing_mark_count: 5,
            barcode_slot_count: 2,
            barcode_semantics,
        }
    }
}

impl StructureConfig {
    pub fn validated(self) -> OmrResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default().validated()?);
        };

        let structure: StructureConfig = read_json(path)?;

        structure
            .validated()
            .with_context(|| format!("structure file rejected: {}", path.display()))
    }

    pub fn validate(&self) -> OmrResult<()> {
        check_range("question_count", self.question_count, QUESTION_COUNT_RANGE)?;
        check_range(
            "options_per_question",
            self.options_per_question,
            OPTIONS_PER_QUESTION_RANGE,
        )?;
        check_range(
            "timing_mark_count",
            self.timing_mark_count,
            TIMING_MARK_COUNT_RANGE,
        )?;
        check_range(
            "barcode_slot_count",
            self.barcode_slot_count,
            BARCODE_SLOT_COUNT_RANGE,
        )?;

        if self.barcode_semantics.len() > self.barcode_slot_count {
            return Err(OmrError::Config(format!(
                "{} barcode semantics mapped but only {} slots configured",
                self.barcode_semantics.len(),
                self.barcode_slot_count
            )));
        }

        for (slot, field) in &self.barcode_semantics {
            if *slot >= self.barcode_slot_count {
                return Err(OmrError::Config(format!(
                    "barcode semantic '{field}' mapped to slot {slot}, outside 0..{}",
                    self.barcode_slot_count
                )));
            }
            if field.trim().is_empty() {
                return Err(OmrError::Config(format!(
                    "barcode slot {slot} has a blank field name"
                )));
            }
        }

        Ok(())
    }

    pub fn semantic_for_slot(&self, slot_index: usize) -> Option<&str> {
        self.barcode_semantics.get(&slot_index).map(String::as_str)
    }

    pub fn question_numbers(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.question_count as u32
    }

    pub fn is_valid_option(&self, option: u32) -> bool {
        option >= 1 && option as usize <= self.options_per_question
    }
}

fn check_range(name: &str, value: usize, (min, max): (usize, usize)) -> OmrResult<()> {
    if value < min || value > max {
        return Err(OmrError::Config(format!(
            "{name} = {value} is outside [{min}, {max}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_structure_is_valid() {
        let structure = StructureConfig::default().validated().expect("default is valid");
        assert_eq!(structure.semantic_for_slot(0), Some(STUDENT_ID_FIELD));
        assert_eq!(structure.semantic_for_slot(1), Some(INTERVIEW_ID_FIELD));
        assert_eq!(structure.semantic_for_slot(2), None);
        assert_eq!(structure.question_numbers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn validate_rejects_out_of_range_constants() {
        let cases = [
            StructureConfig {
                question_count: 0,
                ..StructureConfig::default()
            },
            StructureConfig {
                question_count: 21,
                ..StructureConfig::default()
            },
            StructureConfig {
                options_per_question: 1,
                ..StructureConfig::default()
            },
            StructureConfig {
                options_per_question: 27,
                ..StructureConfig::default()
            },
            StructureConfig {
                timing_mark_count: 2,
                ..StructureConfig::default()
            },
            StructureConfig {
                timing_mark_count: 11,
                ..StructureConfig::default()
            },
        ];

        for structure in cases {
            let error = structure.validate().expect_err("structure should be rejected");
            assert!(matches!(error, OmrError::Config(_)), "unexpected error: {error}");
        }
    }

    #[test]
    fn validate_rejects_more_semantics_than_slots() {
        let structure = StructureConfig {
            barcode_slot_count: 1,
            ..StructureConfig::default()
        };

        let error = structure.validate().expect_err("two semantics on one slot");
        assert!(error.to_string().contains("only 1 slots"), "unexpected error: {error}");
    }

    #[test]
    fn validate_rejects_semantic_on_unconfigured_slot() {
        let mut structure = StructureConfig::default();
        structure.barcode_semantics.remove(&1);
        structure
            .barcode_semantics
            .insert(4, INTERVIEW_ID_FIELD.to_string());

        let error = structure.validate().expect_err("slot 4 does not exist");
        assert!(error.to_string().contains("slot 4"), "unexpected error: {error}");
    }

    #[test]
    fn structure_deserializes_slot_keys_from_json_strings() {
        let raw = r#"
        {
          "question_count": 3,
          "options_per_question": 5,
          "timing_mark_count": 4,
          "barcode_slot_count": 3,
          "barcode_semantics": { "0": "StudentId", "1": "InterviewId", "2": "ExamCode" }
        }
        "#;

        let structure: StructureConfig = serde_json::from_str(raw).expect("structure json");
        let structure = structure.validated().expect("three-slot layout is valid");
        assert_eq!(structure.semantic_for_slot(2), Some("ExamCode"));
        assert!(structure.is_valid_option(5));
        assert!(!structure.is_valid_option(6));
        assert!(!structure.is_valid_option(0));
    }

    #[test]
    fn load_reads_file_and_rejects_invalid_layouts() {
        let dir = std::env::temp_dir().join(format!("omrgrade-structure-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(
            &good,
            r#"{ "question_count": 6, "options_per_question": 4, "timing_mark_count": 5, "barcode_slot_count": 1 }"#,
        )
        .expect("write good");
        std::fs::write(
            &bad,
            r#"{ "question_count": 99, "options_per_question": 4, "timing_mark_count": 5, "barcode_slot_count": 1 }"#,
        )
        .expect("write bad");

        let structure = StructureConfig::load(Some(&good)).expect("good layout");
        assert_eq!(structure.question_count, 6);

        let error = StructureConfig::load(Some(&bad)).expect_err("question_count out of range");
        assert!(error.to_string().contains("bad.json"), "unexpected error: {error}");

        let error = StructureConfig::load(Some(&dir.join("absent.json"))).expect_err("missing file");
        assert!(error.to_string().contains("failed to read"), "unexpected error: {error}");

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
