use tracing::{debug, warn};

use crate::engine::barcode::BarcodeFieldMapper;
use crate::engine::ingest_state::IngestState;
use crate::engine::sheet::{SheetRecord, resolve_question_markings};
use crate::engine::structure::StructureConfig;
use crate::model::DocumentVerdicts;

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub record: SheetRecord,
    pub state: IngestState,
}

/// `file_present` is `None` when no scan inventory was available.
pub fn ingest_document(
    structure: &StructureConfig,
    mapper: &dyn BarcodeFieldMapper,
    verdicts: &DocumentVerdicts,
    file_present: Option<bool>,
    warnings: &mut Vec<String>,
) -> IngestedDocument {
    let mut record = SheetRecord::new(&verdicts.image_id, &verdicts.file_name, structure);
    let mut state = IngestState::new();

    state.set_missing_file(file_present.map(|present| !present));
    state.set_aligned_ok(verdicts.alignment.as_ref().map(|alignment| alignment.success));
    if let Some(alignment) = verdicts.alignment.as_ref().filter(|a| !a.success) {
        debug!(
            image_id = %verdicts.image_id,
            confidence = alignment.confidence,
            "alignment failed"
        );
    }

    let mut barcode_ok = None::<bool>;
    for barcode in &verdicts.barcodes {
        let mut slot_ok = barcode.success;
        if let Err(err) = mapper.apply_barcode_result(&mut record, barcode, barcode.slot) {
            let message = format!("{}: {err}", verdicts.image_id);
            warn!(image_id = %verdicts.image_id, error = %err, "barcode verdict rejected");
            warnings.push(message);
            slot_ok = false;
        }
        barcode_ok = Some(barcode_ok.unwrap_or(true) && slot_ok);
    }
    state.set_barcode_ok(barcode_ok);

    let combined_id_ok = barcode_ok.map(|_| record.combined_id().is_some());
    state.set_combined_id_ok(combined_id_ok);

    record.question_markings = resolve_question_markings(structure, &verdicts.marks);

    state.set_quarantine_override(verdicts.quarantine_override);

    IngestedDocument { record, state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::barcode::SlotSemanticsMapper;
    use crate::engine::ingest_state::FailureReason;
    use crate::model::{AlignmentVerdict, BarcodeVerdict, MarkVerdict};

    fn barcode(slot: i64, text: Option<&str>) -> BarcodeVerdict {
        BarcodeVerdict {
            slot,
            success: text.is_some(),
            decoded_text: text.map(str::to_string),
            format: None,
            error_message: None,
        }
    }

    fn document() -> DocumentVerdicts {
        DocumentVerdicts {
            image_id: "img-1".to_string(),
            file_name: "scan_001.png".to_string(),
            alignment: Some(AlignmentVerdict {
                success: true,
                confidence: 0.97,
                aligned_image_path: None,
            }),
            barcodes: vec![barcode(0, Some("9101010101")), barcode(1, Some("01"))],
            marks: vec![MarkVerdict {
                question: 1,
                option: 2,
                is_marked: true,
                average_brightness: 0.1,
            }],
            quarantine_override: None,
        }
    }

    #[test]
    fn clean_document_passes_every_stage() {
        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let mut warnings = Vec::new();

        let doc = ingest_document(&structure, &mapper, &document(), Some(true), &mut warnings);

        assert!(!doc.state.is_quarantined());
        assert!(!doc.state.is_unknown());
        assert_eq!(doc.state.barcode_ok(), Some(true));
        assert_eq!(doc.state.combined_id_ok(), Some(true));
        assert_eq!(doc.state.missing_file(), Some(false));
        assert_eq!(doc.record.question_markings, vec![Some(2), None, None, None]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn failed_stages_accumulate_reasons() {
        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let mut warnings = Vec::new();
        let mut verdicts = document();
        verdicts.alignment = Some(AlignmentVerdict {
            success: false,
            confidence: 0.2,
            aligned_image_path: None,
        });
        verdicts.barcodes = vec![barcode(0, None), barcode(1, None)];

        let doc = ingest_document(&structure, &mapper, &verdicts, Some(false), &mut warnings);
        let reasons = doc.state.failure_reasons();

        assert!(doc.state.is_quarantined());
        assert!(reasons.contains(FailureReason::AlignFailed));
        assert!(reasons.contains(FailureReason::BarcodeFailed));
        assert!(reasons.contains(FailureReason::CombinedIdMissing));
        assert!(reasons.contains(FailureReason::MissingFile));
        assert_eq!(
            doc.record.error_message.as_deref(),
            Some("StudentId decode failed; InterviewId decode failed")
        );
    }

    #[test]
    fn negative_slot_becomes_warning_and_barcode_failure() {
        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let mut warnings = Vec::new();
        let mut verdicts = document();
        verdicts.barcodes.push(barcode(-1, Some("X")));

        let doc = ingest_document(&structure, &mapper, &verdicts, None, &mut warnings);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("negative"), "unexpected warning: {}", warnings[0]);
        assert_eq!(doc.state.barcode_ok(), Some(false));
        assert_eq!(doc.state.missing_file(), None);
        assert_eq!(doc.record.student_id.as_deref(), Some("9101010101"));
    }

    #[test]
    fn missing_stage_verdicts_stay_unknown() {
        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let mut warnings = Vec::new();
        let verdicts = DocumentVerdicts {
            alignment: None,
            barcodes: Vec::new(),
            marks: Vec::new(),
            ..document()
        };

        let doc = ingest_document(&structure, &mapper, &verdicts, None, &mut warnings);

        assert!(doc.state.is_unknown());
        assert!(!doc.state.is_quarantined());
        assert_eq!(doc.state.combined_id_ok(), None);
    }

    #[test]
    fn override_from_verdicts_is_applied() {
        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let mut warnings = Vec::new();
        let verdicts = DocumentVerdicts {
            quarantine_override: Some(true),
            ..document()
        };

        let doc = ingest_document(&structure, &mapper, &verdicts, Some(true), &mut warnings);
        assert!(doc.state.is_quarantined());
        assert!(doc.state.failure_reasons().is_empty());
    }
}
