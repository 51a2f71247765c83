use tracing::debug;

use crate::engine::sheet::SheetRecord;
use crate::engine::structure::{INTERVIEW_ID_FIELD, STUDENT_ID_FIELD, StructureConfig};
use crate::error::{OmrError, OmrResult};
use crate::model::BarcodeVerdict;

/// Strategy for copying a decoded barcode onto a sheet record.
pub trait BarcodeFieldMapper {
    fn apply_barcode_result(
        &self,
        record: &mut SheetRecord,
        barcode: &BarcodeVerdict,
        slot_index: i64,
    ) -> OmrResult<()>;
}

pub struct SlotSemanticsMapper<'a> {
    structure: &'a StructureConfig,
}

impl<'a> SlotSemanticsMapper<'a> {
    pub fn new(structure: &'a StructureConfig) -> Self {
        Self { structure }
    }
}

impl BarcodeFieldMapper for SlotSemanticsMapper<'_> {
    fn apply_barcode_result(
        &self,
        record: &mut SheetRecord,
        barcode: &BarcodeVerdict,
        slot_index: i64,
    ) -> OmrResult<()> {
        let slot = usize::try_from(slot_index).map_err(|_| {
            OmrError::InvalidArgument(format!("barcode slot index {slot_index} is negative"))
        })?;
        let semantic = self.structure.semantic_for_slot(slot);

        if let Some(semantic) = semantic {
            let decoded = barcode
                .success
                .then(|| barcode.decoded_text.as_deref().unwrap_or_default().trim());
            let value = decoded.filter(|text| !text.is_empty()).map(str::to_string);

            match semantic {
                STUDENT_ID_FIELD => record.student_id = value,
                INTERVIEW_ID_FIELD => record.interview_id = value,
                other => match value {
                    Some(value) => {
                        record.extra_fields.insert(other.to_string(), value);
                    }
                    None => {
                        record.extra_fields.remove(other);
                    }
                },
            }

            if decoded.is_some_and(str::is_empty) {
                record.append_error(&empty_value_message(semantic));
            }
        }

        if !barcode.success {
            let label = semantic
                .map(str::to_string)
                .unwrap_or_else(|| format!("barcode {}", slot + 1));
            debug!(
                image_id = %record.image_id,
                slot,
                reason = %barcode.error_message.as_deref().unwrap_or("unspecified"),
                "barcode decode failed"
            );
            record.append_error(&format!("{label} decode failed"));
        }

        Ok(())
    }
}

fn empty_value_message(semantic: &str) -> String {
    match semantic {
        STUDENT_ID_FIELD => "student-id barcode value empty".to_string(),
        INTERVIEW_ID_FIELD => "interview-id barcode value empty".to_string(),
        other => format!("{other} barcode value empty"),
    }
}
