use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{CacheLayout, StatusArgs};
use crate::engine::ingest_state::FailureReasons;
use crate::model::{GradeRunSnapshot, IngestRunManifest, ScanInventoryManifest, SheetEntry};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let layout = CacheLayout::new(&args.cache_root);
    let inventory_path = layout.inventory_path();
    let ingest_path = layout.latest_ingest_path();
    let grade_path = layout.latest_grade_path();

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: ScanInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            scan_count = inventory.scan_count,
            source = %inventory.source_directory,
            "loaded scan inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "scan inventory manifest missing");
    }

    if ingest_path.exists() {
        let ingest: IngestRunManifest = read_json(&ingest_path)?;
        info!(
            run_id = %ingest.run_id,
            batch_id = %ingest.batch_id,
            status = %ingest.status,
            updated_at = %ingest.updated_at,
            documents = ingest.counts.document_count,
            quarantined = ingest.counts.quarantined_count,
            missing_files = ingest.counts.missing_file_count,
            unknown = ingest.counts.unknown_count,
            errors = ingest.counts.error_count,
            duplicate_groups = ingest.counts.duplicate_groups,
            warnings = ingest.warnings.len(),
            "loaded latest ingest run"
        );

        let reasons = ingest
            .sheets
            .iter()
            .fold(FailureReasons::none(), |acc, sheet| {
                acc.union(sheet.ingest.failure_reasons())
            });
        let overridden = ingest
            .sheets
            .iter()
            .filter(|sheet| sheet.ingest.quarantine_override().is_some())
            .count();
        if !reasons.is_empty() || overridden > 0 {
            let stages = StageFailures::tally(&ingest.sheets);
            info!(
                reasons = %reasons.summary(),
                overridden,
                alignment = stages.alignment,
                barcode = stages.barcode,
                combined_id = stages.combined_id,
                missing_file = stages.missing_file,
                "failure reasons seen in batch"
            );
        }

        for failure in &ingest.load_failures {
            info!(
                image_id = %failure.image_id,
                file_name = %failure.file_name,
                reasons = %failure.failure_reason_summary,
                "quarantined document"
            );
        }
    } else {
        warn!(path = %ingest_path.display(), "no ingest run recorded");
    }

    if grade_path.exists() {
        let grade: GradeRunSnapshot = read_json(&grade_path)?;
        info!(
            run_id = %grade.run_id,
            ingest_run_id = %grade.ingest_run_id,
            generated_at = %grade.generated_at,
            graded = grade.counts.sheets_graded,
            scored = grade.counts.scored_count,
            ranked = grade.counts.ranked_count,
            roster_matched = grade.counts.roster_matched,
            errors = grade.counts.error_count,
            "loaded latest grade run"
        );
    } else {
        warn!(path = %grade_path.display(), "no grade run recorded");
    }

    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct StageFailures {
    alignment: usize,
    barcode: usize,
    combined_id: usize,
    missing_file: usize,
}

impl StageFailures {
    fn tally(sheets: &[SheetEntry]) -> Self {
        let mut tally = Self::default();
        for sheet in sheets {
            let state = &sheet.ingest;
            if state.aligned_ok() == Some(false) {
                tally.alignment += 1;
            }
            if state.barcode_ok() == Some(false) {
                tally.barcode += 1;
            }
            if state.combined_id_ok() == Some(false) {
                tally.combined_id += 1;
            }
            if state.missing_file() == Some(true) {
                tally.missing_file += 1;
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ingest_state::IngestState;
    use crate::engine::sheet::SheetRecord;

    fn sheet(ingest: IngestState) -> SheetEntry {
        SheetEntry {
            record: SheetRecord::default(),
            quarantined: ingest.is_quarantined(),
            is_error_only: false,
            ingest,
        }
    }

    #[test]
    fn stage_failures_count_only_failed_verdicts() {
        let mut misaligned = IngestState::new();
        misaligned.set_aligned_ok(Some(false));
        misaligned.set_missing_file(Some(false));

        let mut unreadable = IngestState::new();
        unreadable.set_barcode_ok(Some(false));
        unreadable.set_combined_id_ok(Some(false));
        unreadable.set_missing_file(Some(true));

        let mut pending = IngestState::new();
        pending.set_aligned_ok(None);

        let tally = StageFailures::tally(&[sheet(misaligned), sheet(unreadable), sheet(pending)]);

        assert_eq!(
            tally,
            StageFailures {
                alignment: 1,
                barcode: 1,
                combined_id: 1,
                missing_file: 1,
            }
        );
    }
}
