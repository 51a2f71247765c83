use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{CacheLayout, IngestArgs};
use crate::commands::inventory;
use crate::engine::barcode::SlotSemanticsMapper;
use crate::engine::duplicates::{detect_duplicates, review_order};
use crate::engine::ingest_state::FailureReason;
use crate::engine::pipeline::ingest_document;
use crate::engine::structure::StructureConfig;
use crate::model::{
    IngestCounts, IngestRunManifest, ScanInventoryManifest, SheetEntry, VerdictBatch,
};
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("ingest-{}", utc_compact_string(started_ts));

    let layout = CacheLayout::new(&args.cache_root);
    let manifest_dir = layout.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let structure = StructureConfig::load(args.structure_path.as_deref())?;
    info!(
        run_id = %run_id,
        questions = structure.question_count,
        options = structure.options_per_question,
        barcode_slots = structure.barcode_slot_count,
        "starting ingest"
    );

    let verdicts_path = args
        .verdicts_path
        .clone()
        .unwrap_or_else(|| layout.verdicts_path());
    let batch: VerdictBatch = read_json(&verdicts_path)?;
    if batch.documents.is_empty() {
        bail!("verdict batch {} has no documents", verdicts_path.display());
    }

    let inventory = if args.skip_file_check {
        None
    } else {
        let inventory_path = args
            .inventory_manifest_path
            .clone()
            .unwrap_or_else(|| layout.inventory_path());
        Some(load_or_refresh_inventory(
            &layout.scan_dir(),
            &inventory_path,
            args.refresh_inventory,
        )?)
    };
    let scanned_files = inventory.as_ref().map(|manifest| {
        manifest
            .scans
            .iter()
            .map(|scan| scan.file_name.as_str())
            .collect::<HashSet<&str>>()
    });

    let mapper = SlotSemanticsMapper::new(&structure);
    let mut warnings = Vec::new();
    let mut records = Vec::with_capacity(batch.documents.len());
    let mut states = Vec::with_capacity(batch.documents.len());

    for verdicts in &batch.documents {
        let file_present = scanned_files
            .as_ref()
            .map(|files| files.contains(verdicts.file_name.as_str()));

        let document = ingest_document(&structure, &mapper, verdicts, file_present, &mut warnings);
        if document.state.is_quarantined() {
            warn!(
                image_id = %verdicts.image_id,
                reasons = %document.state.failure_reasons().summary(),
                "document quarantined"
            );
        }

        records.push(document.record);
        states.push(document.state);
    }

    let duplicates = detect_duplicates(&mut records);
    if duplicates.duplicate_groups > 0 {
        warn!(
            groups = duplicates.duplicate_groups,
            records = duplicates.duplicate_records,
            "duplicate submissions detected"
        );
    }

    let mut review = records
        .iter()
        .filter(|record| record.is_duplicate || record.is_error_only())
        .cloned()
        .collect::<Vec<_>>();
    review_order(&mut review);
    let review_queue = review
        .into_iter()
        .map(|record| record.image_id)
        .collect::<Vec<_>>();

    let load_failures = records
        .iter()
        .zip(states.iter())
        .filter(|(_, state)| state.is_quarantined())
        .map(|(record, state)| state.load_failure_item(&record.image_id, &record.image_file_name))
        .collect::<Vec<_>>();

    let sheets = records
        .into_iter()
        .zip(states)
        .map(|(record, ingest)| SheetEntry {
            quarantined: ingest.is_quarantined(),
            is_error_only: record.is_error_only(),
            record,
            ingest,
        })
        .collect::<Vec<_>>();

    let counts = IngestCounts {
        document_count: sheets.len(),
        scan_count: inventory.as_ref().map(|m| m.scan_count).unwrap_or(0),
        quarantined_count: load_failures.len(),
        missing_file_count: sheets
            .iter()
            .filter(|sheet| sheet.ingest.failure_reasons().contains(FailureReason::MissingFile))
            .count(),
        unknown_count: sheets.iter().filter(|sheet| sheet.ingest.is_unknown()).count(),
        error_count: sheets.iter().filter(|sheet| sheet.record.has_errors).count(),
        duplicate_groups: duplicates.duplicate_groups,
        duplicate_records: duplicates.duplicate_records,
        records_without_combined_id: duplicates.records_without_combined_id,
    };

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        batch_id: batch.batch_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        structure,
        counts,
        sheets,
        review_queue,
        load_failures,
        warnings,
    };

    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });
    write_json_pretty(&ingest_manifest_path, &manifest)?;
    write_json_pretty(&layout.latest_ingest_path(), &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        documents = manifest.counts.document_count,
        quarantined = manifest.counts.quarantined_count,
        missing_files = manifest.counts.missing_file_count,
        unknown = manifest.counts.unknown_count,
        errors = manifest.counts.error_count,
        "ingest completed"
    );

    Ok(())
}

fn load_or_refresh_inventory(
    scan_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<ScanInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        if !scan_dir.is_dir() {
            warn!(
                scan_dir = %scan_dir.display(),
                "scan directory missing; every document will be marked as missing its file"
            );
            return Ok(inventory::empty_manifest(scan_dir));
        }

        let manifest = inventory::build_manifest(scan_dir)?;
        if manifest.scans.is_empty() {
            warn!(
                scan_dir = %scan_dir.display(),
                "no scanned images found; every document will be marked as missing its file"
            );
            return Ok(manifest);
        }

        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            scan_count = manifest.scan_count,
            "refreshed scan inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: ScanInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        scan_count = manifest.scan_count,
        "loaded existing scan inventory manifest"
    );

    Ok(manifest)
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "omrgrade".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.structure_path {
        command.push("--structure-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.verdicts_path {
        command.push("--verdicts-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if args.skip_file_check {
        command.push("--skip-file-check".to_string());
    }

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::DocumentVerdicts;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("omrgrade-ingest-{label}-{}", std::process::id()))
    }

    #[test]
    fn empty_scan_directory_yields_empty_inventory() {
        let scan_dir = temp_dir("empty-scans");
        std::fs::create_dir_all(&scan_dir).expect("scan dir");
        let manifest_path = scan_dir.join("scan_inventory.json");

        let manifest =
            load_or_refresh_inventory(&scan_dir, &manifest_path, true).expect("inventory");

        assert_eq!(manifest.scan_count, 0);
        assert!(!manifest_path.exists());

        std::fs::remove_dir_all(&scan_dir).expect("cleanup");
    }

    #[test]
    fn missing_scan_directory_marks_documents_missing() {
        let scan_dir = temp_dir("absent-scans");
        let manifest_path = temp_dir("absent-manifest").join("scan_inventory.json");

        let manifest =
            load_or_refresh_inventory(&scan_dir, &manifest_path, false).expect("inventory");
        assert!(manifest.scans.is_empty());

        let structure = StructureConfig::default();
        let mapper = SlotSemanticsMapper::new(&structure);
        let verdicts = DocumentVerdicts {
            image_id: "img-1".to_string(),
            file_name: "img-1.png".to_string(),
            alignment: None,
            barcodes: Vec::new(),
            marks: Vec::new(),
            quarantine_override: None,
        };
        let present = manifest
            .scans
            .iter()
            .any(|scan| scan.file_name == verdicts.file_name);
        let mut warnings = Vec::new();
        let document =
            ingest_document(&structure, &mapper, &verdicts, Some(present), &mut warnings);

        assert_eq!(document.state.missing_file(), Some(true));
        assert!(
            document
                .state
                .failure_reasons()
                .contains(FailureReason::MissingFile)
        );
        assert!(document.state.is_quarantined());
    }

    #[test]
    fn render_ingest_command_lists_only_supplied_flags() {
        let args = IngestArgs {
            cache_root: PathBuf::from(".cache/omr"),
            structure_path: Some(PathBuf::from("structure.json")),
            verdicts_path: None,
            inventory_manifest_path: None,
            ingest_manifest_path: None,
            refresh_inventory: true,
            skip_file_check: false,
        };

        assert_eq!(
            render_ingest_command(&args),
            "omrgrade ingest --cache-root .cache/omr --structure-path structure.json --refresh-inventory"
        );
    }
}
