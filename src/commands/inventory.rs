use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::{CacheLayout, InventoryArgs};
use crate::model::{ScanEntry, ScanInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const SCAN_FILENAME_PATTERN: &str = r"(?i)^(?P<stem>.+)\.(png|jpe?g|tiff?|bmp)$";

pub fn run(args: InventoryArgs) -> Result<()> {
    let layout = CacheLayout::new(&args.cache_root);
    let scan_dir = args.scan_dir.clone().unwrap_or_else(|| layout.scan_dir());
    let manifest = build_manifest(&scan_dir)?;
    if manifest.scans.is_empty() {
        bail!("no scanned images found in {}", scan_dir.display());
    }

    if args.dry_run {
        info!(
            scan_count = manifest.scan_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| layout.inventory_path());

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote scan inventory manifest");
    info!(scan_count = manifest.scan_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(scan_dir: &Path) -> Result<ScanInventoryManifest> {
    let pattern =
        Regex::new(SCAN_FILENAME_PATTERN).context("failed to compile scan filename regex")?;

    let mut scan_paths = discover_files(scan_dir)?;
    scan_paths.sort();

    let mut scans = Vec::with_capacity(scan_paths.len());
    for path in scan_paths {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let Some(image_id) = image_id_from_file_name(&file_name, &pattern) else {
            continue;
        };

        let size_bytes = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let sha256 = sha256_file(&path)?;

        scans.push(ScanEntry {
            file_name,
            image_id,
            size_bytes,
            sha256,
        });
    }

    let mut seen = std::collections::HashSet::new();
    for scan in &scans {
        if !seen.insert(scan.image_id.as_str()) {
            warn!(image_id = %scan.image_id, "several scans share one image id");
        }
    }

    Ok(ScanInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: scan_dir.display().to_string(),
        scan_count: scans.len(),
        scans,
    })
}

pub fn empty_manifest(scan_dir: &Path) -> ScanInventoryManifest {
    ScanInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: scan_dir.display().to_string(),
        scan_count: 0,
        scans: Vec::new(),
    }
}

fn discover_files(scan_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let entries =
        fs::read_dir(scan_dir).with_context(|| format!("failed to read {}", scan_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", scan_dir.display()))?;
        let path = entry.path();

        if entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            files.push(path);
        }
    }

    Ok(files)
}

fn image_id_from_file_name(file_name: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(file_name)
        .and_then(|captures| captures.name("stem"))
        .map(|stem| stem.as_str().to_string())
}
