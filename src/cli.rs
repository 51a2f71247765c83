use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::engine::grading::{PeerScope, TieBreak, UnmarkedPolicy};

#[derive(Parser, Debug)]
#[command(
    name = "omrgrade",
    version,
    about = "Ingest-state tracking and grading for scanned answer sheets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Grade(GradeArgs),
    Status(StatusArgs),
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".cache/omr")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub scan_dir: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/omr")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub structure_path: Option<PathBuf>,

    #[arg(long)]
    pub verdicts_path: Option<PathBuf>,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long, default_value_t = false)]
    pub skip_file_check: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GradeArgs {
    #[arg(long, default_value = ".cache/omr")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub structure_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub roster_path: Option<PathBuf>,

    #[arg(long)]
    pub scoring_path: Option<PathBuf>,

    #[arg(long)]
    pub grade_manifest_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = UnmarkedPolicy::Exclude)]
    pub unmarked_policy: UnmarkedPolicy,

    #[arg(long, value_enum, default_value_t = PeerScope::Batch)]
    pub rank_scope: PeerScope,

    #[arg(long, value_enum, default_value_t = TieBreak::Shared)]
    pub ties: TieBreak,

    #[arg(long, default_value_t = false)]
    pub rank_duplicates: bool,

    #[arg(long, default_value_t = false)]
    pub include_quarantined: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/omr")]
    pub cache_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = ".cache/omr")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub structure_path: Option<PathBuf>,

    #[arg(long)]
    pub scoring_path: Option<PathBuf>,
}

pub struct CacheLayout {
    pub root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: &std::path::Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn scan_dir(&self) -> PathBuf {
        self.root.join("scans")
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.manifest_dir().join("scan_inventory.json")
    }

    pub fn verdicts_path(&self) -> PathBuf {
        self.root.join("verdicts.json")
    }

    pub fn roster_path(&self) -> PathBuf {
        self.root.join("roster.json")
    }

    pub fn scoring_path(&self) -> PathBuf {
        self.root.join("scoring.json")
    }

    pub fn latest_ingest_path(&self) -> PathBuf {
        self.manifest_dir().join("ingest_latest.json")
    }

    pub fn latest_grade_path(&self) -> PathBuf {
        self.manifest_dir().join("grade_latest.json")
    }
}
