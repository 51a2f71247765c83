use anyhow::{Result, bail};
use chrono::Utc;
use clap::ValueEnum;
use tracing::{info, warn};

use crate::cli::{CacheLayout, GradeArgs};
use crate::engine::duplicates::{DuplicateSummary, detect_duplicates};
use crate::engine::grading::{GradingAggregator, PeerRankPolicy, PeerReduction};
use crate::engine::roster::Roster;
use crate::engine::scoring::ScoringTable;
use crate::engine::sheet::SheetRecord;
use crate::engine::structure::StructureConfig;
use crate::model::{GradeCounts, GradeRunManifest, IngestRunManifest, SheetEntry};
use crate::util::{now_utc_string, read_json, utc_compact_string, write_json_pretty};

pub fn run(args: GradeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("grade-{}", utc_compact_string(started_ts));
    let layout = CacheLayout::new(&args.cache_root);

    let structure = StructureConfig::load(args.structure_path.as_deref())?;

    let ingest_path = args
        .ingest_manifest_path
        .clone()
        .unwrap_or_else(|| layout.latest_ingest_path());
    let ingest: IngestRunManifest = read_json(&ingest_path)?;
    if ingest.structure != structure {
        bail!(
            "ingest run {} used a different sheet structure than {}",
            ingest.run_id,
            args.structure_path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "the built-in default".to_string())
        );
    }
    info!(
        run_id = %run_id,
        ingest_run_id = %ingest.run_id,
        sheets = ingest.sheets.len(),
        "starting grade"
    );

    let roster_path = args.roster_path.clone().unwrap_or_else(|| layout.roster_path());
    let roster = if roster_path.exists() {
        Roster::load(&roster_path)?
    } else {
        warn!(path = %roster_path.display(), "roster missing; roster fields will be empty");
        Roster::default()
    };
    info!(
        students = roster.student_count(),
        interviewers = roster.interviewer_count(),
        "loaded roster"
    );

    let scoring_path = args
        .scoring_path
        .clone()
        .unwrap_or_else(|| layout.scoring_path());
    let scoring = if scoring_path.exists() {
        ScoringTable::load(&structure, &scoring_path)?
    } else {
        warn!(path = %scoring_path.display(), "scoring table missing; every option scores 0");
        ScoringTable::new(&structure)
    };
    let labelled_options = (1..=structure.options_per_question as u32)
        .filter(|option| scoring.option_label(*option).is_some_and(|label| !label.is_empty()))
        .count();
    info!(
        rows = scoring.rows().len(),
        labelled_options,
        "loaded scoring table"
    );

    let sheets_in_ingest = ingest.sheets.len();
    let (records, quarantined_skipped, duplicates) =
        select_gradable(ingest.sheets, args.include_quarantined);
    if quarantined_skipped > 0 {
        info!(skipped = quarantined_skipped, "quarantined sheets left out of grading");
    }

    let aggregator = GradingAggregator::new(&scoring, &roster, args.unmarked_policy);
    let mut results = aggregator.aggregate(&records);

    let rank_policy = PeerRankPolicy {
        scope: args.rank_scope,
        ties: args.ties,
        rank_duplicates: args.rank_duplicates,
    };
    rank_policy.reduce(&mut results);

    results.sort_by(|left, right| {
        left.rank
            .is_none()
            .cmp(&right.rank.is_none())
            .then(left.rank.cmp(&right.rank))
            .then_with(|| left.image_id.cmp(&right.image_id))
    });

    let counts = GradeCounts {
        sheets_in_ingest,
        sheets_graded: results.len(),
        quarantined_skipped,
        scored_count: results.iter().filter(|r| r.total_score.is_some()).count(),
        ranked_count: results.iter().filter(|r| r.rank.is_some()).count(),
        roster_matched: results.iter().filter(|r| r.student_name.is_some()).count(),
        error_count: results.iter().filter(|r| r.has_errors).count(),
    };

    let manifest = GradeRunManifest {
        manifest_version: 1,
        run_id,
        ingest_run_id: ingest.run_id,
        generated_at: now_utc_string(),
        command: render_grade_command(&args),
        unmarked_policy: args.unmarked_policy,
        rank_policy,
        duplicates,
        counts,
        results,
    };

    let grade_manifest_path = args.grade_manifest_path.clone().unwrap_or_else(|| {
        layout
            .manifest_dir()
            .join(format!("grade_run_{}.json", utc_compact_string(started_ts)))
    });
    write_json_pretty(&grade_manifest_path, &manifest)?;
    write_json_pretty(&layout.latest_grade_path(), &manifest)?;

    info!(path = %grade_manifest_path.display(), "wrote grade run manifest");
    info!(
        graded = manifest.counts.sheets_graded,
        scored = manifest.counts.scored_count,
        ranked = manifest.counts.ranked_count,
        errors = manifest.counts.error_count,
        "grade completed"
    );

    Ok(())
}

fn select_gradable(
    sheets: Vec<SheetEntry>,
    include_quarantined: bool,
) -> (Vec<SheetRecord>, usize, DuplicateSummary) {
    let (mut records, quarantined): (Vec<SheetRecord>, Vec<bool>) = sheets
        .into_iter()
        .map(|sheet| {
            let quarantined = sheet.ingest.is_quarantined();
            (sheet.record, quarantined)
        })
        .unzip();

    let duplicates = detect_duplicates(&mut records);

    let mut skipped = 0;
    let records = records
        .into_iter()
        .zip(quarantined)
        .filter_map(|(record, quarantined)| {
            if quarantined && !include_quarantined {
                skipped += 1;
                return None;
            }
            Some(record)
        })
        .collect();

    (records, skipped, duplicates)
}

fn render_grade_command(args: &GradeArgs) -> String {
    let mut command = vec![
        "omrgrade".to_string(),
        "grade".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    for (flag, path) in [
        ("--structure-path", &args.structure_path),
        ("--ingest-manifest-path", &args.ingest_manifest_path),
        ("--roster-path", &args.roster_path),
        ("--scoring-path", &args.scoring_path),
        ("--grade-manifest-path", &args.grade_manifest_path),
    ] {
        if let Some(path) = path {
            command.push(flag.to_string());
            command.push(path.display().to_string());
        }
    }

    command.push(format!("--unmarked-policy={}", value_name(args.unmarked_policy)));
    command.push(format!("--rank-scope={}", value_name(args.rank_scope)));
    command.push(format!("--ties={}", value_name(args.ties)));
    if args.rank_duplicates {
        command.push("--rank-duplicates".to_string());
    }
    if args.include_quarantined {
        command.push("--include-quarantined".to_string());
    }

    command.join(" ")
}

fn value_name<T: ValueEnum>(value: T) -> String {
    value
        .to_possible_value()
        .map(|possible| possible.get_name().to_string())
        .unwrap_or_default()
}
