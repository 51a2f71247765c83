use std::collections::HashSet;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::{CacheLayout, ValidateArgs};
use crate::engine::scoring::ScoringTableFile;
use crate::engine::structure::StructureConfig;
use crate::util::read_json;

pub fn run(args: ValidateArgs) -> Result<()> {
    let layout = CacheLayout::new(&args.cache_root);
    let structure = StructureConfig::load(args.structure_path.as_deref())?;

    info!(
        questions = structure.question_count,
        options = structure.options_per_question,
        timing_marks = structure.timing_mark_count,
        barcode_slots = structure.barcode_slot_count,
        semantics = ?structure.barcode_semantics,
        "sheet structure is valid"
    );

    let scoring_path = args
        .scoring_path
        .clone()
        .unwrap_or_else(|| layout.scoring_path());
    if !scoring_path.exists() {
        warn!(path = %scoring_path.display(), "scoring table missing; nothing else to check");
        return Ok(());
    }

    let definition: ScoringTableFile = read_json(&scoring_path)?;
    let issues = check_scoring_definition(&structure, &definition);
    for issue in &issues {
        warn!(path = %scoring_path.display(), issue = %issue, "scoring table issue");
    }

    if !issues.is_empty() {
        bail!(
            "scoring table {} has {} issue(s) against the sheet structure",
            scoring_path.display(),
            issues.len()
        );
    }

    info!(path = %scoring_path.display(), rows = definition.rows.len(), "scoring table is valid");
    Ok(())
}

pub fn check_scoring_definition(
    structure: &StructureConfig,
    definition: &ScoringTableFile,
) -> Vec<String> {
    let mut issues = Vec::new();

    if definition.option_labels.len() > structure.options_per_question {
        issues.push(format!(
            "{} option labels for {} options",
            definition.option_labels.len(),
            structure.options_per_question
        ));
    }

    let mut seen = HashSet::new();
    for row in &definition.rows {
        if row.question == 0 || row.question as usize > structure.question_count {
            issues.push(format!(
                "row for question {} outside 1..={}",
                row.question, structure.question_count
            ));
            continue;
        }
        if !seen.insert(row.question) {
            issues.push(format!("question {} defined more than once", row.question));
        }
        if row.scores.len() > structure.options_per_question {
            issues.push(format!(
                "question {} lists {} scores for {} options",
                row.question,
                row.scores.len(),
                structure.options_per_question
            ));
        }
    }

    issues
}
