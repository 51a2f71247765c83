use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::structure::StructureConfig;
use crate::util::read_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub question: u32,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringTable {
    options_per_question: usize,
    rows: Vec<ScoreRow>,
    option_labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringTableFile {
    #[serde(default)]
    pub option_labels: Vec<String>,
    #[serde(default)]
    pub rows: Vec<ScoreRow>,
}

impl ScoringTable {
    pub fn new(structure: &StructureConfig) -> Self {
        let rows = structure
            .question_numbers()
            .map(|question| ScoreRow {
                question,
                scores: vec![0.0; structure.options_per_question],
            })
            .collect();

        Self {
            options_per_question: structure.options_per_question,
            rows,
            option_labels: vec![String::new(); structure.options_per_question],
        }
    }

    pub fn from_definition(structure: &StructureConfig, definition: &ScoringTableFile) -> Self {
        let mut table = Self::new(structure);

        for (index, label) in definition.option_labels.iter().enumerate() {
            table.set_option_label(index as u32 + 1, label);
        }

        for row in &definition.rows {
            if table.row(row.question).is_none() {
                warn!(question = row.question, "scoring row for unknown question ignored");
                continue;
            }
            for (index, score) in row.scores.iter().enumerate() {
                table.set_score(row.question, index as u32 + 1, *score);
            }
        }

        table
    }

    pub fn load(structure: &StructureConfig, path: &Path) -> Result<Self> {
        let definition: ScoringTableFile = read_json(path)?;
        Ok(Self::from_definition(structure, &definition))
    }

    pub fn get_score(&self, question: u32, option: u32) -> f64 {
        if !self.option_in_range(option) {
            return 0.0;
        }

        self.row(question)
            .and_then(|row| row.scores.get(option as usize - 1))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_score(&mut self, question: u32, option: u32, value: f64) {
        if !self.option_in_range(option) {
            return;
        }
        let Some(row) = self.rows.iter_mut().find(|row| row.question == question) else {
            return;
        };

        let index = option as usize - 1;
        if row.scores.len() <= index {
            row.scores.resize(index + 1, 0.0);
        }
        row.scores[index] = value;
    }

    pub fn option_label(&self, option: u32) -> Option<&str> {
        let index = (option as usize).checked_sub(1)?;
        self.option_labels.get(index).map(String::as_str)
    }

    pub fn set_option_label(&mut self, option: u32, label: &str) {
        if !self.option_in_range(option) {
            return;
        }
        self.option_labels[option as usize - 1] = label.to_string();
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn row(&self, question: u32) -> Option<&ScoreRow> {
        self.rows.iter().find(|row| row.question == question)
    }

    fn option_in_range(&self, option: u32) -> bool {
        option >= 1 && option as usize <= self.options_per_question
    }
}
