use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::roster::Roster;
use crate::engine::scoring::ScoringTable;
use crate::engine::sheet::SheetRecord;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
pub enum UnmarkedPolicy {
    #[default]
    Exclude,
    FlagError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub image_id: String,
    pub image_file_name: String,
    pub student_id: Option<String>,
    pub interview_id: Option<String>,
    pub combined_id: Option<String>,
    pub session: Option<String>,
    pub room_number: Option<String>,
    pub order_number: Option<String>,
    pub question_markings: Vec<Option<u8>>,
    pub has_errors: bool,
    pub error_message: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_count: usize,

    pub student_name: Option<String>,
    pub group: Option<String>,
    pub interview_room: Option<String>,
    pub time: Option<String>,
    pub number: Option<String>,
    pub registration_number: Option<String>,
    pub middle_school: Option<String>,
    pub interviewer_name: Option<String>,

    pub total_score: Option<f64>,
    pub average_score: Option<f64>,
    pub rank: Option<usize>,
}

impl GradingResult {
    fn append_error(&mut self, message: &str) {
        self.has_errors = true;
        self.error_message = Some(match self.error_message.take() {
            Some(existing) => format!("{existing}; {message}"),
            None => message.to_string(),
        });
    }
}

pub struct GradingAggregator<'a> {
    scoring: &'a ScoringTable,
    roster: &'a Roster,
    unmarked_policy: UnmarkedPolicy,
}

impl<'a> GradingAggregator<'a> {
    pub fn new(
        scoring: &'a ScoringTable,
        roster: &'a Roster,
        unmarked_policy: UnmarkedPolicy,
    ) -> Self {
        Self {
            scoring,
            roster,
            unmarked_policy,
        }
    }

    pub fn aggregate(&self, records: &[SheetRecord]) -> Vec<GradingResult> {
        records.iter().map(|record| self.grade(record)).collect()
    }

    fn grade(&self, record: &SheetRecord) -> GradingResult {
        let mut result = GradingResult {
            image_id: record.image_id.clone(),
            image_file_name: record.image_file_name.clone(),
            student_id: record.student_id.clone(),
            interview_id: record.interview_id.clone(),
            combined_id: record.combined_id(),
            session: record.session().map(|session| session.as_str().to_string()),
            room_number: record.room_number(),
            order_number: record.order_number(),
            question_markings: record.question_markings.clone(),
            has_errors: record.has_errors,
            error_message: record.error_message.clone(),
            is_duplicate: record.is_duplicate,
            duplicate_count: record.duplicate_count,
            ..GradingResult::default()
        };

        if let Some(student) = record
            .student_id
            .as_deref()
            .and_then(|id| self.roster.student(id))
        {
            result.student_name = Some(student.name.clone());
            result.group = student.group.clone();
            result.interview_room = student.interview_room.clone();
            result.time = student.time.clone();
            result.number = student.number.clone();
            result.registration_number = student.registration_number.clone();
            result.middle_school = student.middle_school.clone();
        }

        result.interviewer_name = record
            .interview_id
            .as_deref()
            .and_then(|id| self.roster.interviewer(id))
            .map(|interviewer| interviewer.name.clone());

        let mut total = None::<f64>;
        for question in 1..=record.question_markings.len() as u32 {
            match record.marking(question) {
                Some(option) => {
                    let score = self.scoring.get_score(question, u32::from(option));
                    total = Some(total.unwrap_or(0.0) + score);
                }
                None if self.unmarked_policy == UnmarkedPolicy::FlagError => {
                    result.append_error(&format!("question {question} unmarked"));
                }
                None => {}
            }
        }
        result.total_score = total;

        debug!(
            image_id = %result.image_id,
            total = ?result.total_score,
            roster_match = result.student_name.is_some(),
            "graded sheet"
        );

        result
    }
}

pub trait PeerReduction {
    fn reduce(&self, results: &mut [GradingResult]);
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
pub enum PeerScope {
    #[default]
    Batch,
    Session,
    Room,
    Group,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
pub enum TieBreak {
    #[default]
    Shared,
    ByImageId,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PeerRankPolicy {
    pub scope: PeerScope,
    pub ties: TieBreak,
    pub rank_duplicates: bool,
}

impl PeerRankPolicy {
    fn peer_key(&self, result: &GradingResult) -> Option<String> {
        match self.scope {
            PeerScope::Batch => Some(String::new()),
            PeerScope::Session => result.session.clone(),
            PeerScope::Room => result.room_number.clone(),
            PeerScope::Group => result.group.clone(),
        }
    }

    fn is_eligible(&self, result: &GradingResult) -> bool {
        result.total_score.is_some() && (self.rank_duplicates || !result.is_duplicate)
    }
}

impl PeerReduction for PeerRankPolicy {
    fn reduce(&self, results: &mut [GradingResult]) {
        let mut groups = BTreeMap::<Option<String>, Vec<usize>>::new();

        for (index, result) in results.iter_mut().enumerate() {
            result.average_score = None;
            result.rank = None;
            if self.is_eligible(result) {
                groups.entry(self.peer_key(result)).or_default().push(index);
            }
        }

        for members in groups.values_mut() {
            let total_of = |index: usize| results[index].total_score.unwrap_or(0.0);

            let average = members.iter().map(|index| total_of(*index)).sum::<f64>()
                / members.len() as f64;

            members.sort_by(|left, right| {
                total_of(*right)
                    .total_cmp(&total_of(*left))
                    .then_with(|| results[*left].image_id.cmp(&results[*right].image_id))
            });

            let mut ranks = Vec::with_capacity(members.len());
            for (position, index) in members.iter().enumerate() {
                let rank = match self.ties {
                    TieBreak::ByImageId => position + 1,
                    TieBreak::Shared => {
                        let previous = position
                            .checked_sub(1)
                            .map(|prior| (members[prior], ranks[prior]));
                        match previous {
                            Some((prior, prior_rank)) if total_of(prior) == total_of(*index) => {
                                prior_rank
                            }
                            _ => position + 1,
                        }
                    }
                };
                ranks.push(rank);
            }

            for (index, rank) in members.iter().zip(ranks) {
                results[*index].average_score = Some(average);
                results[*index].rank = Some(rank);
            }
        }
    }
}
