use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::structure::StructureConfig;
use crate::model::MarkVerdict;

const ERROR_SEPARATOR: &str = "; ";
const ROOM_NUMBER_RANGE: (u32, u32) = (1, 12);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Session {
    Morning,
    Afternoon,
}

impl Session {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub image_id: String,
    pub image_file_name: String,
    pub student_id: Option<String>,
    pub interview_id: Option<String>,
    pub question_markings: Vec<Option<u8>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_fields: BTreeMap<String, String>,
    pub has_errors: bool,
    pub error_message: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_count: usize,
}

impl SheetRecord {
    pub fn new(
        image_id: impl Into<String>,
        image_file_name: impl Into<String>,
        structure: &StructureConfig,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            image_file_name: image_file_name.into(),
            question_markings: vec![None; structure.question_count],
            duplicate_count: 1,
            ..Self::default()
        }
    }

    pub fn append_error(&mut self, message: &str) {
        self.has_errors = true;

        match self.error_message.as_mut() {
            Some(existing) => {
                if existing.split(ERROR_SEPARATOR).any(|segment| segment == message) {
                    return;
                }
                existing.push_str(ERROR_SEPARATOR);
                existing.push_str(message);
            }
            None => self.error_message = Some(message.to_string()),
        }
    }

    pub fn marking(&self, question: u32) -> Option<u8> {
        let index = (question as usize).checked_sub(1)?;
        self.question_markings.get(index).copied().flatten()
    }

    pub fn session(&self) -> Option<Session> {
        session_of(self.student_id.as_deref()?)
    }

    pub fn room_number(&self) -> Option<String> {
        room_number_of(self.student_id.as_deref()?)
    }

    pub fn order_number(&self) -> Option<String> {
        order_number_of(self.student_id.as_deref()?)
    }

    pub fn combined_id(&self) -> Option<String> {
        combined_id(self.student_id.as_deref(), self.interview_id.as_deref())
    }

    pub fn is_error_only(&self) -> bool {
        self.has_errors && !self.is_duplicate
    }
}

pub fn session_of(student_id: &str) -> Option<Session> {
    match char_slice(student_id, 0, 2)?.as_str() {
        "91" => Some(Session::Morning),
        "92" => Some(Session::Afternoon),
        _ => None,
    }
}

pub fn room_number_of(student_id: &str) -> Option<String> {
    let code = char_slice(student_id, 2, 4)?;
    let room = code.parse::<u32>().ok()?;
    (ROOM_NUMBER_RANGE.0..=ROOM_NUMBER_RANGE.1)
        .contains(&room)
        .then_some(code)
}

pub fn order_number_of(student_id: &str) -> Option<String> {
    char_slice(student_id, 4, 6)
}

pub fn combined_id(student_id: Option<&str>, interview_id: Option<&str>) -> Option<String> {
    match (student_id, interview_id) {
        (Some(student), Some(interview)) => Some(format!("{student}{interview}")),
        (Some(single), None) | (None, Some(single)) => Some(single.to_string()),
        (None, None) => None,
    }
}

fn char_slice(value: &str, start: usize, end: usize) -> Option<String> {
    if value.chars().count() < end {
        return None;
    }
    Some(value.chars().skip(start).take(end - start).collect())
}

pub fn resolve_marking(option_marks: &[bool]) -> Option<u8> {
    let mut marked = option_marks
        .iter()
        .enumerate()
        .filter(|(_, is_marked)| **is_marked)
        .map(|(index, _)| index);

    let first = marked.next()?;
    if marked.next().is_some() {
        return None;
    }
    u8::try_from(first + 1).ok()
}

pub fn resolve_question_markings(
    structure: &StructureConfig,
    verdicts: &[MarkVerdict],
) -> Vec<Option<u8>> {
    let mut grid = vec![vec![false; structure.options_per_question]; structure.question_count];

    for verdict in verdicts {
        let in_range = verdict.question >= 1
            && verdict.question as usize <= structure.question_count
            && structure.is_valid_option(verdict.option);
        if !in_range {
            warn!(
                question = verdict.question,
                option = verdict.option,
                "ignoring mark verdict outside sheet structure"
            );
            continue;
        }

        if verdict.is_marked {
            grid[verdict.question as usize - 1][verdict.option as usize - 1] = true;
        }
    }

    grid.iter().map(|options| resolve_marking(options)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(question: u32, option: u32, is_marked: bool) -> MarkVerdict {
        MarkVerdict {
            question,
            option,
            is_marked,
            average_brightness: if is_marked { 0.2 } else { 0.9 },
        }
    }

    #[test]
    fn combined_id_joins_present_parts() {
        assert_eq!(
            combined_id(Some("12345678"), Some("99")).as_deref(),
            Some("1234567899")
        );
        assert_eq!(combined_id(None, Some("99")).as_deref(), Some("99"));
        assert_eq!(combined_id(Some("1234"), None).as_deref(), Some("1234"));
        assert_eq!(combined_id(None, None), None);
    }

    #[test]
    fn session_reads_two_char_prefix() {
        assert_eq!(session_of("9101010203"), Some(Session::Morning));
        assert_eq!(session_of("9201010203"), Some(Session::Afternoon));
        assert_eq!(session_of("1234"), None);
        assert_eq!(session_of("9"), None);
    }

    #[test]
    fn room_number_requires_code_in_range() {
        assert_eq!(room_number_of("910013"), None);
        assert_eq!(room_number_of("910513").as_deref(), Some("05"));
        assert_eq!(room_number_of("911213").as_deref(), Some("12"));
        assert_eq!(room_number_of("911313"), None);
        assert_eq!(room_number_of("91x113"), None);
        assert_eq!(room_number_of("910"), None);
    }

    #[test]
    fn order_number_is_kept_verbatim() {
        assert_eq!(order_number_of("9105ab").as_deref(), Some("ab"));
        assert_eq!(order_number_of("91050"), None);
    }

    #[test]
    fn derived_fields_are_absent_without_student_id() {
        let record = SheetRecord {
            interview_id: Some("07".to_string()),
            ..SheetRecord::default()
        };
        assert_eq!(record.session(), None);
        assert_eq!(record.room_number(), None);
        assert_eq!(record.order_number(), None);
        assert_eq!(record.combined_id().as_deref(), Some("07"));
    }

    #[test]
    fn resolve_marking_accepts_exactly_one_mark() {
        let mut slots = [false; 12];
        assert_eq!(resolve_marking(&slots), None);

        slots[6] = true;
        assert_eq!(resolve_marking(&slots), Some(7));

        slots[2] = true;
        assert_eq!(resolve_marking(&slots), None);
    }

    #[test]
    fn resolve_question_markings_groups_by_question() {
        let structure = StructureConfig::default();
        let verdicts = vec![
            mark(1, 3, true),
            mark(1, 4, false),
            mark(2, 1, true),
            mark(2, 12, true),
            mark(4, 12, true),
            mark(5, 1, true),
            mark(1, 13, true),
        ];

        let markings = resolve_question_markings(&structure, &verdicts);
        assert_eq!(markings, vec![Some(3), None, None, Some(12)]);
    }

    #[test]
    fn append_error_joins_segments_without_repeating() {
        let mut record = SheetRecord::default();
        record.append_error("StudentId decode failed");
        record.append_error("question 2 unmarked");
        record.append_error("StudentId decode failed");

        assert!(record.has_errors);
        assert_eq!(
            record.error_message.as_deref(),
            Some("StudentId decode failed; question 2 unmarked")
        );
    }

    #[test]
    fn error_only_excludes_duplicates() {
        let mut record = SheetRecord::default();
        assert!(!record.is_error_only());

        record.has_errors = true;
        assert!(record.is_error_only());

        record.is_duplicate = true;
        assert!(!record.is_error_only());
    }
}
