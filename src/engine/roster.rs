use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::util::read_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub interview_room: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub middle_school: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewerInfo {
    pub interviewer_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub students: Vec<StudentInfo>,
    #[serde(default)]
    pub interviewers: Vec<InterviewerInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: HashMap<String, StudentInfo>,
    interviewers: HashMap<String, InterviewerInfo>,
}

impl Roster {
    pub fn from_file_contents(file: RosterFile) -> Self {
        let mut roster = Self::default();

        for student in file.students {
            if let Some(previous) = roster
                .students
                .insert(student.student_id.clone(), student)
            {
                warn!(student_id = %previous.student_id, "duplicate roster student; keeping last entry");
            }
        }

        for interviewer in file.interviewers {
            if let Some(previous) = roster
                .interviewers
                .insert(interviewer.interviewer_id.clone(), interviewer)
            {
                warn!(interviewer_id = %previous.interviewer_id, "duplicate roster interviewer; keeping last entry");
            }
        }

        roster
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: RosterFile = read_json(path)?;
        Ok(Self::from_file_contents(file))
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentInfo> {
        self.students.get(student_id)
    }

    pub fn interviewer(&self, interviewer_id: &str) -> Option<&InterviewerInfo> {
        self.interviewers.get(interviewer_id)
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn interviewer_count(&self) -> usize {
        self.interviewers.len()
    }
}
