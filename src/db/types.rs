use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Identification,
    Essay,
}

impl QuestionType {
    /// Objective questions are graded by comparison with the stored answer key.
    pub fn is_objective(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::Identification)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Identification => "identification",
            QuestionType::Essay => "essay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}
