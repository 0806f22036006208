use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExamQuestion};
use crate::db::types::QuestionType;
use crate::services::grading::choice_index;
use crate::session::model;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    pub(crate) question_type: QuestionType,
    #[validate(length(min = 1, max = 4000, message = "question must be 1-4000 characters"))]
    pub(crate) question: String,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) correct_answer: Option<String>,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 100, message = "points must be between 1 and 100"))]
    pub(crate) points: i32,
}

impl QuestionCreate {
    /// Checks the constraints that depend on the question type.
    pub(crate) fn check_shape(&self) -> Result<(), String> {
        let options = self.options.as_deref().unwrap_or_default();
        let has_key = self.correct_answer.as_deref().is_some_and(|key| !key.trim().is_empty());
        match self.question_type {
            QuestionType::MultipleChoice => {
                if options.len() < 2 {
                    return Err("multiple_choice questions need at least two options".to_string());
                }
                if options.len() > 26 {
                    return Err("multiple_choice questions support at most 26 options".to_string());
                }
                let Some(key) = self.correct_answer.as_deref().filter(|_| has_key) else {
                    return Err("multiple_choice questions need a correct_answer".to_string());
                };
                if choice_index(key, options).is_none() {
                    return Err(format!("correct_answer {key:?} matches none of the options"));
                }
            }
            QuestionType::Identification => {
                if !has_key {
                    return Err("identification questions need a correct_answer".to_string());
                }
            }
            QuestionType::Essay => {
                if !options.is_empty() {
                    return Err("essay questions do not take options".to_string());
                }
            }
        }
        Ok(())
    }
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 600, message = "time_limit_minutes must be between 1 and 600"))]
    pub(crate) time_limit_minutes: Option<i32>,
    #[serde(default)]
    pub(crate) is_public: bool,
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

impl ExamCreate {
    pub(crate) const MAX_QUESTIONS: usize = 200;

    /// Checks the question count and each question's type-specific shape.
    pub(crate) fn check_questions(&self) -> Result<(), String> {
        if self.questions.is_empty() || self.questions.len() > Self::MAX_QUESTIONS {
            return Err(format!("an exam needs 1-{} questions", Self::MAX_QUESTIONS));
        }
        for (index, question) in self.questions.iter().enumerate() {
            question.check_shape().map_err(|message| format!("questions[{index}]: {message}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) is_public: bool,
    pub(crate) created_at: String,
}

impl From<Exam> for ExamSummary {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            time_limit_minutes: exam.time_limit_minutes,
            is_public: exam.is_public,
            created_at: format_primitive(exam.created_at),
        }
    }
}

/// Student-facing exam with questions ordered by position. Drops answer keys.
pub(crate) fn exam_response(exam: Exam, questions: Vec<ExamQuestion>) -> model::Exam {
    model::Exam {
        id: exam.id,
        title: exam.title,
        description: exam.description,
        time_limit_minutes: exam.time_limit_minutes,
        questions: questions
            .into_iter()
            .map(|question| model::Question {
                id: question.id,
                question_type: question.question_type,
                question: question.question,
                options: question.options.map(|options| options.0),
                points: question.points,
                position: question.position,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionType, options: Option<Vec<&str>>, key: Option<&str>) -> QuestionCreate {
        QuestionCreate {
            question_type: kind,
            question: "What is ATP?".to_string(),
            options: options.map(|options| options.into_iter().map(str::to_string).collect()),
            correct_answer: key.map(str::to_string),
            points: 1,
        }
    }

    #[test]
    fn multiple_choice_requires_options_and_key() {
        assert!(question(QuestionType::MultipleChoice, Some(vec!["A) x"]), Some("A")).check_shape().is_err());
        assert!(question(QuestionType::MultipleChoice, Some(vec!["x", "y"]), None).check_shape().is_err());
        assert!(question(QuestionType::MultipleChoice, Some(vec!["x", "y"]), Some("B")).check_shape().is_ok());
    }

    #[test]
    fn multiple_choice_key_must_name_an_option() {
        let options = Some(vec!["A) Mitochondria", "B) Ribosome", "C) Nucleus"]);
        assert!(question(QuestionType::MultipleChoice, options.clone(), Some("Z")).check_shape().is_err());
        assert!(question(QuestionType::MultipleChoice, options.clone(), Some("D")).check_shape().is_err());
        assert!(question(QuestionType::MultipleChoice, options.clone(), Some("Golgi")).check_shape().is_err());
        assert!(question(QuestionType::MultipleChoice, options.clone(), Some("c")).check_shape().is_ok());
        assert!(question(QuestionType::MultipleChoice, options, Some("Ribosome")).check_shape().is_ok());
    }

    #[test]
    fn identification_requires_key_and_essay_rejects_options() {
        assert!(question(QuestionType::Identification, None, Some("  ")).check_shape().is_err());
        assert!(question(QuestionType::Identification, None, Some("ATP")).check_shape().is_ok());
        assert!(question(QuestionType::Essay, Some(vec!["x"]), None).check_shape().is_err());
        assert!(question(QuestionType::Essay, None, None).check_shape().is_ok());
    }

    #[test]
    fn exam_payload_validates_nested_questions() {
        let payload: ExamCreate = serde_json::from_value(serde_json::json!({
            "title": "Biology",
            "time_limit_minutes": 0,
            "questions": [{"question_type": "essay", "question": ""}]
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err().to_string();
        assert!(errors.contains("time_limit_minutes"));
        assert!(errors.contains("question"));
    }

    #[test]
    fn exam_needs_between_one_and_two_hundred_questions() {
        let exam = |count: usize| ExamCreate {
            title: "Biology".to_string(),
            description: None,
            time_limit_minutes: None,
            is_public: false,
            questions: (0..count).map(|_| question(QuestionType::Essay, None, None)).collect(),
        };

        assert!(exam(0).check_questions().is_err());
        assert!(exam(1).check_questions().is_ok());
        assert!(exam(200).check_questions().is_ok());
        assert!(exam(201).check_questions().is_err());
    }

    #[test]
    fn question_errors_name_their_position() {
        let mut payload = ExamCreate {
            title: "Biology".to_string(),
            description: None,
            time_limit_minutes: None,
            is_public: false,
            questions: vec![question(QuestionType::Essay, None, None)],
        };
        payload.questions.push(question(QuestionType::Identification, None, None));

        let message = payload.check_questions().unwrap_err();
        assert!(message.starts_with("questions[1]"), "{message}");
    }
}
