use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::ExamQuestion;
use crate::db::types::QuestionType;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("essay evaluation failed for question {question_id}")]
    Essay {
        question_id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EssayPrompt<'a> {
    pub(crate) question: &'a str,
    pub(crate) model_answer: Option<&'a str>,
    pub(crate) answer: &'a str,
    pub(crate) max_points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EssayVerdict {
    pub(crate) score: f64,
    pub(crate) feedback: String,
}

/// Scores free-text answers. Implemented by the AI grading service.
#[async_trait]
pub(crate) trait EssayEvaluator: Send + Sync {
    async fn evaluate(&self, prompt: EssayPrompt<'_>) -> anyhow::Result<EssayVerdict>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradedQuestion {
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) answer: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: f64,
    pub(crate) max_points: f64,
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradedAttempt {
    pub(crate) questions: Vec<GradedQuestion>,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
}

/// Grades every question of an exam against the persisted answers.
///
/// Objective questions are compared with their answer key. Non-blank essays go
/// through `essays`; a single evaluator failure fails the whole attempt so that
/// no partial score is ever produced.
pub(crate) async fn grade_attempt(
    questions: &[ExamQuestion],
    answers: &HashMap<String, String>,
    essays: &dyn EssayEvaluator,
) -> Result<GradedAttempt, GradingError> {
    let essay_count =
        questions.iter().filter(|q| q.question_type == QuestionType::Essay).count();
    tracing::debug!(
        questions = questions.len(),
        essays = essay_count,
        answered = answers.len(),
        "Grading attempt"
    );

    let mut graded = Vec::with_capacity(questions.len());
    for question in questions {
        let answer = answers.get(&question.id).map(String::as_str);
        let max_points = f64::from(question.points);
        let outcome = match question.question_type {
            QuestionType::MultipleChoice => grade_multiple_choice(question, answer),
            QuestionType::Identification => grade_identification(question, answer),
            QuestionType::Essay => grade_essay(question, answer, essays).await?,
        };

        graded.push(GradedQuestion {
            question_id: question.id.clone(),
            question_type: question.question_type,
            answer: answer.map(str::to_string),
            is_correct: outcome.is_correct,
            points_earned: outcome.points.clamp(0.0, max_points),
            max_points,
            feedback: outcome.feedback,
        });
    }

    let score: f64 = graded.iter().map(|q| q.points_earned).sum();
    let max_score: f64 = graded.iter().map(|q| q.max_points).sum();

    Ok(GradedAttempt { questions: graded, score, max_score, percentage: percentage(score, max_score) })
}

pub(crate) fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    (score / max_score * 1000.0).round() / 10.0
}

struct Outcome {
    is_correct: Option<bool>,
    points: f64,
    feedback: Option<String>,
}

impl Outcome {
    fn objective(correct: bool, points: i32) -> Self {
        Self {
            is_correct: Some(correct),
            points: if correct { f64::from(points) } else { 0.0 },
            feedback: None,
        }
    }

    fn unscored(feedback: &str) -> Self {
        Self { is_correct: None, points: 0.0, feedback: Some(feedback.to_string()) }
    }
}

fn grade_multiple_choice(question: &ExamQuestion, answer: Option<&str>) -> Outcome {
    let options = question.options.as_ref().map(|options| options.0.as_slice()).unwrap_or(&[]);
    let Some(key) = question.correct_answer.as_deref().and_then(|key| choice_index(key, options))
    else {
        tracing::warn!(question_id = %question.id, "Multiple choice question has no usable answer key");
        return Outcome::unscored("Answer key missing");
    };

    let selected = answer.and_then(|answer| choice_index(answer, options));
    Outcome::objective(selected == Some(key), question.points)
}

fn grade_identification(question: &ExamQuestion, answer: Option<&str>) -> Outcome {
    let Some(key) = question.correct_answer.as_deref().map(normalize_text).filter(|k| !k.is_empty())
    else {
        tracing::warn!(question_id = %question.id, "Identification question has no answer key");
        return Outcome::unscored("Answer key missing");
    };

    let correct = answer.map(normalize_text).is_some_and(|given| given == key);
    Outcome::objective(correct, question.points)
}

async fn grade_essay(
    question: &ExamQuestion,
    answer: Option<&str>,
    essays: &dyn EssayEvaluator,
) -> Result<Outcome, GradingError> {
    let Some(answer) = answer.map(str::trim).filter(|answer| !answer.is_empty()) else {
        return Ok(Outcome::unscored("No answer provided"));
    };

    let prompt = EssayPrompt {
        question: &question.question,
        model_answer: question.correct_answer.as_deref(),
        answer,
        max_points: f64::from(question.points),
    };
    let verdict = essays.evaluate(prompt).await.map_err(|source| GradingError::Essay {
        question_id: question.id.clone(),
        source,
    })?;

    let points = if verdict.score.is_finite() { verdict.score } else { 0.0 };
    Ok(Outcome { is_correct: None, points, feedback: Some(verdict.feedback) })
}

/// Resolves a choice to its option index. Accepts a letter (`"b"`, `" C "`) or
/// the option text itself, with or without a `"A) "` style prefix.
pub(crate) fn choice_index(raw: &str, options: &[String]) -> Option<usize> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() {
            let index = usize::from(letter.to_ascii_uppercase() as u8 - b'A');
            return (options.is_empty() || index < options.len()).then_some(index);
        }
    }

    let wanted = normalize_text(strip_choice_prefix(raw));
    options
        .iter()
        .position(|option| normalize_text(strip_choice_prefix(option)) == wanted)
        .filter(|_| !wanted.is_empty())
}

fn strip_choice_prefix(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && matches!(bytes[1], b')' | b'.') {
        value[2..].trim_start()
    } else {
        value
    }
}

fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sqlx::types::Json;

    use super::*;

    struct FixedEvaluator {
        score: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EssayEvaluator for FixedEvaluator {
        async fn evaluate(&self, _prompt: EssayPrompt<'_>) -> anyhow::Result<EssayVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EssayVerdict { score: self.score, feedback: "ok".to_string() })
        }
    }

    struct FailingEvaluator;

    #[async_trait]
    impl EssayEvaluator for FailingEvaluator {
        async fn evaluate(&self, _prompt: EssayPrompt<'_>) -> anyhow::Result<EssayVerdict> {
            Err(anyhow::anyhow!("upstream unavailable"))
        }
    }

    fn question(id: &str, kind: QuestionType, key: Option<&str>, points: i32) -> ExamQuestion {
        ExamQuestion {
            id: id.to_string(),
            exam_id: "exam-1".to_string(),
            question_type: kind,
            question: format!("Question {id}"),
            options: (kind == QuestionType::MultipleChoice).then(|| {
                Json(vec![
                    "A) Mitochondria".to_string(),
                    "B) Ribosome".to_string(),
                    "C) Nucleus".to_string(),
                ])
            }),
            correct_answer: key.map(str::to_string),
            points,
            position: 0,
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn grades_mixed_exam_and_totals_points() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, Some("B"), 2),
            question("q2", QuestionType::Identification, Some("Photosynthesis"), 3),
            question("q3", QuestionType::Essay, Some("Cells divide"), 5),
        ];
        let evaluator = FixedEvaluator { score: 4.0, calls: AtomicUsize::new(0) };

        let graded = grade_attempt(
            &questions,
            &answers(&[("q1", " b "), ("q2", "  photosynthesis\n"), ("q3", "Mitosis splits")]),
            &evaluator,
        )
        .await
        .unwrap();

        assert_eq!(graded.score, 9.0);
        assert_eq!(graded.max_score, 10.0);
        assert_eq!(graded.percentage, 90.0);
        assert_eq!(graded.questions[0].is_correct, Some(true));
        assert_eq!(graded.questions[1].is_correct, Some(true));
        assert_eq!(graded.questions[2].is_correct, None);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unanswered_questions_score_zero_and_blank_essays_skip_the_evaluator() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, Some("A"), 1),
            question("q2", QuestionType::Essay, None, 4),
        ];
        let evaluator = FixedEvaluator { score: 4.0, calls: AtomicUsize::new(0) };

        let graded = grade_attempt(&questions, &answers(&[("q2", "   ")]), &evaluator).await.unwrap();

        assert_eq!(graded.score, 0.0);
        assert_eq!(graded.questions[0].is_correct, Some(false));
        assert_eq!(graded.questions[0].answer, None);
        assert_eq!(graded.questions[1].feedback.as_deref(), Some("No answer provided"));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn essay_scores_are_clamped_to_question_points() {
        let questions = vec![question("q1", QuestionType::Essay, None, 3)];
        let generous = FixedEvaluator { score: 12.0, calls: AtomicUsize::new(0) };
        let graded = grade_attempt(&questions, &answers(&[("q1", "text")]), &generous).await.unwrap();
        assert_eq!(graded.questions[0].points_earned, 3.0);

        let negative = FixedEvaluator { score: -2.0, calls: AtomicUsize::new(0) };
        let graded = grade_attempt(&questions, &answers(&[("q1", "text")]), &negative).await.unwrap();
        assert_eq!(graded.questions[0].points_earned, 0.0);
    }

    #[tokio::test]
    async fn evaluator_failure_fails_the_whole_attempt() {
        let questions = vec![
            question("q1", QuestionType::MultipleChoice, Some("A"), 1),
            question("q2", QuestionType::Essay, None, 4),
        ];

        let err = grade_attempt(&questions, &answers(&[("q1", "A"), ("q2", "words")]), &FailingEvaluator)
            .await
            .unwrap_err();

        match err {
            GradingError::Essay { question_id, .. } => assert_eq!(question_id, "q2"),
        }
    }

    #[test]
    fn multiple_choice_accepts_option_text_as_key() {
        let q = question("q1", QuestionType::MultipleChoice, Some("Nucleus"), 1);
        assert_eq!(grade_multiple_choice(&q, Some("c")).is_correct, Some(true));
        assert_eq!(grade_multiple_choice(&q, Some("A")).is_correct, Some(false));
        assert_eq!(grade_multiple_choice(&q, Some("Z")).is_correct, Some(false));
    }

    #[test]
    fn missing_key_leaves_question_unscored() {
        let q = question("q1", QuestionType::Identification, None, 2);
        let outcome = grade_identification(&q, Some("anything"));
        assert_eq!(outcome.is_correct, None);
        assert_eq!(outcome.points, 0.0);
    }

    #[test]
    fn identification_collapses_inner_whitespace() {
        let q = question("q1", QuestionType::Identification, Some("Golgi apparatus"), 1);
        assert_eq!(grade_identification(&q, Some(" golgi\t  APPARATUS ")).is_correct, Some(true));
        assert_eq!(grade_identification(&q, Some("golgi")).is_correct, Some(false));
    }

    #[test]
    fn percentage_is_rounded_to_one_decimal() {
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(0.0, 0.0), 0.0);
    }
}
