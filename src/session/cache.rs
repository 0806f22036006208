//! Local answer cache with per-question dirty tracking.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    value: String,
    /// Last value confirmed written to the backend.
    persisted: Option<String>,
}

impl Entry {
    fn is_dirty(&self) -> bool {
        match &self.persisted {
            Some(persisted) => persisted != &self.value,
            // Nothing stored yet and nothing typed.
            None => !self.value.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent.
    pub percentage: u8,
}

impl Progress {
    pub fn new(answered: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((answered.min(total) as f64 / total as f64) * 100.0).round() as u8
        };
        Self { answered, total, percentage }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnswerCache {
    entries: HashMap<String, Entry>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded from stored responses; every seeded entry is clean.
    pub fn from_persisted(answers: HashMap<String, String>) -> Self {
        let entries = answers
            .into_iter()
            .map(|(question_id, answer)| {
                (question_id, Entry { value: answer.clone(), persisted: Some(answer) })
            })
            .collect();
        Self { entries }
    }

    /// Local mutation only.
    pub fn set(&mut self, question_id: &str, value: impl Into<String>) {
        self.entries.entry(question_id.to_string()).or_default().value = value.into();
    }

    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.entries.get(question_id).map(|entry| entry.value.as_str())
    }

    pub fn is_dirty(&self, question_id: &str) -> bool {
        self.entries.get(question_id).is_some_and(Entry::is_dirty)
    }

    /// The value a flush should write, or `None` when the entry is clean or absent.
    pub fn pending(&self, question_id: &str) -> Option<&str> {
        self.entries
            .get(question_id)
            .filter(|entry| entry.is_dirty())
            .map(|entry| entry.value.as_str())
    }

    /// Records a confirmed write of `value`. The entry stays dirty if it was
    /// edited again while the write was in flight.
    pub fn mark_persisted(&mut self, question_id: &str, value: &str) {
        self.entries.entry(question_id.to_string()).or_default().persisted = Some(value.to_string());
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.get(question_id).is_some_and(|value| !value.trim().is_empty())
    }

    pub fn progress<'a>(&self, question_ids: impl IntoIterator<Item = &'a str>) -> Progress {
        let mut total = 0;
        let mut answered = 0;
        for question_id in question_ids {
            total += 1;
            if self.is_answered(question_id) {
                answered += 1;
            }
        }
        Progress::new(answered, total)
    }
}
