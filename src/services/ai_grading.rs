use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;
use crate::services::grading::{EssayEvaluator, EssayPrompt, EssayVerdict};

const MAX_RETRIES: u32 = 3;

const ESSAY_SYSTEM_PROMPT: &str = r#"You are an experienced teacher grading a short essay answer on a practice exam.
Grade only against the question and, when given, the model answer. Be strict but fair:
reward correct concepts and reasoning, do not reward length.

Respond with strict JSON:
{
  "score": <number between 0 and the maximum points>,
  "feedback": "<two or three sentences for the student>"
}
"#;

#[derive(Debug, Deserialize)]
struct EssayGrade {
    score: f64,
    #[serde(default)]
    feedback: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AiGradingService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AiGradingService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.grading().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.grading().api_key.clone(),
            base_url: settings.grading().base_url.trim_end_matches('/').to_string(),
            model: settings.grading().model.clone(),
            max_tokens: settings.grading().max_tokens,
            temperature: settings.grading().temperature,
        })
    }

    fn user_prompt(prompt: &EssayPrompt<'_>) -> String {
        let model_answer = prompt.model_answer.unwrap_or("(none provided)");
        format!(
            "Question:\n{}\n\nModel answer:\n{}\n\nMaximum points: {}\n\nStudent answer:\n{}\n",
            prompt.question, model_answer, prompt.max_points, prompt.answer
        )
    }

    async fn complete(&self, payload: &Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.client.post(&url).bearer_auth(&self.api_key).json(payload).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body: Value = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        return Ok(body);
                    }
                    // Client errors other than rate limiting will not improve on retry.
                    if status.is_client_error() && status.as_u16() != 429 {
                        anyhow::bail!("AI API rejected request ({status}): {body}");
                    }
                    last_error = Some(anyhow::anyhow!("AI API error ({status}): {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call AI API"));
                }
            }

            if attempt < MAX_RETRIES {
                tracing::warn!(attempt, "AI grading request failed, retrying");
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("AI API request failed")))
    }
}

#[async_trait]
impl EssayEvaluator for AiGradingService {
    async fn evaluate(&self, prompt: EssayPrompt<'_>) -> Result<EssayVerdict> {
        if self.api_key.is_empty() {
            anyhow::bail!("AI grading is not configured (OPENAI_API_KEY is empty)");
        }

        let timer = Instant::now();
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": ESSAY_SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(&prompt)}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        let body = self.complete(&payload).await?;
        let verdict = parse_completion(&body)?;

        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|value| value.as_u64());
        tracing::info!(
            model = %self.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used = tokens_used,
            "AI essay grading completed"
        );

        Ok(verdict)
    }
}

fn parse_completion(body: &Value) -> Result<EssayVerdict> {
    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|value| value.as_str())
        .context("Missing AI response content")?;

    let grade: EssayGrade = serde_json::from_str(content).context("Failed to parse AI JSON")?;
    if !grade.score.is_finite() {
        anyhow::bail!("AI returned a non-numeric score");
    }
    Ok(EssayVerdict { score: grade.score, feedback: grade.feedback })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str) -> Value {
        json!({"choices": [{"message": {"content": content}}], "usage": {"total_tokens": 42}})
    }

    #[test]
    fn parses_score_and_feedback() {
        let verdict =
            parse_completion(&completion(r#"{"score": 3.5, "feedback": "Good outline."}"#)).unwrap();
        assert_eq!(verdict, EssayVerdict { score: 3.5, feedback: "Good outline.".to_string() });
    }

    #[test]
    fn feedback_is_optional() {
        let verdict = parse_completion(&completion(r#"{"score": 1}"#)).unwrap();
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.feedback.is_empty());
    }

    #[test]
    fn rejects_missing_content_and_invalid_json() {
        assert!(parse_completion(&json!({"choices": []})).is_err());
        assert!(parse_completion(&completion("not json")).is_err());
        assert!(parse_completion(&completion(r#"{"feedback": "no score"}"#)).is_err());
    }

    #[test]
    fn prompt_mentions_missing_model_answer() {
        let prompt = EssayPrompt {
            question: "Explain osmosis",
            model_answer: None,
            answer: "Water moves",
            max_points: 4.0,
        };
        let text = AiGradingService::user_prompt(&prompt);
        assert!(text.contains("Explain osmosis"));
        assert!(text.contains("(none provided)"));
        assert!(text.contains("Maximum points: 4"));
    }

    #[tokio::test]
    async fn unconfigured_service_fails_without_network() {
        let _guard = crate::test_support::env_lock().await;
        crate::test_support::set_test_env();
        std::env::set_var("OPENAI_API_KEY", "");
        let settings = Settings::load().unwrap();
        let service = AiGradingService::from_settings(&settings).unwrap();
        let prompt =
            EssayPrompt { question: "q", model_answer: None, answer: "a", max_points: 1.0 };
        assert!(service.evaluate(prompt).await.is_err());
    }
}
