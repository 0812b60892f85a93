use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quizcade_common::question::{
    sanitize_questions, Difficulty, Question, RawQuestion, QUESTIONS_PER_ROUND,
};

const DEFAULT_API_URL: &str =
    "https://router.huggingface.co/novita/v3/openai/chat/completions";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned status {status}")]
    Api { status: u16 },
    #[error("could not parse completion: {0}")]
    Parse(String),
    #[error("no valid questions in completion")]
    NoValidQuestions,
}

/// External question generation. Implementations may fail freely; callers
/// always recover with the local fallback generator.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, GeneratorError>;

    fn name(&self) -> &str;
}

/// Configuration for the remote question source.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        let get = |key: &str| {
            std::env::var(key).ok().and_then(|v| {
                let trimmed = v.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };

        Self {
            api_url: get("QUIZ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_token: get("QUIZ_API_TOKEN"),
            model: get("QUIZ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: get("QUIZ_GENERATION_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Build the HTTP source, or `None` when no API token is configured
    /// (the server then serves fallback questions only).
    pub fn build(&self) -> Option<HttpQuestionSource> {
        self.api_token
            .as_ref()
            .map(|token| HttpQuestionSource::new(self.clone(), token.clone()))
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// -- HTTP provider (OpenAI-compatible chat completions) --

pub struct HttpQuestionSource {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    model: String,
}

impl HttpQuestionSource {
    pub fn new(config: GeneratorConfig, api_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: config.api_url,
            api_token,
            model: config.model,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, GeneratorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a quiz generator that outputs ONLY valid JSON arrays. \
                              No explanations, no markdown, just the JSON array."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(topic, difficulty),
                },
            ],
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.9,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::Api {
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        parse_completion(content)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn difficulty_guide(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "basic facts, common knowledge, straightforward questions",
        Difficulty::Medium => "requires some knowledge, moderate complexity",
        Difficulty::Hard => "detailed knowledge, tricky options, expert level",
    }
}

fn build_prompt(topic: &str, difficulty: Difficulty) -> String {
    format!(
        "You are a quiz master. Generate exactly {count} multiple-choice trivia questions about \"{topic}\".\n\
         Difficulty: {difficulty} ({guide})\n\n\
         Requirements:\n\
         - Each question must be SPECIFICALLY about {topic} with real facts\n\
         - Include 4 answer options\n\
         - Only ONE correct answer per question\n\
         - Make incorrect options plausible but clearly wrong\n\n\
         IMPORTANT: Respond with ONLY a valid JSON array, nothing else before or after:\n\
         [\n  {{\"question\": \"Question text?\", \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"], \"correctAnswerIndex\": 0}}\n]",
        count = QUESTIONS_PER_ROUND,
        topic = topic,
        difficulty = difficulty.display_name(),
        guide = difficulty_guide(difficulty),
    )
}

/// Pull the question set out of raw completion text. Models wrap the array
/// in prose or markdown fences often enough that this has to be lenient.
pub fn parse_completion(content: &str) -> Result<Vec<Question>, GeneratorError> {
    let json = extract_json_array(content)
        .ok_or_else(|| GeneratorError::Parse("no JSON array in completion".to_string()))?;
    let cleaned = clean_json(json);
    let raw: Vec<RawQuestion> =
        serde_json::from_str(&cleaned).map_err(|e| GeneratorError::Parse(e.to_string()))?;
    let questions = sanitize_questions(raw);
    if questions.is_empty() {
        return Err(GeneratorError::NoValidQuestions);
    }
    Ok(questions)
}

fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end > start).then(|| &content[start..=end])
}

/// Scrub the usual LLM JSON defects: control characters and trailing commas.
fn clean_json(json: &str) -> String {
    let no_controls: String = json
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(no_controls.len());
    let mut chars = no_controls.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            // Drop the comma if the next non-whitespace char closes a scope.
            let mut lookahead = chars.clone();
            while let Some(&n) = lookahead.peek() {
                if n.is_whitespace() {
                    lookahead.next();
                } else {
                    break;
                }
            }
            if matches!(lookahead.peek(), Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

// -- Deterministic local fallback --

const FALLBACK_TEMPLATES: [(&str, [&str; 4], usize); 8] = [
    (
        "What is considered a key characteristic of {}?",
        ["Its uniqueness", "Its simplicity", "Its complexity", "All of these"],
        3,
    ),
    (
        "Which century saw major developments in {}?",
        ["18th century", "19th century", "20th century", "21st century"],
        2,
    ),
    (
        "What is the primary purpose of studying {}?",
        ["Entertainment", "Knowledge expansion", "Career advancement", "All of the above"],
        3,
    ),
    (
        "How has {} evolved over time?",
        ["Remained static", "Slowly changed", "Rapidly transformed", "Completely reversed"],
        2,
    ),
    (
        "What skill is most useful when learning about {}?",
        ["Critical thinking", "Memorization", "Speed reading", "Guessing"],
        0,
    ),
    (
        "Which approach is best for understanding {}?",
        ["Theoretical study", "Practical application", "Both combined", "Neither"],
        2,
    ),
    (
        "What makes {} relevant in today's world?",
        ["Historical significance", "Modern applications", "Future potential", "All of these"],
        3,
    ),
    (
        "Who would benefit most from learning about {}?",
        ["Students only", "Professionals only", "Everyone", "No one"],
        2,
    ),
];

/// Topic-templated questions with pre-baked answer keys. Deterministic: the
/// same topic always yields the same round, though different topics start at
/// different offsets in the template pool.
pub fn fallback_questions(topic: &str) -> Vec<Question> {
    let offset = topic.bytes().map(usize::from).sum::<usize>() % FALLBACK_TEMPLATES.len();
    (0..QUESTIONS_PER_ROUND)
        .map(|i| {
            let (template, options, correct_index) =
                FALLBACK_TEMPLATES[(offset + i) % FALLBACK_TEMPLATES.len()];
            Question {
                text: template.replace("{}", topic),
                options: options.iter().map(|o| o.to_string()).collect(),
                correct_index,
            }
        })
        .collect()
}

/// Ask the configured source for a round of questions; any failure, or no
/// source at all, falls back to the local generator. Generation is never a
/// user-facing error: a round always starts.
pub async fn generate_or_fallback(
    source: Option<&dyn QuestionSource>,
    topic: &str,
    difficulty: Difficulty,
) -> Vec<Question> {
    match source {
        Some(source) => match source.generate(topic, difficulty).await {
            Ok(questions) => {
                tracing::info!(
                    "Generated {} questions for topic '{}' via {}",
                    questions.len(),
                    topic,
                    source.name()
                );
                questions
            }
            Err(e) => {
                tracing::warn!(
                    "Question source {} failed for topic '{}': {}, using fallback",
                    source.name(),
                    topic,
                    e
                );
                fallback_questions(topic)
            }
        },
        None => {
            tracing::debug!("No question source configured, using fallback for '{}'", topic);
            fallback_questions(topic)
        }
    }
}
