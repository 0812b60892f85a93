use serde::{Deserialize, Serialize};

/// A round is always played with this many questions.
pub const QUESTIONS_PER_ROUND: usize = 5;
/// Every question presents exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn display_name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && self.options.len() == OPTIONS_PER_QUESTION
            && self.correct_index < OPTIONS_PER_QUESTION
    }

    /// The question as shown to players: no correct index.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }
}

/// Player-facing question, stripped of the answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
}

/// A question as the generation service emits it, before validation.
/// Field names follow the service's JSON contract.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(rename = "correctAnswerIndex", default)]
    pub correct_answer_index: i64,
}

/// Validate generated questions: drop entries with missing text or fewer
/// than 4 options, truncate extra options, clamp the answer index, and cap
/// the set at one round's worth.
pub fn sanitize_questions(raw: Vec<RawQuestion>) -> Vec<Question> {
    raw.into_iter()
        .filter_map(|q| {
            let text = q.question.trim().to_string();
            if text.is_empty() || q.options.len() < OPTIONS_PER_QUESTION {
                return None;
            }
            let options: Vec<String> = q
                .options
                .into_iter()
                .take(OPTIONS_PER_QUESTION)
                .map(|o| o.trim().to_string())
                .collect();
            let correct_index =
                q.correct_answer_index.clamp(0, OPTIONS_PER_QUESTION as i64 - 1) as usize;
            Some(Question {
                text,
                options,
                correct_index,
            })
        })
        .take(QUESTIONS_PER_ROUND)
        .collect()
}
