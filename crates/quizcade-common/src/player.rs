use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::scoring::QUESTION_BUDGET_SECS;

/// Cosmetic avatars handed out by join order. The first slot doubles as the
/// leader marker and is reassigned on leader succession.
pub const AVATARS: [&str; 4] = ["👑", "🧑‍🚀", "🎮", "🎯"];
pub const LEADER_AVATAR: &str = "👑";
const FALLBACK_AVATAR: &str = "🧑‍🚀";

/// A recorded answer to one question. `choice: None` means the player never
/// answered before the budget ran out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub choice: Option<usize>,
    pub elapsed_seconds: f64,
}

impl Answer {
    pub fn new(choice: Option<usize>, elapsed_seconds: f64) -> Self {
        Self {
            // Client-reported timing is only used for scoring, never for
            // triggering resolution; clamp it into the budget window.
            elapsed_seconds: elapsed_seconds.clamp(0.0, QUESTION_BUDGET_SECS),
            choice,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            choice: None,
            elapsed_seconds: QUESTION_BUDGET_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
    pub score: u32,
    /// Keyed by question index; entries are never overwritten within a round.
    pub answers: HashMap<usize, Answer>,
}

impl Player {
    pub fn new(id: Uuid, name: String, join_index: usize) -> Self {
        let avatar = AVATARS.get(join_index).copied().unwrap_or(FALLBACK_AVATAR);
        Self {
            id,
            name,
            avatar: avatar.to_string(),
            score: 0,
            answers: HashMap::new(),
        }
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answers.contains_key(&question_index)
    }

    /// First write wins: returns false (and changes nothing) if an answer is
    /// already recorded for this question.
    pub fn record_answer(&mut self, question_index: usize, answer: Answer) -> bool {
        if self.has_answered(question_index) {
            return false;
        }
        self.answers.insert(question_index, answer);
        true
    }

    pub fn reset_answers(&mut self) {
        self.answers.clear();
    }

    pub fn reset_for_new_game(&mut self) {
        self.score = 0;
        self.answers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_by_join_order() {
        let p0 = Player::new(Uuid::new_v4(), "Ann".into(), 0);
        let p3 = Player::new(Uuid::new_v4(), "Dee".into(), 3);
        assert_eq!(p0.avatar, LEADER_AVATAR);
        assert_eq!(p3.avatar, AVATARS[3]);
    }

    #[test]
    fn test_record_answer_at_most_once() {
        let mut p = Player::new(Uuid::new_v4(), "Ann".into(), 0);
        assert!(p.record_answer(0, Answer::new(Some(1), 3.0)));
        assert!(!p.record_answer(0, Answer::new(Some(2), 1.0)));
        assert_eq!(p.answers[&0].choice, Some(1));
    }

    #[test]
    fn test_elapsed_clamped_to_budget() {
        let a = Answer::new(Some(0), 42.0);
        assert_eq!(a.elapsed_seconds, QUESTION_BUDGET_SECS);
        let b = Answer::new(Some(0), -1.0);
        assert_eq!(b.elapsed_seconds, 0.0);
    }

    #[test]
    fn test_reset_for_new_game() {
        let mut p = Player::new(Uuid::new_v4(), "Ann".into(), 0);
        p.score = 30;
        p.record_answer(0, Answer::new(Some(1), 3.0));
        p.reset_for_new_game();
        assert_eq!(p.score, 0);
        assert!(p.answers.is_empty());
    }
}
