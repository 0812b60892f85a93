use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::player::{Answer, Player, LEADER_AVATAR};
use crate::protocol::{PlayerInfo, RoomSnapshot};
use crate::question::{Difficulty, Question};
use crate::scoring;

/// The game is designed around at most 4 simultaneous competitors.
pub const MAX_PLAYERS: usize = 4;
/// How long the reveal screen stays up before advancing.
pub const REVEAL_DELAY_MS: u64 = 2500;

// -- Room State Machine --

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoomState {
    Lobby,
    /// Transient: a question-source call is in flight. Submits and second
    /// starts are rejected until it completes.
    Generating,
    InGame,
    Finished,
}

/// Outcome of recording an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Wrong state, unknown player, or duplicate submission. Silently dropped.
    Ignored,
    Recorded { all_answered: bool },
}

/// What happened when a player was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    NotMember,
    /// Last player left; the room must be deleted by the registry.
    Empty,
    Removed { new_leader: Option<Uuid> },
}

/// Result of advancing past a revealed question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextQuestion(usize),
    Finished,
}

/// Everything clients need to render the reveal screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reveal {
    pub question_index: usize,
    pub correct_index: usize,
    pub choices: Vec<PlayerChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerChoice {
    pub player_id: Uuid,
    pub choice: Option<usize>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room is full (max {MAX_PLAYERS} players)")]
    RoomFull,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("only the room leader can do that")]
    NotLeader,
    #[error("no game in progress")]
    GameNotInProgress,
    #[error("game is not finished")]
    GameNotFinished,
    #[error("answers already revealed for this question")]
    AlreadyRevealed,
    #[error("answers not yet revealed for this question")]
    NotRevealed,
}

/// A single game session. Owned by the registry; all mutation goes through
/// the methods below so the state invariants hold at every step.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub leader_id: Uuid,
    pub state: RoomState,
    /// Join order; the tie-break for leader succession.
    pub players: Vec<Player>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub questions: Vec<Question>,
    pub current_question: usize,
    /// True between resolution and advancement, while `InGame`.
    pub revealed: bool,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(code: String, leader_id: Uuid, leader_name: String) -> Self {
        Self {
            code,
            leader_id,
            state: RoomState::Lobby,
            players: vec![Player::new(leader_id, leader_name, 0)],
            topic: None,
            difficulty: None,
            questions: Vec::new(),
            current_question: 0,
            revealed: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_member(&self, player_id: Uuid) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.state != RoomState::Lobby {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }
        let join_index = self.players.len();
        self.players.push(Player::new(player_id, name, join_index));
        Ok(())
    }

    /// Leader-only: enter the transient `Generating` state while the question
    /// source is called. The caller must later apply `begin_game` (or roll
    /// back via the room being deleted).
    pub fn begin_generating(&mut self, requester: Uuid) -> Result<(), RoomError> {
        if requester != self.leader_id {
            return Err(RoomError::NotLeader);
        }
        if self.state != RoomState::Lobby {
            return Err(RoomError::GameAlreadyStarted);
        }
        self.state = RoomState::Generating;
        Ok(())
    }

    /// Freeze the generated question set and start the round.
    pub fn begin_game(&mut self, topic: String, difficulty: Difficulty, questions: Vec<Question>) {
        debug_assert!(!questions.is_empty());
        debug_assert!(questions.iter().all(|q| q.is_valid()));
        self.topic = Some(topic);
        self.difficulty = Some(difficulty);
        self.questions = questions;
        self.current_question = 0;
        self.revealed = false;
        self.state = RoomState::InGame;
        for p in &mut self.players {
            p.reset_answers();
        }
    }

    /// Record a player's answer for the current question. Duplicates, unknown
    /// players and out-of-state submissions are ignored, not errors: they are
    /// expected under retries and double-clicks.
    pub fn record_answer(
        &mut self,
        player_id: Uuid,
        choice: Option<usize>,
        elapsed_seconds: f64,
    ) -> SubmitOutcome {
        if self.state != RoomState::InGame || self.revealed {
            return SubmitOutcome::Ignored;
        }
        let index = self.current_question;
        let Some(player) = self.player_mut(player_id) else {
            return SubmitOutcome::Ignored;
        };
        if !player.record_answer(index, Answer::new(choice, elapsed_seconds)) {
            return SubmitOutcome::Ignored;
        }
        let all_answered = self.players.iter().all(|p| p.has_answered(index));
        SubmitOutcome::Recorded { all_answered }
    }

    /// Score the current question and mark it revealed. Players without a
    /// recorded answer get the timeout sentinel and 0 points. Errors if the
    /// question was already resolved, so resolution happens exactly once even
    /// when the budget timer races the final submission.
    pub fn resolve_current(&mut self) -> Result<Reveal, RoomError> {
        if self.state != RoomState::InGame {
            return Err(RoomError::GameNotInProgress);
        }
        if self.revealed {
            return Err(RoomError::AlreadyRevealed);
        }
        let index = self.current_question;
        let correct_index = self
            .current_question()
            .ok_or(RoomError::GameNotInProgress)?
            .correct_index;

        let mut choices = Vec::with_capacity(self.players.len());
        for player in &mut self.players {
            let answer = player
                .answers
                .entry(index)
                .or_insert_with(Answer::timed_out);
            let correct = answer.choice == Some(correct_index);
            let elapsed = answer.elapsed_seconds;
            choices.push(PlayerChoice {
                player_id: player.id,
                choice: answer.choice,
            });
            if correct {
                player.score += scoring::score_answer(true, elapsed);
            }
        }
        self.revealed = true;
        Ok(Reveal {
            question_index: index,
            correct_index,
            choices,
        })
    }

    /// Move past a revealed question: either onto the next index or into
    /// `Finished` if the last question was just resolved.
    pub fn advance(&mut self) -> Result<Advance, RoomError> {
        if self.state != RoomState::InGame {
            return Err(RoomError::GameNotInProgress);
        }
        if !self.revealed {
            return Err(RoomError::NotRevealed);
        }
        if self.current_question + 1 < self.questions.len() {
            self.current_question += 1;
            self.revealed = false;
            Ok(Advance::NextQuestion(self.current_question))
        } else {
            self.state = RoomState::Finished;
            Ok(Advance::Finished)
        }
    }

    /// Leader-only: back to the lobby with scores, answers, questions, topic
    /// and difficulty all cleared.
    pub fn reset(&mut self, requester: Uuid) -> Result<(), RoomError> {
        if requester != self.leader_id {
            return Err(RoomError::NotLeader);
        }
        if self.state != RoomState::Finished {
            return Err(RoomError::GameNotFinished);
        }
        self.state = RoomState::Lobby;
        self.topic = None;
        self.difficulty = None;
        self.questions.clear();
        self.current_question = 0;
        self.revealed = false;
        for p in &mut self.players {
            p.reset_for_new_game();
        }
        Ok(())
    }

    /// Remove a player in any state. If the leader left, the earliest-joined
    /// remaining player takes over and gets the leader marker.
    pub fn remove_player(&mut self, player_id: Uuid) -> Departure {
        let before = self.players.len();
        self.players.retain(|p| p.id != player_id);
        if self.players.len() == before {
            return Departure::NotMember;
        }
        if self.players.is_empty() {
            return Departure::Empty;
        }
        let mut new_leader = None;
        if self.leader_id == player_id {
            let successor = &mut self.players[0];
            successor.avatar = LEADER_AVATAR.to_string();
            self.leader_id = successor.id;
            new_leader = Some(successor.id);
        }
        Departure::Removed { new_leader }
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            leader_id: self.leader_id,
            state: self.state,
            topic: self.topic.clone(),
            difficulty: self.difficulty,
            current_question: self.current_question,
            question_count: self.questions.len(),
            revealed: self.revealed,
            players: self
                .players
                .iter()
                .map(|p| PlayerInfo {
                    id: p.id,
                    name: p.name.clone(),
                    avatar: p.avatar.clone(),
                    score: p.score,
                    has_answered: p.has_answered(self.current_question),
                })
                .collect(),
        }
    }
}
