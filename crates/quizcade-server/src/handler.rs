use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use uuid::Uuid;

use quizcade_common::protocol::{ClientMessage, ErrorCode, ServerMessage};
use quizcade_common::question::{Difficulty, Question, QuestionView, OPTIONS_PER_QUESTION};
use quizcade_common::room::{
    Advance, Departure, RoomError, RoomState, SubmitOutcome, REVEAL_DELAY_MS,
};
use quizcade_common::scoring::QUESTION_BUDGET_SECS;

use crate::generator;
use crate::server::SharedState;

pub async fn handle_message(
    player_id: Uuid,
    msg: ClientMessage,
    state: &SharedState,
) -> anyhow::Result<()> {
    match msg {
        // Handshake is handled in the connection setup; a stray Hello here
        // is a confused client, not an error.
        ClientMessage::Hello { .. } => {}

        ClientMessage::CreateRoom { player_name } => {
            let name = player_name.trim().to_string();
            if name.is_empty() {
                send_to_player(
                    player_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidAction,
                        message: "Player name cannot be empty".into(),
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            if current_room_code(player_id, state).await.is_some() {
                send_to_player(
                    player_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidAction,
                        message: "Leave your current room first".into(),
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            let mut registry = state.registry.write().await;
            let code = registry.create_room(player_id, name);
            let room_count = registry.room_count();
            let snapshot = match registry.get_room(&code) {
                Some(room) => room.snapshot(),
                None => return Ok(()),
            };
            drop(registry);

            // Bind the connection to its room
            {
                let mut conns = state.connections.write().await;
                if let Some(conn) = conns.get_mut(&player_id) {
                    conn.room_code = Some(code.clone());
                }
            }

            tracing::info!("Room {} created by {} ({} live)", code, player_id, room_count);
            send_to_player(
                player_id,
                ServerMessage::RoomCreated {
                    room: snapshot,
                    player_id,
                },
                state,
            )
            .await;
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => {
            let name = player_name.trim().to_string();
            if name.is_empty() {
                send_to_player(
                    player_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidAction,
                        message: "Player name cannot be empty".into(),
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            if current_room_code(player_id, state).await.is_some() {
                send_to_player(
                    player_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidAction,
                        message: "Leave your current room first".into(),
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            let code = room_code.trim().to_uppercase();
            let mut registry = state.registry.write().await;
            let room = match registry.get_room_mut(&code) {
                Some(r) => r,
                None => {
                    drop(registry);
                    send_to_player(
                        player_id,
                        ServerMessage::Error {
                            code: ErrorCode::RoomNotFound,
                            message: format!("No room with code {}", code),
                        },
                        state,
                    )
                    .await;
                    return Ok(());
                }
            };

            if let Err(e) = room.add_player(player_id, name) {
                drop(registry);
                let (code, message) = room_error_to_protocol(&e);
                send_to_player(player_id, ServerMessage::Error { code, message }, state).await;
                return Ok(());
            }

            let snapshot = room.snapshot();
            let members = room.member_ids();
            drop(registry);

            {
                let mut conns = state.connections.write().await;
                if let Some(conn) = conns.get_mut(&player_id) {
                    conn.room_code = Some(code.clone());
                }
            }

            tracing::info!("Player {} joined room {}", player_id, code);
            send_to_player(
                player_id,
                ServerMessage::RoomJoined {
                    room: snapshot.clone(),
                    player_id,
                },
                state,
            )
            .await;
            broadcast_to_list(
                &members,
                &ServerMessage::RoomUpdated { room: snapshot },
                state,
                Some(player_id),
            )
            .await;
        }

        ClientMessage::LeaveRoom => {
            handle_leave_room(player_id, state).await;
        }

        ClientMessage::StartGame { topic, difficulty } => {
            let topic = topic.trim().to_string();
            if topic.is_empty() {
                send_to_player(
                    player_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidAction,
                        message: "Topic cannot be empty".into(),
                    },
                    state,
                )
                .await;
                return Ok(());
            }

            let room_code = match current_room_code(player_id, state).await {
                Some(code) => code,
                None => {
                    send_not_in_room(player_id, state).await;
                    return Ok(());
                }
            };

            let mut registry = state.registry.write().await;
            let room = match registry.get_room_mut(&room_code) {
                Some(r) => r,
                None => return Ok(()),
            };

            if let Err(e) = room.begin_generating(player_id) {
                drop(registry);
                let (code, message) = room_error_to_protocol(&e);
                send_to_player(player_id, ServerMessage::Error { code, message }, state).await;
                return Ok(());
            }

            let members = room.member_ids();
            drop(registry);

            tracing::info!(
                "Room {}: generating questions (topic '{}', {})",
                room_code,
                topic,
                difficulty.display_name()
            );
            broadcast_to_list(&members, &ServerMessage::GeneratingQuestions, state, None).await;

            // The source call happens off the registry lock; the room sits in
            // Generating meanwhile, which rejects joins, submits and second
            // starts. Completion revalidates before applying.
            let state = state.clone();
            let source = state.question_source.clone();
            tokio::spawn(async move {
                let questions =
                    generator::generate_or_fallback(source.as_deref(), &topic, difficulty).await;
                apply_generated_questions(&state, &room_code, topic, difficulty, questions).await;
            });
        }

        ClientMessage::SubmitAnswer {
            choice,
            elapsed_seconds,
        } => {
            let room_code = match current_room_code(player_id, state).await {
                Some(code) => code,
                None => return Ok(()),
            };

            // An out-of-range pick is treated as no pick at all
            let choice = choice.filter(|&c| c < OPTIONS_PER_QUESTION);

            let mut registry = state.registry.write().await;
            let room = match registry.get_room_mut(&room_code) {
                Some(r) => r,
                None => return Ok(()),
            };

            match room.record_answer(player_id, choice, elapsed_seconds) {
                SubmitOutcome::Ignored => {}
                SubmitOutcome::Recorded { all_answered: false } => {
                    let snapshot = room.snapshot();
                    let members = room.member_ids();
                    drop(registry);
                    broadcast_to_list(
                        &members,
                        &ServerMessage::RoomUpdated { room: snapshot },
                        state,
                        None,
                    )
                    .await;
                }
                SubmitOutcome::Recorded { all_answered: true } => {
                    // Resolution happens under the same lock as the recording
                    // submit, so the budget timer cannot interleave.
                    let reveal = match room.resolve_current() {
                        Ok(r) => r,
                        Err(_) => return Ok(()),
                    };
                    let snapshot = room.snapshot();
                    let members = room.member_ids();
                    drop(registry);

                    state.timers.cancel(&room_code).await;
                    broadcast_to_list(
                        &members,
                        &ServerMessage::AnswersRevealed {
                            room: snapshot,
                            reveal,
                        },
                        state,
                        None,
                    )
                    .await;
                    schedule_reveal_advance(state, &room_code).await;
                }
            }
        }

        ClientMessage::PlayAgain => {
            let room_code = match current_room_code(player_id, state).await {
                Some(code) => code,
                None => {
                    send_not_in_room(player_id, state).await;
                    return Ok(());
                }
            };

            let mut registry = state.registry.write().await;
            let room = match registry.get_room_mut(&room_code) {
                Some(r) => r,
                None => return Ok(()),
            };

            if let Err(e) = room.reset(player_id) {
                drop(registry);
                let (code, message) = room_error_to_protocol(&e);
                send_to_player(player_id, ServerMessage::Error { code, message }, state).await;
                return Ok(());
            }

            let snapshot = room.snapshot();
            let members = room.member_ids();
            drop(registry);

            tracing::info!("Room {} returned to lobby", room_code);
            broadcast_to_list(
                &members,
                &ServerMessage::RoomUpdated { room: snapshot },
                state,
                None,
            )
            .await;
        }

        ClientMessage::Ping => {
            send_to_player(player_id, ServerMessage::Pong, state).await;
        }

        ClientMessage::Disconnect => {
            handle_disconnect(player_id, state).await;
        }
    }

    Ok(())
}

/// Apply a finished generation run. The room may have emptied out or been
/// deleted while the source call was in flight; only a room still waiting in
/// `Generating` gets the questions.
async fn apply_generated_questions(
    state: &SharedState,
    room_code: &str,
    topic: String,
    difficulty: Difficulty,
    questions: Vec<Question>,
) {
    let mut registry = state.registry.write().await;
    let room = match registry.get_room_mut(room_code) {
        Some(r) => r,
        None => {
            tracing::debug!("Room {} vanished during generation", room_code);
            return;
        }
    };
    if room.state != RoomState::Generating {
        tracing::debug!("Room {} no longer generating, dropping questions", room_code);
        return;
    }

    room.begin_game(topic, difficulty, questions);
    let snapshot = room.snapshot();
    let views: Vec<QuestionView> = room.questions.iter().map(|q| q.view()).collect();
    let members = room.member_ids();
    drop(registry);

    tracing::info!("Room {}: game started with {} questions", room_code, views.len());
    broadcast_to_list(
        &members,
        &ServerMessage::GameStarted {
            room: snapshot,
            questions: views,
        },
        state,
        None,
    )
    .await;
    schedule_question_budget(state, room_code, 0).await;
}

/// Arm the per-question budget. When it fires, the question is force-resolved
/// so one silent client can never stall the round.
///
/// Returns a boxed future (rather than being an `async fn`) to break the
/// async recursion cycle through the timer callbacks:
/// schedule_question_budget -> resolve_on_timeout -> schedule_reveal_advance
/// -> advance_room -> schedule_question_budget.
fn schedule_question_budget<'a>(
    state: &'a SharedState,
    room_code: &'a str,
    question_index: usize,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let task_state = state.clone();
        let code = room_code.to_string();
        state
            .timers
            .arm(
                room_code,
                Duration::from_secs_f64(QUESTION_BUDGET_SECS),
                async move {
                    resolve_on_timeout(&task_state, &code, question_index).await;
                },
            )
            .await;
    })
}

/// Boxed for the same recursion-breaking reason as `schedule_question_budget`.
fn schedule_reveal_advance<'a>(
    state: &'a SharedState,
    room_code: &'a str,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let task_state = state.clone();
        let code = room_code.to_string();
        state
            .timers
            .arm(
                room_code,
                Duration::from_millis(REVEAL_DELAY_MS),
                async move {
                    advance_room(&task_state, &code).await;
                },
            )
            .await;
    })
}

/// Budget expiry path. Re-checks that the room is still on the question the
/// timer was armed for; a stale timer that lost the race to a full submit (or
/// to room deletion) does nothing.
async fn resolve_on_timeout(state: &SharedState, room_code: &str, question_index: usize) {
    let mut registry = state.registry.write().await;
    let room = match registry.get_room_mut(room_code) {
        Some(r) => r,
        None => return,
    };
    if room.state != RoomState::InGame
        || room.current_question != question_index
        || room.revealed
    {
        return;
    }
    let reveal = match room.resolve_current() {
        Ok(r) => r,
        Err(_) => return,
    };
    let snapshot = room.snapshot();
    let members = room.member_ids();
    drop(registry);

    tracing::debug!(
        "Room {}: question {} resolved on budget expiry",
        room_code,
        question_index
    );
    broadcast_to_list(
        &members,
        &ServerMessage::AnswersRevealed {
            room: snapshot,
            reveal,
        },
        state,
        None,
    )
    .await;
    schedule_reveal_advance(state, room_code).await;
}

/// Reveal delay expiry: move to the next question or finish the game.
async fn advance_room(state: &SharedState, room_code: &str) {
    let mut registry = state.registry.write().await;
    let room = match registry.get_room_mut(room_code) {
        Some(r) => r,
        None => return,
    };
    let advance = match room.advance() {
        Ok(a) => a,
        Err(_) => return,
    };
    let snapshot = room.snapshot();
    let members = room.member_ids();
    drop(registry);

    match advance {
        Advance::NextQuestion(index) => {
            broadcast_to_list(
                &members,
                &ServerMessage::NextQuestion { room: snapshot },
                state,
                None,
            )
            .await;
            schedule_question_budget(state, room_code, index).await;
        }
        Advance::Finished => {
            tracing::info!("Room {}: game finished", room_code);
            broadcast_to_list(
                &members,
                &ServerMessage::GameFinished { room: snapshot },
                state,
                None,
            )
            .await;
        }
    }
}

async fn handle_leave_room(player_id: Uuid, state: &SharedState) {
    let room_code = match current_room_code(player_id, state).await {
        Some(code) => code,
        None => return,
    };

    let mut registry = state.registry.write().await;
    let departure = match registry.get_room_mut(&room_code) {
        Some(room) => room.remove_player(player_id),
        None => Departure::NotMember,
    };

    let remaining = match departure {
        Departure::Removed { .. } => registry
            .get_room(&room_code)
            .map(|room| (room.snapshot(), room.member_ids())),
        Departure::Empty => {
            registry.remove_room(&room_code);
            None
        }
        Departure::NotMember => None,
    };
    let room_count = registry.room_count();
    drop(registry);

    match departure {
        Departure::Empty => {
            // Nobody left to notify; any armed timer dies with the room
            state.timers.cancel(&room_code).await;
            tracing::info!("Room {} deleted (empty, {} live)", room_code, room_count);
        }
        Departure::Removed { new_leader } => {
            if let Some(leader) = new_leader {
                tracing::info!("Room {}: leadership passed to {}", room_code, leader);
            }
            if let Some((snapshot, members)) = remaining {
                broadcast_to_list(
                    &members,
                    &ServerMessage::RoomUpdated { room: snapshot },
                    state,
                    None,
                )
                .await;
            }
        }
        Departure::NotMember => {}
    }

    {
        let mut conns = state.connections.write().await;
        if let Some(conn) = conns.get_mut(&player_id) {
            conn.room_code = None;
        }
    }

    send_to_player(player_id, ServerMessage::RoomLeft, state).await;
}

pub async fn handle_disconnect(player_id: Uuid, state: &SharedState) {
    handle_leave_room(player_id, state).await;
    state.connections.write().await.remove(&player_id);
}

async fn current_room_code(player_id: Uuid, state: &SharedState) -> Option<String> {
    let conns = state.connections.read().await;
    conns.get(&player_id).and_then(|c| c.room_code.clone())
}

async fn send_not_in_room(player_id: Uuid, state: &SharedState) {
    send_to_player(
        player_id,
        ServerMessage::Error {
            code: ErrorCode::InvalidAction,
            message: "You are not in a room".into(),
        },
        state,
    )
    .await;
}

async fn send_to_player(player_id: Uuid, msg: ServerMessage, state: &SharedState) {
    let conns = state.connections.read().await;
    if let Some(conn) = conns.get(&player_id) {
        let _ = conn.tx.send(msg).await;
    }
}

/// Broadcast a message to a list of player IDs. Optionally exclude one player.
async fn broadcast_to_list(
    member_ids: &[Uuid],
    msg: &ServerMessage,
    state: &SharedState,
    exclude: Option<Uuid>,
) {
    let conns = state.connections.read().await;
    for &id in member_ids {
        if Some(id) == exclude {
            continue;
        }
        if let Some(conn) = conns.get(&id) {
            let _ = conn.tx.send(msg.clone()).await;
        }
    }
}

fn room_error_to_protocol(e: &RoomError) -> (ErrorCode, String) {
    let code = match e {
        RoomError::RoomFull => ErrorCode::RoomFull,
        RoomError::GameAlreadyStarted => ErrorCode::GameAlreadyStarted,
        RoomError::NotLeader => ErrorCode::NotLeader,
        RoomError::GameNotInProgress
        | RoomError::GameNotFinished
        | RoomError::AlreadyRevealed
        | RoomError::NotRevealed => ErrorCode::InvalidAction,
    };
    (code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::{mpsc, RwLock};

    use quizcade_common::player::Answer;

    use crate::connection::ConnectionHandle;
    use crate::registry::RoomRegistry;
    use crate::server::ServerState;
    use crate::timer::TimerMap;

    fn test_state() -> SharedState {
        Arc::new(ServerState {
            registry: RwLock::new(RoomRegistry::new()),
            connections: RwLock::new(HashMap::new()),
            timers: TimerMap::new(),
            question_source: None,
            max_connections: 16,
        })
    }

    fn make_questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                text: format!("Question {i}?"),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_index: 0,
            })
            .collect()
    }

    async fn in_game_room(state: &SharedState, players: &[Uuid], n_questions: usize) -> String {
        let mut registry = state.registry.write().await;
        let code = registry.create_room(players[0], "P0".into());
        let room = registry.get_room_mut(&code).unwrap();
        for (i, id) in players.iter().enumerate().skip(1) {
            room.add_player(*id, format!("P{i}")).unwrap();
        }
        room.begin_generating(players[0]).unwrap();
        room.begin_game("Capitals".into(), Difficulty::Easy, make_questions(n_questions));
        code
    }

    async fn register_connection(
        state: &SharedState,
        player_id: Uuid,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(8);
        state.connections.write().await.insert(
            player_id,
            ConnectionHandle {
                player_id,
                tx,
                room_code: None,
            },
        );
        rx
    }

    #[tokio::test]
    async fn test_budget_expiry_backfills_and_scores() {
        let state = test_state();
        let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let code = in_game_room(&state, &[ann, bob], 1).await;

        {
            let mut registry = state.registry.write().await;
            let room = registry.get_room_mut(&code).unwrap();
            room.record_answer(ann, Some(0), 1.0);
        }

        resolve_on_timeout(&state, &code, 0).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert!(room.revealed);
        assert_eq!(room.player(ann).unwrap().score, 18);
        assert_eq!(room.player(bob).unwrap().answers[&0], Answer::timed_out());
        assert_eq!(room.player(bob).unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_budget_expiry_noop_after_room_deleted() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 1).await;
        state.registry.write().await.remove_room(&code);

        resolve_on_timeout(&state, &code, 0).await;

        assert_eq!(state.registry.read().await.room_count(), 0);
    }

    #[tokio::test]
    async fn test_budget_expiry_noop_for_stale_question_index() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 2).await;

        // a timer armed for a question the room is not on must do nothing
        resolve_on_timeout(&state, &code, 1).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert!(!room.revealed);
        assert_eq!(room.current_question, 0);
        assert_eq!(room.player(ann).unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_budget_expiry_noop_when_already_revealed() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 1).await;

        {
            let mut registry = state.registry.write().await;
            let room = registry.get_room_mut(&code).unwrap();
            room.record_answer(ann, Some(0), 1.0);
            room.resolve_current().unwrap();
        }

        // the late timer must not award a second round of points
        resolve_on_timeout(&state, &code, 0).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert!(room.revealed);
        assert_eq!(room.player(ann).unwrap().score, 18);
    }

    #[tokio::test]
    async fn test_advance_moves_to_next_question() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 2).await;

        {
            let mut registry = state.registry.write().await;
            let room = registry.get_room_mut(&code).unwrap();
            room.record_answer(ann, Some(0), 1.0);
            room.resolve_current().unwrap();
        }

        advance_room(&state, &code).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.state, RoomState::InGame);
        assert_eq!(room.current_question, 1);
        assert!(!room.revealed);
    }

    #[tokio::test]
    async fn test_advance_noop_when_unrevealed() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 2).await;

        advance_room(&state, &code).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.current_question, 0);
        assert_eq!(room.state, RoomState::InGame);
    }

    #[tokio::test]
    async fn test_advance_finishes_after_last_question() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = in_game_room(&state, &[ann], 1).await;

        {
            let mut registry = state.registry.write().await;
            let room = registry.get_room_mut(&code).unwrap();
            room.record_answer(ann, Some(0), 1.0);
            room.resolve_current().unwrap();
        }

        advance_room(&state, &code).await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.state, RoomState::Finished);
    }

    #[tokio::test]
    async fn test_generated_questions_dropped_when_room_gone() {
        let state = test_state();

        apply_generated_questions(
            &state,
            "ZZZZZZ",
            "Capitals".into(),
            Difficulty::Easy,
            make_questions(5),
        )
        .await;

        assert_eq!(state.registry.read().await.room_count(), 0);
    }

    #[tokio::test]
    async fn test_generated_questions_dropped_when_not_generating() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = {
            let mut registry = state.registry.write().await;
            registry.create_room(ann, "Ann".into())
        };

        // room never entered Generating, e.g. everyone left and rejoined
        apply_generated_questions(
            &state,
            &code,
            "Capitals".into(),
            Difficulty::Easy,
            make_questions(5),
        )
        .await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.state, RoomState::Lobby);
        assert!(room.questions.is_empty());
    }

    #[tokio::test]
    async fn test_generated_questions_start_waiting_room() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let code = {
            let mut registry = state.registry.write().await;
            let code = registry.create_room(ann, "Ann".into());
            registry
                .get_room_mut(&code)
                .unwrap()
                .begin_generating(ann)
                .unwrap();
            code
        };

        apply_generated_questions(
            &state,
            &code,
            "Capitals".into(),
            Difficulty::Easy,
            make_questions(5),
        )
        .await;

        let registry = state.registry.read().await;
        let room = registry.get_room(&code).unwrap();
        assert_eq!(room.state, RoomState::InGame);
        assert_eq!(room.questions.len(), 5);
        assert_eq!(room.current_question, 0);
    }

    #[tokio::test]
    async fn test_start_game_outside_room_reports_error() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let mut rx = register_connection(&state, ann).await;

        handle_message(
            ann,
            ClientMessage::StartGame {
                topic: "Capitals".into(),
                difficulty: Difficulty::Easy,
            },
            &state,
        )
        .await
        .unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidAction),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_play_again_outside_room_reports_error() {
        let state = test_state();
        let ann = Uuid::new_v4();
        let mut rx = register_connection(&state, ann).await;

        handle_message(ann, ClientMessage::PlayAgain, &state)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidAction),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
