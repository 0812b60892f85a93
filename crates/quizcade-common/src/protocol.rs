use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use uuid::Uuid;

use crate::question::{Difficulty, QuestionView};
use crate::room::{Reveal, RoomState};

// -- Framing --

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed_transport(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(64 * 1024)
        .new_framed(stream)
}

// -- Client -> Server Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    // Handshake
    Hello {
        version: String,
    },

    // Room lifecycle
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    LeaveRoom,

    // Gameplay
    StartGame {
        topic: String,
        difficulty: Difficulty,
    },
    SubmitAnswer {
        /// `None` means the client's own timer ran out without a pick.
        choice: Option<usize>,
        elapsed_seconds: f64,
    },
    PlayAgain,

    // Connection
    Ping,
    Disconnect,
}

// -- Server -> Client Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    // Handshake
    Welcome {
        player_id: Uuid,
        server_version: String,
    },
    HandshakeError {
        reason: String,
    },

    // Room lifecycle (Created/Joined go to the requester only, with their
    // assigned identity; RoomUpdated is broadcast)
    RoomCreated {
        room: RoomSnapshot,
        player_id: Uuid,
    },
    RoomJoined {
        room: RoomSnapshot,
        player_id: Uuid,
    },
    RoomUpdated {
        room: RoomSnapshot,
    },
    RoomLeft,

    // Game flow
    GeneratingQuestions,
    GameStarted {
        room: RoomSnapshot,
        /// The frozen question set, answer keys withheld.
        questions: Vec<QuestionView>,
    },
    AnswersRevealed {
        room: RoomSnapshot,
        reveal: Reveal,
    },
    NextQuestion {
        room: RoomSnapshot,
    },
    GameFinished {
        room: RoomSnapshot,
    },

    // Errors (requester only)
    Error {
        code: ErrorCode,
        message: String,
    },

    // Connection
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    GameAlreadyStarted,
    NotLeader,
    InvalidAction,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub leader_id: Uuid,
    pub state: RoomState,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub current_question: usize,
    pub question_count: usize,
    pub revealed: bool,
    pub players: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
    pub score: u32,
    /// Whether this player has answered the current question.
    pub has_answered: bool,
}

// -- Serialization helpers --

pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    Ok(Bytes::from(json))
}

pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    data: &[u8],
) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

// -- Transport helpers --

pub async fn send_message<T: Serialize>(
    transport: &mut Transport,
    msg: &T,
) -> anyhow::Result<()> {
    let bytes = serialize_message(msg).map_err(|e| anyhow::anyhow!("serialize error: {}", e))?;
    transport
        .send(bytes.into())
        .await
        .map_err(|e| anyhow::anyhow!("send error: {}", e))
}

pub async fn recv_message<T: for<'de> Deserialize<'de>>(
    transport: &mut Transport,
) -> anyhow::Result<Option<T>> {
    match transport.next().await {
        Some(Ok(frame)) => {
            let msg = deserialize_message(&frame)
                .map_err(|e| anyhow::anyhow!("deserialize error: {}", e))?;
            Ok(Some(msg))
        }
        Some(Err(e)) => Err(anyhow::anyhow!("recv error: {}", e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{PlayerChoice, Room};

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::JoinRoom {
            room_code: "AB12CD".into(),
            player_name: "Alice".into(),
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ClientMessage = deserialize_message(&bytes).unwrap();
        match deserialized {
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => {
                assert_eq!(room_code, "AB12CD");
                assert_eq!(player_name, "Alice");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_server_message_serialization() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::Welcome {
            player_id: id,
            server_version: "0.1.0".into(),
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ServerMessage = deserialize_message(&bytes).unwrap();
        match deserialized {
            ServerMessage::Welcome {
                player_id,
                server_version,
            } => {
                assert_eq!(player_id, id);
                assert_eq!(server_version, "0.1.0");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_reveal_serialization() {
        let pid = Uuid::new_v4();
        let room = Room::new("XY34ZT".into(), pid, "Ann".into());
        let msg = ServerMessage::AnswersRevealed {
            room: room.snapshot(),
            reveal: Reveal {
                question_index: 2,
                correct_index: 1,
                choices: vec![PlayerChoice {
                    player_id: pid,
                    choice: None,
                }],
            },
        };
        let bytes = serialize_message(&msg).unwrap();
        let deserialized: ServerMessage = deserialize_message(&bytes).unwrap();
        match deserialized {
            ServerMessage::AnswersRevealed { reveal, .. } => {
                assert_eq!(reveal.question_index, 2);
                assert_eq!(reveal.correct_index, 1);
                assert_eq!(reveal.choices[0].choice, None);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_all_client_messages_serialize() {
        let messages = vec![
            ClientMessage::Hello {
                version: "0.1.0".into(),
            },
            ClientMessage::CreateRoom {
                player_name: "Ann".into(),
            },
            ClientMessage::JoinRoom {
                room_code: "AB12CD".into(),
                player_name: "Bob".into(),
            },
            ClientMessage::LeaveRoom,
            ClientMessage::StartGame {
                topic: "Capitals".into(),
                difficulty: Difficulty::Easy,
            },
            ClientMessage::SubmitAnswer {
                choice: Some(2),
                elapsed_seconds: 4.2,
            },
            ClientMessage::SubmitAnswer {
                choice: None,
                elapsed_seconds: 10.0,
            },
            ClientMessage::PlayAgain,
            ClientMessage::Ping,
            ClientMessage::Disconnect,
        ];

        for msg in &messages {
            let bytes = serialize_message(msg).unwrap();
            let _: ClientMessage = deserialize_message(&bytes).unwrap();
        }
    }

    #[test]
    fn test_all_server_messages_serialize() {
        let id = Uuid::new_v4();
        let room = Room::new("AB12CD".into(), id, "Ann".into());
        let snap = room.snapshot();
        let messages = vec![
            ServerMessage::Welcome {
                player_id: id,
                server_version: "0.1.0".into(),
            },
            ServerMessage::HandshakeError {
                reason: "Expected Hello message".into(),
            },
            ServerMessage::RoomCreated {
                room: snap.clone(),
                player_id: id,
            },
            ServerMessage::RoomJoined {
                room: snap.clone(),
                player_id: id,
            },
            ServerMessage::RoomUpdated { room: snap.clone() },
            ServerMessage::RoomLeft,
            ServerMessage::GeneratingQuestions,
            ServerMessage::GameStarted {
                room: snap.clone(),
                questions: vec![QuestionView {
                    text: "Q?".into(),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                }],
            },
            ServerMessage::AnswersRevealed {
                room: snap.clone(),
                reveal: Reveal {
                    question_index: 0,
                    correct_index: 1,
                    choices: vec![PlayerChoice {
                        player_id: id,
                        choice: Some(1),
                    }],
                },
            },
            ServerMessage::NextQuestion { room: snap.clone() },
            ServerMessage::GameFinished { room: snap },
            ServerMessage::Error {
                code: ErrorCode::RoomNotFound,
                message: "No room with code AB12CD".into(),
            },
            ServerMessage::Pong,
        ];

        for msg in &messages {
            let bytes = serialize_message(msg).unwrap();
            let _: ServerMessage = deserialize_message(&bytes).unwrap();
        }
    }
}
