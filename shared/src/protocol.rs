//! Line-oriented wire protocol shared by the server and the client agent
//!
//! Every message is a single UTF-8 line: a type tag followed by zero or more
//! `|`-separated fields. The transport appends the terminating newline; the
//! functions here never include it.
//!
//! Decoding happens in two layers:
//! - [`Frame`] splits a line into its tag and raw string fields, keeping
//!   empty trailing fields so that encode/parse is lossless
//! - [`Message`] interprets a frame as one of the known message kinds and
//!   parses its numeric fields
//!
//! Coordinates travel as integers. Sub-pixel precision is dropped on the wire
//! by truncating toward zero.

use crate::{Enemy, Vec2};
use thiserror::Error;

pub const SEPARATOR: char = '|';

/// Errors produced while decoding a line.
///
/// Consumers are expected to log and discard these; a bad line never
/// terminates a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,

    #[error("unknown message tag: {0}")]
    UnknownTag(String),

    #[error("{tag}: missing field {index}")]
    MissingField { tag: &'static str, index: usize },

    #[error("{tag}: field {index} is not a valid number: {value:?}")]
    BadNumber {
        tag: &'static str,
        index: usize,
        value: String,
    },
}

/// A raw protocol line: tag plus uninterpreted string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: String,
    pub args: Vec<String>,
}

impl Frame {
    pub fn new(tag: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            args,
        }
    }

    pub fn encode(&self) -> String {
        let mut line = self.tag.clone();
        for arg in &self.args {
            line.push(SEPARATOR);
            line.push_str(arg);
        }
        line
    }

    /// Splits a line on `|`. A trailing `\n` or `\r\n` is ignored.
    pub fn parse(line: &str) -> Result<Frame, DecodeError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut parts = line.split(SEPARATOR);
        let tag = parts.next().unwrap_or_default().to_string();
        let args = parts.map(str::to_string).collect();
        Ok(Frame { tag, args })
    }
}

/// Every message kind understood by this protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// S→C: assigns the receiving client its session id
    Welcome { session_id: u32 },
    /// S→C: a new peer connected
    Joined { session_id: u32 },
    /// C→S: join announcement with an optional display name
    Join { display_name: Option<String> },
    /// Relayed: a player's last known position
    Pos { session_id: u32, x: i32, y: i32 },
    /// Relayed: a player fired a bullet
    Shot {
        session_id: u32,
        x: i32,
        y: i32,
        vx: i32,
        vy: i32,
    },
    /// C→S: a local bullet touched an enemy
    Hit {
        enemy_id: u32,
        damage: i32,
        shooter_id: u32,
    },
    EnemySpawn { enemy_id: u32, x: i32, y: i32, hp: i32 },
    EnemyPos { enemy_id: u32, x: i32, y: i32, hp: i32 },
    EnemyHp { enemy_id: u32, hp: i32 },
    EnemyDead { enemy_id: u32 },
    /// S→C: a peer disconnected
    Leave { session_id: u32 },
}

impl Message {
    pub const WELCOME: &'static str = "WELCOME";
    pub const JOINED: &'static str = "JOINED";
    pub const JOIN: &'static str = "JOIN";
    pub const POS: &'static str = "POS";
    pub const SHOT: &'static str = "SHOT";
    pub const HIT: &'static str = "HIT";
    pub const ENSPAWN: &'static str = "ENSPAWN";
    pub const ENPOS: &'static str = "ENPOS";
    pub const ENHP: &'static str = "ENHP";
    pub const ENDEAD: &'static str = "ENDEAD";
    pub const LEAVE: &'static str = "LEAVE";

    pub fn pos(session_id: u32, position: Vec2) -> Self {
        Message::Pos {
            session_id,
            x: to_wire(position.x),
            y: to_wire(position.y),
        }
    }

    pub fn shot(session_id: u32, position: Vec2, velocity: Vec2) -> Self {
        Message::Shot {
            session_id,
            x: to_wire(position.x),
            y: to_wire(position.y),
            vx: to_wire(velocity.x),
            vy: to_wire(velocity.y),
        }
    }

    pub fn enemy_spawn(enemy: &Enemy) -> Self {
        Message::EnemySpawn {
            enemy_id: enemy.id,
            x: to_wire(enemy.position.x),
            y: to_wire(enemy.position.y),
            hp: enemy.hp,
        }
    }

    pub fn enemy_pos(enemy: &Enemy) -> Self {
        Message::EnemyPos {
            enemy_id: enemy.id,
            x: to_wire(enemy.position.x),
            y: to_wire(enemy.position.y),
            hp: enemy.hp,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Message::Welcome { .. } => Self::WELCOME,
            Message::Joined { .. } => Self::JOINED,
            Message::Join { .. } => Self::JOIN,
            Message::Pos { .. } => Self::POS,
            Message::Shot { .. } => Self::SHOT,
            Message::Hit { .. } => Self::HIT,
            Message::EnemySpawn { .. } => Self::ENSPAWN,
            Message::EnemyPos { .. } => Self::ENPOS,
            Message::EnemyHp { .. } => Self::ENHP,
            Message::EnemyDead { .. } => Self::ENDEAD,
            Message::Leave { .. } => Self::LEAVE,
        }
    }

    pub fn to_frame(&self) -> Frame {
        let args: Vec<String> = match self {
            Message::Welcome { session_id }
            | Message::Joined { session_id }
            | Message::Leave { session_id } => vec![session_id.to_string()],
            Message::Join { display_name } => display_name.iter().cloned().collect(),
            Message::Pos { session_id, x, y } => {
                vec![session_id.to_string(), x.to_string(), y.to_string()]
            }
            Message::Shot {
                session_id,
                x,
                y,
                vx,
                vy,
            } => vec![
                session_id.to_string(),
                x.to_string(),
                y.to_string(),
                vx.to_string(),
                vy.to_string(),
            ],
            Message::Hit {
                enemy_id,
                damage,
                shooter_id,
            } => vec![
                enemy_id.to_string(),
                damage.to_string(),
                shooter_id.to_string(),
            ],
            Message::EnemySpawn { enemy_id, x, y, hp } | Message::EnemyPos { enemy_id, x, y, hp } => vec![
                enemy_id.to_string(),
                x.to_string(),
                y.to_string(),
                hp.to_string(),
            ],
            Message::EnemyHp { enemy_id, hp } => vec![enemy_id.to_string(), hp.to_string()],
            Message::EnemyDead { enemy_id } => vec![enemy_id.to_string()],
        };
        Frame::new(self.tag(), args)
    }

    pub fn encode(&self) -> String {
        self.to_frame().encode()
    }

    pub fn decode(line: &str) -> Result<Message, DecodeError> {
        let frame = Frame::parse(line)?;
        Message::from_frame(&frame)
    }

    pub fn from_frame(frame: &Frame) -> Result<Message, DecodeError> {
        let message = match frame.tag.as_str() {
            Self::WELCOME => {
                let f = Fields::new(Self::WELCOME, frame);
                Message::Welcome {
                    session_id: f.number(0)?,
                }
            }
            Self::JOINED => {
                let f = Fields::new(Self::JOINED, frame);
                Message::Joined {
                    session_id: f.number(0)?,
                }
            }
            Self::JOIN => Message::Join {
                display_name: frame.args.first().filter(|name| !name.is_empty()).cloned(),
            },
            Self::POS => {
                let f = Fields::new(Self::POS, frame);
                Message::Pos {
                    session_id: f.number(0)?,
                    x: f.number(1)?,
                    y: f.number(2)?,
                }
            }
            Self::SHOT => {
                let f = Fields::new(Self::SHOT, frame);
                Message::Shot {
                    session_id: f.number(0)?,
                    x: f.number(1)?,
                    y: f.number(2)?,
                    vx: f.number(3)?,
                    vy: f.number(4)?,
                }
            }
            Self::HIT => {
                let f = Fields::new(Self::HIT, frame);
                Message::Hit {
                    enemy_id: f.number(0)?,
                    damage: f.number(1)?,
                    shooter_id: f.number(2)?,
                }
            }
            Self::ENSPAWN => {
                let f = Fields::new(Self::ENSPAWN, frame);
                Message::EnemySpawn {
                    enemy_id: f.number(0)?,
                    x: f.number(1)?,
                    y: f.number(2)?,
                    hp: f.number(3)?,
                }
            }
            Self::ENPOS => {
                let f = Fields::new(Self::ENPOS, frame);
                Message::EnemyPos {
                    enemy_id: f.number(0)?,
                    x: f.number(1)?,
                    y: f.number(2)?,
                    hp: f.number(3)?,
                }
            }
            Self::ENHP => {
                let f = Fields::new(Self::ENHP, frame);
                Message::EnemyHp {
                    enemy_id: f.number(0)?,
                    hp: f.number(1)?,
                }
            }
            Self::ENDEAD => {
                let f = Fields::new(Self::ENDEAD, frame);
                Message::EnemyDead {
                    enemy_id: f.number(0)?,
                }
            }
            Self::LEAVE => {
                let f = Fields::new(Self::LEAVE, frame);
                Message::Leave {
                    session_id: f.number(0)?,
                }
            }
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(message)
    }
}

/// Truncates a coordinate to whole arena units.
pub fn to_wire(value: f32) -> i32 {
    value as i32
}

pub fn from_wire(x: i32, y: i32) -> Vec2 {
    Vec2::new(x as f32, y as f32)
}

/// Strips separators and control characters from a display name so it fits
/// in one JOIN field. Returns `None` when nothing printable is left.
pub fn sanitize_display_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| *c != SEPARATOR && !c.is_control())
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct Fields<'a> {
    tag: &'static str,
    frame: &'a Frame,
}

impl<'a> Fields<'a> {
    fn new(tag: &'static str, frame: &'a Frame) -> Self {
        Self { tag, frame }
    }

    fn number<T: std::str::FromStr>(&self, index: usize) -> Result<T, DecodeError> {
        let raw = self
            .frame
            .args
            .get(index)
            .ok_or(DecodeError::MissingField {
                tag: self.tag,
                index,
            })?;
        raw.trim().parse().map_err(|_| DecodeError::BadNumber {
            tag: self.tag,
            index,
            value: raw.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_encode() {
        let frame = Frame::new("POS", vec!["3".into(), "10".into(), "20".into()]);
        assert_eq!(frame.encode(), "POS|3|10|20");
    }

    #[test]
    fn test_frame_without_args() {
        let frame = Frame::parse("JOIN").unwrap();
        assert_eq!(frame.tag, "JOIN");
        assert!(frame.args.is_empty());
        assert_eq!(frame.encode(), "JOIN");
    }

    #[test]
    fn test_frame_keeps_empty_trailing_fields() {
        let frame = Frame::parse("SHOT|1||").unwrap();
        assert_eq!(frame.args, vec!["1".to_string(), String::new(), String::new()]);
        assert_eq!(frame.encode(), "SHOT|1||");
    }

    #[test]
    fn test_frame_roundtrip_preserves_tag_and_args() {
        let samples = vec![
            Frame::new("ANY", vec![]),
            Frame::new("ANY", vec![String::new()]),
            Frame::new("X", vec!["a b".into(), "".into(), "ü".into(), "".into()]),
            Frame::new("ENPOS", vec!["1".into(), "-4".into(), "7".into(), "50".into()]),
        ];

        for frame in samples {
            let parsed = Frame::parse(&frame.encode()).unwrap();
            assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn test_frame_strips_line_terminator() {
        let frame = Frame::parse("LEAVE|4\r\n").unwrap();
        assert_eq!(frame.args, vec!["4".to_string()]);
    }

    #[test]
    fn test_empty_line_is_error() {
        assert_eq!(Frame::parse(""), Err(DecodeError::Empty));
        assert_eq!(Message::decode("\n"), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_every_message_kind() {
        let cases = vec![
            ("WELCOME|1", Message::Welcome { session_id: 1 }),
            ("JOINED|2", Message::Joined { session_id: 2 }),
            (
                "JOIN|alice",
                Message::Join {
                    display_name: Some("alice".into()),
                },
            ),
            (
                "POS|3|120|-8",
                Message::Pos {
                    session_id: 3,
                    x: 120,
                    y: -8,
                },
            ),
            (
                "SHOT|3|1|2|420|0",
                Message::Shot {
                    session_id: 3,
                    x: 1,
                    y: 2,
                    vx: 420,
                    vy: 0,
                },
            ),
            (
                "HIT|9|10|3",
                Message::Hit {
                    enemy_id: 9,
                    damage: 10,
                    shooter_id: 3,
                },
            ),
            (
                "ENSPAWN|9|0|300|50",
                Message::EnemySpawn {
                    enemy_id: 9,
                    x: 0,
                    y: 300,
                    hp: 50,
                },
            ),
            (
                "ENPOS|9|5|300|50",
                Message::EnemyPos {
                    enemy_id: 9,
                    x: 5,
                    y: 300,
                    hp: 50,
                },
            ),
            ("ENHP|9|40", Message::EnemyHp { enemy_id: 9, hp: 40 }),
            ("ENDEAD|9", Message::EnemyDead { enemy_id: 9 }),
            ("LEAVE|3", Message::Leave { session_id: 3 }),
        ];

        for (line, expected) in cases {
            let decoded = Message::decode(line).unwrap();
            assert_eq!(decoded, expected);
            assert_eq!(decoded.encode(), line);
        }
    }

    #[test]
    fn test_join_without_name() {
        assert_eq!(
            Message::decode("JOIN").unwrap(),
            Message::Join { display_name: None }
        );
        assert_eq!(
            Message::decode("JOIN|").unwrap(),
            Message::Join { display_name: None }
        );
        assert_eq!(Message::Join { display_name: None }.encode(), "JOIN");
    }

    #[test]
    fn test_sanitize_display_name() {
        assert_eq!(sanitize_display_name("Player"), Some("Player".into()));
        assert_eq!(
            sanitize_display_name("bad|na\nme"),
            Some("badname".into())
        );
        assert_eq!(
            sanitize_display_name("  x\r\nPOS|1|0|0 "),
            Some("xPOS100".into())
        );
        assert_eq!(sanitize_display_name("|\n\t "), None);
        assert_eq!(sanitize_display_name(""), None);
    }

    #[test]
    fn test_sanitized_name_stays_one_field() {
        let display_name = sanitize_display_name("a|b\nJOINED|9");
        let line = Message::Join {
            display_name: display_name.clone(),
        }
        .encode();

        assert!(!line.contains('\n'));
        assert_eq!(
            Message::decode(&line).unwrap(),
            Message::Join { display_name }
        );
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            Message::decode("TELEPORT|1|2"),
            Err(DecodeError::UnknownTag("TELEPORT".into()))
        );
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert!(matches!(
            Message::decode("pos|1|2|3"),
            Err(DecodeError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_malformed_number() {
        let err = Message::decode("POS|1|abc|3").unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadNumber {
                tag: "POS",
                index: 1,
                value: "abc".into(),
            }
        );
    }

    #[test]
    fn test_negative_id_is_rejected() {
        assert!(matches!(
            Message::decode("ENDEAD|-1"),
            Err(DecodeError::BadNumber { .. })
        ));
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(
            Message::decode("HIT|4|10"),
            Err(DecodeError::MissingField {
                tag: "HIT",
                index: 2
            })
        );
    }

    #[test]
    fn test_extra_fields_are_tolerated() {
        assert_eq!(
            Message::decode("LEAVE|4|extra").unwrap(),
            Message::Leave { session_id: 4 }
        );
    }

    #[test]
    fn test_positions_truncate_on_the_wire() {
        let msg = Message::pos(2, Vec2::new(10.9, -3.7));
        assert_eq!(msg.encode(), "POS|2|10|-3");

        let enemy = Enemy {
            id: 5,
            position: Vec2::new(99.99, 0.5),
            hp: 30,
        };
        assert_eq!(Message::enemy_pos(&enemy).encode(), "ENPOS|5|99|0|30");
        assert_eq!(Message::enemy_spawn(&enemy).encode(), "ENSPAWN|5|99|0|30");
    }

    #[test]
    fn test_shot_constructor() {
        let msg = Message::shot(1, Vec2::new(50.2, 60.8), Vec2::new(-420.0, 0.0));
        assert_eq!(msg.encode(), "SHOT|1|50|60|-420|0");
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::MissingField {
            tag: "POS",
            index: 2,
        };
        assert_eq!(err.to_string(), "POS: missing field 2");
    }
}
