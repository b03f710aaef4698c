// 🤖 Chat Rows - chatbot sessions and their message log

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Bot,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Bot => "bot",
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: i64,
    pub user_id: Option<String>,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl ChatSession {
    const COLUMNS: &'static str = "session_id, user_id, session_start, last_activity, is_active";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ChatSession {
            session_id: row.get(0)?,
            user_id: row.get(1)?,
            session_start: row.get(2)?,
            last_activity: row.get(3)?,
            is_active: row.get(4)?,
        })
    }

    pub fn find(conn: &Connection, session_id: i64) -> AppResult<Option<ChatSession>> {
        let session = conn
            .query_row(
                &format!(
                    "SELECT {} FROM chat_session WHERE session_id = ?1",
                    Self::COLUMNS
                ),
                [session_id],
                Self::from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Resolve the session for a conversation turn.
    ///
    /// An explicit `session_id` wins when it exists. Otherwise the newest
    /// active session of `user_id` is reused, and a new one is opened if
    /// there is none. The returned session has `last_activity = now`.
    pub fn get_or_create(
        conn: &Connection,
        session_id: Option<i64>,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<ChatSession> {
        let existing = match session_id {
            Some(id) => Self::find(conn, id)?,
            None => None,
        };

        let existing = match (existing, user_id) {
            (Some(session), _) => Some(session),
            (None, Some(user)) => conn
                .query_row(
                    &format!(
                        "SELECT {} FROM chat_session
                         WHERE user_id = ?1 AND is_active = 1
                         ORDER BY last_activity DESC, session_id DESC
                         LIMIT 1",
                        Self::COLUMNS
                    ),
                    [user],
                    Self::from_row,
                )
                .optional()?,
            (None, None) => None,
        };

        match existing {
            Some(mut session) => {
                conn.execute(
                    "UPDATE chat_session SET last_activity = ?1 WHERE session_id = ?2",
                    params![now, session.session_id],
                )?;
                session.last_activity = now;
                Ok(session)
            }
            None => {
                conn.execute(
                    "INSERT INTO chat_session (user_id, session_start, last_activity, is_active)
                     VALUES (?1, ?2, ?2, 1)",
                    params![user_id, now],
                )?;
                tracing::debug!(user_id = ?user_id, "opened chat session");

                Ok(ChatSession {
                    session_id: conn.last_insert_rowid(),
                    user_id: user_id.map(str::to_string),
                    session_start: now,
                    last_activity: now,
                    is_active: true,
                })
            }
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub session_id: i64,
    pub message_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Data the bot answered from, as stored JSON
    pub context_data: Option<serde_json::Value>,
}

impl ChatMessage {
    const COLUMNS: &'static str =
        "message_id, session_id, message_type, content, timestamp, context_data";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let context_json: Option<String> = row.get(5)?;
        let context_data = context_json
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;

        Ok(ChatMessage {
            message_id: row.get(0)?,
            session_id: row.get(1)?,
            message_type: row.get(2)?,
            content: row.get(3)?,
            timestamp: row.get(4)?,
            context_data,
        })
    }

    pub fn save(
        conn: &Connection,
        session_id: i64,
        message_type: MessageType,
        content: &str,
        context_data: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<ChatMessage> {
        let context_json = context_data.map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO chat_message (session_id, message_type, content, timestamp, context_data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                message_type.as_str(),
                content,
                now,
                context_json
            ],
        )?;

        Ok(ChatMessage {
            message_id: conn.last_insert_rowid(),
            session_id,
            message_type: message_type.as_str().to_string(),
            content: content.to_string(),
            timestamp: now,
            context_data: context_data.cloned(),
        })
    }

    /// Whole conversation, oldest first
    pub fn history(conn: &Connection, session_id: i64) -> AppResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chat_message WHERE session_id = ?1 ORDER BY message_id ASC",
            Self::COLUMNS
        ))?;

        let messages = stmt
            .query_map([session_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    /// The last `limit` messages of a conversation, oldest first
    pub fn recent(conn: &Connection, session_id: i64, limit: usize) -> AppResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chat_message WHERE session_id = ?1 ORDER BY message_id DESC LIMIT ?2",
            Self::COLUMNS
        ))?;

        let mut messages = stmt
            .query_map(params![session_id, limit as i64], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::setup_database(&conn).unwrap();
        conn
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_get_or_create_reuses_user_session() {
        let conn = setup();

        let first = ChatSession::get_or_create(&conn, None, Some("admin"), at(0)).unwrap();
        let second = ChatSession::get_or_create(&conn, None, Some("admin"), at(5)).unwrap();
        let other = ChatSession::get_or_create(&conn, None, Some("staff"), at(6)).unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(second.last_activity, at(5));
        assert_ne!(first.session_id, other.session_id);
    }

    #[test]
    fn test_explicit_session_id_wins() {
        let conn = setup();

        let first = ChatSession::get_or_create(&conn, None, Some("admin"), at(0)).unwrap();
        let anon = ChatSession::get_or_create(&conn, None, None, at(1)).unwrap();
        assert_ne!(first.session_id, anon.session_id);

        let resumed =
            ChatSession::get_or_create(&conn, Some(anon.session_id), Some("admin"), at(2)).unwrap();
        assert_eq!(resumed.session_id, anon.session_id);
    }

    #[test]
    fn test_unknown_session_id_opens_new_session() {
        let conn = setup();
        let session = ChatSession::get_or_create(&conn, Some(999), None, at(0)).unwrap();
        assert_ne!(session.session_id, 999);
        assert!(ChatSession::find(&conn, session.session_id).unwrap().is_some());
    }

    #[test]
    fn test_recent_returns_last_messages_in_order() {
        let conn = setup();
        let session = ChatSession::get_or_create(&conn, None, Some("admin"), at(0)).unwrap();

        for i in 0..5 {
            ChatMessage::save(
                &conn,
                session.session_id,
                if i % 2 == 0 { MessageType::User } else { MessageType::Bot },
                &format!("message {}", i),
                None,
                at(i),
            )
            .unwrap();
        }

        let recent = ChatMessage::recent(&conn, session.session_id, 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);

        let history = ChatMessage::history(&conn, session.session_id).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].content, "message 0");
    }

    #[test]
    fn test_context_data_round_trip() {
        let conn = setup();
        let session = ChatSession::get_or_create(&conn, None, None, at(0)).unwrap();
        let context = serde_json::json!({"intent": "finance_info", "total_revenue": 1210.0});

        ChatMessage::save(
            &conn,
            session.session_id,
            MessageType::Bot,
            "Revenue is up",
            Some(&context),
            at(1),
        )
        .unwrap();

        let history = ChatMessage::history(&conn, session.session_id).unwrap();
        assert_eq!(history[0].context_data.as_ref(), Some(&context));
        assert_eq!(history[0].message_type, "bot");
    }
}
