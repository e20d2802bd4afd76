//! Message repository — conversation outcome messages.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

use forge_core::ids::{ConversationId, MessageId};
use forge_core::state::{Fragment, MessageKind, Role};

use crate::errors::Result;
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::migrations::run_migrations;
use crate::store::{MessageStore, NewMessage, StoredMessage};

const SELECT_COLUMNS: &str = "id, conversation_id, role, kind, content, \
     fragment_title, fragment_sandbox_url, fragment_files, created_at";

fn invalid_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unexpected value: {value}").into(),
    )
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(2)?;
    let role = match role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => return Err(invalid_text(2, other)),
    };

    let kind: String = row.get(3)?;
    let kind = match kind.as_str() {
        "RESULT" => MessageKind::Result,
        "ERROR" => MessageKind::Error,
        other => return Err(invalid_text(3, other)),
    };

    let fragment_title: Option<String> = row.get(5)?;
    let fragment = match fragment_title {
        Some(title) => {
            let sandbox_url: String = row.get(6)?;
            let files_json: String = row.get(7)?;
            let files: BTreeMap<String, String> = serde_json::from_str(&files_json)
                .map_err(|e| invalid_text(7, &e.to_string()))?;
            Some(Fragment {
                title,
                sandbox_url,
                files,
            })
        }
        None => None,
    };

    let created_at: String = row.get(8)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| invalid_text(8, &e.to_string()))?
        .with_timezone(&Utc);

    Ok(StoredMessage {
        id: MessageId::from_string(row.get(0)?),
        conversation_id: ConversationId::from_string(row.get(1)?),
        role,
        kind,
        content: row.get(4)?,
        fragment,
        created_at,
    })
}

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message and return the stored row.
    pub fn create(conn: &Connection, message: NewMessage) -> Result<StoredMessage> {
        let id = MessageId::new();
        let created_at = Utc::now();

        let (fragment_title, fragment_sandbox_url, fragment_files) = match &message.fragment {
            Some(fragment) => (
                Some(fragment.title.clone()),
                Some(fragment.sandbox_url.clone()),
                Some(serde_json::to_string(&fragment.files)?),
            ),
            None => (None, None, None),
        };

        let _ = conn.execute(
            "INSERT INTO messages (id, conversation_id, role, kind, content, \
             fragment_title, fragment_sandbox_url, fragment_files, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.as_str(),
                message.conversation_id.as_str(),
                message.role.as_str(),
                message.kind.as_str(),
                message.content,
                fragment_title,
                fragment_sandbox_url,
                fragment_files,
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(StoredMessage {
            id,
            conversation_id: message.conversation_id,
            role: message.role,
            kind: message.kind,
            content: message.content,
            fragment: message.fragment,
            created_at,
        })
    }

    /// The most recent `limit` messages of a conversation, oldest first.
    pub fn find_recent(
        conn: &Connection,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages \
             WHERE conversation_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))?;
        let mut messages: Vec<StoredMessage> = stmt
            .query_map(params![conversation_id.as_str(), limit as i64], decode_row)?
            .collect::<rusqlite::Result<_>>()?;
        // Query is newest-first to apply the limit; callers want oldest-first.
        messages.reverse();
        Ok(messages)
    }
}

/// Pool-backed [`MessageStore`] implementation.
pub struct SqliteMessageStore {
    pool: ConnectionPool,
}

impl SqliteMessageStore {
    /// Create a store over a pool, running pending migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }
}

impl MessageStore for SqliteMessageStore {
    fn find_recent(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conn = self.pool.get()?;
        MessageRepo::find_recent(&conn, conversation_id, limit)
    }

    fn create(&self, message: NewMessage) -> Result<StoredMessage> {
        let conn = self.pool.get()?;
        MessageRepo::create(&conn, message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::new_in_memory;
    use forge_core::state::OutcomeRecord;
    use forge_core::state::RunState;

    fn store() -> SqliteMessageStore {
        SqliteMessageStore::new(new_in_memory().unwrap()).unwrap()
    }

    fn conversation() -> ConversationId {
        ConversationId::from("conv-1")
    }

    #[test]
    fn create_and_find_round_trip() {
        let store = store();
        let created = store
            .create(NewMessage::user(conversation(), "build a page".into()))
            .unwrap();

        let found = store.find_recent(&conversation(), 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, created.id);
        assert_eq!(found[0].role, Role::User);
        assert_eq!(found[0].kind, MessageKind::Result);
        assert_eq!(found[0].content, "build a page");
        assert!(found[0].fragment.is_none());
    }

    #[test]
    fn fragment_round_trips() {
        let store = store();
        let state = RunState {
            summary: "done".into(),
            files: BTreeMap::from([("app/page.tsx".to_owned(), "code".to_owned())]),
        };
        let outcome = OutcomeRecord::classify(
            conversation(),
            &state,
            "Landing page".into(),
            "Built it".into(),
            "https://host-3000.example.dev".into(),
        );
        let _ = store.create(NewMessage::from_outcome(outcome)).unwrap();

        let found = store.find_recent(&conversation(), 10).unwrap();
        let fragment = found[0].fragment.as_ref().unwrap();
        assert_eq!(fragment.title, "Landing page");
        assert_eq!(fragment.sandbox_url, "https://host-3000.example.dev");
        assert_eq!(fragment.files["app/page.tsx"], "code");
    }

    #[test]
    fn find_recent_returns_newest_n_oldest_first() {
        let store = store();
        for i in 0..7 {
            let _ = store
                .create(NewMessage::user(conversation(), format!("message {i}")))
                .unwrap();
        }

        let found = store.find_recent(&conversation(), 5).unwrap();
        assert_eq!(found.len(), 5);
        // Oldest-first within the newest five
        assert_eq!(found[0].content, "message 2");
        assert_eq!(found[4].content, "message 6");
    }

    #[test]
    fn find_recent_is_scoped_to_conversation() {
        let store = store();
        let _ = store
            .create(NewMessage::user(conversation(), "mine".into()))
            .unwrap();
        let _ = store
            .create(NewMessage::user(ConversationId::from("other"), "theirs".into()))
            .unwrap();

        let found = store.find_recent(&conversation(), 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "mine");
    }
}
