use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, TransactionBehavior};
use tracing::warn;

use parley_types::models::{
    ChatListEntry, ChatPeer, Message, MessageTarget, PendingMessage, Reaction, ReactionOutcome,
};

use crate::Database;
use crate::models::{ChatListRow, MessageRow, ReactionRow};

const MESSAGE_COLUMNS: &str =
    "id, sender_id, message_type, chat_id, group_id, content, created_at, is_recalled";

impl Database {
    // -- Messages --

    /// Insert one message. `None` means the statement touched no rows.
    pub fn insert_message(&self, message: &PendingMessage) -> Result<Option<Message>> {
        self.with_conn(|conn| insert_message_row(conn, message))
    }

    /// Insert a batch inside one transaction, each row under its own
    /// savepoint so a failing row is rolled back alone.
    pub fn insert_messages(&self, messages: &[PendingMessage]) -> Result<Vec<Result<Option<Message>>>> {
        self.with_conn_mut(|conn| {
            let mut tx = conn.transaction()?;
            let mut results = Vec::with_capacity(messages.len());

            for message in messages {
                let sp = tx.savepoint()?;
                match insert_message_row(&sp, message) {
                    Ok(inserted) => {
                        sp.commit()?;
                        results.push(Ok(inserted));
                    }
                    Err(e) => {
                        // dropping the savepoint rolls the row back
                        drop(sp);
                        results.push(Err(e));
                    }
                }
            }

            tx.commit()?;
            Ok(results)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let row = self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row([id], message_row).optional()
        })?;

        row.map(MessageRow::into_message).transpose()
    }

    /// Returns rows affected: 0 when the message is missing or already recalled.
    pub fn mark_message_recalled(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE messages SET is_recalled = 1 WHERE id = ?1 AND is_recalled = 0",
                [id],
            )?;
            Ok(rows)
        })
    }

    pub fn get_messages(
        &self,
        viewer_id: i64,
        target: MessageTarget,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let before = before.map(|b| b.timestamp_millis());
        let rows = self.with_conn(|conn| query_messages(conn, viewer_id, target, before, limit))?;

        // Skip corrupt rows rather than failing the whole page
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                row.into_message()
                    .map_err(|e| warn!("Skipping corrupt message {}: {}", id, e))
                    .ok()
            })
            .collect())
    }

    // -- Reactions --

    pub fn get_reaction(&self, message_id: i64, user_id: i64) -> Result<Option<Reaction>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, message_id, user_id, reaction_type, created_at
                 FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                [message_id, user_id],
                reaction_row,
            )
            .optional()
        })?;

        row.map(ReactionRow::into_reaction).transpose()
    }

    /// Insert or overwrite the user's reaction on a message.
    ///
    /// The read of the current type and the `ON CONFLICT` upsert share one
    /// transaction, so two racing adds both succeed and the later commit
    /// wins. The row id survives a type change.
    pub fn upsert_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        reaction_type: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ReactionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<String> = tx
                .query_row(
                    "SELECT reaction_type FROM message_reactions
                     WHERE message_id = ?1 AND user_id = ?2",
                    [message_id, user_id],
                    |r| r.get(0),
                )
                .optional()?;

            let outcome = match current.as_deref() {
                Some(existing) if existing == reaction_type => return Ok(ReactionOutcome::Unchanged),
                Some(_) => ReactionOutcome::Updated,
                None => ReactionOutcome::Added,
            };

            tx.execute(
                "INSERT INTO message_reactions (message_id, user_id, reaction_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id, user_id) DO UPDATE SET reaction_type = excluded.reaction_type",
                rusqlite::params![message_id, user_id, reaction_type, created_at.timestamp_millis()],
            )?;
            tx.commit()?;

            Ok(outcome)
        })
    }

    pub fn delete_reaction(&self, message_id: i64, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                [message_id, user_id],
            )?;
            Ok(rows)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn get_reactions_for_messages(&self, message_ids: &[i64]) -> Result<Vec<Reaction>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, message_id, user_id, reaction_type, created_at
                 FROM message_reactions WHERE message_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids.iter()), reaction_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })?;

        rows.into_iter().map(ReactionRow::into_reaction).collect()
    }

    // -- Groups --

    pub fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                [group_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn remove_group_member(&self, group_id: i64, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                [group_id, user_id],
            )?;
            Ok(rows)
        })
    }

    pub fn get_group_member_ids(&self, group_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY user_id")?;
            let ids = stmt
                .query_map([group_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    // -- Chat list --

    pub fn upsert_chat_entry(
        &self,
        owner_id: i64,
        peer: ChatPeer,
        preview: &str,
        at: DateTime<Utc>,
        bump_unread: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_list
                    (owner_id, peer_kind, peer_id, last_message_preview, last_message_at, unread_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner_id, peer_kind, peer_id) DO UPDATE SET
                    last_message_preview = excluded.last_message_preview,
                    last_message_at = excluded.last_message_at,
                    unread_count = chat_list.unread_count + excluded.unread_count",
                rusqlite::params![
                    owner_id,
                    peer.kind(),
                    peer.id(),
                    preview,
                    at.timestamp_millis(),
                    bump_unread as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn reset_unread(&self, owner_id: i64, peer: ChatPeer) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_list SET unread_count = 0
                 WHERE owner_id = ?1 AND peer_kind = ?2 AND peer_id = ?3",
                rusqlite::params![owner_id, peer.kind(), peer.id()],
            )?;
            Ok(())
        })
    }

    /// Chat list for a user, most recent conversation first.
    pub fn get_chat_list(&self, owner_id: i64) -> Result<Vec<ChatListEntry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT owner_id, peer_kind, peer_id, last_message_preview, last_message_at, unread_count
                 FROM chat_list WHERE owner_id = ?1
                 ORDER BY last_message_at DESC",
            )?;
            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok(ChatListRow {
                        owner_id: row.get(0)?,
                        peer_kind: row.get(1)?,
                        peer_id: row.get(2)?,
                        last_message_preview: row.get(3)?,
                        last_message_at: row.get(4)?,
                        unread_count: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(ChatListRow::into_entry).collect()
    }
}

fn insert_message_row(conn: &Connection, message: &PendingMessage) -> Result<Option<Message>> {
    let (chat_id, group_id) = match message.target {
        MessageTarget::Private { chat_id } => (Some(chat_id), None),
        MessageTarget::Group { group_id } => (None, Some(group_id)),
    };

    let rows = conn.execute(
        "INSERT INTO messages (sender_id, message_type, chat_id, group_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.sender_id,
            message.target.message_type().as_str(),
            chat_id,
            group_id,
            message.content,
            message.created_at.timestamp_millis(),
        ],
    )?;

    if rows == 0 {
        return Ok(None);
    }

    Ok(Some(message.clone().into_message(conn.last_insert_rowid())))
}

fn query_messages(
    conn: &Connection,
    viewer_id: i64,
    target: MessageTarget,
    before: Option<i64>,
    limit: u32,
) -> Result<Vec<MessageRow>> {
    let rows = match target {
        MessageTarget::Group { group_id } => {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE message_type = 'GROUP' AND group_id = ?1
                   AND (?2 IS NULL OR created_at < ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(rusqlite::params![group_id, before, limit], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        MessageTarget::Private { chat_id } => {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE message_type = 'PRIVATE'
                   AND ((sender_id = ?1 AND chat_id = ?2) OR (sender_id = ?2 AND chat_id = ?1))
                   AND (?3 IS NULL OR created_at < ?3)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?4",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(rusqlite::params![viewer_id, chat_id, before, limit], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        message_type: row.get(2)?,
        chat_id: row.get(3)?,
        group_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
        is_recalled: row.get(7)?,
    })
}

fn reaction_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        reaction_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
