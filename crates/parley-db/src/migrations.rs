use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL,
                message_type    TEXT NOT NULL CHECK (message_type IN ('PRIVATE', 'GROUP')),
                chat_id         INTEGER,
                group_id        INTEGER,
                content         TEXT NOT NULL CHECK (length(content) > 0),
                created_at      INTEGER NOT NULL,
                is_recalled     INTEGER NOT NULL DEFAULT 0,
                CHECK (
                    (message_type = 'PRIVATE' AND chat_id IS NOT NULL AND group_id IS NULL)
                    OR (message_type = 'GROUP' AND group_id IS NOT NULL AND chat_id IS NULL)
                )
            );

            CREATE INDEX idx_messages_group
                ON messages(group_id, created_at);

            CREATE INDEX idx_messages_private
                ON messages(sender_id, chat_id, created_at);

            CREATE TABLE message_reactions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      INTEGER NOT NULL REFERENCES messages(id),
                user_id         INTEGER NOT NULL,
                reaction_type   TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                UNIQUE(message_id, user_id)
            );

            CREATE INDEX idx_reactions_message
                ON message_reactions(message_id);

            CREATE TABLE group_members (
                group_id    INTEGER NOT NULL,
                user_id     INTEGER NOT NULL,
                PRIMARY KEY (group_id, user_id)
            );

            CREATE TABLE chat_list (
                owner_id                INTEGER NOT NULL,
                peer_kind               TEXT NOT NULL CHECK (peer_kind IN ('user', 'group')),
                peer_id                 INTEGER NOT NULL,
                last_message_preview    TEXT NOT NULL,
                last_message_at         INTEGER NOT NULL,
                unread_count            INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (owner_id, peer_kind, peer_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}
