use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

macro_rules! migration_ddl {
    ($file:literal) => {
        include_str!(concat!("../../ddl/migrations/", $file))
    };
}

/// Define all schema migrations.
///
/// V1 uses `IF NOT EXISTS` so that databases created before versioning was
/// tracked (same tables, `user_version` 0) upgrade in place.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(migration_ddl!("00001__chat_store.sql"))])
}

/// Apply all pending migrations to the database.
pub fn apply_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    migrations()
        .to_latest(conn)
        .map_err(|e| anyhow::anyhow!("Failed to apply migrations: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn migrations_are_valid() {
        migrations().validate().unwrap();
    }

    #[test]
    fn apply_migrations_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();

        assert!(table_exists(&conn, "chatHistory"));
        assert!(table_exists(&conn, "userContext"));
    }

    #[test]
    fn apply_migrations_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
    }

    #[test]
    fn unversioned_database_is_adopted() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Tables created by a tool that never set user_version.
        conn.execute_batch(
            "CREATE TABLE chatHistory (
                chatID TEXT PRIMARY KEY,
                userID TEXT,
                lastUpdated INTEGER,
                chatName TEXT,
                serviceInfo TEXT,
                messages TEXT
            );
            CREATE TABLE userContext (
                userID TEXT PRIMARY KEY,
                activeChatID TEXT,
                isPaused INTEGER
            );
            INSERT INTO userContext (userID, activeChatID, isPaused) VALUES ('u1', 'c1', 1);",
        )
        .unwrap();

        apply_migrations(&mut conn).unwrap();

        let (active, paused): (String, i64) = conn
            .query_row(
                "SELECT activeChatID, isPaused FROM userContext WHERE userID = 'u1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(active, "c1");
        assert_eq!(paused, 1);

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
