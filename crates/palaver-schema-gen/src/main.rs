//! Regenerates `crates/palaver-lib/ddl/schema.sql` from the migration files.
//!
//! Run via: `cargo run -p palaver-schema-gen`

use std::path::PathBuf;

use rusqlite::Connection;

macro_rules! migration_ddl {
    ($file:literal) => {
        include_str!(concat!("../../palaver-lib/ddl/migrations/", $file))
    };
}

/// All migration files in order. Add new entries here when creating migrations.
const MIGRATIONS: &[&str] = &[migration_ddl!("00001__chat_store.sql")];

fn main() {
    let conn = build_from_migrations();
    let schema = dump_schema(&conn);

    let output_path = output_path();
    std::fs::write(&output_path, &schema)
        .unwrap_or_else(|e| panic!("Failed to write {}: {e}", output_path.display()));

    println!("Schema written to {}", output_path.display());
}

fn build_from_migrations() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
    for (i, ddl) in MIGRATIONS.iter().enumerate() {
        conn.execute_batch(ddl)
            .unwrap_or_else(|e| panic!("Failed to apply migration {}: {e}", i + 1));
    }
    conn
}

/// Dump all CREATE statements from `sqlite_master`, excluding `SQLite` internals.
fn dump_schema(conn: &Connection) -> String {
    let mut stmt = conn
        .prepare(
            "SELECT sql FROM sqlite_master \
             WHERE sql IS NOT NULL \
             AND name NOT LIKE 'sqlite_%' \
             ORDER BY \
                 CASE type \
                     WHEN 'table' THEN 0 \
                     WHEN 'index' THEN 1 \
                     ELSE 2 \
                 END, \
                 name",
        )
        .expect("Failed to prepare sqlite_master query");

    let rows: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .expect("Failed to query sqlite_master")
        .map(|r| r.expect("Failed to read row"))
        .collect();

    rows.iter()
        .map(|sql| format!("{sql};\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn output_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../palaver-lib/ddl/schema.sql")
}
