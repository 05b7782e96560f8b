use std::path::PathBuf;

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::schema::apply_migrations;

/// Knows where the chat database lives and how to open a migrated connection.
pub enum DatabaseDriver {
    /// A database file, created with its parent directories on first open.
    File(PathBuf),
    /// A named shared-cache in-memory database. The anchor connection keeps
    /// it alive for as long as the driver exists.
    InMemory { uri: String, _anchor: Connection },
}

impl DatabaseDriver {
    pub fn file(path: PathBuf) -> Self {
        Self::File(path)
    }

    /// Create a named in-memory database with the schema applied.
    ///
    /// Connections opened from the same driver see the same data; drivers
    /// with different names are isolated from each other.
    pub fn in_memory(name: &str) -> anyhow::Result<Self> {
        let uri = format!("file:{name}?mode=memory&cache=shared");
        let mut anchor = open_uri(&uri)?;
        apply_migrations(&mut anchor)?;
        Ok(Self::InMemory {
            uri,
            _anchor: anchor,
        })
    }

    /// Open a connection with all migrations applied.
    pub fn open(&self) -> anyhow::Result<Connection> {
        match self {
            Self::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
                let mut conn = Connection::open(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?;
                apply_migrations(&mut conn)?;
                debug!(path = %path.display(), "Opened chat database");
                Ok(conn)
            }
            Self::InMemory { uri, .. } => {
                let conn = open_uri(uri)?;
                debug!(uri = %uri, "Opened in-memory chat database");
                Ok(conn)
            }
        }
    }
}

fn open_uri(uri: &str) -> anyhow::Result<Connection> {
    Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open in-memory database {uri}"))
}
