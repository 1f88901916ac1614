//! SQLite backend shared by memory records and the session name index.
//!
//! Unset scope fields are stored as empty strings so the
//! `UNIQUE(name, agent_id, user_id, session_id)` constraint treats them as
//! equal values.

use crate::state::{SessionIndexStore, SessionMapping, StateError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use mnemos_rs_memory::store::check_inputs;
use mnemos_rs_memory::{
    Access, ListFilter, MemoryError, MemoryRecord, MemoryRecordInput, MemoryScope, MemoryStore,
    MemoryUpdate, ReadMode, RunScope, SessionId,
};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memory_records (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    content TEXT NOT NULL,
    read_mode TEXT NOT NULL,
    access TEXT NOT NULL,
    agent_id TEXT NOT NULL DEFAULT '',
    user_id TEXT NOT NULL DEFAULT '',
    session_id TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(name, agent_id, user_id, session_id)
);
CREATE TABLE IF NOT EXISTS session_names (
    session_name TEXT PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
"#;

const RECORD_COLUMNS: &str = "id, name, description, content, read_mode, access, agent_id, \
     user_id, session_id, metadata, created_at, updated_at";

/// SQLite-backed store for memory records and session names.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("opened sqlite store (path={})", path.display());
        Self::from_connection(conn)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StateError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StateError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Raw column values for a memory record row.
struct RecordRow {
    id: String,
    name: String,
    description: Option<String>,
    content: String,
    read_mode: String,
    access: String,
    agent_id: String,
    user_id: String,
    session_id: String,
    metadata: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            content: row.get(3)?,
            read_mode: row.get(4)?,
            access: row.get(5)?,
            agent_id: row.get(6)?,
            user_id: row.get(7)?,
            session_id: row.get(8)?,
            metadata: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<MemoryRecord, MemoryError> {
        let corrupt = |field: &str, value: &str| {
            MemoryError::Store(format!("invalid {field} in memory_records: {value}"))
        };
        let id = Uuid::parse_str(&self.id).map_err(|_| corrupt("id", &self.id))?;
        let read_mode =
            ReadMode::parse(&self.read_mode).ok_or_else(|| corrupt("read_mode", &self.read_mode))?;
        let access = Access::parse(&self.access).ok_or_else(|| corrupt("access", &self.access))?;
        let session_id = match self.session_id.as_str() {
            "" => None,
            raw => Some(Uuid::parse_str(raw).map_err(|_| corrupt("session_id", raw))?),
        };
        Ok(MemoryRecord {
            id,
            name: self.name,
            description: self.description,
            content: serde_json::from_str(&self.content)?,
            read_mode,
            access,
            scope: MemoryScope {
                agent_id: non_empty(self.agent_id),
                user_id: non_empty(self.user_id),
                session_id,
            },
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn session_column(session_id: Option<SessionId>) -> String {
    session_id.map(|id| id.to_string()).unwrap_or_default()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

fn store_error(err: rusqlite::Error) -> MemoryError {
    MemoryError::Store(err.to_string())
}

fn insert_record(conn: &Connection, record: &MemoryRecord) -> Result<(), MemoryError> {
    let result = conn.execute(
        "INSERT INTO memory_records (id, name, description, content, read_mode, access, \
         agent_id, user_id, session_id, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id.to_string(),
            record.name,
            record.description,
            serde_json::to_string(&record.content)?,
            record.read_mode.as_str(),
            record.access.as_str(),
            record.scope.agent_id.clone().unwrap_or_default(),
            record.scope.user_id.clone().unwrap_or_default(),
            session_column(record.scope.session_id),
            serde_json::to_string(&record.metadata)?,
            record.created_at,
            record.updated_at,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_constraint_violation(&err) => Err(MemoryError::Duplicate {
            name: record.name.clone(),
        }),
        Err(err) => Err(store_error(err)),
    }
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    let mut stmt = conn.prepare(sql).map_err(store_error)?;
    let rows = stmt
        .query_map(params, RecordRow::from_row)
        .map_err(store_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(store_error)?;
    rows.into_iter().map(RecordRow::into_record).collect()
}

fn load_record(conn: &Connection, id: Uuid) -> Result<Option<MemoryRecord>, MemoryError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM memory_records WHERE id = ?1"),
            params![id.to_string()],
            RecordRow::from_row,
        )
        .optional()
        .map_err(store_error)?;
    row.map(RecordRow::into_record).transpose()
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn create(&self, input: MemoryRecordInput) -> Result<MemoryRecord, MemoryError> {
        input.validate()?;
        let record = MemoryRecord::from_input(input);
        let conn = self.conn.lock();
        insert_record(&conn, &record)?;
        debug!(
            "stored memory record (id={}, name={}, read_mode={})",
            record.id,
            record.name,
            record.read_mode.as_str()
        );
        Ok(record)
    }

    async fn create_batch(
        &self,
        inputs: Vec<MemoryRecordInput>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        check_inputs(&[], &inputs)?;
        let records: Vec<MemoryRecord> = inputs.into_iter().map(MemoryRecord::from_input).collect();
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_error)?;
        for record in &records {
            // Dropping the transaction on error rolls it back.
            insert_record(&tx, record)?;
        }
        tx.commit().map_err(store_error)?;
        info!("stored memory batch (count={})", records.len());
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, MemoryError> {
        let conn = self.conn.lock();
        load_record(&conn, id)
    }

    async fn find_in_scope(&self, scope: &RunScope) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.conn.lock();
        let records = query_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM memory_records \
                 WHERE (agent_id = '' OR agent_id = ?1) \
                 AND (user_id = '' OR user_id = ?2) \
                 AND (session_id = '' OR session_id = ?3)"
            ),
            params![
                scope.agent_id,
                scope.user_id.clone().unwrap_or_default(),
                session_column(scope.session_id),
            ],
        )?;
        debug!(
            "found scoped memory (agent_id={}, returned={})",
            scope.agent_id,
            records.len()
        );
        Ok(records)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.conn.lock();
        let mut records = query_records(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM memory_records ORDER BY created_at"),
            [],
        )?;
        records.retain(|record| filter.accepts(record));
        Ok(records)
    }

    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<MemoryRecord, MemoryError> {
        let conn = self.conn.lock();
        let mut record = load_record(&conn, id)?.ok_or(MemoryError::NotFound(id))?;
        record.apply(update);
        conn.execute(
            "UPDATE memory_records SET description = ?2, content = ?3, read_mode = ?4, \
             access = ?5, metadata = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                id.to_string(),
                record.description,
                serde_json::to_string(&record.content)?,
                record.read_mode.as_str(),
                record.access.as_str(),
                serde_json::to_string(&record.metadata)?,
                record.updated_at,
            ],
        )
        .map_err(store_error)?;
        debug!("updated memory record (id={}, name={})", id, record.name);
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError> {
        let conn = self.conn.lock();
        let affected = conn
            .execute(
                "DELETE FROM memory_records WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(store_error)?;
        if affected > 0 {
            info!("deleted memory record (id={})", id);
        }
        Ok(affected > 0)
    }
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, DateTime<Utc>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_mapping(
    (session_name, session_id, created_at): (String, String, DateTime<Utc>),
) -> Result<SessionMapping, StateError> {
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|_| StateError::Corrupt(format!("invalid session_id: {session_id}")))?;
    Ok(SessionMapping {
        session_name,
        session_id,
        created_at,
    })
}

#[async_trait]
impl SessionIndexStore for SqliteStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<SessionMapping>, StateError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT session_name, session_id, created_at FROM session_names \
                 WHERE session_name = ?1",
                params![name],
                mapping_from_row,
            )
            .optional()?;
        row.map(into_mapping).transpose()
    }

    async fn find_by_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT session_name, session_id, created_at FROM session_names \
                 WHERE session_id = ?1",
                params![session_id.to_string()],
                mapping_from_row,
            )
            .optional()?;
        row.map(into_mapping).transpose()
    }

    async fn insert_mapping(
        &self,
        name: &str,
        session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        let mapping = SessionMapping {
            session_name: name.to_string(),
            session_id,
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO session_names (session_name, session_id, created_at) \
             VALUES (?1, ?2, ?3)",
            params![name, session_id.to_string(), mapping.created_at],
        );
        match result {
            Ok(_) => Ok(mapping),
            Err(err) if is_constraint_violation(&err) => {
                let name_taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM session_names WHERE session_name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if name_taken {
                    Err(StateError::NameTaken(name.to_string()))
                } else {
                    Err(StateError::IdTaken(session_id))
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}
