use chrono::DateTime;
use rusqlite::{params, Connection, ErrorCode};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::PersistedDocument;

const SELECT_COLUMNS: &str = "id, identity, title, summary, category, filepath, text, tags,
     timestamp, langs, text_orig, filepath_orig";

/// Insert a document and return its row id.
///
/// A second insert with the same identity fails with
/// `DatabaseError::DuplicateIdentity`; every other failure is `Sqlite`.
pub fn insert_document(conn: &Connection, doc: &PersistedDocument) -> Result<i64, DatabaseError> {
    let tags = serde_json::to_string(&doc.tags).unwrap_or_else(|_| "[]".to_string());
    let langs = serde_json::to_string(&doc.languages).unwrap_or_else(|_| "[]".to_string());

    let result = conn.execute(
        "INSERT INTO documents (identity, title, summary, category, filepath, text, tags,
         timestamp, langs, text_orig, filepath_orig)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doc.identity.to_string(),
            doc.title,
            doc.summary,
            doc.category,
            doc.current_filepath,
            doc.text,
            tags,
            doc.timestamp.to_rfc3339(),
            langs,
            doc.original_text,
            doc.original_filepath,
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(DatabaseError::DuplicateIdentity(doc.identity.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_document_by_identity(
    conn: &Connection,
    identity: &Uuid,
) -> Result<Option<(i64, PersistedDocument)>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM documents WHERE identity = ?1"
    ))?;

    let result = stmt.query_row(params![identity.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some((row.id, document_from_row(row)?))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_documents(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

struct DocumentRow {
    id: i64,
    identity: String,
    title: String,
    summary: String,
    category: String,
    filepath: String,
    text: String,
    tags: String,
    timestamp: String,
    langs: String,
    text_orig: Option<String>,
    filepath_orig: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        identity: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        category: row.get(4)?,
        filepath: row.get(5)?,
        text: row.get(6)?,
        tags: row.get(7)?,
        timestamp: row.get(8)?,
        langs: row.get(9)?,
        text_orig: row.get(10)?,
        filepath_orig: row.get(11)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<PersistedDocument, DatabaseError> {
    let id = row.id;
    let corrupt = |reason: String| DatabaseError::CorruptRow { id, reason };

    let identity = Uuid::parse_str(&row.identity).map_err(|e| corrupt(e.to_string()))?;
    let timestamp =
        DateTime::parse_from_rfc3339(&row.timestamp).map_err(|e| corrupt(e.to_string()))?;
    let tags: Vec<String> =
        serde_json::from_str(&row.tags).map_err(|e| corrupt(format!("tags: {e}")))?;
    let languages: Vec<String> =
        serde_json::from_str(&row.langs).map_err(|e| corrupt(format!("langs: {e}")))?;

    Ok(PersistedDocument {
        identity,
        title: row.title,
        text: row.text,
        original_text: row.text_orig,
        summary: row.summary,
        category: row.category,
        tags,
        languages,
        timestamp,
        current_filepath: row.filepath,
        original_filepath: row.filepath_orig,
    })
}
