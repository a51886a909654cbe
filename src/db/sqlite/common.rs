use sqlx::{Row, sqlite::SqliteRow};
use uuid::Uuid;

use crate::{
    db::error::{DbError, DbResult},
    models::{Choice, Poll},
};

/// Column list shared by every poll SELECT / RETURNING clause.
pub const POLL_COLUMNS: &str = "id, question, created_at, updated_at, expires_at, deleted_at";

/// Parse a UUID string from the database, returning a DbError on failure
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID in database: {}", e)))
}

pub const CHOICE_COLUMNS: &str = "id, poll_id, choice_text, votes, position";

pub fn choice_from_row(row: &SqliteRow) -> DbResult<Choice> {
    Ok(Choice {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        poll_id: parse_uuid(&row.get::<String, _>("poll_id"))?,
        choice_text: row.get("choice_text"),
        votes: row.get("votes"),
        position: row.get("position"),
    })
}

pub fn poll_from_row(row: &SqliteRow) -> DbResult<Poll> {
    Ok(Poll {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        question: row.get("question"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        expires_at: row.get("expires_at"),
        deleted_at: row.get("deleted_at"),
    })
}
