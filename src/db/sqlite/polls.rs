use async_trait::async_trait;
use chrono::Duration;
use sqlx::{Row, SqlitePool, pool::PoolConnection};
use uuid::Uuid;
use validator::Validate;

use super::common::{CHOICE_COLUMNS, POLL_COLUMNS, choice_from_row, poll_from_row};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{PollRepo, PurgeReason},
    },
    lifecycle::{Lifecycle, LifecycleState},
    models::{Choice, CreatePoll, DependentCounts, Poll, StateCounts},
};

pub struct SqlitePollRepo {
    pool: SqlitePool,
    lifecycle: Lifecycle,
}

impl SqlitePollRepo {
    pub fn new(pool: SqlitePool, lifecycle: Lifecycle) -> Self {
        Self { pool, lifecycle }
    }

    async fn fetch_where(&self, filter: &str) -> DbResult<Vec<Poll>> {
        let query = format!(
            "SELECT {} FROM polls {} ORDER BY created_at ASC, id ASC",
            POLL_COLUMNS, filter
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(poll_from_row).collect()
    }

    /// Distinguish "lost the race" from "no such poll" after a conditional
    /// update matched nothing.
    async fn precondition_or_not_found(&self, id: Uuid, precondition: DbError) -> DbError {
        match self.get_by_id(id).await {
            Ok(Some(_)) => precondition,
            Ok(None) => DbError::NotFound,
            Err(e) => e,
        }
    }

    /// Acquire a connection and take the SQLite write lock up front, so the
    /// read-classify-write sequence that follows cannot interleave with
    /// another writer.
    async fn begin_immediate(&self) -> DbResult<PoolConnection<sqlx::Sqlite>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    async fn finish<T>(
        mut conn: PoolConnection<sqlx::Sqlite>,
        result: DbResult<T>,
    ) -> DbResult<T> {
        match &result {
            Ok(_) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
            }
            Err(_) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            }
        }
        result
    }
}

#[async_trait]
impl PollRepo for SqlitePollRepo {
    async fn create(&self, input: CreatePoll) -> DbResult<Poll> {
        input
            .validate()
            .map_err(|e| DbError::Validation(e.to_string()))?;

        let id = Uuid::new_v4();
        let now = self.lifecycle.now();
        let expires_at = input.expiration.expires_at(now);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO polls (id, question, created_at, updated_at, expires_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.question)
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        for (position, choice_text) in input.choices.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO choices (id, poll_id, choice_text, votes, position)
                VALUES (?, ?, ?, 0, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(choice_text.trim())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Poll {
            id,
            question: input.question,
            created_at: now,
            updated_at: now,
            expires_at,
            deleted_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Poll>> {
        let query = format!("SELECT {} FROM polls WHERE id = ?", POLL_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(poll_from_row).transpose()
    }

    async fn all(&self) -> DbResult<Vec<Poll>> {
        self.fetch_where("").await
    }

    async fn non_deleted(&self) -> DbResult<Vec<Poll>> {
        self.fetch_where("WHERE deleted_at IS NULL").await
    }

    async fn active(&self) -> DbResult<Vec<Poll>> {
        let candidates = self.non_deleted().await?;
        let now = self.lifecycle.now();
        Ok(candidates
            .into_iter()
            .filter(|poll| self.lifecycle.classify_at(poll, now) == LifecycleState::Active)
            .collect())
    }

    async fn soft_deleted(&self) -> DbResult<Vec<Poll>> {
        self.fetch_where("WHERE deleted_at IS NOT NULL").await
    }

    async fn count_by_state(&self) -> DbResult<StateCounts> {
        let polls = self.all().await?;
        let now = self.lifecycle.now();
        let mut counts = StateCounts::default();
        for poll in &polls {
            counts.record(self.lifecycle.classify_at(poll, now));
        }
        Ok(counts)
    }

    async fn choices(&self, poll_id: Uuid) -> DbResult<Vec<Choice>> {
        let query = format!(
            "SELECT {} FROM choices WHERE poll_id = ? ORDER BY position ASC",
            CHOICE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(poll_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(choice_from_row).collect()
    }

    async fn count_dependents(&self, id: Uuid) -> DbResult<DependentCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM choices WHERE poll_id = ?) AS choices,
                (SELECT COUNT(*) FROM votes WHERE poll_id = ?) AS votes
            "#,
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(DependentCounts {
            choices: row.get::<i64, _>("choices") as u64,
            votes: row.get::<i64, _>("votes") as u64,
        })
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<Poll> {
        let now = self.lifecycle.now();
        let query = format!(
            r#"
            UPDATE polls
            SET deleted_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            RETURNING {}
            "#,
            POLL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => poll_from_row(&row),
            None => Err(self
                .precondition_or_not_found(id, DbError::AlreadySoftDeleted)
                .await),
        }
    }

    async fn restore(&self, id: Uuid) -> DbResult<Poll> {
        let now = self.lifecycle.now();
        let query = format!(
            r#"
            UPDATE polls
            SET deleted_at = NULL, updated_at = ?
            WHERE id = ? AND deleted_at IS NOT NULL
            RETURNING {}
            "#,
            POLL_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => poll_from_row(&row),
            None => Err(self
                .precondition_or_not_found(id, DbError::NotSoftDeleted)
                .await),
        }
    }

    async fn extend_expiration(&self, id: Uuid, duration: Duration) -> DbResult<Poll> {
        // Reject before touching the store.
        self.lifecycle.policy().validate_extension(duration)?;
        let allow_never = self.lifecycle.policy().allow_extend_never_expiring;

        let mut conn = self.begin_immediate().await?;

        let result: DbResult<Poll> = async {
            let select = format!("SELECT {} FROM polls WHERE id = ?", POLL_COLUMNS);
            let current = sqlx::query(&select)
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(DbError::NotFound)?;
            let current = poll_from_row(&current)?;

            let now = self.lifecycle.now();
            let new_expires_at = match current.expires_at {
                Some(expires_at) => expires_at.max(now) + duration,
                None if allow_never => now + duration,
                None => return Err(DbError::AlreadyNeverExpires),
            };

            let update = format!(
                r#"
                UPDATE polls
                SET expires_at = ?, updated_at = ?
                WHERE id = ?
                RETURNING {}
                "#,
                POLL_COLUMNS
            );
            let row = sqlx::query(&update)
                .bind(new_expires_at)
                .bind(now)
                .bind(id.to_string())
                .fetch_one(&mut *conn)
                .await?;

            poll_from_row(&row)
        }
        .await;

        Self::finish(conn, result).await
    }

    async fn purge(&self, id: Uuid, reason: PurgeReason) -> DbResult<DependentCounts> {
        let mut conn = self.begin_immediate().await?;

        let result: DbResult<DependentCounts> = async {
            let select = format!("SELECT {} FROM polls WHERE id = ?", POLL_COLUMNS);
            let current = sqlx::query(&select)
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(DbError::NotFound)?;
            let current = poll_from_row(&current)?;

            // Re-classify under the write lock: a restore or extension may have
            // landed since the caller looked.
            let state = self.lifecycle.classify(&current);
            let required = match reason {
                PurgeReason::GraceElapsed => LifecycleState::PurgeEligible,
                PurgeReason::ForcedExpiry => LifecycleState::Expired,
            };
            if state != required {
                return Err(DbError::NotPurgeEligible(format!(
                    "poll is {}, {} purge requires {}",
                    state,
                    reason.as_str(),
                    required
                )));
            }

            let votes = sqlx::query("DELETE FROM votes WHERE poll_id = ?")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?
                .rows_affected();
            let choices = sqlx::query("DELETE FROM choices WHERE poll_id = ?")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?
                .rows_affected();
            let deleted = sqlx::query("DELETE FROM polls WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?
                .rows_affected();

            if deleted == 0 {
                return Err(DbError::NotFound);
            }

            Ok(DependentCounts { choices, votes })
        }
        .await;

        Self::finish(conn, result).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        db::tests::harness::run_sqlite_migrations,
        lifecycle::{ExpirationChoice, ManualClock, RetentionPolicy},
    };

    async fn create_file_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(dir.path().join("polls.db"))
                    .create_if_missing(true)
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                    .busy_timeout(std::time::Duration::from_secs(5)),
            )
            .await
            .expect("Failed to create file-backed SQLite pool");
        run_sqlite_migrations(&pool).await;
        pool
    }

    fn lifecycle() -> Lifecycle {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap());
        Lifecycle::new(Arc::new(clock), RetentionPolicy::default())
    }

    fn input() -> CreatePoll {
        CreatePoll {
            question: "Ship on Friday?".to_string(),
            choices: vec!["Yes".to_string(), "Never".to_string()],
            expiration: ExpirationChoice::Days7,
        }
    }

    #[tokio::test]
    async fn test_concurrent_soft_deletes_commit_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_file_pool(&dir).await;
        let repo = Arc::new(SqlitePollRepo::new(pool, lifecycle()));
        let poll = repo.create(input()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move { repo.soft_delete(poll.id).await }));
        }

        let mut applied = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => applied += 1,
                Err(DbError::AlreadySoftDeleted) => already += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(already, 3);
    }

    #[tokio::test]
    async fn test_timestamps_survive_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_file_pool(&dir).await;
        let repo = SqlitePollRepo::new(pool, lifecycle());

        let created = repo.create(input()).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }
}
