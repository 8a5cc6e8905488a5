// SQLite JobRepository Implementation

use async_trait::async_trait;
use restyle_core::domain::{Job, JobId, JobMetrics, JobPatch, JobStatus, Precondition};
use restyle_core::error::{AppError, Result};
use restyle_core::port::{JobRepository, UpdateOutcome};
use sqlx::SqlitePool;

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "275" => AppError::Database(format!(
                        "Check constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// SQL guard evaluated in the same statement as the write
fn guard_clause(precondition: Precondition) -> String {
    match precondition {
        Precondition::StatusIs(status) => format!("status = '{}'", status.as_str()),
        Precondition::NotTerminal => format!(
            "status IN ('{}', '{}')",
            JobStatus::Pending.as_str(),
            JobStatus::Processing.as_str()
        ),
        Precondition::ProgressBelow(percent) => format!(
            "status = '{}' AND progress < {}",
            JobStatus::Processing.as_str(),
            percent
        ),
    }
}

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let options = serde_json::to_string(&job.options)?;
        let metrics = job.metrics.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, input_path, reference_path, style_template, options,
                status, progress, output_path, error_message, metrics,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.input_path)
        .bind(&job.reference_path)
        .bind(&job.style_template)
        .bind(options)
        .bind(job.status.as_str())
        .bind(i64::from(job.progress))
        .bind(&job.output_path)
        .bind(&job.error_message)
        .bind(metrics)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<UpdateOutcome> {
        let metrics = patch
            .metrics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Conditional update: absent patch fields keep their stored values
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = COALESCE(?, status),
                progress = COALESCE(?, progress),
                output_path = COALESCE(?, output_path),
                error_message = COALESCE(?, error_message),
                metrics = COALESCE(?, metrics),
                updated_at = ?
            WHERE id = ? AND {}
            RETURNING *
            "#,
            guard_clause(patch.precondition)
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(patch.status.map(JobStatus::as_str))
            .bind(patch.progress.map(i64::from))
            .bind(&patch.output_path)
            .bind(&patch.error_message)
            .bind(metrics)
            .bind(patch.updated_at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Ok(UpdateOutcome::Applied(row.into_job()?));
        }

        // Guard failed or the job does not exist
        Ok(match self.find_by_id(id).await? {
            Some(current) => UpdateOutcome::Rejected(current),
            None => UpdateOutcome::NotFound,
        })
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM jobs ORDER BY created_at ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE status = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    input_path: String,
    reference_path: Option<String>,
    style_template: Option<String>,
    options: String,
    status: String,
    progress: i64,
    output_path: Option<String>,
    error_message: Option<String>,
    metrics: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status: JobStatus = self.status.parse()?;
        let progress = u8::try_from(self.progress).map_err(|_| {
            AppError::Database(format!(
                "Job {} has out-of-range progress {}",
                self.id, self.progress
            ))
        })?;
        let metrics: Option<JobMetrics> = self
            .metrics
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Job {
            id: self.id,
            input_path: self.input_path,
            reference_path: self.reference_path,
            style_template: self.style_template,
            options: serde_json::from_str(&self.options)?,
            status,
            progress,
            output_path: self.output_path,
            error_message: self.error_message,
            metrics,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
