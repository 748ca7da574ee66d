use sqlx::PgPool;

use crate::expressions::repo_types::JobRow;

pub async fn insert(db: &PgPool, user_id: i64, expression: &str) -> Result<JobRow, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO expressions (user_id, expression, status)
        VALUES ($1, $2, 'pending')
        RETURNING id, user_id, expression, status, result, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(expression)
    .fetch_one(db)
    .await
}

/// Moves a pending job to a terminal status. Returns the number of rows
/// changed: 0 when the job is unknown or already terminal.
pub async fn mark_terminal(
    db: &PgPool,
    job_id: i64,
    status: &str,
    result: Option<f64>,
) -> Result<u64, sqlx::Error> {
    let done = sqlx::query(
        r#"
        UPDATE expressions
        SET status = $2, result = $3, updated_at = GREATEST(now(), created_at)
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .bind(status)
    .bind(result)
    .execute(db)
    .await?;
    Ok(done.rows_affected())
}

pub async fn list_by_user(db: &PgPool, user_id: i64) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, user_id, expression, status, result, created_at, updated_at
        FROM expressions
        WHERE user_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn find_for_user(
    db: &PgPool,
    user_id: i64,
    job_id: i64,
) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, user_id, expression, status, result, created_at, updated_at
        FROM expressions
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn list_pending(db: &PgPool) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, user_id, expression, status, result, created_at, updated_at
        FROM expressions
        WHERE status = 'pending'
        ORDER BY id ASC
        "#,
    )
    .fetch_all(db)
    .await
}
