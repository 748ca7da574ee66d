use crate::auth::repo_types::User;
use sqlx::PgPool;

impl User {
    /// Find a user by login.
    pub async fn find_by_login(db: &PgPool, login: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(db)
        .await
    }

    /// Insert a user unless the login is taken; `None` means it was.
    ///
    /// The unique constraint decides the race, so two concurrent registrations
    /// of the same login cannot both succeed.
    pub async fn create(
        db: &PgPool,
        login: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (login, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (login) DO NOTHING
            RETURNING id, login, password_hash
            "#,
        )
        .bind(login)
        .bind(password_hash)
        .fetch_optional(db)
        .await
    }
}
