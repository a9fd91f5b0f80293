use chrono::{
    DateTime,
    Utc,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    NewSubscriber,
    SubscriberEmail,
};

/// Postgres error code for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum SubscriberStoreError {
    #[error("a subscriber with the same email already exists")]
    Conflict,
    #[error(transparent)]
    Unexpected(#[from] sqlx::Error),
}

impl SubscriberStoreError {
    fn from_insert(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error)
                if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                SubscriberStoreError::Conflict
            }
            _ => SubscriberStoreError::Unexpected(error),
        }
    }
}

#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct SubscriberRecord {
    pub email: String,
    pub name: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

/// Insert a new subscriber keyed by its normalized email.
///
/// There is deliberately no existence pre-check: the unique constraint is
/// the single race-safe enforcement point, and a concurrent duplicate
/// surfaces as `Conflict`.
#[tracing::instrument(
    name = "inserting new subscriber",
    skip(pool, subscriber),
    fields(email = %subscriber.email)
)]
pub async fn insert(pool: &PgPool, subscriber: &NewSubscriber) -> Result<(), SubscriberStoreError> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, email, name, subscribed_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subscriber.email.as_ref())
    .bind(subscriber.name.as_ref().map(AsRef::as_ref))
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(SubscriberStoreError::from_insert)?;
    Ok(())
}

/// The full subscriber list, in unspecified order. Callers treat the
/// result as a snapshot: rows added or removed afterwards are not
/// reflected.
#[tracing::instrument(name = "loading all subscribers", skip(pool))]
pub async fn all(pool: &PgPool) -> Result<Vec<SubscriberRecord>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberRecord>(
        r#"
        SELECT email, name, subscribed_at
        FROM subscriptions
        "#,
    )
    .fetch_all(pool)
    .await
}

#[tracing::instrument(name = "looking up subscriber", skip(pool), fields(email = %email))]
pub async fn find_by_email(
    pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<Option<SubscriberRecord>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberRecord>(
        r#"
        SELECT email, name, subscribed_at
        FROM subscriptions
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .fetch_optional(pool)
    .await
}

/// Delete by normalized email; returns the number of removed rows (0 or 1).
#[tracing::instrument(name = "deleting subscriber", skip(pool), fields(email = %email))]
pub async fn delete_by_email(pool: &PgPool, email: &SubscriberEmail) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM subscriptions
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[tracing::instrument(name = "counting subscribers", skip(pool))]
pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM subscriptions
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(total)
}
