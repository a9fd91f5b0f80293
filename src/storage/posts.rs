use chrono::{
    DateTime,
    Utc,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::NewPost;
use crate::uploads::StoredUpload;

/// A published post as recorded in the durable log. Immutable once
/// written; never deleted by this service.
#[derive(Clone, Debug, serde::Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub post_url: String,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub send_full: bool,
    pub published_at: DateTime<Utc>,
}

/// Record exactly one post for a publish call and return it with its
/// assigned identifier and publication time.
#[tracing::instrument(
    name = "inserting new post",
    skip(pool, post, attachment),
    fields(title = %post.title)
)]
pub async fn insert(
    pool: &PgPool,
    post: &NewPost,
    attachment: Option<&StoredUpload>,
) -> Result<Post, sqlx::Error> {
    let record = Post {
        id: Uuid::new_v4(),
        title: post.title.clone(),
        excerpt: post.excerpt.clone(),
        content: post.content.clone(),
        post_url: post.post_url.to_string(),
        attachment_url: attachment.map(|a| a.url.clone()),
        attachment_name: attachment.map(|a| a.file_name.clone()),
        send_full: post.send_full,
        published_at: Utc::now(),
    };
    sqlx::query(
        r#"
        INSERT INTO posts
            (id, title, excerpt, content, post_url, attachment_url, attachment_name, send_full, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(record.id)
    .bind(&record.title)
    .bind(&record.excerpt)
    .bind(&record.content)
    .bind(&record.post_url)
    .bind(record.attachment_url.as_deref())
    .bind(record.attachment_name.as_deref())
    .bind(record.send_full)
    .bind(record.published_at)
    .execute(pool)
    .await?;
    Ok(record)
}

/// All recorded posts, newest first.
#[tracing::instrument(name = "listing published posts", skip(pool))]
pub async fn list_published(pool: &PgPool) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, excerpt, content, post_url, attachment_url, attachment_name, send_full, published_at
        FROM posts
        ORDER BY published_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}
