use std::convert::TryFrom;

use actix_web::web::Data;
use actix_web::{
    web,
    HttpRequest,
    HttpResponse,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::app::AdminAccount;
use crate::domain::{
    AppBaseUrl,
    MalformedInput,
    NewPost,
    SubscriberEmail,
};
use crate::email_client::EmailClient;
use crate::routes::subscriptions::unsubscribe_link;
use crate::routes::PublishError;
use crate::storage::{
    posts,
    subscribers,
    Post,
    SubscriberRecord,
};
use crate::uploads::{
    StoredUpload,
    UploadStore,
};

const PUBLISH_SECRET_HEADER: &str = "X-Publish-Secret";

#[derive(Deserialize)]
pub struct PublishRequest {
    title: Option<String>,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    content: String,
    post_url: Option<String>,
    #[serde(default, deserialize_with = "truthy_flag")]
    send_full: bool,
    attachment: Option<AttachmentPayload>,
    secret: Option<String>,
}

#[derive(Deserialize)]
pub struct AttachmentPayload {
    file_name: String,
    /// Base64-encoded file content.
    content: String,
}

/// Delivery outcome of one publish call. Produced and consumed within the
/// call; never persisted.
struct DeliveryReport {
    sent: usize,
    failed_recipients: Vec<String>,
    total: usize,
}

#[derive(Serialize)]
pub struct PublishResponse {
    success: bool,
    post_id: Uuid,
    message: String,
    total_recipients: usize,
    sent: usize,
    failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment_url: Option<String>,
}

/// Publish a new post and fan its notification out to every current
/// subscriber.
///
/// Authorization and validation are the only gates before persistence;
/// once the post is recorded, the call reports overall success even if
/// every single send fails. Individual failures are informational and
/// end up in the delivery report.
#[tracing::instrument(
    name = "publishing new post",
    skip(request, body, pool, email_client, upload_store, admin, app_base_url),
    fields(title = ?body.title)
)]
pub async fn publish_newsletter(
    request: HttpRequest,
    body: web::Json<PublishRequest>,
    pool: Data<PgPool>,
    email_client: Data<EmailClient>,
    upload_store: Data<UploadStore>,
    admin: Data<AdminAccount>,
    app_base_url: Data<AppBaseUrl>,
) -> Result<HttpResponse, PublishError> {
    let body = body.into_inner();
    authorize(&request, body.secret.as_deref(), &admin)?;

    let new_post = NewPost::new(body.title, body.excerpt, body.content, body.post_url, body.send_full)?;
    let attachment = match body.attachment {
        Some(payload) => Some(store_attachment(&upload_store, payload)?),
        None => None,
    };

    // The post is durably recorded before any email goes out; it stays
    // recorded even if every delivery below fails.
    let post = posts::insert(&pool, &new_post, attachment.as_ref()).await?;

    let subscriber_snapshot = subscribers::all(&pool).await?;
    let report = deliver_to_subscribers(&email_client, &subscriber_snapshot, &post, &app_base_url).await;
    send_publish_report(&email_client, &admin, &post, &report).await;

    let message = format!(
        "post published, notified {} of {} subscribers",
        report.sent, report.total
    );
    Ok(HttpResponse::Ok().json(PublishResponse {
        success: true,
        post_id: post.id,
        message,
        total_recipients: report.total,
        sent: report.sent,
        failed: report.failed_recipients.len(),
        failed_recipients: report.failed_recipients,
        attachment_url: post.attachment_url,
    }))
}

/// All recorded posts, newest first.
#[tracing::instrument(name = "listing posts", skip(pool))]
pub async fn list_newsletters(pool: Data<PgPool>) -> Result<HttpResponse, PublishError> {
    let posts = posts::list_published(&pool).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// The publish secret travels in a header or in the body; a mismatch
/// fails closed before any side effect.
fn authorize(
    request: &HttpRequest,
    body_secret: Option<&str>,
    admin: &AdminAccount,
) -> Result<(), PublishError> {
    let provided = request
        .headers()
        .get(PUBLISH_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(body_secret);
    match provided {
        Some(secret) if secret == admin.publish_secret => Ok(()),
        _ => Err(PublishError::Unauthorized),
    }
}

fn store_attachment(
    upload_store: &UploadStore,
    payload: AttachmentPayload,
) -> Result<StoredUpload, PublishError> {
    let content = base64::decode(&payload.content).map_err(|_| PublishError::InvalidPost {
        source: MalformedInput::InvalidAttachment {
            message: "content is not valid base64".into(),
        },
    })?;
    Ok(upload_store.store(&payload.file_name, &content)?)
}

/// Sequential, paced fan-out over a subscriber snapshot.
///
/// One send attempt per recipient: a failure is appended to the failed
/// list and the loop moves on. Sends never overlap within a call, which
/// keeps the outbound rate towards the provider predictable.
#[tracing::instrument(
    name = "delivering post to subscribers",
    skip(email_client, subscriber_snapshot, post, app_base_url),
    fields(title = %post.title, recipients = subscriber_snapshot.len())
)]
async fn deliver_to_subscribers(
    email_client: &EmailClient,
    subscriber_snapshot: &[SubscriberRecord],
    post: &Post,
    app_base_url: &AppBaseUrl,
) -> DeliveryReport {
    let mut sent = 0;
    let mut failed_recipients = Vec::new();

    for (position, subscriber) in subscriber_snapshot.iter().enumerate() {
        if position > 0 {
            tokio::time::sleep(email_client.send_pacing()).await;
        }
        let recipient = match SubscriberEmail::try_from(subscriber.email.clone()) {
            Ok(recipient) => recipient,
            Err(e) => {
                tracing::warn!("invalid email retrieved from the store: {}", e);
                failed_recipients.push(subscriber.email.clone());
                continue;
            }
        };
        let (html, text) = render_notification(post, &recipient, app_base_url);
        if email_client
            .send_best_effort(&recipient, &post.title, &html, &text)
            .await
        {
            sent += 1;
        } else {
            failed_recipients.push(subscriber.email.clone());
        }
    }

    DeliveryReport {
        sent,
        failed_recipients,
        total: subscriber_snapshot.len(),
    }
}

fn render_notification(
    post: &Post,
    recipient: &SubscriberEmail,
    app_base_url: &AppBaseUrl,
) -> (String, String) {
    let body = if post.send_full {
        post.content.as_str()
    } else {
        post.excerpt.as_str()
    };
    let unsubscribe_url = unsubscribe_link(app_base_url, recipient);
    let attachment_html = attachment_link(post)
        .map(|(url, name)| format!("<p>Attachment: <a href=\"{}\">{}</a></p>", url, name))
        .unwrap_or_default();
    let attachment_text = attachment_link(post)
        .map(|(url, name)| format!("Attachment {}: {}\n", name, url))
        .unwrap_or_default();

    let html = format!(
        "<h1>{}</h1><p>{}</p><p>Read the full post <a href=\"{}\">here</a>.</p>{}\
         <p><a href=\"{}\">Unsubscribe</a> from this newsletter.</p>",
        post.title, body, post.post_url, attachment_html, unsubscribe_url
    );
    let text = format!(
        "{}\n\n{}\n\nRead the full post: {}\n{}Unsubscribe: {}\n",
        post.title, body, post.post_url, attachment_text, unsubscribe_url
    );
    (html, text)
}

fn attachment_link(post: &Post) -> Option<(&str, &str)> {
    post.attachment_url.as_deref().map(|url| {
        let name = post.attachment_name.as_deref().unwrap_or(url);
        (url, name)
    })
}

/// Exactly one administrator summary per publish call, sent after the
/// fan-out. Best-effort: its failure is logged by the mail client and
/// never propagated.
#[tracing::instrument(
    name = "sending publish report",
    skip(email_client, admin, post, report),
    fields(title = %post.title, sent = report.sent, failed = report.failed_recipients.len())
)]
async fn send_publish_report(
    email_client: &EmailClient,
    admin: &AdminAccount,
    post: &Post,
    report: &DeliveryReport,
) {
    let subject = format!("Published: {}", post.title);
    let attachment_html = attachment_link(post)
        .map(|(url, name)| format!("<li>Attachment: <a href=\"{}\">{}</a></li>", url, name))
        .unwrap_or_default();
    let failed_html = if report.failed_recipients.is_empty() {
        String::new()
    } else {
        let items: String = report
            .failed_recipients
            .iter()
            .map(|email| format!("<li>{}</li>", email))
            .collect();
        format!("<p>Failed recipients:</p><ul>{}</ul>", items)
    };

    let html = format!(
        "<h1>{}</h1><ul><li>Sent: {}</li><li>Failed: {}</li><li>Total recipients: {}</li>\
         <li>Published at: {}</li><li>Post url: <a href=\"{}\">{}</a></li>{}</ul>{}",
        post.title,
        report.sent,
        report.failed_recipients.len(),
        report.total,
        post.published_at.to_rfc3339(),
        post.post_url,
        post.post_url,
        attachment_html,
        failed_html
    );
    let failed_text = if report.failed_recipients.is_empty() {
        String::new()
    } else {
        format!("Failed recipients: {}\n", report.failed_recipients.join(", "))
    };
    let text = format!(
        "{}\nSent: {}\nFailed: {}\nTotal recipients: {}\nPublished at: {}\nPost url: {}\n{}{}",
        post.title,
        report.sent,
        report.failed_recipients.len(),
        report.total,
        post.published_at.to_rfc3339(),
        post.post_url,
        attachment_link(post)
            .map(|(url, name)| format!("Attachment {}: {}\n", name, url))
            .unwrap_or_default(),
        failed_text
    );

    email_client
        .send_best_effort(&admin.email, &subject, &html, &text)
        .await;
}

/// `send_full` arrives as a JSON boolean or as the stringy flags `"1"`
/// and `"true"` some publishing clients send.
fn truthy_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(value) => {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        }
    })
}
