use std::convert::TryFrom;

use actix_web::web::Data;
use actix_web::{
    web,
    HttpResponse,
};
use serde::{
    Deserialize,
    Serialize,
};
use sqlx::PgPool;
use tracing_futures::Instrument;

use crate::app::AdminAccount;
use crate::domain::{
    AppBaseUrl,
    MalformedInput,
    NewSubscriber,
    SubscriberEmail,
    SubscriberName,
};
use crate::email_client::EmailClient;
use crate::routes::SubscriptionError;
use crate::storage::subscribers;
use crate::storage::{
    SubscriberRecord,
    SubscriberStoreError,
};

#[derive(Deserialize)]
pub struct FormData {
    email: String,
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum SubscriptionStatus {
    Created,
    AlreadySubscribed,
}

#[derive(Serialize)]
struct SubscribeResponse {
    status: SubscriptionStatus,
}

/// Subscribe an email address to the newsletter.
///
/// A duplicate subscribe is a success without a new subscription: the
/// store's unique key is the only duplicate check, so two concurrent
/// calls for the same address race safely and one of them observes
/// `Conflict`.
#[tracing::instrument(
    name = "adding new subscriber",
    skip(form, pool, email_client, admin, app_base_url),
    fields(email = %form.email)
)]
pub async fn subscribe(
    form: web::Form<FormData>,
    pool: Data<PgPool>,
    email_client: Data<EmailClient>,
    admin: Data<AdminAccount>,
    app_base_url: Data<AppBaseUrl>,
) -> Result<HttpResponse, SubscriptionError> {
    let new_subscriber = build_new_subscriber(form.into_inner())?;

    match subscribers::insert(&pool, &new_subscriber).await {
        Ok(()) => {}
        Err(SubscriberStoreError::Conflict) => {
            tracing::info!("email is already subscribed, nothing to do");
            return Ok(HttpResponse::Ok().json(SubscribeResponse {
                status: SubscriptionStatus::AlreadySubscribed,
            }));
        }
        Err(error) => return Err(error.into()),
    }

    spawn_subscription_notifications(
        pool,
        email_client,
        admin,
        app_base_url.get_ref().clone(),
        new_subscriber.email,
    );

    Ok(HttpResponse::Ok().json(SubscribeResponse {
        status: SubscriptionStatus::Created,
    }))
}

#[tracing::instrument(name = "validating subscription data", skip(form))]
fn build_new_subscriber(form: FormData) -> Result<NewSubscriber, MalformedInput> {
    let name = match form.name.filter(|name| !name.trim().is_empty()) {
        Some(name) => Some(SubscriberName::try_from(name).map_err(|e| {
            tracing::warn!("{}", e);
            e
        })?),
        None => None,
    };
    let email = SubscriberEmail::try_from(form.email).map_err(|e| {
        tracing::warn!("{}", e);
        e
    })?;
    Ok(NewSubscriber { email, name })
}

/// Welcome and admin notifications are detached from the request path:
/// the subscriber is created whether or not either email goes out, and
/// failures are only logged.
fn spawn_subscription_notifications(
    pool: Data<PgPool>,
    email_client: Data<EmailClient>,
    admin: Data<AdminAccount>,
    app_base_url: AppBaseUrl,
    email: SubscriberEmail,
) {
    let span = tracing::info_span!("subscription notifications", email = %email);
    actix_web::rt::spawn(
        async move {
            let unsubscribe_url = unsubscribe_link(&app_base_url, &email);
            email_client
                .send_best_effort(
                    &email,
                    "Welcome to our newsletter",
                    &format!(
                        "Welcome to our newsletter!<br />You can <a href=\"{}\">unsubscribe</a> \
                         at any time.",
                        unsubscribe_url
                    ),
                    &format!(
                        "Welcome to our newsletter!\nYou can unsubscribe at any time: {}\n",
                        unsubscribe_url
                    ),
                )
                .await;

            match subscribers::count(&pool).await {
                Ok(total) => {
                    email_client
                        .send_best_effort(
                            &admin.email,
                            "New newsletter subscriber",
                            &format!(
                                "<p>{} just subscribed.</p><p>Total subscribers: {}</p>",
                                email, total
                            ),
                            &format!("{} just subscribed.\nTotal subscribers: {}\n", email, total),
                        )
                        .await;
                }
                Err(e) => {
                    tracing::warn!("error counting subscribers for the admin notification: {}", e)
                }
            }
        }
        .instrument(span),
    );
}

/// Per-recipient unsubscribe endpoint, parameterized by the normalized
/// email address.
pub(super) fn unsubscribe_link(app_base_url: &AppBaseUrl, email: &SubscriberEmail) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("email", email.as_ref())
        .finish();
    format!("{}/subscriptions/unsubscribe?{}", app_base_url.0, query)
}

#[derive(Deserialize)]
pub struct EmailQuery {
    email: String,
}

#[derive(Serialize)]
struct UnsubscribeResponse {
    removed: bool,
}

/// Remove a subscriber. Always success-shaped and idempotent:
/// `removed=false` means "was not subscribed", which is not an error.
#[tracing::instrument(name = "removing subscriber", skip(query, pool), fields(email = %query.email))]
pub async fn unsubscribe(
    query: web::Query<EmailQuery>,
    pool: Data<PgPool>,
) -> Result<HttpResponse, SubscriptionError> {
    // A malformed address can never match a stored key.
    let removed = match SubscriberEmail::try_from(query.into_inner().email) {
        Ok(email) => {
            subscribers::delete_by_email(&pool, &email)
                .await
                .map_err(SubscriberStoreError::from)?
                > 0
        }
        Err(_) => false,
    };
    Ok(HttpResponse::Ok().json(UnsubscribeResponse { removed }))
}

#[derive(Serialize)]
struct CheckSubscriptionResponse {
    subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscriber: Option<SubscriberRecord>,
}

/// Read-only lookup with the same normalization and format validation as
/// subscribe.
#[tracing::instrument(name = "checking subscription", skip(query, pool), fields(email = %query.email))]
pub async fn check_subscription(
    query: web::Query<EmailQuery>,
    pool: Data<PgPool>,
) -> Result<HttpResponse, SubscriptionError> {
    let email = SubscriberEmail::try_from(query.into_inner().email)?;
    let subscriber = subscribers::find_by_email(&pool, &email)
        .await
        .map_err(SubscriberStoreError::from)?;
    Ok(HttpResponse::Ok().json(CheckSubscriptionResponse {
        subscribed: subscriber.is_some(),
        subscriber,
    }))
}
