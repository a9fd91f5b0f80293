use std::convert::TryInto;
use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{
    web,
    App,
    HttpServer,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;
use url::Url;

use crate::app::configuration::{
    AdminSettings,
    DatabaseSettings,
    EmailClientSettings,
    Settings,
    UploadSettings,
};
use crate::domain::{
    AppBaseUrl,
    SubscriberEmail,
};
use crate::email_client::EmailClient;
use crate::routes::*;
use crate::uploads::UploadStore;

/// The administrator contact plus the shared secret that authorizes
/// publish calls.
pub struct AdminAccount {
    pub email: SubscriberEmail,
    pub publish_secret: String,
}

/// Upper bound on a publish request body: a 10 MiB attachment grows by
/// one third under base64, plus the post fields around it.
const JSON_PAYLOAD_LIMIT: usize = 16 * 1024 * 1024;

pub struct BulletinApp {
    pub server: Server,
    pub port: u16,
}

impl BulletinApp {
    pub async fn from(configuration: Settings) -> Result<BulletinApp, std::io::Error> {
        let tcp_listener = TcpListener::bind(configuration.application.binding_address())?;
        let port = tcp_listener.local_addr()?.port();
        let postgres_pool =
            web::Data::new(BulletinApp::postgres_pool(configuration.database).await);
        let email_client = web::Data::new(BulletinApp::email_client(configuration.email_client));
        let upload_store = web::Data::new(BulletinApp::upload_store(configuration.uploads));
        let admin = web::Data::new(BulletinApp::admin_account(configuration.admin));
        let app_base_url = web::Data::new(AppBaseUrl(configuration.application.base_url.clone()));

        // HttpServer handles all transport level concerns
        let server = HttpServer::new(move || {
            // App is where all the application logic lives: routing,
            // middlewares, request handlers, etc.
            App::new()
                .wrap(TracingLogger::default())
                .app_data(web::JsonConfig::default().limit(JSON_PAYLOAD_LIMIT))
                .route("/health_check", web::get().to(health_check))
                .route("/subscriptions", web::post().to(subscribe))
                .route("/subscriptions/unsubscribe", web::get().to(unsubscribe))
                .route("/subscriptions/check", web::get().to(check_subscription))
                .route("/newsletters", web::post().to(publish_newsletter))
                .route("/newsletters", web::get().to(list_newsletters))
                .app_data(postgres_pool.clone())
                .app_data(email_client.clone())
                .app_data(upload_store.clone())
                .app_data(admin.clone())
                .app_data(app_base_url.clone())
        })
        .backlog(configuration.application.max_pending_connections)
        .listen(tcp_listener)
        .map(HttpServer::run)?;
        Ok(BulletinApp { port, server })
    }

    pub async fn postgres_pool(database_config: DatabaseSettings) -> PgPool {
        PgPoolOptions::new()
            .connect_timeout(Duration::from_secs(database_config.connect_timeout_seconds))
            .max_connections(database_config.max_db_connections)
            .connect_with(database_config.database_connection_options())
            .await
            .unwrap_or_else(|_| {
                panic!(
                    "error creating postgres connection pool from config: {:?}",
                    database_config
                )
            })
    }

    fn email_client(client_config: EmailClientSettings) -> EmailClient {
        let base_url = Url::parse(&client_config.base_url).unwrap_or_else(|e| {
            panic!(
                "invalid base url: {} for email client: {}",
                client_config.base_url, e
            )
        });

        let sender_email: SubscriberEmail = client_config
            .sender_email
            .try_into()
            .unwrap_or_else(|e| panic!("invalid sender email: {}", e));

        EmailClient::new(
            base_url,
            sender_email,
            client_config.token,
            client_config.timeout_secs,
            Duration::from_millis(client_config.send_pacing_ms),
        )
        .unwrap_or_else(|e| panic!("error building the email client: {}", e))
    }

    fn upload_store(upload_config: UploadSettings) -> UploadStore {
        let base_url = Url::parse(&upload_config.base_url).unwrap_or_else(|e| {
            panic!(
                "invalid base url: {} for uploads: {}",
                upload_config.base_url, e
            )
        });
        UploadStore::new(PathBuf::from(&upload_config.storage_dir), base_url)
            .unwrap_or_else(|e| panic!("error building the upload store: {}", e))
    }

    fn admin_account(admin_config: AdminSettings) -> AdminAccount {
        let email: SubscriberEmail = admin_config
            .email
            .try_into()
            .unwrap_or_else(|e| panic!("invalid admin email: {}", e));
        AdminAccount {
            email,
            publish_secret: admin_config.publish_secret,
        }
    }
}
