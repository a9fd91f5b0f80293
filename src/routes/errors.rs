use actix_web::http::StatusCode;
use actix_web::{
    HttpResponse,
    ResponseError,
};
use custom_error::custom_error;

use crate::domain::MalformedInput;
use crate::storage::SubscriberStoreError;
use crate::uploads::UploadError;

custom_error! {
///! Error inside a subscription handler.
pub SubscriptionError
    InvalidFormData{source:MalformedInput} = "invalid subscription data: {source}",
    StoreError{source:SubscriberStoreError} = "{source}",
}

impl ResponseError for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::InvalidFormData { .. } => StatusCode::BAD_REQUEST,
            SubscriptionError::StoreError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // No internal error detail leaves the service.
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).finish()
    }
}

custom_error! {
///! Error inside a publish handler.
pub PublishError
    Unauthorized = "invalid or missing publish secret",
    InvalidPost{source:MalformedInput} = "invalid post data: {source}",
    AttachmentRejected{source:UploadError} = "{source}",
    DatabaseError{source:sqlx::Error} = "{source}",
}

impl ResponseError for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            PublishError::Unauthorized => StatusCode::UNAUTHORIZED,
            PublishError::InvalidPost { .. } => StatusCode::BAD_REQUEST,
            PublishError::AttachmentRejected { source } if source.is_client_error() => {
                StatusCode::BAD_REQUEST
            }
            PublishError::AttachmentRejected { .. } | PublishError::DatabaseError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // No internal error detail leaves the service.
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).finish()
    }
}
