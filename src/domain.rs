pub use app_base_url::AppBaseUrl;
pub use errors::MalformedInput;
pub use new_post::NewPost;
pub use new_subscriber::NewSubscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;

mod app_base_url;
mod errors;
mod new_post;
mod new_subscriber;
mod subscriber_email;
mod subscriber_name;
