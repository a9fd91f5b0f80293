pub use errors::{
    PublishError,
    SubscriptionError,
};
pub use health_check::health_check;
pub use newsletters::{
    list_newsletters,
    publish_newsletter,
};
pub use subscriptions::{
    check_subscription,
    subscribe,
    unsubscribe,
};

mod errors;
mod health_check;
mod newsletters;
mod subscriptions;
