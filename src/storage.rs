pub use posts::Post;
pub use subscribers::{
    SubscriberRecord,
    SubscriberStoreError,
};

pub mod posts;
pub mod subscribers;
