pub use configuration::*;
pub use startup::{
    AdminAccount,
    BulletinApp,
};
pub use telemetry::setup_tracing;

mod configuration;
mod startup;
mod telemetry;
