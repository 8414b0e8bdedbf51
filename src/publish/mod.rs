//! Publishing social output to the external content service

pub mod contract;
pub mod http;
pub mod worker;

pub use contract::{LocalPublisher, PublishError, PublishReceipt, PublishRequest, Publisher};
pub use http::HttpPublisher;
pub use worker::{spawn_worker, PublishJob, PublishOutcome, PublishQueue};
