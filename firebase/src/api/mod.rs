pub mod auth;
pub mod client;
pub mod error;
pub mod storage;

#[cfg(test)]
pub mod test_helpers;

pub use client::Client;
pub use error::ApiError;
pub use storage::{default_bucket_id, BucketProbe, BucketRef, DefaultBucket};
