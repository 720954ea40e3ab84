pub mod default_bucket;

pub use default_bucket::DefaultBucketDataSource;
