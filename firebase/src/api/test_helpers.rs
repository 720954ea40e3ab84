//! Test helpers for the Firebase API

use super::auth::TokenSource;
use super::Client;

pub fn create_test_client(url: &str) -> Client {
    Client::with_token_source(
        reqwest::Client::new(),
        url,
        TokenSource::static_token("test-token"),
    )
    .unwrap()
}
