use std::time::Duration;

use reqwest::{Client, Error};

const USER_AGENT: &str = concat!("tunebot/", env!("CARGO_PKG_VERSION"));

pub struct HttpClient;

impl HttpClient {
    /// Shared client for the Discord REST API and the audio node.
    pub fn new() -> Result<Client, Error> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
    }
}
