use serde::{Deserialize, Serialize};

/// Connection settings for the Lavalink node.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LavalinkConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub password: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub ssl: bool,
}

impl LavalinkConfig {
    fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Display name, `{region}-{host}:{port}`.
    pub fn node_name(&self) -> String {
        format!("{}-{}", self.region, self.authority())
    }

    pub fn rest_base(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}/v4", scheme, self.authority())
    }

    pub fn websocket_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}/v4/websocket", scheme, self.authority())
    }
}

fn default_region() -> String {
    "us".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_follow_ssl_flag() {
        let mut config = LavalinkConfig {
            host: "lava.local".into(),
            port: Some(2333),
            password: "youshallnotpass".into(),
            region: default_region(),
            ssl: false,
        };
        assert_eq!(config.rest_base(), "http://lava.local:2333/v4");
        assert_eq!(config.websocket_url(), "ws://lava.local:2333/v4/websocket");
        assert_eq!(config.node_name(), "us-lava.local:2333");

        config.ssl = true;
        config.port = None;
        assert_eq!(config.rest_base(), "https://lava.local/v4");
        assert_eq!(config.websocket_url(), "wss://lava.local/v4/websocket");
    }
}
