use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Discord sends snowflakes as JSON strings but some payloads (and our
/// config files) carry plain integers, so every id accepts both forms.
macro_rules! snowflake {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub u64);

            impl $name {
                pub fn get(self) -> u64 {
                    self.0
                }
            }

            impl From<u64> for $name {
                fn from(id: u64) -> Self {
                    Self(id)
                }
            }

            impl std::str::FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.parse::<u64>().map(Self)
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Serialize for $name {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(&self.0)
                }
            }

            impl<'de> Deserialize<'de> for $name {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    deserialize_snowflake(deserializer).map(Self)
                }
            }
        )*
    };
}

snowflake! {
    /// A guild (server); the scoping key for voice sessions.
    GuildId,
    /// A voice or text channel.
    ChannelId,
    UserId,
    RoleId,
    ApplicationId,
    InteractionId,
}

fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid snowflake '{s}': {e}"))),
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_accepts_string_and_number() {
        let a: GuildId = serde_json::from_str("\"81384788765712384\"").unwrap();
        let b: GuildId = serde_json::from_str("81384788765712384").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(), 81384788765712384);
    }

    #[test]
    fn snowflake_serializes_as_string() {
        let json = serde_json::to_string(&ChannelId(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn snowflake_rejects_garbage() {
        assert!(serde_json::from_str::<UserId>("\"not-a-number\"").is_err());
    }
}
