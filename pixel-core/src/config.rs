use std::env;
use std::time::Duration;

/// Default namespace every gallery object lives under.
pub const DEFAULT_PREFIX: &str = "images";

/// Uploads larger than this are rejected before touching the network.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Content types the gateway accepts for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bucket: String,
    pub prefix: String,
    /// S3-compatible endpoint (MinIO/LocalStack/etc), forces path-style addressing
    pub endpoint_url: Option<String>,
    /// Base URL objects are served from, e.g. a CDN in front of the bucket
    pub public_base_url: Option<String>,
    /// When set, object URLs are presigned GETs valid for this long
    pub presign_expiry: Option<Duration>,
    pub credentials: Option<StaticCredentials>,
}

impl GatewayConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            endpoint_url: None,
            public_base_url: None,
            presign_expiry: None,
            credentials: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    /// Fill the optional settings from the environment.
    ///
    /// `AWS_ENDPOINT_URL`, `PIXEL_PUBLIC_URL`, `PIXEL_PRESIGN_SECS` and the
    /// `PIXEL_ACCESS_KEY_ID`/`PIXEL_SECRET_ACCESS_KEY` pair are all optional.
    pub fn from_env(bucket: impl Into<String>) -> Self {
        let mut config = Self::new(bucket);

        if let Ok(prefix) = env::var("PIXEL_PREFIX") {
            config = config.with_prefix(prefix);
        }
        config.endpoint_url = non_empty_var("AWS_ENDPOINT_URL");
        config.public_base_url =
            non_empty_var("PIXEL_PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string());
        config.presign_expiry = non_empty_var("PIXEL_PRESIGN_SECS")
            .and_then(|secs| match secs.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!("Ignoring invalid PIXEL_PRESIGN_SECS={}", secs);
                    None
                }
            });

        if let (Some(access_key_id), Some(secret_access_key)) = (
            non_empty_var("PIXEL_ACCESS_KEY_ID"),
            non_empty_var("PIXEL_SECRET_ACCESS_KEY"),
        ) {
            config.credentials = Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            });
        }

        config
    }

    /// Full object key for a file name under the configured prefix.
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Prefix used for listing, always ending in `/` unless empty.
    pub fn list_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_under_prefix() {
        let config = GatewayConfig::new("bucket");
        assert_eq!(config.key_for("1_a.png"), "images/1_a.png");
        assert_eq!(config.list_prefix(), "images/");
    }

    #[test]
    fn test_prefix_is_trimmed() {
        let config = GatewayConfig::new("bucket").with_prefix("/photos/");
        assert_eq!(config.key_for("x.jpg"), "photos/x.jpg");

        let root = GatewayConfig::new("bucket").with_prefix("");
        assert_eq!(root.key_for("x.jpg"), "x.jpg");
        assert_eq!(root.list_prefix(), "");
    }
}
