use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const CURRENT_CONFIG_VERSION: &str = "v1";
/// Largest `max_image_bytes` accepted. Upload bodies are capped a little
/// above this so oversized images still reach the image size check.
pub const MAX_IMAGE_BYTES_CEILING: u64 = 15 * 1024 * 1024;

fn default_page_size() -> u64 {
    10
}

fn default_focus_image() -> String {
    "../default-focus_bpca53".to_string()
}

fn default_image_url_prefix() -> String {
    "/images".to_string()
}

fn default_max_image_bytes() -> u64 {
    2 * 1024 * 1024
}

fn default_max_image_dimension() -> u32 {
    4096
}

/// An account provisioned at startup. The token is hashed before storage.
#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    #[serde(alias = "pageSize")]
    pub page_size: u64,
    #[serde(alias = "defaultFocusImage")]
    pub default_focus_image: String,
    #[serde(alias = "imageUrlPrefix")]
    pub image_url_prefix: String,
    #[serde(alias = "maxImageBytes")]
    pub max_image_bytes: u64,
    #[serde(alias = "maxImageDimension")]
    pub max_image_dimension: u32,
    pub users: Vec<SeedUser>,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        if self.page_size == 0 {
            tracing::warn!("page_size must be positive, resetting to default");
            self.page_size = default_page_size();
        }

        let prefix = self.image_url_prefix.trim().trim_end_matches('/');
        self.image_url_prefix = if prefix.is_empty() {
            default_image_url_prefix()
        } else if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        };

        if self.max_image_bytes == 0 {
            tracing::warn!("max_image_bytes must be positive, resetting to default");
            self.max_image_bytes = default_max_image_bytes();
        } else if self.max_image_bytes > MAX_IMAGE_BYTES_CEILING {
            tracing::warn!(
                requested = self.max_image_bytes,
                ceiling = MAX_IMAGE_BYTES_CEILING,
                "max_image_bytes above the upload ceiling, clamping"
            );
            self.max_image_bytes = MAX_IMAGE_BYTES_CEILING;
        }

        if self.default_focus_image.trim().is_empty() {
            self.default_focus_image = default_focus_image();
        }

        self.users.retain(|user| {
            let keep = !user.username.trim().is_empty() && !user.token.trim().is_empty();
            if !keep {
                tracing::warn!(username = %user.username, "Skipping seed user with blank username or token");
            }
            keep
        });

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            page_size: default_page_size(),
            default_focus_image: default_focus_image(),
            image_url_prefix: default_image_url_prefix(),
            max_image_bytes: default_max_image_bytes(),
            max_image_dimension: default_max_image_dimension(),
            users: Vec::new(),
        }
    }
}
