//! Service configuration resolved from environment variables.
//!
//! `main` loads `.env` with `dotenvy` before calling [`MediaConfig::from_env`].
//! Every value has a default, so an empty environment yields a working
//! configuration for local development.

use std::env;
use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_MAX_DIMENSION: u32 = 2560;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_VARIANT_SIZES: [u32; 5] = [1920, 1440, 960, 480, 160];
pub const DEFAULT_SEO_SIZE: (u32, u32) = (1200, 630);

/// Encoding parameters shared by the variant generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    /// Long-edge cap for the main asset.
    pub max_dimension: u32,
    /// Lossy WebP quality, 1..=100.
    pub quality: u8,
    /// Ladder of long-edge sizes, strictly descending.
    pub variant_sizes: Vec<u32>,
    /// Output size of the social/SEO crop.
    pub seo_size: (u32, u32),
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            quality: DEFAULT_QUALITY,
            variant_sizes: DEFAULT_VARIANT_SIZES.to_vec(),
            seo_size: DEFAULT_SEO_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    /// URL path under which stored files are served, e.g. `/uploads`.
    pub public_prefix: String,
    /// Mount point of the admin API, e.g. `/api`.
    pub api_root: String,
    pub admin_token: Option<String>,
    pub content_snapshot: Option<PathBuf>,
    pub upload_limit_bytes: usize,
    pub images: ImageSettings,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = parse_or(get("MEDIA_PORT"), "MEDIA_PORT", 3000u16);
        let upload_dir = get("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_upload_dir);
        let public_prefix = normalize_prefix(get("PUBLIC_PREFIX").as_deref().unwrap_or("/uploads"));
        let api_root = normalize_prefix(get("API_ROOT").as_deref().unwrap_or("/api"));
        let upload_limit_mb = parse_or(get("UPLOAD_LIMIT_MB"), "UPLOAD_LIMIT_MB", 50usize);

        let max_dimension = parse_or(
            get("MAX_DIMENSION"),
            "MAX_DIMENSION",
            DEFAULT_MAX_DIMENSION,
        )
        .max(1);
        let quality = parse_or(get("WEBP_QUALITY"), "WEBP_QUALITY", DEFAULT_QUALITY).clamp(1, 100);
        let variant_sizes = match get("VARIANT_SIZES") {
            Some(raw) => parse_sizes(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "invalid VARIANT_SIZES, using default ladder");
                DEFAULT_VARIANT_SIZES.to_vec()
            }),
            None => DEFAULT_VARIANT_SIZES.to_vec(),
        };
        let seo_size = match get("SEO_SIZE") {
            Some(raw) => parse_size_pair(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "invalid SEO_SIZE, using default");
                DEFAULT_SEO_SIZE
            }),
            None => DEFAULT_SEO_SIZE,
        };

        Self {
            port,
            upload_dir,
            public_prefix,
            api_root,
            admin_token: get("ADMIN_TOKEN"),
            content_snapshot: get("CONTENT_SNAPSHOT").map(PathBuf::from),
            upload_limit_bytes: upload_limit_mb.saturating_mul(1024 * 1024),
            images: ImageSettings {
                max_dimension,
                quality,
                variant_sizes,
                seo_size,
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn default_upload_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(mut base) => {
            base.push("studio-media");
            base.push("uploads");
            base
        }
        None => PathBuf::from("uploads"),
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        Some(value) => value.parse::<T>().unwrap_or_else(|_| {
            warn!(key, value = %value, "invalid value, using default");
            default
        }),
        None => default,
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Parse a comma separated ladder. The result is sorted descending without
/// duplicates or zeros.
pub fn parse_sizes(raw: &str) -> Option<Vec<u32>> {
    let mut sizes = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>().ok().filter(|size| *size > 0))
        .collect::<Option<Vec<u32>>>()?;
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes.dedup();
    Some(sizes)
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_size_pair(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse::<u32>().ok().filter(|w| *w > 0)?;
    let h = h.trim().parse::<u32>().ok().filter(|h| *h > 0)?;
    Some((w, h))
}
