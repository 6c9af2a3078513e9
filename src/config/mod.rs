use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Allowed MIME types, one list per asset category
#[derive(Debug, Clone, PartialEq)]
pub struct AllowedMimes {
    pub image: Vec<String>,
    pub video: Vec<String>,
    pub document: Vec<String>,
}

impl AllowedMimes {
    /// Union of all category lists, in category order
    pub fn all(&self) -> Vec<String> {
        self.image
            .iter()
            .chain(self.video.iter())
            .chain(self.document.iter())
            .cloned()
            .collect()
    }

    pub fn contains(&self, mime_type: &str) -> bool {
        self.image
            .iter()
            .chain(self.video.iter())
            .chain(self.document.iter())
            .any(|m| m == mime_type)
    }
}

impl Default for AllowedMimes {
    fn default() -> Self {
        Self {
            image: to_strings(&[
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "image/svg+xml",
            ]),
            video: to_strings(&[
                "video/mp4",
                "video/avi",
                "video/mov",
                "video/wmv",
                "video/webm",
            ]),
            document: to_strings(&[
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "text/plain",
                "text/csv",
            ]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum upload size in KB (default: 10240)
    pub max_file_size_kb: u64,

    /// Maximum number of files in one multi-upload (default: 10)
    pub max_files: usize,

    pub allowed_mimes: AllowedMimes,
}

impl UploadConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb * 1024
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Generate conversions on demand (default: true)
    pub enabled: bool,

    /// Named size presets, width x height
    pub sizes: BTreeMap<String, (u32, u32)>,

    /// Encoder quality 0-100 (default: 90)
    pub quality: u8,

    /// Upper bound for a single transform (default: 30s)
    pub timeout: Duration,
}

impl ThumbnailConfig {
    /// Conversion name used for the default display thumbnail
    pub const THUMB: &'static str = "thumb";

    /// Resolve a conversion name to its target box. `thumb` is the medium preset.
    pub fn size_for(&self, conversion: &str) -> Option<(u32, u32)> {
        if conversion == Self::THUMB {
            return Some(self.sizes.get("medium").copied().unwrap_or((300, 300)));
        }
        self.sizes.get(conversion).copied()
    }
}

#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub images: String,
    pub videos: String,
    pub documents: String,
    pub thumbnails: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Media library configuration, built once and handed to every service
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Disk new uploads are written to (default: "public")
    pub default_disk: String,
    pub upload: UploadConfig,
    pub thumbnails: ThumbnailConfig,
    pub paths: StoragePaths,
    pub cache: CacheConfig,
    /// Page size for asset listings (default: 24)
    pub per_page: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let mut sizes = BTreeMap::new();
        sizes.insert("small".to_string(), (150, 150));
        sizes.insert("medium".to_string(), (300, 300));
        sizes.insert("large".to_string(), (600, 600));

        Self {
            default_disk: "public".to_string(),
            upload: UploadConfig {
                max_file_size_kb: 10240,
                max_files: 10,
                allowed_mimes: AllowedMimes::default(),
            },
            thumbnails: ThumbnailConfig {
                enabled: true,
                sizes,
                quality: 90,
                timeout: Duration::from_secs(30),
            },
            paths: StoragePaths {
                images: "media/images".to_string(),
                videos: "media/videos".to_string(),
                documents: "media/documents".to_string(),
                thumbnails: "media/thumbnails".to_string(),
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 3600,
            },
            per_page: 24,
        }
    }
}

impl MediaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let allowed_mimes = AllowedMimes {
            image: env_list("MEDIA_ALLOWED_IMAGE_MIMES")
                .unwrap_or(default.upload.allowed_mimes.image),
            video: env_list("MEDIA_ALLOWED_VIDEO_MIMES")
                .unwrap_or(default.upload.allowed_mimes.video),
            document: env_list("MEDIA_ALLOWED_DOCUMENT_MIMES")
                .unwrap_or(default.upload.allowed_mimes.document),
        };

        Self {
            default_disk: env::var("MEDIA_DISK").unwrap_or(default.default_disk),

            upload: UploadConfig {
                max_file_size_kb: env::var("MEDIA_MAX_FILE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.upload.max_file_size_kb),
                max_files: env::var("MEDIA_MAX_FILES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.upload.max_files),
                allowed_mimes,
            },

            thumbnails: ThumbnailConfig {
                enabled: env::var("MEDIA_THUMBNAILS_ENABLED")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.thumbnails.enabled),
                sizes: default.thumbnails.sizes,
                quality: env::var("MEDIA_THUMBNAIL_QUALITY")
                    .ok()
                    .and_then(|v| v.parse::<u8>().ok())
                    .map(|q| q.min(100))
                    .unwrap_or(default.thumbnails.quality),
                timeout: env::var("MEDIA_THUMBNAIL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(default.thumbnails.timeout),
            },

            paths: default.paths,

            cache: CacheConfig {
                enabled: env::var("MEDIA_CACHE_ENABLED")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.cache.enabled),
                ttl_secs: env::var("MEDIA_CACHE_TTL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.cache.ttl_secs),
            },

            per_page: env::var("MEDIA_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.per_page),
        }
    }

    /// Create config for development (no result caching, short transform timeout)
    pub fn development() -> Self {
        let mut config = Self::default();
        config.cache.enabled = false;
        config.thumbnails.timeout = Duration::from_secs(5);
        config
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();
        assert_eq!(config.default_disk, "public");
        assert_eq!(config.upload.max_file_size_kb, 10240);
        assert_eq!(config.upload.max_file_size_bytes(), 10240 * 1024);
        assert_eq!(config.upload.max_files, 10);
        assert!(config.thumbnails.enabled);
        assert_eq!(config.thumbnails.quality, 90);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.per_page, 24);
    }

    #[test]
    fn test_thumb_conversion_uses_medium_preset() {
        let config = MediaConfig::default();
        assert_eq!(config.thumbnails.size_for("thumb"), Some((300, 300)));
        assert_eq!(config.thumbnails.size_for("small"), Some((150, 150)));
        assert_eq!(config.thumbnails.size_for("poster"), None);
    }

    #[test]
    fn test_allowed_mimes_union() {
        let mimes = AllowedMimes::default();
        let all = mimes.all();
        assert_eq!(all.len(), 17);
        assert!(mimes.contains("image/png"));
        assert!(mimes.contains("text/csv"));
        assert!(!mimes.contains("application/x-msdownload"));
    }

    #[test]
    fn test_development_config() {
        let config = MediaConfig::development();
        assert!(!config.cache.enabled);
        assert_eq!(config.thumbnails.timeout, Duration::from_secs(5));
    }
}
