//! Derived attributes shared by every media record type.
//!
//! The registry and the thumbnail resolver only need a handful of fields from a
//! stored asset. [`AssetLike`] captures that surface so an application can wire
//! its own record type in place of [`media_items::Model`].

use crate::config::AllowedMimes;
use crate::entities::media_items;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Image,
    Video,
    Document,
    Other,
}

impl Classification {
    /// Classify a MIME type against the configured allow-lists.
    /// Types that appear in no list are `Other`.
    pub fn of(mime_type: &str, allowed: &AllowedMimes) -> Self {
        let mime_type = mime_type.trim().to_lowercase();
        if allowed.image.iter().any(|m| *m == mime_type) {
            Classification::Image
        } else if allowed.video.iter().any(|m| *m == mime_type) {
            Classification::Video
        } else if allowed.document.iter().any(|m| *m == mime_type) {
            Classification::Document
        } else {
            Classification::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Image => "image",
            Classification::Video => "video",
            Classification::Document => "document",
            Classification::Other => "other",
        }
    }
}

impl std::str::FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Classification::Image),
            "video" => Ok(Classification::Video),
            "document" => Ok(Classification::Document),
            "other" => Ok(Classification::Other),
            other => Err(format!("unknown classification '{}'", other)),
        }
    }
}

/// Human readable size using binary prefixes, e.g. `1536` -> `"1.5 KB"`.
/// Values beyond the GB range stay in GB.
pub fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Capability set the registry and thumbnail resolver rely on
pub trait AssetLike: Send + Sync {
    fn id(&self) -> &str;
    fn disk(&self) -> &str;
    fn path(&self) -> &str;
    fn mime_type(&self) -> &str;
    fn size(&self) -> i64;
    fn width(&self) -> Option<i32>;
    fn height(&self) -> Option<i32>;

    fn classification(&self, allowed: &AllowedMimes) -> Classification {
        Classification::of(self.mime_type(), allowed)
    }

    fn is_image(&self, allowed: &AllowedMimes) -> bool {
        self.classification(allowed) == Classification::Image
    }

    fn is_video(&self, allowed: &AllowedMimes) -> bool {
        self.classification(allowed) == Classification::Video
    }

    fn is_document(&self, allowed: &AllowedMimes) -> bool {
        self.classification(allowed) == Classification::Document
    }

    fn formatted_size(&self) -> String {
        format_size(self.size())
    }

    fn dimensions(&self) -> Option<String> {
        match (self.width(), self.height()) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{} × {}", w, h)),
            _ => None,
        }
    }
}

impl AssetLike for media_items::Model {
    fn id(&self) -> &str {
        &self.id
    }

    fn disk(&self) -> &str {
        &self.disk
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn width(&self) -> Option<i32> {
        self.width
    }

    fn height(&self) -> Option<i32> {
        self.height
    }
}
