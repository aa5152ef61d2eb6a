//! Core data types for the photo upload pipeline

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::storage::StorageKind;

/// Closed set of photo categories used by the service workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    Before,
    After,
    General,
}

impl Default for PhotoCategory {
    fn default() -> Self {
        PhotoCategory::General
    }
}

impl PhotoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoCategory::Before => "before",
            PhotoCategory::After => "after",
            PhotoCategory::General => "general",
        }
    }

    /// Lenient parse used for values read back from storage paths/rows.
    /// Unknown values map to `General` rather than failing a listing.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "before" => PhotoCategory::Before,
            "after" => PhotoCategory::After,
            _ => PhotoCategory::General,
        }
    }
}

impl std::fmt::Display for PhotoCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhotoCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(PhotoCategory::Before),
            "after" => Ok(PhotoCategory::After),
            "general" => Ok(PhotoCategory::General),
            other => Err(format!("unknown photo category: {}", other)),
        }
    }
}

/// A single file handed to the uploader, together with the batch metadata
/// that applies to it. Discarded after processing.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub data: Bytes,
    /// Declared media type, e.g. `image/jpeg`.
    pub content_type: String,
    pub filename: String,
    pub category: PhotoCategory,
    pub chair_id: Option<String>,
    pub job_id: Option<String>,
}

impl UploadItem {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Lower-cased filename extension, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }
}

/// Compressed, base64-encoded representation of an uploaded image as the
/// fallback backends persist it. Field names follow the remote bucket's
/// wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub id: String,
    pub filename: String,
    /// Self-describing data URL: `data:image/jpeg;base64,...`
    pub base64_data: String,
    pub mime_type: String,
    /// Byte size of the original input, not of the encoded payload.
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub category: PhotoCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chair_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// The record returned to callers for every successfully stored photo.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredPhotoRecord {
    pub id: String,
    /// Resolvable https URL for the object store; a data URL convertible
    /// via the codec for the fallback backends.
    pub url: String,
    pub filename: String,
    pub category: PhotoCategory,
    pub uploaded_at: DateTime<Utc>,
    pub size: u64,
    /// Which adapter persisted this photo. Anything other than the object
    /// store means degraded storage and the UI renders an indicator.
    pub backend: StorageKind,
}

impl StoredPhotoRecord {
    pub fn is_degraded(&self) -> bool {
        self.backend != StorageKind::ObjectStore
    }
}

/// The remote JSON bucket's unit of storage: one named basket holding the
/// whole collection. Fetched, mutated and rewritten as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoCollection {
    pub images: Vec<EncodedImage>,
    pub last_updated: DateTime<Utc>,
    pub total_images: usize,
}

impl PhotoCollection {
    pub fn empty() -> Self {
        PhotoCollection {
            images: Vec::new(),
            last_updated: Utc::now(),
            total_images: 0,
        }
    }

    /// Rebuild the derived fields after a mutation.
    pub fn touch(&mut self) {
        self.total_images = self.images.len();
        self.last_updated = Utc::now();
    }
}

/// Optional constraints accepted by the list operations.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PhotoFilter {
    pub category: Option<PhotoCategory>,
    pub chair_id: Option<String>,
    pub job_id: Option<String>,
}

impl PhotoFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.chair_id.is_none() && self.job_id.is_none()
    }

    /// Filter applied to records whose owner references are not persisted
    /// (the object store encodes them in the key instead).
    pub fn matches_record(&self, record: &StoredPhotoRecord) -> bool {
        self.category.map_or(true, |c| record.category == c)
    }
}

/// Aggregate counts returned by `stats()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StorageStats {
    pub total_images: u64,
    pub total_bytes: u64,
    /// Image counts keyed by category name.
    pub categories: HashMap<String, u64>,
}

impl StorageStats {
    pub fn record(&mut self, category: PhotoCategory, size: u64) {
        self.total_images += 1;
        self.total_bytes += size;
        *self.categories.entry(category.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: StorageStats) {
        self.total_images += other.total_images;
        self.total_bytes += other.total_bytes;
        for (category, count) in other.categories {
            *self.categories.entry(category).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in [PhotoCategory::Before, PhotoCategory::After, PhotoCategory::General] {
            assert_eq!(category.as_str().parse::<PhotoCategory>().unwrap(), category);
        }
        assert!("sideways".parse::<PhotoCategory>().is_err());
        assert_eq!(PhotoCategory::parse_lossy("sideways"), PhotoCategory::General);
    }

    #[test]
    fn collection_touch_recomputes_count() {
        let mut collection = PhotoCollection::empty();
        collection.images.push(EncodedImage {
            id: "img_1".into(),
            filename: "a.jpg".into(),
            base64_data: "data:image/jpeg;base64,".into(),
            mime_type: "image/jpeg".into(),
            size: 10,
            uploaded_at: Utc::now(),
            category: PhotoCategory::Before,
            chair_id: None,
            job_id: None,
        });
        collection.touch();
        assert_eq!(collection.total_images, 1);
    }

    #[test]
    fn stats_merge_accumulates_categories() {
        let mut a = StorageStats::default();
        a.record(PhotoCategory::Before, 100);
        let mut b = StorageStats::default();
        b.record(PhotoCategory::Before, 50);
        b.record(PhotoCategory::After, 25);

        a.merge(b);
        assert_eq!(a.total_images, 3);
        assert_eq!(a.total_bytes, 175);
        assert_eq!(a.categories.get("before"), Some(&2));
        assert_eq!(a.categories.get("after"), Some(&1));
    }
}
