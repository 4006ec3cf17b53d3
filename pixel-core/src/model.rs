use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Quality assigned to records sourced from the bucket (untouched originals).
pub const DEFAULT_QUALITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Nature,
    Art,
    Cyber,
    Tech,
    Abstract,
    #[default]
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Nature,
        Category::Art,
        Category::Cyber,
        Category::Tech,
        Category::Abstract,
        Category::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Nature => "Nature",
            Category::Art => "Art",
            Category::Cyber => "Cyber",
            Category::Tech => "Tech",
            Category::Abstract => "Abstract",
            Category::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown category: {s}"))
    }
}

/// Category half of a gallery view: everything, or exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(category: Category) -> Self {
        CategoryFilter::Only(category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => ImageFormat::Png,
            "image/gif" => ImageFormat::Gif,
            "image/webp" => ImageFormat::Webp,
            _ => ImageFormat::Jpeg,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// The gateway's raw view of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectDescriptor {
    /// Object name, without the namespace prefix
    pub id: String,
    pub url: String,
    pub name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: String,
    /// Full key, used for deletion
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub category: Category,
    pub size_bytes: u64,
    pub tags: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    pub quality: u8,
    pub format: ImageFormat,
    /// Full storage key for cloud-backed records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl ImageRecord {
    /// Normalize a listed or freshly uploaded object into a record with
    /// default category, empty tags and default quality.
    pub fn from_descriptor(descriptor: &StorageObjectDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            url: descriptor.url.clone(),
            title: title_from_name(&descriptor.name),
            category: Category::default(),
            size_bytes: descriptor.size_bytes,
            tags: Vec::new(),
            uploaded_at: descriptor.uploaded_at,
            liked: false,
            album: None,
            quality: DEFAULT_QUALITY,
            format: ImageFormat::from_content_type(&descriptor.content_type),
            storage_path: Some(descriptor.path.clone()),
        }
    }

    /// A record created on this client, e.g. an edited copy, with a
    /// timestamp-based id.
    pub fn new_local(url: impl Into<String>, title: impl Into<String>, size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            id: format!("local-{}", now.timestamp_millis()),
            url: url.into(),
            title: title.into(),
            category: Category::default(),
            size_bytes,
            tags: Vec::new(),
            uploaded_at: now,
            liked: false,
            album: None,
            quality: DEFAULT_QUALITY,
            format: ImageFormat::default(),
            storage_path: None,
        }
    }

    /// Case-insensitive substring match against the title and every tag.
    /// `needle` must already be lowercased.
    fn matches_query(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
    }

    pub(crate) fn passes(&self, filter: CategoryFilter, album: Option<&str>, needle: &str) -> bool {
        filter.matches(self.category)
            && album.map_or(true, |album| self.album.as_deref() == Some(album))
            && (needle.is_empty() || self.matches_query(needle))
    }
}

/// Partial update for one record. Absent fields are left alone; for `album`,
/// an explicit `null` clears the membership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
}

impl ImagePatch {
    pub fn apply(&self, record: &mut ImageRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(liked) = self.liked {
            record.liked = liked;
        }
        if let Some(album) = &self.album {
            record.album = album.clone();
        }
        if let Some(quality) = self.quality {
            record.quality = quality.min(100);
        }
        if let Some(format) = self.format {
            record.format = format;
        }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Display counter only; never recomputed from actual membership.
    pub image_count: u32,
    pub created: DateTime<Utc>,
}

impl Album {
    pub fn new(name: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            image_count: 0,
            created: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryStats {
    pub total: usize,
    pub favorites: usize,
    pub categories: usize,
    pub storage_bytes: u64,
}

/// Display title for a stored file name: drops the extension and a leading
/// all-digit upload timestamp (`1712345678901_sunset.jpg` -> `sunset`).
pub fn title_from_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };

    match stem.split_once('_') {
        Some((stamp, rest))
            if !stamp.is_empty() && !rest.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest.to_string()
        }
        _ => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_strips_timestamp_and_extension() {
        assert_eq!(title_from_name("1712345678901_sunset.jpg"), "sunset");
        assert_eq!(title_from_name("beach.day.png"), "beach.day");
        assert_eq!(title_from_name("no_extension"), "no_extension");
        assert_eq!(title_from_name("2024_trip_photo.webp"), "trip_photo");
        assert_eq!(title_from_name(".hidden"), ".hidden");
        assert_eq!(title_from_name("123_.gif"), "123_");
    }

    #[test]
    fn test_category_filter_parsing() {
        assert_eq!("All".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!("".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "nature".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(Category::Nature))
        );
        assert!("Landscapes".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn test_record_from_descriptor_defaults() {
        let descriptor = StorageObjectDescriptor {
            id: "1700000000000_cat.png".to_string(),
            url: "https://cdn.example.com/images/1700000000000_cat.png".to_string(),
            name: "1700000000000_cat.png".to_string(),
            size_bytes: 2048,
            uploaded_at: Utc::now(),
            content_type: "image/png".to_string(),
            path: "images/1700000000000_cat.png".to_string(),
        };

        let record = ImageRecord::from_descriptor(&descriptor);
        assert_eq!(record.id, descriptor.id);
        assert_eq!(record.title, "cat");
        assert_eq!(record.category, Category::Uncategorized);
        assert!(record.tags.is_empty());
        assert!(!record.liked);
        assert_eq!(record.quality, DEFAULT_QUALITY);
        assert_eq!(record.format, ImageFormat::Png);
        assert_eq!(record.storage_path.as_deref(), Some("images/1700000000000_cat.png"));
    }

    #[test]
    fn test_patch_distinguishes_null_album_from_absent() {
        let clear: ImagePatch = serde_json::from_str(r#"{"album": null}"#).unwrap();
        assert_eq!(clear.album, Some(None));

        let untouched: ImagePatch = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(untouched.album, None);

        let mut record = ImageRecord::new_local("u", "t", 1);
        record.album = Some("a1".to_string());
        untouched.apply(&mut record);
        assert_eq!(record.album.as_deref(), Some("a1"));
        clear.apply(&mut record);
        assert_eq!(record.album, None);
    }

    #[test]
    fn test_patch_clamps_quality() {
        let mut record = ImageRecord::new_local("u", "t", 1);
        let patch = ImagePatch {
            quality: Some(250),
            ..Default::default()
        };
        patch.apply(&mut record);
        assert_eq!(record.quality, 100);
    }
}
