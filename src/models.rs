use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category shown for records that were saved without one.
pub const DEFAULT_CATEGORY: &str = "Allgemein";

/// Shared cover used at render time for records without their own cover.
pub const PLACEHOLDER_COVER: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iNDAwIiBoZWlnaHQ9IjYwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iNDAwIiBoZWlnaHQ9IjYwMCIgZmlsbD0iIzFhM2Q0ZiIvPjx0ZXh0IHg9IjUwJSIgeT0iNTAlIiBmb250LXNpemU9IjI0IiBmaWxsPSIjNDBFMEQwIiB0ZXh0LWFuY2hvcj0ibWlkZGxlIiBkb21pbmFudC1iYXNlbGluZT0ibWlkZGxlIj5CdWNoY292ZXI8L3RleHQ+PC9zdmc+";

/// Opaque record identifier.
///
/// Freshly created records get a millisecond timestamp. Older data may carry
/// the same value as a string, so equality compares the textual form: the
/// number `5` and the string `"5"` name the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookId {
    Numeric(u64),
    Text(String),
}

impl BookId {
    /// Returns a timestamp-based id that does not collide with `existing`.
    pub fn generate(existing: &[BookRecord]) -> Self {
        let mut candidate = unix_millis();
        while existing.iter().any(|book| book.id.key() == candidate.to_string()) {
            candidate += 1;
        }
        BookId::Numeric(candidate)
    }

    pub fn key(&self) -> Cow<'_, str> {
        match self {
            BookId::Numeric(value) => Cow::Owned(value.to_string()),
            BookId::Text(value) => Cow::Borrowed(value.as_str()),
        }
    }
}

impl PartialEq for BookId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BookId {}

impl Hash for BookId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<u64> for BookId {
    fn from(value: u64) -> Self {
        BookId::Numeric(value)
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        BookId::Text(value.to_string())
    }
}

/// A value that may have been stored as a number or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Number(serde_json::Number),
    Text(String),
}

impl LooseValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, LooseValue::Text(text) if text.trim().is_empty())
    }
}

impl fmt::Display for LooseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LooseValue::Number(number) => write!(f, "{number}"),
            LooseValue::Text(text) => f.write_str(text),
        }
    }
}

/// A file embedded into a record as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: BookId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub full_description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub pages: Option<LooseValue>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub year: Option<LooseValue>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub documents: Vec<Attachment>,
    #[serde(default)]
    pub videos: Vec<Attachment>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default)]
    pub images: Vec<Attachment>,
    /// Optional keys the stored object did not carry. They stay out of the
    /// saved form for as long as they hold no value.
    #[serde(skip)]
    pub absent_keys: Vec<String>,
}

impl BookRecord {
    pub fn new(id: impl Into<BookId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            category: None,
            description: None,
            full_description: None,
            author: None,
            price: None,
            isbn: None,
            pages: None,
            publisher: None,
            year: None,
            link: None,
            cover: None,
            documents: Vec::new(),
            videos: Vec::new(),
            video_urls: Vec::new(),
            images: Vec::new(),
            absent_keys: Vec::new(),
        }
    }

    /// Keys other than `id`, in stored order.
    pub const OPTIONAL_KEYS: [&'static str; 16] = [
        "title",
        "category",
        "description",
        "fullDescription",
        "author",
        "price",
        "isbn",
        "pages",
        "publisher",
        "year",
        "link",
        "cover",
        "documents",
        "videos",
        "videoUrls",
        "images",
    ];

    /// Parses one stored object, remembering which optional keys it lacked.
    pub fn from_stored(value: Value) -> serde_json::Result<Self> {
        let absent_keys = match &value {
            Value::Object(map) => Self::OPTIONAL_KEYS
                .iter()
                .filter(|key| !map.contains_key(**key))
                .map(|key| key.to_string())
                .collect(),
            _ => Vec::new(),
        };
        let mut book: BookRecord = serde_json::from_value(value)?;
        book.absent_keys = absent_keys;
        Ok(book)
    }

    /// Stored form of the record. Keys the source lacked are left out again
    /// unless they gained a value.
    pub fn to_stored(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.retain(|key, field| !(self.absent_keys.contains(key) && is_unset(field)));
        }
        Ok(value)
    }

    pub fn title_text(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn category_or_default(&self) -> &str {
        non_empty(&self.category).unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn cover_or_placeholder(&self) -> &str {
        non_empty(&self.cover).unwrap_or(PLACEHOLDER_COVER)
    }
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Treats missing and empty text the same, the way the form does.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Cover,
    Documents,
    Videos,
    Images,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Cover,
        AssetKind::Documents,
        AssetKind::Videos,
        AssetKind::Images,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Cover => "Cover",
            AssetKind::Documents => "Dokumente",
            AssetKind::Videos => "Videos",
            AssetKind::Images => "Bilder",
        }
    }

    /// Cover is a single slot; every other kind is an append-only list.
    pub fn is_single_slot(self) -> bool {
        matches!(self, AssetKind::Cover)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient message shown after save/delete.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
