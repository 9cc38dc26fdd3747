//! Read-only view of the content records that may reference stored images.
//!
//! The records are owned by the CRUD layer; this crate only reads their
//! image-path fields. A [`ContentSource`] hands over a full snapshot per
//! call.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Database identifiers may be integers or strings depending on the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Page {
    pub id: Option<RecordId>,
    pub title: String,
    pub slug: String,
    pub hero_image: Option<String>,
    pub seo_image: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GalleryItem {
    pub id: Option<RecordId>,
    pub image_path: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Gallery {
    pub id: Option<RecordId>,
    pub title: String,
    pub slug: String,
    pub items: Vec<GalleryItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Testimonial {
    pub id: Option<RecordId>,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub og_image: Option<String>,
    pub favicon: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentSnapshot {
    pub pages: Vec<Page>,
    pub galleries: Vec<Gallery>,
    pub testimonials: Vec<Testimonial>,
    pub settings: Option<Settings>,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn snapshot(&self) -> MediaResult<ContentSnapshot>;
}

/// Fixed, in-memory content.
#[derive(Debug, Clone, Default)]
pub struct StaticContent(pub ContentSnapshot);

#[async_trait]
impl ContentSource for StaticContent {
    async fn snapshot(&self) -> MediaResult<ContentSnapshot> {
        Ok(self.0.clone())
    }
}

/// JSON export of the content database, re-read on every call. A missing
/// file means no content.
#[derive(Debug, Clone)]
pub struct JsonFileContent {
    path: PathBuf,
}

impl JsonFileContent {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ContentSource for JsonFileContent {
    async fn snapshot(&self) -> MediaResult<ContentSnapshot> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ContentSnapshot::default());
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes).map_err(|err| {
            MediaError::Storage(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid content snapshot {}: {err}", self.path.display()),
            ))
        })
    }
}
