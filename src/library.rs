//! Request-level media operations, independent of the HTTP framework.
//!
//! An upload runs through: payload check → base name → collision handling →
//! generation → response. Nothing here is transactional with the content
//! database; the CRUD layer stores the returned URLs afterwards.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::image_processing;
use crate::naming;
use crate::store::{AssetStore, StoredFile};
use crate::usage::{ContentSource, FileUsage, JsonFileContent, StaticContent, UsageIndexer};
use crate::variants::{GeneratedVariant, VariantGenerator};

#[derive(Debug, Default)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    /// Original client file name.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Explicit base name chosen by the caller.
    pub base_name: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub variants: Vec<GeneratedVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCheck {
    pub exists: bool,
    pub base_name: String,
    pub filename: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub files: Vec<FileUsage>,
}

#[derive(Clone)]
pub struct MediaLibrary {
    store: AssetStore,
    generator: VariantGenerator,
    indexer: UsageIndexer,
}

impl MediaLibrary {
    pub fn new(store: AssetStore, generator: VariantGenerator, indexer: UsageIndexer) -> Self {
        Self {
            store,
            generator,
            indexer,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        let store = AssetStore::new(config.upload_dir.clone(), config.public_prefix.clone());
        let generator = VariantGenerator::new(store.clone(), config.images.clone());
        let source: Arc<dyn ContentSource> = match &config.content_snapshot {
            Some(path) => Arc::new(JsonFileContent::new(path.clone())),
            None => Arc::new(StaticContent::default()),
        };
        Self::new(store, generator, UsageIndexer::new(source))
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub async fn upload(&self, request: UploadRequest) -> MediaResult<UploadResponse> {
        if request.bytes.is_empty() {
            return Err(MediaError::BadRequest("No file uploaded".to_string()));
        }
        if let Some(content_type) = request.content_type.as_deref() {
            if !content_type.starts_with("image/") {
                return Err(MediaError::BadRequest(format!(
                    "Unsupported file type: {content_type}"
                )));
            }
        }

        let requested = request
            .base_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let explicit = requested.is_some();
        let mut base_name = naming::normalize(
            requested
                .or(request.file_name.as_deref())
                .unwrap_or_default(),
        );

        if self.store.main_exists(&base_name).await? {
            if request.overwrite {
                let removed = self.store.delete_family(&base_name, None).await?;
                info!(base_name = %base_name, removed, "overwriting existing asset");
            } else if explicit {
                let url = self.store.public_url(&naming::main_file_name(&base_name));
                return Err(MediaError::Conflict { base_name, url });
            } else {
                base_name = self.store.ensure_unique(&base_name).await?;
            }
        }

        let already_target = image_processing::is_target_format(&request.bytes);
        let asset = self
            .generator
            .generate(request.bytes, &base_name, already_target)
            .await?;

        Ok(UploadResponse {
            url: asset.url,
            filename: asset.file_name,
            variants: asset.variants,
        })
    }

    pub async fn check_name(&self, name: Option<&str>) -> MediaResult<NameCheck> {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MediaError::BadRequest("name is required".to_string()))?;
        let base_name = naming::normalize(name);
        let filename = naming::main_file_name(&base_name);
        let exists = self.store.exists(&filename).await?;
        Ok(NameCheck {
            exists,
            url: exists.then(|| self.store.public_url(&filename)),
            base_name,
            filename,
        })
    }

    pub async fn list_files(&self) -> MediaResult<Vec<StoredFile>> {
        self.store.enumerate().await
    }

    /// Delete a stored file together with its whole variant family.
    pub async fn delete_file(&self, name: &str) -> MediaResult<DeleteResponse> {
        if !naming::is_safe_file_name(name) {
            return Err(MediaError::BadRequest(format!("invalid file name: {name}")));
        }
        if !self.store.exists(name).await? {
            return Err(MediaError::NotFound(format!("File not found: {name}")));
        }
        let base_name = naming::base_name_of(name);
        let deleted = self.store.delete_family(base_name, Some(name)).await?;
        info!(file = name, deleted, "deleted asset family");
        Ok(DeleteResponse { ok: true, deleted })
    }

    pub async fn usage(&self) -> MediaResult<UsageReport> {
        Ok(UsageReport {
            files: self.indexer.compute(&self.store).await?,
        })
    }

    pub async fn ensure_seo_image(&self, source_url: &str) -> MediaResult<String> {
        self.generator.ensure_seo_image(source_url).await
    }
}
