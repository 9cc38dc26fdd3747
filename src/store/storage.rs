use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;
use crate::naming::{self, AssetFamily};

/// One listed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
}

/// Flat directory of media files, addressed by file name.
///
/// There is no locking: two callers uploading the same base name at once can
/// both observe it as free. Callers that need that to be safe must serialize
/// access themselves.
#[derive(Clone, Debug)]
pub struct AssetStore {
    base_dir: PathBuf,
    public_prefix: String,
}

impl AssetStore {
    pub fn new(base_dir: PathBuf, public_prefix: impl Into<String>) -> Self {
        Self {
            base_dir,
            public_prefix: public_prefix.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn ensure_dir(&self) -> MediaResult<()> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> MediaResult<Option<Vec<u8>>> {
        let path = self.resolve_path(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn put(&self, name: &str, data: &[u8]) -> MediaResult<()> {
        let path = self.resolve_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> MediaResult<bool> {
        let path = self.resolve_path(name);
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the main file for `base_name` is present.
    pub async fn main_exists(&self, base_name: &str) -> MediaResult<bool> {
        self.exists(&naming::main_file_name(base_name)).await
    }

    /// First free base name derived from `base_name` (`name`, `name-1`, …).
    pub async fn ensure_unique(&self, base_name: &str) -> MediaResult<String> {
        let names = self.file_names().await?;
        Ok(naming::unique_base_name(base_name, |candidate| {
            names.contains(&naming::main_file_name(candidate))
        }))
    }

    /// Primary files only: derived variants, SEO crops and dotfiles are
    /// skipped. Sorted by name.
    pub async fn enumerate(&self) -> MediaResult<Vec<StoredFile>> {
        let mut names = self.file_names().await?;
        names.retain(|name| !naming::is_hidden_file(name) && !naming::is_derived_file(name));
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| StoredFile {
                url: self.public_url(&name),
                name,
            })
            .collect())
    }

    /// Primary files paired with the family a delete of each would remove,
    /// all taken from one directory listing. Sorted by name.
    pub async fn enumerate_families(&self) -> MediaResult<Vec<(StoredFile, AssetFamily)>> {
        let names = self.file_names().await?;
        let mut primary: Vec<&String> = names
            .iter()
            .filter(|name| !naming::is_hidden_file(name) && !naming::is_derived_file(name))
            .collect();
        primary.sort();
        Ok(primary
            .into_iter()
            .map(|name| {
                let family = AssetFamily::for_file(name, names.iter().map(String::as_str));
                let file = StoredFile {
                    name: name.clone(),
                    url: self.public_url(name),
                };
                (file, family)
            })
            .collect())
    }

    /// The family owned by `base_name` as currently on disk.
    pub async fn family(&self, base_name: &str, main_file: Option<&str>) -> MediaResult<AssetFamily> {
        let names = self.file_names().await?;
        Ok(AssetFamily::collect(
            base_name,
            main_file,
            names.iter().map(String::as_str),
        ))
    }

    /// Remove every file of the family. Returns how many files were removed.
    ///
    /// Files that disappear concurrently are not counted; any other failure
    /// aborts with the remaining files left in place.
    pub async fn delete_family(&self, base_name: &str, main_file: Option<&str>) -> MediaResult<usize> {
        let family = self.family(base_name, main_file).await?;
        let mut removed = 0;
        for name in family.files() {
            match fs::remove_file(self.resolve_path(name)).await {
                Ok(()) => {
                    debug!(file = name, "removed");
                    removed += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(file = name, "already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }

    /// Best-effort removal of specific files, used to undo a failed upload.
    pub async fn remove_files(&self, names: &[String]) {
        for name in names {
            if let Err(err) = fs::remove_file(self.resolve_path(name)).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(file = %name, error = %err, "cleanup failed");
                }
            }
        }
    }

    pub fn public_url(&self, name: &str) -> String {
        let prefix = self.public_prefix.trim_end_matches('/');
        let name = name.trim_start_matches('/');
        format!("{prefix}/{name}")
    }

    pub fn resolve_path(&self, name: &str) -> PathBuf {
        let normalized = name.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }

    async fn file_names(&self) -> MediaResult<Vec<String>> {
        let mut dir = match fs::read_dir(&self.base_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with(files: &[&str]) -> (TempDir, AssetStore) {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::new(tmp.path().to_path_buf(), "/uploads");
        for name in files {
            store.put(name, b"x").await.unwrap();
        }
        (tmp, store)
    }

    fn names(files: &[StoredFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn enumerate_lists_primary_files_only() {
        let (_tmp, store) = store_with(&[
            "photo.webp",
            "photo-w960.webp",
            "photo-w160.webp",
            "photo-seo-1200x630.webp",
            "photo-2.webp",
            "photo-2-w960.webp",
            ".DS_Store",
            "logo.png",
        ])
        .await;

        let listed = store.enumerate().await.unwrap();
        assert_eq!(names(&listed), vec!["logo.png", "photo-2.webp", "photo.webp"]);
        assert_eq!(listed[2].url, "/uploads/photo.webp");
    }

    #[tokio::test]
    async fn enumerate_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::new(tmp.path().join("nope"), "/uploads");
        assert!(store.enumerate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumerate_skips_directories() {
        let (tmp, store) = store_with(&["a.webp"]).await;
        std::fs::create_dir(tmp.path().join("nested.webp")).unwrap();
        assert_eq!(names(&store.enumerate().await.unwrap()), vec!["a.webp"]);
    }

    #[tokio::test]
    async fn enumerate_families_groups_derived_files() {
        let (_tmp, store) = store_with(&[
            "hero.webp",
            "hero-w960.webp",
            "hero-seo-64x32.webp",
            "hero-2.webp",
        ])
        .await;

        let listed = store.enumerate_families().await.unwrap();
        assert_eq!(listed.len(), 2);
        let (file, family) = &listed[1];
        assert_eq!(file.name, "hero.webp");
        assert_eq!(
            family.files().collect::<Vec<_>>(),
            vec!["hero.webp", "hero-w960.webp", "hero-seo-64x32.webp"]
        );
        assert_eq!(listed[0].1.files().collect::<Vec<_>>(), vec!["hero-2.webp"]);
    }

    #[tokio::test]
    async fn delete_family_leaves_similar_names() {
        let (_tmp, store) = store_with(&[
            "photo.webp",
            "photo-w960.webp",
            "photo-seo-1200x630.webp",
            "photo-2.webp",
            "photo-2-w960.webp",
        ])
        .await;

        let removed = store.delete_family("photo", None).await.unwrap();
        assert_eq!(removed, 3);
        assert!(!store.exists("photo.webp").await.unwrap());
        assert!(!store.exists("photo-w960.webp").await.unwrap());
        assert!(!store.exists("photo-seo-1200x630.webp").await.unwrap());
        assert!(store.exists("photo-2.webp").await.unwrap());
        assert!(store.exists("photo-2-w960.webp").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_family_removes_nothing() {
        let (_tmp, store) = store_with(&["other.webp"]).await;
        assert_eq!(store.delete_family("ghost", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ensure_unique_counts_up() {
        let (_tmp, store) = store_with(&["my-photo.webp", "my-photo-1.webp"]).await;
        assert_eq!(store.ensure_unique("my-photo").await.unwrap(), "my-photo-2");
        assert_eq!(store.ensure_unique("fresh").await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn ensure_unique_ignores_variant_only_leftovers() {
        // a stray variant does not make the base name taken
        let (_tmp, store) = store_with(&["orphan-w960.webp"]).await;
        assert_eq!(store.ensure_unique("orphan").await.unwrap(), "orphan");
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (_tmp, store) = store_with(&[]).await;
        assert_eq!(store.get("nothing.webp").await.unwrap(), None);
    }

    #[test]
    fn public_url_joins_cleanly() {
        let store = AssetStore::new(PathBuf::from("/srv"), "/uploads/");
        assert_eq!(store.public_url("/a.webp"), "/uploads/a.webp");
        assert_eq!(store.resolve_path("/a.webp"), PathBuf::from("/srv/a.webp"));
    }
}
