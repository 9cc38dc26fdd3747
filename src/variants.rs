//! Main asset, resized ladder and SEO crop generation.
//!
//! All pixel work for an upload happens in memory on a blocking worker before
//! anything touches the store. Writes then run in order (main first, then the
//! ladder from largest to smallest). If a write fails, the files already
//! written for this upload are removed again, so a failed upload leaves no
//! partial family behind.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ImageSettings;
use crate::error::{MediaError, MediaResult};
use crate::image_processing::{self, LadderStep};
use crate::naming;
use crate::store::AssetStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedVariant {
    pub size: u32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAsset {
    pub base_name: String,
    pub file_name: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub variants: Vec<GeneratedVariant>,
}

/// An encoded file waiting to be written.
#[derive(Debug)]
struct RenderedFile {
    name: String,
    /// Ladder size, `None` for the main asset.
    size: Option<u32>,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct RenderedFamily {
    width: u32,
    height: u32,
    files: Vec<RenderedFile>,
}

fn render_family(
    source: &[u8],
    base_name: &str,
    already_target: bool,
    settings: &ImageSettings,
) -> MediaResult<RenderedFamily> {
    let image = image_processing::decode_oriented(source)?;
    let original = (image.width(), image.height());
    if original.0 == 0 || original.1 == 0 {
        return Err(MediaError::ImageProcessing("image has no pixels".to_string()));
    }

    let (main_bytes, (width, height)) = if already_target {
        (source.to_vec(), original)
    } else {
        let (w, h) = image_processing::fit_within(original, settings.max_dimension);
        let main = image_processing::resize_exact(&image, w, h);
        (image_processing::encode_webp(&main, settings.quality)?, (w, h))
    };

    let mut files = vec![RenderedFile {
        name: naming::main_file_name(base_name),
        size: None,
        bytes: main_bytes,
    }];

    for LadderStep {
        size,
        width: w,
        height: h,
    } in image_processing::ladder_steps(original, &settings.variant_sizes)
    {
        let resized = image_processing::resize_exact(&image, w, h);
        files.push(RenderedFile {
            name: naming::variant_file_name(base_name, size),
            size: Some(size),
            bytes: image_processing::encode_webp(&resized, settings.quality)?,
        });
    }

    Ok(RenderedFamily {
        width,
        height,
        files,
    })
}

fn render_seo(source: &[u8], settings: &ImageSettings) -> MediaResult<Vec<u8>> {
    let image = image_processing::decode_oriented(source)?;
    let (w, h) = settings.seo_size;
    let cropped = image_processing::cover_crop(&image, w, h);
    image_processing::encode_webp(&cropped, settings.quality)
}

async fn run_blocking<T, F>(job: F) -> MediaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> MediaResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| MediaError::ImageProcessing(format!("image worker failed: {err}")))?
}

/// Last path segment of an absolute or relative URL, without query/fragment.
fn file_name_from_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let path = match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .next()
        .filter(|name| naming::is_safe_file_name(name))
        .map(str::to_string)
}

#[derive(Clone, Debug)]
pub struct VariantGenerator {
    store: AssetStore,
    settings: ImageSettings,
}

impl VariantGenerator {
    pub fn new(store: AssetStore, settings: ImageSettings) -> Self {
        Self { store, settings }
    }

    /// Produce and persist the main asset plus every applicable ladder size.
    ///
    /// `already_target` keeps the source bytes verbatim as the main asset.
    pub async fn generate(
        &self,
        source: Vec<u8>,
        base_name: &str,
        already_target: bool,
    ) -> MediaResult<GeneratedAsset> {
        let settings = self.settings.clone();
        let base = base_name.to_string();
        let rendered =
            run_blocking(move || render_family(&source, &base, already_target, &settings)).await?;

        let mut written: Vec<String> = Vec::with_capacity(rendered.files.len());
        let mut variants = Vec::new();
        for file in &rendered.files {
            if let Err(err) = self.store.put(&file.name, &file.bytes).await {
                self.store.remove_files(&written).await;
                return Err(err);
            }
            debug!(file = %file.name, bytes = file.bytes.len(), "wrote");
            written.push(file.name.clone());
            if let Some(size) = file.size {
                variants.push(GeneratedVariant {
                    size,
                    url: self.store.public_url(&file.name),
                });
            }
        }

        let file_name = naming::main_file_name(base_name);
        info!(
            base_name,
            width = rendered.width,
            height = rendered.height,
            variants = variants.len(),
            "generated asset"
        );
        Ok(GeneratedAsset {
            base_name: base_name.to_string(),
            url: self.store.public_url(&file_name),
            file_name,
            width: rendered.width,
            height: rendered.height,
            variants,
        })
    }

    /// URL of the SEO crop for `source_url`, creating it on first request.
    ///
    /// The crop is keyed by the owning family, so asking with a ladder
    /// variant's URL yields the same crop as the main asset.
    pub async fn ensure_seo_image(&self, source_url: &str) -> MediaResult<String> {
        let file_name = file_name_from_url(source_url)
            .ok_or_else(|| MediaError::BadRequest(format!("invalid image url: {source_url}")))?;
        let base = naming::owning_base_name(&file_name).to_string();
        let seo_name = naming::seo_file_name(&base, self.settings.seo_size);
        if self.store.exists(&seo_name).await? {
            return Ok(self.store.public_url(&seo_name));
        }

        let main_name = naming::main_file_name(&base);
        let source = match self.store.get(&main_name).await? {
            Some(bytes) => bytes,
            None => self
                .store
                .get(&file_name)
                .await?
                .ok_or_else(|| MediaError::NotFound(format!("image not found: {file_name}")))?,
        };

        let settings = self.settings.clone();
        let bytes = run_blocking(move || render_seo(&source, &settings)).await?;
        self.store.put(&seo_name, &bytes).await?;
        info!(file = %seo_name, "generated seo crop");
        Ok(self.store.public_url(&seo_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::tests::{jpeg_bytes, png_bytes};
    use tempfile::TempDir;

    fn small_settings() -> ImageSettings {
        ImageSettings {
            max_dimension: 256,
            quality: 80,
            variant_sizes: vec![192, 96, 48],
            seo_size: (120, 63),
        }
    }

    fn generator(tmp: &TempDir, settings: ImageSettings) -> VariantGenerator {
        VariantGenerator::new(AssetStore::new(tmp.path().to_path_buf(), "/uploads"), settings)
    }

    fn dims_of(path: &std::path::Path) -> (u32, u32) {
        image::image_dimensions(path).unwrap()
    }

    #[test]
    fn render_family_skips_rungs_above_source() {
        let family = render_family(&png_bytes(100, 60), "shot", false, &small_settings()).unwrap();
        let names: Vec<&str> = family.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["shot.webp", "shot-w96.webp", "shot-w48.webp"]);
        assert_eq!((family.width, family.height), (100, 60));
    }

    #[test]
    fn render_family_keeps_target_format_verbatim() {
        let webp = {
            let image = image_processing::decode_oriented(&png_bytes(80, 40)).unwrap();
            image_processing::encode_webp(&image, 50).unwrap()
        };
        let family = render_family(&webp, "kept", true, &small_settings()).unwrap();
        assert_eq!(family.files[0].bytes, webp);
    }

    #[test]
    fn render_family_rejects_corrupt_source() {
        let err = render_family(b"garbage", "bad", false, &small_settings()).unwrap_err();
        assert!(matches!(err, MediaError::ImageProcessing(_)));
    }

    #[tokio::test]
    async fn generate_writes_capped_main_and_ladder() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());

        let asset = generator
            .generate(jpeg_bytes(400, 200), "studio", false)
            .await
            .unwrap();

        assert_eq!(asset.url, "/uploads/studio.webp");
        assert_eq!((asset.width, asset.height), (256, 128));
        assert_eq!(dims_of(&tmp.path().join("studio.webp")), (256, 128));
        let sizes: Vec<u32> = asset.variants.iter().map(|v| v.size).collect();
        assert_eq!(sizes, vec![192, 96, 48]);
        assert_eq!(asset.variants[1].url, "/uploads/studio-w96.webp");
        assert_eq!(dims_of(&tmp.path().join("studio-w192.webp")), (192, 96));
        assert_eq!(dims_of(&tmp.path().join("studio-w48.webp")), (48, 24));
    }

    #[tokio::test]
    async fn generate_never_upscales_small_sources() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());

        let asset = generator.generate(png_bytes(40, 30), "tiny", false).await.unwrap();

        assert!(asset.variants.is_empty());
        assert_eq!(dims_of(&tmp.path().join("tiny.webp")), (40, 30));
    }

    #[tokio::test]
    async fn generate_failure_on_decode_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());

        let err = generator
            .generate(b"not an image".to_vec(), "broken", false)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ImageProcessing(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn generate_write_failure_cleans_up_written_files() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());
        // a directory in place of a ladder file makes that write fail
        std::fs::create_dir(tmp.path().join("blocked-w96.webp")).unwrap();

        let err = generator
            .generate(png_bytes(300, 200), "blocked", false)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Storage(_)));
        assert!(!tmp.path().join("blocked.webp").exists());
        assert!(!tmp.path().join("blocked-w192.webp").exists());
        assert!(!tmp.path().join("blocked-w48.webp").exists());
    }

    #[tokio::test]
    async fn seo_image_is_created_once() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());
        generator.generate(png_bytes(300, 300), "cover", false).await.unwrap();

        let first = generator.ensure_seo_image("/uploads/cover.webp").await.unwrap();
        assert_eq!(first, "/uploads/cover-seo-120x63.webp");
        let crop_path = tmp.path().join("cover-seo-120x63.webp");
        assert_eq!(dims_of(&crop_path), (120, 63));

        // replace the crop; a second call must hand it back untouched
        std::fs::write(&crop_path, b"marker").unwrap();
        let second = generator
            .ensure_seo_image("https://studio.example/uploads/cover.webp?v=2")
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(std::fs::read(&crop_path).unwrap(), b"marker");
    }

    #[tokio::test]
    async fn seo_image_from_variant_url_uses_family() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());
        generator.generate(png_bytes(300, 200), "hero", false).await.unwrap();

        let url = generator.ensure_seo_image("/uploads/hero-w96.webp").await.unwrap();
        assert_eq!(url, "/uploads/hero-seo-120x63.webp");
    }

    #[tokio::test]
    async fn seo_image_missing_source_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let generator = generator(&tmp, small_settings());

        let err = generator.ensure_seo_image("/uploads/ghost.webp").await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }

    #[test]
    fn file_name_from_urls() {
        assert_eq!(
            file_name_from_url("https://x.test/uploads/a.webp?x=1").as_deref(),
            Some("a.webp")
        );
        assert_eq!(file_name_from_url("/uploads/b.webp#top").as_deref(), Some("b.webp"));
        assert_eq!(file_name_from_url("c.webp").as_deref(), Some("c.webp"));
        assert_eq!(file_name_from_url("/uploads/"), None);
        assert_eq!(file_name_from_url("/uploads/.."), None);
    }
}
