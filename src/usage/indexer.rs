use std::sync::Arc;

use serde::Serialize;

use super::content::{ContentSnapshot, ContentSource, RecordId};
use crate::error::MediaResult;
use crate::naming::AssetFamily;
use crate::store::{AssetStore, StoredFile};

/// Decides whether a stored path string refers to a file.
pub trait UsageMatcher: Send + Sync {
    fn references(&self, stored: &str, file_name: &str) -> bool;
}

/// Plain substring containment, so absolute URLs, relative paths and bare
/// names all match. A name that is a substring of another file's path
/// (`photo.webp` inside `my-photo.webp`) is a false positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl UsageMatcher for SubstringMatcher {
    fn references(&self, stored: &str, file_name: &str) -> bool {
        !file_name.is_empty() && stored.contains(file_name)
    }
}

/// One content record field that mentions a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    pub field: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub pages: Vec<UsageRef>,
    pub galleries: Vec<UsageRef>,
    pub testimonials: Vec<UsageRef>,
    pub settings: Vec<UsageRef>,
}

impl Usage {
    pub fn count(&self) -> usize {
        self.pages.len() + self.galleries.len() + self.testimonials.len() + self.settings.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUsage {
    pub name: String,
    pub url: String,
    pub usage: Usage,
    pub usage_count: usize,
}

fn mentions(matcher: &dyn UsageMatcher, value: Option<&str>, members: &[&str]) -> bool {
    value.is_some_and(|stored| members.iter().any(|name| matcher.references(stored, name)))
}

/// Every record field in `content` that references any of `members`.
///
/// `members` is the whole family of an asset (main file, ladder variants and
/// SEO crops), so a field pointing at `hero-seo-1200x630.webp` counts as a use
/// of `hero.webp`. A field is reported once however many members it mentions.
pub fn usage_of(content: &ContentSnapshot, members: &[&str], matcher: &dyn UsageMatcher) -> Usage {
    let mut usage = Usage::default();

    for page in &content.pages {
        let fields = [
            ("heroImage", page.hero_image.as_deref()),
            ("seoImage", page.seo_image.as_deref()),
            ("content", page.content.as_deref()),
        ];
        for (field, value) in fields {
            if mentions(matcher, value, members) {
                usage.pages.push(UsageRef {
                    id: page.id.clone(),
                    title: page.title.clone(),
                    field,
                    item_id: None,
                });
            }
        }
    }

    for gallery in &content.galleries {
        for item in &gallery.items {
            if mentions(matcher, Some(item.image_path.as_str()), members) {
                usage.galleries.push(UsageRef {
                    id: gallery.id.clone(),
                    title: gallery.title.clone(),
                    field: "imagePath",
                    item_id: item.id.clone(),
                });
            }
        }
    }

    for testimonial in &content.testimonials {
        if mentions(matcher, testimonial.avatar.as_deref(), members) {
            usage.testimonials.push(UsageRef {
                id: testimonial.id.clone(),
                title: testimonial.name.clone(),
                field: "avatar",
                item_id: None,
            });
        }
    }

    if let Some(settings) = &content.settings {
        let fields = [
            ("ogImage", settings.og_image.as_deref()),
            ("favicon", settings.favicon.as_deref()),
            ("logo", settings.logo.as_deref()),
        ];
        for (field, value) in fields {
            if mentions(matcher, value, members) {
                usage.settings.push(UsageRef {
                    id: None,
                    title: "Site settings".to_string(),
                    field,
                    item_id: None,
                });
            }
        }
    }

    usage
}

pub fn compute_usage(
    files: Vec<(StoredFile, AssetFamily)>,
    content: &ContentSnapshot,
    matcher: &dyn UsageMatcher,
) -> Vec<FileUsage> {
    files
        .into_iter()
        .map(|(file, family)| {
            let members: Vec<&str> = family.files().collect();
            let usage = usage_of(content, &members, matcher);
            FileUsage {
                usage_count: usage.count(),
                name: file.name,
                url: file.url,
                usage,
            }
        })
        .collect()
}

/// Recomputes usage for every primary asset on each call; nothing is cached.
#[derive(Clone)]
pub struct UsageIndexer {
    source: Arc<dyn ContentSource>,
    matcher: Arc<dyn UsageMatcher>,
}

impl UsageIndexer {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_matcher(source, Arc::new(SubstringMatcher))
    }

    pub fn with_matcher(source: Arc<dyn ContentSource>, matcher: Arc<dyn UsageMatcher>) -> Self {
        Self { source, matcher }
    }

    pub async fn compute(&self, store: &AssetStore) -> MediaResult<Vec<FileUsage>> {
        let files = store.enumerate_families().await?;
        let content = self.source.snapshot().await?;
        Ok(compute_usage(files, &content, self.matcher.as_ref()))
    }
}
