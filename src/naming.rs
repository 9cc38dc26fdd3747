//! File naming conventions for stored media.
//!
//! A stored asset is identified by its *base name*: a lowercase slug of
//! `[a-z0-9-]` with no leading or trailing hyphen. Every file derived from an
//! upload shares that base name:
//!
//! - `{base}.webp`: the main asset
//! - `{base}-w{size}.webp`: one per generated ladder size
//! - `{base}-seo-{w}x{h}.webp`: the social/SEO crop, created lazily
//!
//! This module is the only place that knows those patterns. The store and
//! the upload pipeline go through [`AssetFamily`] and the helpers below.

use chrono::Utc;

pub const TARGET_EXTENSION: &str = "webp";

/// Normalize a user supplied file name (or requested base name) to a base name.
///
/// Directory components and the extension are dropped, the rest is
/// lowercased and every run of characters outside `[a-z0-9]` collapses into a
/// single hyphen. An empty result becomes `upload-{unix millis}`.
///
/// A slug that would read as a derived file (`banner-w1920`,
/// `cover-seo-1200x630`) gets a `-1` suffix so its main file is never mistaken
/// for another family's variant.
pub fn normalize(raw: &str) -> String {
    let file = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let slug = slugify(strip_extension(file));
    if slug.is_empty() {
        format!("upload-{}", Utc::now().timestamp_millis())
    } else if is_derived_file(&main_file_name(&slug)) {
        format!("{slug}-1")
    } else {
        slug
    }
}

fn strip_extension(file: &str) -> &str {
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Append `-1`, `-2`, … to `base` until `taken` reports the name as free.
///
/// `taken` is consulted against the current store state; the check and the
/// later write are not atomic.
pub fn unique_base_name<F>(base: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !taken(base) {
        return base.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

pub fn main_file_name(base: &str) -> String {
    format!("{base}.{TARGET_EXTENSION}")
}

pub fn variant_file_name(base: &str, size: u32) -> String {
    format!("{base}-w{size}.{TARGET_EXTENSION}")
}

pub fn seo_file_name(base: &str, size: (u32, u32)) -> String {
    format!("{base}-seo-{}x{}.{TARGET_EXTENSION}", size.0, size.1)
}

/// Base name of a stored file: the file name without its extension.
pub fn base_name_of(file_name: &str) -> &str {
    strip_extension(file_name)
}

/// Which member of a family a file name would be, relative to a base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DerivedSuffix {
    Width(u32),
    Seo(u32, u32),
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse the part after the base name: `-w960.webp` or `-seo-1200x630.webp`.
fn parse_derived_suffix(rest: &str) -> Option<DerivedSuffix> {
    let rest = rest.strip_suffix(".webp")?;
    if let Some(size) = rest.strip_prefix("-w") {
        if all_digits(size) {
            return size.parse().ok().map(DerivedSuffix::Width);
        }
        return None;
    }
    let dims = rest.strip_prefix("-seo-")?;
    let (w, h) = dims.split_once('x')?;
    if all_digits(w) && all_digits(h) {
        return Some(DerivedSuffix::Seo(w.parse().ok()?, h.parse().ok()?));
    }
    None
}

/// True if `name` follows a derived-file pattern (`-w{N}.webp` or
/// `-seo-{W}x{H}.webp`) for some non-empty base name.
pub fn is_derived_file(name: &str) -> bool {
    if let Some(idx) = name.rfind("-w") {
        if idx > 0 && parse_derived_suffix(&name[idx..]).is_some() {
            return true;
        }
    }
    if let Some(idx) = name.rfind("-seo-") {
        if idx > 0 && parse_derived_suffix(&name[idx..]).is_some() {
            return true;
        }
    }
    false
}

/// Files that should never be listed as assets.
pub fn is_hidden_file(name: &str) -> bool {
    name.starts_with('.')
}

/// Base name of the family a stored file belongs to. For `photo-w960.webp`
/// and `photo-seo-1200x630.webp` this is `photo`; for anything else it is the
/// name without its extension.
pub fn owning_base_name(file_name: &str) -> &str {
    for marker in ["-seo-", "-w"] {
        if let Some(idx) = file_name.rfind(marker) {
            if idx > 0 && parse_derived_suffix(&file_name[idx..]).is_some() {
                return &file_name[..idx];
            }
        }
    }
    base_name_of(file_name)
}

/// A single path segment that cannot escape the store directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// All files owned by one base name, grouped from a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFamily {
    pub base_name: String,
    /// Present main file names. Normally just `{base}.webp`; a legacy upload
    /// stored under another extension is also counted when named explicitly.
    pub main_files: Vec<String>,
    /// `(size, file name)`, largest first.
    pub variants: Vec<(u32, String)>,
    pub seo_crops: Vec<String>,
}

impl AssetFamily {
    /// Group the members of `base_name` out of `names`.
    ///
    /// `main_file` is an extra exact name treated as the main asset (for
    /// example `photo.jpg` when deleting a non-WebP upload).
    pub fn collect<'a, I>(base_name: &str, main_file: Option<&str>, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let main = main_file_name(base_name);
        let mut family = AssetFamily {
            base_name: base_name.to_string(),
            ..Default::default()
        };
        for name in names {
            if name == main || Some(name) == main_file {
                family.main_files.push(name.to_string());
                continue;
            }
            let Some(rest) = name.strip_prefix(base_name) else {
                continue;
            };
            match parse_derived_suffix(rest) {
                Some(DerivedSuffix::Width(size)) => family.variants.push((size, name.to_string())),
                Some(DerivedSuffix::Seo(..)) => family.seo_crops.push(name.to_string()),
                None => {}
            }
        }
        family.variants.sort_by(|a, b| b.0.cmp(&a.0));
        family
    }

    /// The family a delete of `file_name` would remove: the file itself plus
    /// everything derived from its extension-less base name.
    pub fn for_file<'a, I>(file_name: &str, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::collect(base_name_of(file_name), Some(file_name), names)
    }

    pub fn is_empty(&self) -> bool {
        self.main_files.is_empty() && self.variants.is_empty() && self.seo_crops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.main_files.len() + self.variants.len() + self.seo_crops.len()
    }

    /// Every file name in the family.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.main_files
            .iter()
            .map(String::as_str)
            .chain(self.variants.iter().map(|(_, name)| name.as_str()))
            .chain(self.seo_crops.iter().map(String::as_str))
    }
}
