//! Device template catalog (`contents.json`) and aspect-based auto-selection.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    foundation::{
        error::{FramerError, FramerResult},
        geometry::ScreenBounds,
    },
    template::TemplateDescriptor,
};

/// File name of the catalog inside a resource directory.
pub const CATALOG_FILE: &str = "contents.json";

/// One device in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub res_width: u32,
    pub res_height: u32,
    /// Color variant used when the key names none.
    pub default_image: String,
    /// Color variant → template image file name.
    pub images: BTreeMap<String, String>,
}

impl CatalogEntry {
    pub fn bounds(&self) -> ScreenBounds {
        ScreenBounds::new(self.left, self.top, self.right, self.bottom)
    }

    pub fn screen_width(&self) -> i32 {
        self.right - self.left
    }

    pub fn screen_height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Builds the descriptor for a color variant, or the default one.
    pub fn to_descriptor(
        &self,
        images_dir: &Path,
        color: Option<&str>,
    ) -> FramerResult<TemplateDescriptor> {
        let variant = color.unwrap_or(&self.default_image);
        let file = self.images.get(variant).ok_or_else(|| {
            let known: Vec<&str> = self.images.keys().map(String::as_str).collect();
            FramerError::validation(format!(
                "unknown color \"{variant}\" (available: {})",
                known.join(", ")
            ))
        })?;
        Ok(TemplateDescriptor::new(
            images_dir.join(file),
            self.bounds(),
            self.res_width,
            self.res_height,
        ))
    }
}

/// A parsed `device[_color]` template key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateKey {
    pub device: String,
    pub color: Option<String>,
}

/// Splits a key on runs of `_` into device and optional color.
pub fn parse_template_key(key: &str) -> FramerResult<TemplateKey> {
    let mut parts = key.split('_').filter(|p| !p.is_empty());
    let device = parts.next().ok_or_else(|| {
        FramerError::validation("template key should be in format \"device[_color]\"")
    })?;
    Ok(TemplateKey {
        device: device.to_owned(),
        color: parts.next().map(str::to_owned),
    })
}

/// Index of the aspect ratio closest to `width / height`; ties go to the first.
///
/// NaN aspects never win. Returns `None` for an empty list or a zero-height input.
pub fn auto_select(aspects: &[f64], width: u32, height: u32) -> Option<usize> {
    if height == 0 {
        return None;
    }
    let target = f64::from(width) / f64::from(height);
    let mut best: Option<(usize, f64)> = None;
    for (i, aspect) in aspects.iter().enumerate() {
        let diff = (target - aspect).abs();
        if diff.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, d)| diff < d) {
            best = Some((i, diff));
        }
    }
    best.map(|(i, _)| i)
}

/// All devices known to a resource directory, keyed by device name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> FramerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FramerError::resource(format!("failed to read catalog '{}': {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), devices = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> FramerResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FramerError::serde(format!("invalid template catalog: {e}")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, device: &str) -> Option<&CatalogEntry> {
        self.entries.get(device)
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolves a `device[_color]` key to a descriptor with its image under `images_dir`.
    pub fn resolve(&self, key: &str, images_dir: &Path) -> FramerResult<TemplateDescriptor> {
        let key = parse_template_key(key)?;
        let entry = self
            .get(&key.device)
            .ok_or_else(|| FramerError::validation(format!("invalid template {}", key.device)))?;
        entry.to_descriptor(images_dir, key.color.as_deref())
    }

    /// Picks the device whose screen aspect best matches the input, in its default color.
    pub fn auto_resolve(
        &self,
        width: u32,
        height: u32,
        images_dir: &Path,
    ) -> FramerResult<(String, TemplateDescriptor)> {
        let aspects: Vec<f64> = self
            .entries
            .values()
            .map(|e| e.bounds().aspect().unwrap_or(f64::NAN))
            .collect();
        let index = auto_select(&aspects, width, height).ok_or_else(|| {
            FramerError::validation(format!("no template matches a {width}x{height} input"))
        })?;
        let (device, entry) = self
            .entries
            .iter()
            .nth(index)
            .ok_or_else(|| FramerError::state("auto-selected template index out of range"))?;
        tracing::info!(device = %device, "auto-selected template");
        Ok((device.clone(), entry.to_descriptor(images_dir, None)?))
    }

    pub fn insert(&mut self, device: impl Into<String>, entry: CatalogEntry) {
        self.entries.insert(device.into(), entry);
    }
}

/// Where a resource directory keeps its catalog.
pub fn catalog_path(resources: &Path) -> PathBuf {
    resources.join(CATALOG_FILE)
}
