use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{PopulateError, Result};

/// Produces a derived file at the second path from the original at the first.
pub type VariationJob = Arc<dyn Fn(&Path, &Path) -> Result<()> + Send + Sync>;

/// A named derived file of an attachment (thumbnail, resized copy, ...).
///
/// For a stored file `cover.png`, the variation `thumb` with extension `jpg`
/// is stored next to it as `cover.thumb.jpg`.
#[derive(Clone)]
pub struct Variation {
    name: String,
    extension: String,
    job: VariationJob,
}

impl Variation {
    pub fn new<F>(name: impl Into<String>, extension: impl Into<String>, job: F) -> Self
    where
        F: Fn(&Path, &Path) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extension: extension.into(),
            job: Arc::new(job),
        }
    }

    /// Image scaled to fit within `width` x `height`, aspect ratio kept.
    pub fn thumbnail(
        name: impl Into<String>,
        extension: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        let extension = extension.into();
        let flatten = matches!(extension.to_ascii_lowercase().as_str(), "jpg" | "jpeg");
        Self::new(name, extension, move |source, destination| {
            let thumbnail = image::open(source)?.thumbnail(width, height);
            let thumbnail = if flatten {
                DynamicImage::ImageRgb8(thumbnail.to_rgb8())
            } else {
                thumbnail
            };
            thumbnail.save(destination)?;
            Ok(())
        })
    }

    /// Image resized to exactly `width` x `height`.
    pub fn resize_exact(
        name: impl Into<String>,
        extension: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self::new(name, extension, move |source, destination| {
            image::open(source)?
                .resize_exact(width, height, FilterType::Lanczos3)
                .save(destination)?;
            Ok(())
        })
    }

    /// Unchanged copy of the original under another extension.
    pub fn copy(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::new(name, extension, |source, destination| {
            fs::copy(source, destination)?;
            Ok(())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Runs the job; a job that leaves no file behind is a failure.
    pub fn run(&self, source: &Path, destination: &Path) -> Result<()> {
        (self.job)(source, destination)?;
        if !destination.is_file() {
            return Err(PopulateError::Variation {
                name: self.name.clone(),
                message: "job produced no file".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variation")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}
