//! On-demand thumbnail cache.
//!
//! Artifacts are written once under a deterministic name and never
//! re-rendered: if the file exists its URL is returned without touching the
//! source. Sources that cannot be decoded resolve to the placeholder image.
//!
//! Rendering is CPU bound. Async callers go through [`ThumbnailService::render`],
//! which runs the work on tokio's blocking pool.

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Rgba, RgbaImage};
use metrics::{counter, histogram};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::thumbnail::{
    Background, CropMode, Quality, ThumbnailRequest, ThumbnailSpecError,
};

pub const CACHE_HIT_TOTAL: &str = "galatea_thumbnail_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "galatea_thumbnail_cache_miss_total";
pub const PLACEHOLDER_TOTAL: &str = "galatea_thumbnail_placeholder_total";
pub const RENDER_FAILURE_TOTAL: &str = "galatea_thumbnail_render_failure_total";
pub const RENDER_MS: &str = "galatea_thumbnail_render_ms";

#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Spec(#[from] ThumbnailSpecError),
    #[error("failed to encode thumbnail `{name}`")]
    Encode {
        name: String,
        #[source]
        source: ImageError,
    },
    #[error("failed to write thumbnail `{name}`")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("thumbnail task failed: {0}")]
    Task(String),
}

impl ThumbnailError {
    /// Whether the caller asked for something impossible, as opposed to the
    /// render failing.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ThumbnailError::Spec(_))
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Store holding source images, already scoped to the database name.
    pub source_root: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_url: String,
    pub placeholder_url: String,
    pub default_quality: Quality,
    /// Largest accepted width or height.
    pub max_dimension: u32,
}

#[derive(Clone)]
pub struct ThumbnailService {
    config: Arc<ThumbnailConfig>,
}

impl ThumbnailService {
    /// Create the service, making sure the cache directory exists.
    pub fn new(config: ThumbnailConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Parse template-style arguments, applying the configured default quality.
    pub fn request(
        &self,
        source_id: &str,
        display_name: &str,
        size: &str,
        crop: Option<&str>,
        background: Option<&str>,
        quality: Option<u16>,
    ) -> Result<ThumbnailRequest, ThumbnailSpecError> {
        let request = ThumbnailRequest::parse_with_default(
            source_id,
            display_name,
            size,
            crop,
            background,
            quality,
            self.config.default_quality,
        )?;
        if request.size.exceeds(self.config.max_dimension) {
            return Err(ThumbnailSpecError::SizeTooLarge {
                size: request.size.to_string(),
                limit: self.config.max_dimension,
            });
        }
        Ok(request)
    }

    /// Parse and resolve in one step; the blocking entry point for templates
    /// and the CLI.
    pub fn thumbnail(
        &self,
        source_id: &str,
        display_name: &str,
        size: &str,
        crop: Option<&str>,
        background: Option<&str>,
        quality: Option<u16>,
    ) -> Result<String, ThumbnailError> {
        let request = self.request(source_id, display_name, size, crop, background, quality)?;
        self.get_or_create(&request)
    }

    /// Run [`Self::get_or_create`] on the blocking pool.
    pub async fn render(&self, request: ThumbnailRequest) -> Result<String, ThumbnailError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.get_or_create(&request))
            .await
            .map_err(|err| ThumbnailError::Task(err.to_string()))?
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.config.cache_dir.join(name)
    }

    pub fn artifact_url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.config.cache_url.trim_end_matches('/'),
            urlencoding::encode(name)
        )
    }

    /// Return the URL of the cached artifact for `request`, rendering it first
    /// when it does not exist yet.
    pub fn get_or_create(&self, request: &ThumbnailRequest) -> Result<String, ThumbnailError> {
        let name = request.artifact_name();
        let path = self.artifact_path(&name);
        let url = self.artifact_url(&name);

        if path.exists() {
            counter!(CACHE_HIT_TOTAL).increment(1);
            debug!(target = "galatea::thumbnails", artifact = %name, "thumbnail cache hit");
            return Ok(url);
        }
        counter!(CACHE_MISS_TOTAL).increment(1);

        let source_path = request.source.store_path(&self.config.source_root);
        let (source, source_format) = match decode(&source_path) {
            Ok(decoded) => decoded,
            Err(reason) => {
                counter!(PLACEHOLDER_TOTAL).increment(1);
                warn!(
                    target = "galatea::thumbnails",
                    source = %source_path.display(),
                    reason = %reason,
                    "source image unreadable; using placeholder"
                );
                return Ok(self.config.placeholder_url.clone());
            }
        };

        let started = Instant::now();
        let thumbnail = transform(source, request);
        let format = output_format(source_format, &name);
        let bytes = encode(&thumbnail, format, request.quality).map_err(|source| {
            counter!(RENDER_FAILURE_TOTAL).increment(1);
            ThumbnailError::Encode {
                name: name.clone(),
                source,
            }
        })?;
        self.persist(&path, &bytes).map_err(|source| {
            counter!(RENDER_FAILURE_TOTAL).increment(1);
            ThumbnailError::Io {
                name: name.clone(),
                source,
            }
        })?;

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(RENDER_MS).record(elapsed);
        info!(
            target = "galatea::thumbnails",
            artifact = %name,
            width = thumbnail.width(),
            height = thumbnail.height(),
            bytes = bytes.len(),
            elapsed_ms = elapsed,
            "thumbnail rendered"
        );
        Ok(url)
    }

    /// Write through a temporary file in the cache directory and rename it
    /// into place, so readers never observe a partial artifact. Artifacts are
    /// world-readable for whatever serves the cache URL.
    fn persist(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut temp = NamedTempFile::new_in(&self.config.cache_dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(ARTIFACT_MODE))?;
        }
        temp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

fn decode(path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), String> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| err.to_string())?;
    let format = reader.format();
    let image = reader.decode().map_err(|err| err.to_string())?;
    Ok((image, format))
}

fn transform(source: DynamicImage, request: &ThumbnailRequest) -> DynamicImage {
    let (width, height) = (request.size.width, request.size.height);
    let thumbnail = match request.crop {
        Some(CropMode::Fit) => source.resize_to_fill(width, height, FilterType::Lanczos3),
        None if source.width() <= width && source.height() <= height => source,
        None => source.resize(width, height, FilterType::Lanczos3),
    };

    match request.background {
        Some(background) => pad(&thumbnail, request.size.square_side(), background),
        None => thumbnail,
    }
}

/// Centre `thumbnail` on a square canvas of `side` filled with `background`.
fn pad(thumbnail: &DynamicImage, side: u32, background: Background) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(side, side, Rgba(background.rgba));
    let x = side.saturating_sub(thumbnail.width()) / 2;
    let y = side.saturating_sub(thumbnail.height()) / 2;
    imageops::overlay(&mut canvas, &thumbnail.to_rgba8(), i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas)
}

/// Thumbnails keep the source's format. The artifact extension only decides
/// when the source format cannot be written.
fn output_format(source: Option<ImageFormat>, name: &str) -> ImageFormat {
    source
        .into_iter()
        .chain(ImageFormat::from_path(name).ok())
        .find(ImageFormat::writing_enabled)
        .unwrap_or(ImageFormat::Png)
}

fn encode(image: &DynamicImage, format: ImageFormat, quality: Quality) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.get());
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Png => image.write_to(&mut buffer, ImageFormat::Png)?,
        other => DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut buffer, other)?,
    }
    Ok(buffer.into_inner())
}
