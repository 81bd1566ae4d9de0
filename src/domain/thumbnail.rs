//! Thumbnail rendering requests and their deterministic cache keys.
//!
//! A [`ThumbnailRequest`] is built from the loosely-typed arguments a template
//! passes (`"100x100"`, `"fit"`, `"#ffffff"`, `90`). Parsing happens up front so
//! that every malformed argument is reported before any filesystem work, and so
//! that the artifact name derived from a request is a pure function of its
//! parsed parts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Quality used when a caller does not ask for one.
pub const DEFAULT_QUALITY: u8 = 85;

/// Minimum identifier length needed to build the two-level store partition.
const MIN_SOURCE_ID_LEN: usize = 4;

/// Caller errors: the template or call site asked for something impossible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThumbnailSpecError {
    #[error("size `{0}` is not of the form WIDTHxHEIGHT with positive integers")]
    MalformedSize(String),
    #[error("source id `{0}` must be at least 4 ASCII alphanumeric characters")]
    InvalidSource(String),
    #[error("display name `{0}` must be a plain, non-empty file name")]
    InvalidDisplayName(String),
    #[error("crop mode `{0}` is not supported (expected `fit`)")]
    UnknownCrop(String),
    #[error("background `{0}` is not a recognised colour")]
    InvalidBackground(String),
    #[error("quality {0} is outside 1..=100")]
    QualityOutOfRange(u16),
    #[error("size `{size}` exceeds the {limit}px limit")]
    SizeTooLarge { size: String, limit: u32 },
}

/// Content-addressed identifier of a stored source image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn parse(raw: &str) -> Result<Self, ThumbnailSpecError> {
        let valid = raw.len() >= MIN_SOURCE_ID_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(ThumbnailSpecError::InvalidSource(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the source inside the store: `root/ab/12/ab12...`.
    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0[0..2]).join(&self.0[2..4]).join(&self.0)
    }
}

/// Requested bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeSpec {
    pub width: u32,
    pub height: u32,
}

impl SizeSpec {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn exceeds(&self, limit: u32) -> bool {
        self.width > limit || self.height > limit
    }

    /// Side of the square canvas used when padding with a background.
    pub fn square_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl FromStr for SizeSpec {
    type Err = ThumbnailSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || ThumbnailSpecError::MalformedSize(raw.to_string());
        let (width, height) = raw.trim().split_once('x').ok_or_else(malformed)?;
        let width: u32 = width.parse().map_err(|_| malformed())?;
        let height: u32 = height.parse().map_err(|_| malformed())?;
        Self::new(width, height).ok_or_else(malformed)
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the source is fitted into the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropMode {
    /// Scale and centre-crop so the output is exactly the requested size.
    Fit,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Fit => "fit",
        }
    }
}

impl FromStr for CropMode {
    type Err = ThumbnailSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "fit" => Ok(CropMode::Fit),
            other => Err(ThumbnailSpecError::UnknownCrop(other.to_string())),
        }
    }
}

/// RGBA padding colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Background {
    pub rgba: [u8; 4],
}

impl Background {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { rgba: [r, g, b, 255] }
    }

    fn parse_hex(hex: &str) -> Option<[u8; 4]> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [255u8; 4];
                for (idx, ch) in hex.chars().enumerate() {
                    let nibble = ch.to_digit(16)? as u8;
                    out[idx] = nibble * 17;
                }
                Some(out)
            }
            6 | 8 => {
                let mut out = [255u8; 4];
                for (idx, slot) in out.iter_mut().enumerate().take(hex.len() / 2) {
                    *slot = channel(&hex[idx * 2..idx * 2 + 2])?;
                }
                Some(out)
            }
            _ => None,
        }
    }

    fn parse_channels(raw: &str) -> Option<[u8; 4]> {
        let values = raw
            .split(',')
            .map(|part| part.trim().parse::<u8>().ok())
            .collect::<Option<Vec<u8>>>()?;
        match values.as_slice() {
            [grey] => Some([*grey, *grey, *grey, 255]),
            [r, g, b] => Some([*r, *g, *b, 255]),
            [r, g, b, a] => Some([*r, *g, *b, *a]),
            _ => None,
        }
    }
}

impl FromStr for Background {
    type Err = ThumbnailSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        let rgba = if let Some(hex) = trimmed.strip_prefix('#') {
            Self::parse_hex(hex)
        } else if trimmed.contains(',') || trimmed.parse::<u8>().is_ok() {
            Self::parse_channels(trimmed)
        } else {
            Self::parse_hex(trimmed)
        };

        rgba.map(|rgba| Self { rgba })
            .ok_or_else(|| ThumbnailSpecError::InvalidBackground(raw.to_string()))
    }
}

/// Canonical lowercase hex without `#`, so it is safe inside file names and URLs.
impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.rgba;
        if a == 255 {
            write!(f, "{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Encoder quality in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u16) -> Result<Self, ThumbnailSpecError> {
        match u8::try_from(value) {
            Ok(value @ 1..=100) => Ok(Self(value)),
            _ => Err(ThumbnailSpecError::QualityOutOfRange(value)),
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

/// Output file name split like a path's stem and extension (`photo`, `.jpg`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName {
    stem: String,
    extension: String,
}

impl DisplayName {
    pub fn parse(raw: &str) -> Result<Self, ThumbnailSpecError> {
        let invalid = || ThumbnailSpecError::InvalidDisplayName(raw.to_string());
        if raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0'])
            || raw.chars().any(char::is_control)
        {
            return Err(invalid());
        }

        // Leading dots belong to the stem, as in `.profile`.
        let leading = raw.len() - raw.trim_start_matches('.').len();
        let (stem, extension) = match raw[leading..].rfind('.') {
            Some(dot) => raw.split_at(leading + dot),
            None => (raw, ""),
        };

        Ok(Self {
            stem: stem.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension including its leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Fully-parsed rendering request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailRequest {
    pub source: SourceId,
    pub display_name: DisplayName,
    pub size: SizeSpec,
    pub crop: Option<CropMode>,
    pub background: Option<Background>,
    pub quality: Quality,
    pub default_quality: Quality,
}

impl ThumbnailRequest {
    /// Parse template-style arguments. `quality` of `None` means the default.
    pub fn parse(
        source_id: &str,
        display_name: &str,
        size: &str,
        crop: Option<&str>,
        background: Option<&str>,
        quality: Option<u16>,
    ) -> Result<Self, ThumbnailSpecError> {
        Self::parse_with_default(
            source_id,
            display_name,
            size,
            crop,
            background,
            quality,
            Quality::default(),
        )
    }

    /// Like [`Self::parse`], with `default_quality` standing in for an omitted
    /// quality and dropping out of the artifact name.
    pub fn parse_with_default(
        source_id: &str,
        display_name: &str,
        size: &str,
        crop: Option<&str>,
        background: Option<&str>,
        quality: Option<u16>,
        default_quality: Quality,
    ) -> Result<Self, ThumbnailSpecError> {
        fn non_blank(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        Ok(Self {
            source: SourceId::parse(source_id)?,
            display_name: DisplayName::parse(display_name)?,
            size: size.parse()?,
            crop: non_blank(crop).map(str::parse).transpose()?,
            background: non_blank(background).map(str::parse).transpose()?,
            quality: quality.map(Quality::new).transpose()?.unwrap_or(default_quality),
            default_quality,
        })
    }

    /// Deterministic cache key: `stem_WxH[_crop][_bg][_quality].ext`.
    ///
    /// Quality is only spelled out when it differs from the default, so plain
    /// requests map onto short names such as `photo_100x100.jpg`.
    pub fn artifact_name(&self) -> String {
        let mut name = format!("{}_{}", self.display_name.stem(), self.size);
        if let Some(crop) = self.crop {
            name.push('_');
            name.push_str(crop.as_str());
        }
        if let Some(background) = self.background {
            name.push('_');
            name.push_str(&background.to_string());
        }
        if self.quality != self.default_quality {
            name.push('_');
            name.push_str(&self.quality.get().to_string());
        }
        name.push_str(self.display_name.extension());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(crop: Option<&str>, bg: Option<&str>, quality: Option<u16>) -> ThumbnailRequest {
        ThumbnailRequest::parse("ab12cd34ef", "photo.jpg", "100x100", crop, bg, quality)
            .expect("valid request")
    }

    #[test]
    fn plain_request_uses_size_only() {
        assert_eq!(request(None, None, None).artifact_name(), "photo_100x100.jpg");
    }

    #[test]
    fn crop_background_and_quality_extend_the_name() {
        assert_eq!(
            request(Some("fit"), None, None).artifact_name(),
            "photo_100x100_fit.jpg"
        );
        assert_eq!(
            request(Some("fit"), Some("#FFF"), Some(70)).artifact_name(),
            "photo_100x100_fit_ffffff_70.jpg"
        );
        assert_eq!(
            request(None, Some("255,255,255,0"), None).artifact_name(),
            "photo_100x100_ffffff00.jpg"
        );
    }

    #[test]
    fn explicit_default_quality_matches_omitted_quality() {
        assert_eq!(
            request(None, None, Some(85)).artifact_name(),
            request(None, None, None).artifact_name()
        );
    }

    #[test]
    fn configured_default_quality_drops_out_of_the_name() {
        let parse = |quality| {
            ThumbnailRequest::parse_with_default(
                "ab12cd34ef",
                "photo.jpg",
                "100x100",
                None,
                None,
                quality,
                Quality::new(90).expect("quality"),
            )
            .expect("valid request")
        };
        assert_eq!(parse(None).artifact_name(), "photo_100x100.jpg");
        assert_eq!(parse(None).quality.get(), 90);
        assert_eq!(parse(Some(90)).artifact_name(), "photo_100x100.jpg");
        assert_eq!(parse(Some(85)).artifact_name(), "photo_100x100_85.jpg");
    }

    #[test]
    fn every_parameter_changes_the_name() {
        let base = request(None, None, None).artifact_name();
        let variants = [
            request(Some("fit"), None, None).artifact_name(),
            request(None, Some("000"), None).artifact_name(),
            request(None, None, Some(60)).artifact_name(),
            ThumbnailRequest::parse("ab12cd34ef", "photo.jpg", "100x50", None, None, None)
                .expect("valid")
                .artifact_name(),
            ThumbnailRequest::parse("ab12cd34ef", "other.jpg", "100x100", None, None, None)
                .expect("valid")
                .artifact_name(),
        ];
        for variant in variants {
            assert_ne!(variant, base);
        }
    }

    #[test]
    fn store_path_uses_two_level_partition() {
        let source = SourceId::parse("ab12cd34ef").expect("valid id");
        assert_eq!(
            source.store_path(Path::new("/data/shop")),
            PathBuf::from("/data/shop/ab/12/ab12cd34ef")
        );
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        for raw in ["", "100", "100x", "x100", "0x100", "100x0", "axb", "100*100", "-1x5"] {
            assert!(
                matches!(raw.parse::<SizeSpec>(), Err(ThumbnailSpecError::MalformedSize(_))),
                "{raw} should be rejected"
            );
        }
        assert_eq!(
            " 640x480 ".parse::<SizeSpec>().expect("valid"),
            SizeSpec::new(640, 480).expect("non-zero")
        );
    }

    #[test]
    fn short_or_unsafe_source_ids_are_rejected() {
        assert!(SourceId::parse("abc").is_err());
        assert!(SourceId::parse("../etc/passwd").is_err());
        assert!(SourceId::parse("ab1/").is_err());
        assert!(SourceId::parse("ab12").is_ok());
    }

    #[test]
    fn display_name_splits_like_a_path() {
        let name = DisplayName::parse("archive.tar.gz").expect("valid");
        assert_eq!((name.stem(), name.extension()), ("archive.tar", ".gz"));

        let hidden = DisplayName::parse(".profile").expect("valid");
        assert_eq!((hidden.stem(), hidden.extension()), (".profile", ""));

        let bare = DisplayName::parse("README").expect("valid");
        assert_eq!((bare.stem(), bare.extension()), ("README", ""));

        assert!(DisplayName::parse("../photo.jpg").is_err());
        assert!(DisplayName::parse("").is_err());
    }

    #[test]
    fn background_accepts_common_notations() {
        let white = Background::rgb(255, 255, 255);
        for raw in ["#fff", "#FFFFFF", "ffffff", "255,255,255", "(255, 255, 255)", "255"] {
            assert_eq!(raw.parse::<Background>().expect(raw), white, "{raw}");
        }
        assert_eq!(
            "#11223344".parse::<Background>().expect("rgba").rgba,
            [0x11, 0x22, 0x33, 0x44]
        );
        assert!("#ff".parse::<Background>().is_err());
        assert!("red".parse::<Background>().is_err());
        assert!("1,2".parse::<Background>().is_err());
    }

    #[test]
    fn quality_must_be_within_bounds() {
        assert!(Quality::new(0).is_err());
        assert!(Quality::new(101).is_err());
        assert_eq!(Quality::new(100).expect("max").get(), 100);
        assert_eq!(Quality::default().get(), DEFAULT_QUALITY);
    }

    #[test]
    fn unknown_crop_is_a_caller_error() {
        let err = ThumbnailRequest::parse("ab12cd", "a.png", "10x10", Some("zoom"), None, None)
            .expect_err("unknown crop");
        assert_eq!(err, ThumbnailSpecError::UnknownCrop("zoom".to_string()));
    }

    #[test]
    fn blank_optional_arguments_count_as_absent() {
        let parsed = ThumbnailRequest::parse("ab12cd", "a.png", "10x10", Some(""), Some("  "), None)
            .expect("blank treated as absent");
        assert!(parsed.crop.is_none());
        assert!(parsed.background.is_none());
    }
}
