//! # Image Processing Module
//!
//! Questo modulo contiene il motore di ricerca della qualità: dato il contenuto
//! di un'immagine sorgente e un budget in byte, sceglie in modo deterministico
//! la codifica WebP che rispetta meglio il budget.
//!
//! ## Pipeline di ricerca
//!
//! 1. **Decode**: i byte sorgente vengono decodificati con `image` (JPEG, PNG, WebP)
//!    e normalizzati a RGB8/RGBA8
//! 2. **Lossless**: se la codifica lossless sta nel budget vince sempre
//! 3. **Quality ladder**: 95, 90, ..., 30 (massimo 14 gradini); il primo
//!    gradino che sta nel budget viene accettato subito
//! 4. **Fallback**: nessun tentativo nel budget, si restituisce il tentativo
//!    più piccolo mai osservato come `Oversize`
//!
//! La dimensione non è garantita monotona rispetto alla qualità, quindi il
//! fallback è il minimo reale fra tutti i tentativi e non l'ultimo provato.
//!
//! ## Codec
//!
//! Il codec target sta dietro il trait [`TargetEncoder`]. L'implementazione di
//! produzione è [`WebpEncoder`] (libwebp via crate `webp`).
//!
//! ## Esempio:
//! ```rust,ignore
//! let engine = QualitySearch::new(WebpEncoder::default());
//! match engine.search(&bytes, 128_000) {
//!     TranscodeOutcome::Success(attempt) => println!("{}", attempt.mode),
//!     TranscodeOutcome::Oversize(attempt) => println!("best effort {}", attempt.size_bytes),
//!     TranscodeOutcome::Error { message } => eprintln!("{message}"),
//! }
//! ```

use crate::error::ConvertError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use tracing::debug;
use webp::{Encoder, WebPConfig};

/// Extension written for every converted file
pub const WEBP_EXTENSION: &str = "webp";

/// First quality tried on the ladder
pub const LADDER_START_QUALITY: i32 = 95;
/// Quality decrement between ladder steps
pub const LADDER_STEP: i32 = 5;
/// Maximum number of lossy attempts per image
pub const MAX_LADDER_STEPS: i32 = 14;

/// How a single attempt is encoded. Doubles as the outcome descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMode {
    Lossless,
    Lossy(u8),
}

impl fmt::Display for EncodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lossless => write!(f, "lossless"),
            Self::Lossy(quality) => write!(f, "quality={quality}"),
        }
    }
}

/// Descending lossy qualities: 95, 90, ... never reaching a non-positive value
pub fn quality_ladder() -> impl Iterator<Item = u8> {
    (0..MAX_LADDER_STEPS)
        .map(|i| LADDER_START_QUALITY - LADDER_STEP * i)
        .take_while(|quality| *quality > 0)
        .filter_map(|quality| u8::try_from(quality).ok())
}

/// One encode of the source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingAttempt {
    pub mode: EncodeMode,
    pub blob: Vec<u8>,
    pub size_bytes: u64,
}

impl EncodingAttempt {
    pub fn new(mode: EncodeMode, blob: Vec<u8>) -> Self {
        let size_bytes = blob.len() as u64;
        Self {
            mode,
            blob,
            size_bytes,
        }
    }

    pub fn quality(&self) -> Option<u8> {
        match self.mode {
            EncodeMode::Lossless => None,
            EncodeMode::Lossy(quality) => Some(quality),
        }
    }

    pub fn lossless(&self) -> bool {
        self.mode == EncodeMode::Lossless
    }

    pub fn fits(&self, budget_bytes: u64) -> bool {
        self.size_bytes <= budget_bytes
    }
}

/// Result of searching one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// Within budget
    Success(EncodingAttempt),
    /// Smallest attempt observed, still over budget
    Oversize(EncodingAttempt),
    Error { message: String },
}

/// Outcome tag without payload, used for counting and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Oversize,
    Error,
}

impl TranscodeOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Oversize(_) => OutcomeKind::Oversize,
            Self::Error { .. } => OutcomeKind::Error,
        }
    }

    /// The encoded blob to persist, if any
    pub fn attempt(&self) -> Option<&EncodingAttempt> {
        match self {
            Self::Success(attempt) | Self::Oversize(attempt) => Some(attempt),
            Self::Error { .. } => None,
        }
    }

    pub fn descriptor(&self) -> Option<String> {
        self.attempt().map(|attempt| attempt.mode.to_string())
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.attempt().map(|attempt| attempt.size_bytes)
    }
}

impl From<ConvertError> for TranscodeOutcome {
    fn from(err: ConvertError) -> Self {
        Self::error(err.to_string())
    }
}

/// Encoder for the run's single target codec
pub trait TargetEncoder: Send + Sync {
    /// File extension of the encoded output, without the dot
    fn extension(&self) -> &'static str;

    fn encode(&self, image: &DynamicImage, mode: EncodeMode) -> Result<Vec<u8>, ConvertError>;
}

/// WebP through libwebp
#[derive(Debug, Clone)]
pub struct WebpEncoder {
    /// libwebp effort, 0 (fast) to 6 (slow)
    method: i32,
}

impl Default for WebpEncoder {
    fn default() -> Self {
        Self { method: 4 }
    }
}

impl WebpEncoder {
    fn config_for(&self, mode: EncodeMode) -> Result<WebPConfig, ConvertError> {
        let mut config = WebPConfig::new()
            .map_err(|_| ConvertError::Encode("failed to instantiate webp config".to_string()))?;
        config.method = self.method;

        match mode {
            EncodeMode::Lossless => {
                config.lossless = 1;
                config.alpha_compression = 0;
                config.quality = 75.0;
            }
            EncodeMode::Lossy(quality) => {
                config.lossless = 0;
                config.alpha_compression = 1;
                config.quality = f32::from(quality);
            }
        }

        Ok(config)
    }
}

impl TargetEncoder for WebpEncoder {
    fn extension(&self) -> &'static str {
        WEBP_EXTENSION
    }

    fn encode(&self, image: &DynamicImage, mode: EncodeMode) -> Result<Vec<u8>, ConvertError> {
        let encoder = Encoder::from_image(image)
            .map_err(|reason| ConvertError::Encode(reason.to_string()))?;
        let config = self.config_for(mode)?;

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|reason| ConvertError::Encode(format!("{mode}: {reason:?}")))?;

        // `WebPMemory` is !Send, copy it out before it leaves this frame
        Ok(encoded.deref().to_owned())
    }
}

/// Decode source bytes into an 8-bit RGB or RGBA image
pub fn decode_source(source: &[u8]) -> Result<DynamicImage, ConvertError> {
    let image = image::load_from_memory(source)?;

    Ok(match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    })
}

/// Greedy quality-maximizing search under a byte budget
pub struct QualitySearch<E = WebpEncoder> {
    encoder: E,
}

impl<E: TargetEncoder> QualitySearch<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    pub fn extension(&self) -> &'static str {
        self.encoder.extension()
    }

    /// Pure function of `(source, budget_bytes)`; failures come back as `Error`
    pub fn search(&self, source: &[u8], budget_bytes: u64) -> TranscodeOutcome {
        self.try_search(source, budget_bytes)
            .unwrap_or_else(TranscodeOutcome::from)
    }

    fn try_search(&self, source: &[u8], budget_bytes: u64) -> Result<TranscodeOutcome, ConvertError> {
        if budget_bytes == 0 {
            return Err(ConvertError::Configuration(
                "Size budget must be greater than 0 bytes".to_string(),
            ));
        }

        let image = decode_source(source)?;

        let lossless = self.attempt(&image, EncodeMode::Lossless)?;
        if lossless.fits(budget_bytes) {
            return Ok(TranscodeOutcome::Success(lossless));
        }

        let mut best = lossless;
        for quality in quality_ladder() {
            let attempt = self.attempt(&image, EncodeMode::Lossy(quality))?;
            if attempt.fits(budget_bytes) {
                return Ok(TranscodeOutcome::Success(attempt));
            }
            best = smaller_of(best, attempt);
        }

        debug!(
            descriptor = %best.mode,
            size_bytes = best.size_bytes,
            budget_bytes,
            "no attempt fits the budget"
        );
        Ok(TranscodeOutcome::Oversize(best))
    }

    fn attempt(&self, image: &DynamicImage, mode: EncodeMode) -> Result<EncodingAttempt, ConvertError> {
        let blob = self.encoder.encode(image, mode)?;
        let attempt = EncodingAttempt::new(mode, blob);
        debug!(descriptor = %mode, size_bytes = attempt.size_bytes, "encoded attempt");
        Ok(attempt)
    }
}

/// Keeps the incumbent on ties, so earlier (higher quality) attempts win
fn smaller_of(best: EncodingAttempt, candidate: EncodingAttempt) -> EncodingAttempt {
    if candidate.size_bytes < best.size_bytes {
        candidate
    } else {
        best
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{DynamicImage, ImageOutputFormat, RgbImage, RgbaImage};
    use std::io::Cursor;

    /// Deterministic noise PNG, close to incompressible
    pub fn noise_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        let image = RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            };
            image::Rgb([next(), next(), next()])
        });
        encode_png(DynamicImage::ImageRgb8(image))
    }

    /// Single-colour PNG, tiny in any codec
    pub fn flat_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        encode_png(DynamicImage::ImageRgb8(image))
    }

    pub fn gradient_rgba_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
        });
        encode_png(DynamicImage::ImageRgba8(image))
    }

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }
}
