//! Face embedding extraction via ONNX Runtime.
//!
//! Maps a padded face crop to a 512-dimensional unit-normalized vector
//! through a fixed preprocessing pipeline and a pretrained network. The
//! model is opaque: pre-exported weights, never trained here.

use crate::types::Embedding;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (versioned preprocessing contract) ---
const EMBED_INPUT_SIZE: usize = 256;
const EMBED_MEAN: f32 = 0.0;
const EMBED_STD: f32 = 255.0; // plain [0, 1] scaling, matching the exported graph
const EMBED_DIM: usize = 512;
const EMBED_MODEL_VERSION: &str = "resnet50-emb512-fp32";

/// Crops smaller than this on either side carry too little signal to embed.
pub const MIN_CROP_SIZE: u32 = 16;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("crop too small: {width}x{height}, minimum {MIN_CROP_SIZE} per side")]
    CropTooSmall { width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("embedding contains non-finite values")]
    NonFiniteOutput,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pretrained embedding extractor.
///
/// Pure function of (weights, crop): no state across calls. `&mut` is
/// required only by the `ort` session; the engine thread owns it exclusively.
pub struct EmbeddingExtractor {
    session: Session,
}

impl EmbeddingExtractor {
    /// Load the embedding ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ExtractionError> {
        if !Path::new(model_path).exists() {
            return Err(ExtractionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session })
    }

    /// Extract a unit-normalized embedding from a padded face crop.
    pub fn embed(&mut self, crop: &RgbImage) -> Result<Embedding, ExtractionError> {
        let (width, height) = crop.dimensions();
        if width < MIN_CROP_SIZE || height < MIN_CROP_SIZE {
            return Err(ExtractionError::CropTooSmall { width, height });
        }

        let input = preprocess(crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractionError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBED_DIM {
            return Err(ExtractionError::InferenceFailed(format!(
                "expected {EMBED_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(ExtractionError::NonFiniteOutput);
        }

        Ok(Embedding::from_raw(raw, Some(EMBED_MODEL_VERSION.to_string())))
    }
}

/// Resize a crop to the model resolution and build a NCHW float tensor
/// with fixed per-channel normalization.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = EMBED_INPUT_SIZE;
    let resized = image::imageops::resize(crop, size as u32, size as u32, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 - EMBED_MEAN) / EMBED_STD;
            }
        }
    }

    tensor
}
