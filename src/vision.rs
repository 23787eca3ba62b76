//! Image classification with a pretrained ResNet.
//!
//! Photos are decoded, resized so the short side is 256 px, center-cropped to
//! 224x224 and normalized with the ImageNet channel statistics before a single
//! forward pass. The reply is the label with the highest logit.

use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use image::imageops::{self, FilterType};
use tracing::{debug, info};

use crate::config::{Architecture, ClassifierConfig};

const RESIZE_SHORT_SIDE: u32 = 256;
const CROP_SIZE: u32 = 224;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maps raw image bytes to one label.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<String>;
}

/// A loaded model plus the label set it was trained on. Immutable after load.
pub struct ResnetClassifier {
    model: Func<'static>,
    labels: Vec<String>,
    device: Device,
}

impl ResnetClassifier {
    /// Load labels and safetensors weights as described by `config`.
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        let labels = load_labels(&config.labels)?;
        let device = Device::Cpu;

        let weights = std::fs::read(&config.weights).with_context(|| {
            format!("Failed to read model weights: {}", config.weights.display())
        })?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)
            .context("Failed to parse model weights")?;

        let model = match config.architecture {
            Architecture::Resnet18 => resnet::resnet18(labels.len(), vb),
            Architecture::Resnet34 => resnet::resnet34(labels.len(), vb),
            Architecture::Resnet50 => resnet::resnet50(labels.len(), vb),
            Architecture::Resnet101 => resnet::resnet101(labels.len(), vb),
            Architecture::Resnet152 => resnet::resnet152(labels.len(), vb),
        }
        .with_context(|| format!("Failed to build {} from weights", config.architecture))?;

        let classifier = Self::from_parts(model, labels, device);
        info!(
            "Loaded {} classifier with {} labels",
            config.architecture,
            classifier.labels().len()
        );
        Ok(classifier)
    }

    pub fn from_parts(model: Func<'static>, labels: Vec<String>, device: Device) -> Self {
        Self {
            model,
            labels,
            device,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl ImageClassifier for ResnetClassifier {
    fn classify(&self, image: &[u8]) -> Result<String> {
        let input = preprocess(image, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input)?.squeeze(0)?;
        let index = logits.argmax(D::Minus1)?.to_scalar::<u32>()? as usize;

        let label = self
            .labels
            .get(index)
            .with_context(|| format!("Model predicted class {} outside the label set", index))?;
        debug!("Classified image as class {} ({})", index, label);
        Ok(label.clone())
    }
}

/// Read a label file, one class name per line. Blank lines are skipped.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read label file: {}", path.display()))?;
    let labels = parse_labels(&content);
    if labels.is_empty() {
        bail!("Label file {} contains no labels", path.display());
    }
    Ok(labels)
}

fn parse_labels(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode, resize, crop and normalize into a `(3, 224, 224)` f32 tensor.
pub fn preprocess(bytes: &[u8], device: &Device) -> Result<Tensor> {
    let img = image::load_from_memory(bytes)
        .context("Failed to decode image")?
        .to_rgb8();

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        bail!("Image has zero size ({}x{})", width, height);
    }

    let short = width.min(height) as f32;
    let scale = RESIZE_SHORT_SIDE as f32 / short;
    let new_width = ((width as f32 * scale).round() as u32).max(RESIZE_SHORT_SIDE);
    let new_height = ((height as f32 * scale).round() as u32).max(RESIZE_SHORT_SIDE);
    let resized = imageops::resize(&img, new_width, new_height, FilterType::Triangle);

    let left = (new_width - CROP_SIZE) / 2;
    let top = (new_height - CROP_SIZE) / 2;
    let cropped = imageops::crop_imm(&resized, left, top, CROP_SIZE, CROP_SIZE).to_image();

    let side = CROP_SIZE as usize;
    let data = Tensor::from_vec(cropped.into_raw(), (side, side, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;

    let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, device)?.reshape((3, 1, 1))?;
    let normalized = (data / 255.)?.broadcast_sub(&mean)?.broadcast_div(&std)?;
    Ok(normalized)
}
