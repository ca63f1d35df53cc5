use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, RgbImage};
use serde_json::Value;
use thiserror::Error;

use falflux_contracts::ImageTensor;

use crate::transport::TransportError;

pub const RAW_FALLBACK_LEN: usize = 1024;
pub const RAW_FALLBACK_SIDE: u32 = 32;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image descriptor is not an object")]
    InvalidDescriptor,
    #[error("image descriptor has no url")]
    MissingUrl,
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("failed to download image: {0}")]
    Fetch(#[from] TransportError),
    #[error("failed to decode image data: {0}")]
    Decode(String),
}

pub fn descriptor_url(descriptor: &Value) -> Result<&str, ImageError> {
    let object = descriptor.as_object().ok_or(ImageError::InvalidDescriptor)?;
    object
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(ImageError::MissingUrl)
}

pub fn is_data_uri(url: &str) -> bool {
    url.starts_with("data:image")
}

pub fn decode_data_uri(url: &str) -> Result<Vec<u8>, ImageError> {
    let (_, payload) = url
        .split_once(',')
        .ok_or_else(|| ImageError::InvalidDataUri("missing ',' separator".to_string()))?;
    BASE64
        .decode(payload.trim().as_bytes())
        .map_err(|err| ImageError::InvalidDataUri(err.to_string()))
}

pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => {
            tracing::debug!(
                "opened image {}x{} ({:?})",
                image.width(),
                image.height(),
                image.color()
            );
            image
        }
        Err(err) => {
            tracing::error!("failed to open image data: {err}");
            DynamicImage::ImageLuma8(raw_samples_to_gray(bytes)?)
        }
    };
    Ok(match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    })
}

// A constant buffer maps to black.
pub fn raw_samples_to_gray(bytes: &[u8]) -> Result<GrayImage, ImageError> {
    if bytes.len() != RAW_FALLBACK_LEN {
        return Err(ImageError::Decode(format!(
            "raw buffer of {} bytes does not match the {RAW_FALLBACK_LEN}-byte fallback shape",
            bytes.len()
        )));
    }
    tracing::debug!("interpreting {} bytes as raw 32x32 samples", bytes.len());
    let min = bytes.iter().copied().min().unwrap_or(0);
    let max = bytes.iter().copied().max().unwrap_or(0);
    let span = f32::from(max - min);
    let samples = bytes
        .iter()
        .map(|sample| {
            if span == 0.0 {
                return 0;
            }
            (f32::from(sample - min) / span * 255.0) as u8
        })
        .collect::<Vec<u8>>();
    GrayImage::from_raw(RAW_FALLBACK_SIDE, RAW_FALLBACK_SIDE, samples)
        .ok_or_else(|| ImageError::Decode("raw buffer reshape failed".to_string()))
}

pub fn to_tensor(image: &RgbImage) -> Result<ImageTensor, ImageError> {
    ImageTensor::from_rgb8(image.width(), image.height(), image.as_raw()).ok_or_else(|| {
        ImageError::Decode(format!(
            "pixel buffer does not match {}x{} RGB",
            image.width(),
            image.height()
        ))
    })
}
