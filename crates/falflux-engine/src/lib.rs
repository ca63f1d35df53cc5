pub mod decode;
pub mod transport;

use std::path::Path;

use serde_json::Value;

use falflux_contracts::{
    FalConfig, GenerationError, GenerationRequest, ImageTensor, InputTypes, NodeDefinition,
    NodeInputs, NodeOutput, NodeRegistry, IMAGE_TYPE,
};

pub use decode::ImageError;
pub use transport::{HttpTransport, InferenceTransport, TransportError};

use transport::truncate_text;

pub const NODE_CLASS_NAME: &str = "FalAPIFluxNode";
pub const NODE_DISPLAY_NAME: &str = "Fal API Flux";
pub const NODE_CATEGORY: &str = "image generation";
pub const NODE_FUNCTION: &str = "generate";
const RETURN_TYPES: [&str; 1] = [IMAGE_TYPE];

const LOG_URL_CHARS: usize = 100;
const LOG_RESPONSE_CHARS: usize = 2048;

pub struct ImageGenerationAdapter<T: InferenceTransport = HttpTransport> {
    config: FalConfig,
    transport: T,
}

impl ImageGenerationAdapter<HttpTransport> {
    pub fn new(config: FalConfig) -> Self {
        Self::with_transport(config, HttpTransport::new())
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Self {
        Self::new(FalConfig::load(path))
    }
}

impl<T: InferenceTransport> ImageGenerationAdapter<T> {
    pub fn with_transport(config: FalConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &FalConfig {
        &self.config
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageTensor>, GenerationError> {
        let Some(api_key) = self.config.api_key() else {
            return Err(GenerationError::missing_api_key());
        };
        request.validate()?;

        let payload = serde_json::to_value(request.payload()).map_err(|err| {
            GenerationError::invalid_input("payload", format!("failed to serialize: {err}"))
        })?;
        tracing::debug!(
            "full API request payload: {}",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        );

        let endpoint = self.config.endpoint_url();
        let response = self
            .transport
            .submit(&endpoint, api_key, &payload)
            .map_err(|err| {
                tracing::error!("API error details: {}", err.message);
                if let Some(body) = err.body.as_deref() {
                    tracing::error!("API error response: {body}");
                }
                GenerationError::from(err)
            })?;
        tracing::debug!(
            "API response: {}",
            truncate_text(&response.to_string(), LOG_RESPONSE_CHARS)
        );
        log_response_metadata(&response);

        let descriptors = response
            .get("images")
            .and_then(Value::as_array)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| {
                tracing::error!("No images were generated by the API.");
                GenerationError::no_images_generated()
            })?;

        let outcomes = descriptors
            .iter()
            .map(|descriptor| self.process_descriptor(descriptor))
            .collect::<Vec<Result<ImageTensor, ImageError>>>();
        let images = outcomes
            .into_iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                Ok(tensor) => Some(tensor),
                Err(err) => {
                    tracing::error!("Failed to process image {index}: {err}");
                    None
                }
            })
            .collect::<Vec<ImageTensor>>();

        let Some(first) = images.first() else {
            tracing::error!("Failed to process any of the generated images.");
            return Err(GenerationError::no_images_decoded());
        };
        tracing::debug!(
            "Returning {} images with shape: {:?}",
            images.len(),
            first.shape()
        );
        Ok(images)
    }

    fn process_descriptor(&self, descriptor: &Value) -> Result<ImageTensor, ImageError> {
        let url = decode::descriptor_url(descriptor)?;
        tracing::debug!("Image URL: {}...", truncate_text(url, LOG_URL_CHARS));

        let bytes = if decode::is_data_uri(url) {
            decode::decode_data_uri(url)?
        } else {
            self.transport.fetch(url)?
        };
        tracing::debug!(
            "Image data: {} bytes, leading {:?}",
            bytes.len(),
            &bytes[..bytes.len().min(20)]
        );

        let image = decode::decode_image(&bytes)?;
        decode::to_tensor(&image)
    }
}

fn log_response_metadata(response: &Value) {
    if let Some(seed) = response.get("seed").and_then(Value::as_u64) {
        tracing::debug!("service seed: {seed}");
    }
    let flagged = response
        .get("has_nsfw_concepts")
        .and_then(Value::as_array)
        .map(|flags| flags.iter().filter(|flag| flag.as_bool() == Some(true)).count())
        .unwrap_or(0);
    if flagged > 0 {
        tracing::warn!("safety checker flagged {flagged} image(s)");
    }
}

impl<T: InferenceTransport> NodeDefinition for ImageGenerationAdapter<T> {
    fn class_name(&self) -> &str {
        NODE_CLASS_NAME
    }

    fn display_name(&self) -> &str {
        NODE_DISPLAY_NAME
    }

    fn category(&self) -> &str {
        NODE_CATEGORY
    }

    fn function_name(&self) -> &str {
        NODE_FUNCTION
    }

    fn input_types(&self) -> InputTypes {
        GenerationRequest::input_types()
    }

    fn return_types(&self) -> &[&'static str] {
        &RETURN_TYPES
    }

    fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutput, GenerationError> {
        let request = GenerationRequest::from_inputs(inputs)?;
        self.generate(&request).map(NodeOutput::Images)
    }
}

pub fn default_node_registry(config: FalConfig) -> NodeRegistry {
    let mut nodes = NodeRegistry::new();
    nodes.register(ImageGenerationAdapter::new(config));
    nodes
}
