use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Configuration(String),
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("An error occurred when calling the fal.ai API: {}", transport_detail(.message, .body.as_deref()))]
    Transport {
        message: String,
        body: Option<String>,
    },
    #[error("{0}")]
    EmptyResult(String),
}

impl GenerationError {
    pub fn missing_api_key() -> Self {
        Self::Configuration("API key is not set. Please check your config.ini file.".to_string())
    }

    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn no_images_generated() -> Self {
        Self::EmptyResult("No images were generated by the API.".to_string())
    }

    pub fn no_images_decoded() -> Self {
        Self::EmptyResult("Failed to process any of the generated images.".to_string())
    }
}

fn transport_detail(message: &str, body: Option<&str>) -> String {
    match body.map(str::trim).filter(|body| !body.is_empty()) {
        Some(body) => format!("{message} (response: {body})"),
        None => message.to_string(),
    }
}
