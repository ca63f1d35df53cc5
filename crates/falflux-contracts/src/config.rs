use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

pub const CONFIG_SECTION: &str = "falai";
pub const DEFAULT_API_BASE: &str = "https://fal.run";
pub const DEFAULT_ENDPOINT: &str = "fal-ai/flux-lora";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FalConfig {
    api_key: Option<String>,
    api_base: String,
    endpoint: String,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl FalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the `[falai]` section of an INI file. A missing or unreadable
    /// file leaves every field at its default.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_ini_str(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("no config file at {}", path.display());
                Self::default()
            }
            Err(err) => {
                tracing::warn!("failed reading config file {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn from_ini_str(raw: &str) -> Self {
        let section = parse_ini_section(raw, CONFIG_SECTION);
        let mut config = Self::default();
        config.api_key = section.get("api_key").cloned();
        if let Some(api_base) = section.get("api_base") {
            config = config.with_api_base(api_base);
        }
        if let Some(endpoint) = section.get("endpoint") {
            config = config.with_endpoint(endpoint);
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = non_empty(api_key.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        if let Some(api_base) = non_empty(api_base.into()) {
            self.api_base = api_base.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        if let Some(endpoint) = non_empty(endpoint.into()) {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            return self.endpoint.clone();
        }
        format!("{}/{}", self.api_base, self.endpoint.trim_start_matches('/'))
    }
}

// Later duplicates win; blank values drop the key.
fn parse_ini_section(raw: &str, wanted: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut in_section = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            in_section = name.trim() == wanted;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some(split_at) = trimmed.find(['=', ':']) else {
            continue;
        };
        let (key, value) = trimmed.split_at(split_at);
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        match non_empty(value[1..].to_string()) {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                values.remove(&key);
            }
        }
    }
    values
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
