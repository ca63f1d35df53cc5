use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GenerationError;
use crate::schema::{InputKind, InputSpec, InputTypes};

pub const DEFAULT_INFERENCE_STEPS: u32 = 28;
pub const MIN_INFERENCE_STEPS: u32 = 1;
pub const MAX_INFERENCE_STEPS: u32 = 100;

pub const DEFAULT_GUIDANCE_SCALE: f64 = 3.5;
pub const MIN_GUIDANCE_SCALE: f64 = 0.1;
pub const MAX_GUIDANCE_SCALE: f64 = 20.0;

pub const DEFAULT_NUM_IMAGES: u32 = 1;
pub const MIN_NUM_IMAGES: u32 = 1;
pub const MAX_NUM_IMAGES: u32 = 4;

pub const MAX_LORAS: usize = 5;
pub const LORA_CONFIG_TYPE: &str = "LORA_CONFIG";
const LORA_SLOT_NAMES: [&str; MAX_LORAS] = ["lora_1", "lora_2", "lora_3", "lora_4", "lora_5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "square_hd")]
    SquareHd,
    #[serde(rename = "square")]
    Square,
    #[serde(rename = "portrait_4_3")]
    Portrait4x3,
    #[serde(rename = "portrait_16_9")]
    Portrait16x9,
    #[serde(rename = "landscape_4_3")]
    Landscape4x3,
    #[serde(rename = "landscape_16_9")]
    Landscape16x9,
}

impl ImageSize {
    pub const ALL: [ImageSize; 6] = [
        ImageSize::SquareHd,
        ImageSize::Square,
        ImageSize::Portrait4x3,
        ImageSize::Portrait16x9,
        ImageSize::Landscape4x3,
        ImageSize::Landscape16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::SquareHd => "square_hd",
            ImageSize::Square => "square",
            ImageSize::Portrait4x3 => "portrait_4_3",
            ImageSize::Portrait16x9 => "portrait_16_9",
            ImageSize::Landscape4x3 => "landscape_4_3",
            ImageSize::Landscape16x9 => "landscape_16_9",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|size| size.as_str()).collect()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == raw.trim())
            .ok_or_else(|| {
                format!(
                    "'{}' is not one of: {}",
                    raw.trim(),
                    Self::names().join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoraSlots {
    slots: [Option<Value>; MAX_LORAS],
}

impl LoraSlots {
    pub fn new() -> Self {
        Self::default()
    }

    // 1-based; an empty config clears the slot.
    pub fn set(&mut self, index: usize, config: Value) -> Result<(), GenerationError> {
        let slot = index
            .checked_sub(1)
            .and_then(|idx| self.slots.get_mut(idx))
            .ok_or_else(|| {
                GenerationError::invalid_input(
                    "loras",
                    format!("slot {index} is outside 1..={MAX_LORAS}"),
                )
            })?;
        *slot = Some(config).filter(is_present);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        index
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx))
            .and_then(Option::as_ref)
    }

    pub fn active(&self) -> Vec<Value> {
        self.slots.iter().flatten().cloned().collect()
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(rows) => !rows.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPayload {
    pub prompt: String,
    pub image_size: ImageSize,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_images: u32,
    pub enable_safety_checker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loras: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_size: ImageSize,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_images: u32,
    /// `0` leaves the seed to the service.
    pub seed: u64,
    pub loras: LoraSlots,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_size: ImageSize::default(),
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            num_images: DEFAULT_NUM_IMAGES,
            seed: 0,
            loras: LoraSlots::new(),
        }
    }

    pub fn with_image_size(mut self, image_size: ImageSize) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn with_inference_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    pub fn with_guidance_scale(mut self, guidance_scale: f64) -> Self {
        self.guidance_scale = guidance_scale;
        self
    }

    pub fn with_num_images(mut self, num_images: u32) -> Self {
        self.num_images = num_images;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_lora(mut self, index: usize, config: Value) -> Result<Self, GenerationError> {
        self.loras.set(index, config)?;
        Ok(self)
    }

    pub fn input_types() -> InputTypes {
        let mut types = InputTypes::new()
            .required("prompt", InputKind::String { multiline: true })
            .required(
                "image_size",
                InputKind::Choice {
                    options: ImageSize::names(),
                },
            )
            .required(
                "num_inference_steps",
                InputKind::Int {
                    default: u64::from(DEFAULT_INFERENCE_STEPS),
                    min: u64::from(MIN_INFERENCE_STEPS),
                    max: u64::from(MAX_INFERENCE_STEPS),
                },
            )
            .required(
                "guidance_scale",
                InputKind::Float {
                    default: DEFAULT_GUIDANCE_SCALE,
                    min: MIN_GUIDANCE_SCALE,
                    max: MAX_GUIDANCE_SCALE,
                },
            )
            .required(
                "num_images",
                InputKind::Int {
                    default: u64::from(DEFAULT_NUM_IMAGES),
                    min: u64::from(MIN_NUM_IMAGES),
                    max: u64::from(MAX_NUM_IMAGES),
                },
            )
            .optional(
                "seed",
                InputKind::Int {
                    default: 0,
                    min: 0,
                    max: u64::MAX,
                },
            );
        for name in LORA_SLOT_NAMES {
            types = types.optional(
                name,
                InputKind::Custom {
                    type_name: LORA_CONFIG_TYPE,
                },
            );
        }
        types
    }

    pub fn from_inputs(inputs: &Map<String, Value>) -> Result<Self, GenerationError> {
        let types = Self::input_types();
        let field = |name: &'static str| declared(&types, name);

        let prompt_spec = field("prompt")?;
        let prompt = match types.lookup(inputs, prompt_spec.name)? {
            Some(value) => prompt_spec.string(value)?,
            None => String::new(),
        };

        let size_spec = field("image_size")?;
        let image_size = match types.lookup(inputs, size_spec.name)? {
            Some(value) => size_spec
                .choice(value)?
                .parse::<ImageSize>()
                .map_err(|reason| size_spec.invalid(reason))?,
            None => ImageSize::default(),
        };

        let steps_spec = field("num_inference_steps")?;
        let num_inference_steps = match types.lookup(inputs, steps_spec.name)? {
            Some(value) => narrow(steps_spec.int(value)?, steps_spec.name)?,
            None => DEFAULT_INFERENCE_STEPS,
        };

        let guidance_spec = field("guidance_scale")?;
        let guidance_scale = match types.lookup(inputs, guidance_spec.name)? {
            Some(value) => guidance_spec.float(value)?,
            None => DEFAULT_GUIDANCE_SCALE,
        };

        let count_spec = field("num_images")?;
        let num_images = match types.lookup(inputs, count_spec.name)? {
            Some(value) => narrow(count_spec.int(value)?, count_spec.name)?,
            None => DEFAULT_NUM_IMAGES,
        };

        let seed_spec = field("seed")?;
        let seed = match types.lookup(inputs, seed_spec.name)? {
            Some(value) => seed_spec.int(value)?,
            None => 0,
        };

        let mut loras = LoraSlots::new();
        for (idx, name) in LORA_SLOT_NAMES.iter().enumerate() {
            if let Some(config) = types.lookup(inputs, name)? {
                loras.set(idx + 1, config.clone())?;
            }
        }

        let request = Self {
            prompt,
            image_size,
            num_inference_steps,
            guidance_scale,
            num_images,
            seed,
            loras,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if !(MIN_INFERENCE_STEPS..=MAX_INFERENCE_STEPS).contains(&self.num_inference_steps) {
            return Err(GenerationError::invalid_input(
                "num_inference_steps",
                format!(
                    "{} is outside [{MIN_INFERENCE_STEPS}, {MAX_INFERENCE_STEPS}]",
                    self.num_inference_steps
                ),
            ));
        }
        if !(MIN_GUIDANCE_SCALE..=MAX_GUIDANCE_SCALE).contains(&self.guidance_scale) {
            return Err(GenerationError::invalid_input(
                "guidance_scale",
                format!(
                    "{} is outside [{MIN_GUIDANCE_SCALE}, {MAX_GUIDANCE_SCALE}]",
                    self.guidance_scale
                ),
            ));
        }
        if !(MIN_NUM_IMAGES..=MAX_NUM_IMAGES).contains(&self.num_images) {
            return Err(GenerationError::invalid_input(
                "num_images",
                format!(
                    "{} is outside [{MIN_NUM_IMAGES}, {MAX_NUM_IMAGES}]",
                    self.num_images
                ),
            ));
        }
        Ok(())
    }

    pub fn payload(&self) -> GenerationPayload {
        GenerationPayload {
            prompt: self.prompt.clone(),
            image_size: self.image_size,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            num_images: self.num_images,
            enable_safety_checker: true,
            seed: (self.seed != 0).then_some(self.seed),
            loras: self.loras.active(),
        }
    }
}

fn declared<'a>(types: &'a InputTypes, name: &str) -> Result<&'a InputSpec, GenerationError> {
    types
        .get(name)
        .ok_or_else(|| GenerationError::invalid_input(name, "unknown input"))
}

fn narrow(value: u64, field: &str) -> Result<u32, GenerationError> {
    u32::try_from(value).map_err(|_| GenerationError::invalid_input(field, "value too large"))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{GenerationRequest, ImageSize, LoraSlots};
    use crate::error::GenerationError;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn base_inputs() -> Map<String, Value> {
        inputs(json!({
            "prompt": "a lighthouse at dusk",
            "image_size": "landscape_16_9",
            "num_inference_steps": 28,
            "guidance_scale": 3.5,
            "num_images": 2,
        }))
    }

    #[test]
    fn zero_seed_is_omitted_from_payload() -> anyhow::Result<()> {
        let payload = serde_json::to_value(GenerationRequest::new("boat").with_seed(0).payload())?;
        assert!(payload.get("seed").is_none());
        assert_eq!(payload["enable_safety_checker"], json!(true));
        Ok(())
    }

    #[test]
    fn non_zero_seed_is_forwarded() -> anyhow::Result<()> {
        let payload = serde_json::to_value(GenerationRequest::new("boat").with_seed(42).payload())?;
        assert_eq!(payload["seed"], json!(42));
        Ok(())
    }

    #[test]
    fn lora_slots_keep_order_and_skip_gaps() -> anyhow::Result<()> {
        let first = json!({"path": "https://example.com/one.safetensors", "scale": 1.0});
        let third = json!({"path": "https://example.com/three.safetensors", "scale": 0.6});
        let request = GenerationRequest::new("boat")
            .with_lora(1, first.clone())?
            .with_lora(3, third.clone())?;
        let payload = serde_json::to_value(request.payload())?;
        assert_eq!(payload["loras"], json!([first, third]));
        Ok(())
    }

    #[test]
    fn payload_omits_loras_when_no_slot_is_set() -> anyhow::Result<()> {
        let request = GenerationRequest::new("boat").with_lora(2, json!({}))?;
        let payload = serde_json::to_value(request.payload())?;
        assert!(payload.get("loras").is_none());
        Ok(())
    }

    #[test]
    fn payload_carries_core_parameters() -> anyhow::Result<()> {
        let request = GenerationRequest::from_inputs(&base_inputs())?;
        let payload = serde_json::to_value(request.payload())?;
        assert_eq!(
            payload,
            json!({
                "prompt": "a lighthouse at dusk",
                "image_size": "landscape_16_9",
                "num_inference_steps": 28,
                "guidance_scale": 3.5,
                "num_images": 2,
                "enable_safety_checker": true,
            })
        );
        Ok(())
    }

    #[test]
    fn from_inputs_reads_optional_seed_and_loras() -> anyhow::Result<()> {
        let mut raw = base_inputs();
        raw.insert("seed".to_string(), json!(7));
        raw.insert("lora_2".to_string(), json!({"path": "b"}));
        raw.insert("lora_4".to_string(), Value::Null);
        raw.insert("lora_5".to_string(), json!({"path": "e"}));
        let request = GenerationRequest::from_inputs(&raw)?;
        assert_eq!(request.seed, 7);
        assert_eq!(request.image_size, ImageSize::Landscape16x9);
        assert_eq!(
            request.loras.active(),
            vec![json!({"path": "b"}), json!({"path": "e"})]
        );
        Ok(())
    }

    #[test]
    fn from_inputs_rejects_out_of_range_values() {
        for (field, value) in [
            ("num_inference_steps", json!(0)),
            ("num_inference_steps", json!(101)),
            ("guidance_scale", json!(0.05)),
            ("guidance_scale", json!(20.5)),
            ("num_images", json!(5)),
        ] {
            let mut raw = base_inputs();
            raw.insert(field.to_string(), value);
            let err = GenerationRequest::from_inputs(&raw).unwrap_err();
            assert!(
                matches!(err, GenerationError::InvalidInput { field: ref got, .. } if got == field),
                "unexpected error for {field}: {err}"
            );
        }
    }

    #[test]
    fn from_inputs_rejects_unknown_image_size() {
        let mut raw = base_inputs();
        raw.insert("image_size".to_string(), json!("panorama"));
        let err = GenerationRequest::from_inputs(&raw).unwrap_err();
        assert!(err.to_string().contains("square_hd"));
    }

    #[test]
    fn from_inputs_requires_prompt() {
        let mut raw = base_inputs();
        raw.remove("prompt");
        let err = GenerationRequest::from_inputs(&raw).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input `prompt`: required input is missing"
        );
    }

    #[test]
    fn lora_slot_index_is_bounded() {
        let mut slots = LoraSlots::new();
        assert!(slots.set(0, json!({"path": "a"})).is_err());
        assert!(slots.set(6, json!({"path": "a"})).is_err());
        assert!(slots.set(5, json!({"path": "a"})).is_ok());
        assert_eq!(slots.get(5), Some(&json!({"path": "a"})));
    }

    #[test]
    fn image_size_round_trips_through_names() {
        for size in ImageSize::ALL {
            assert_eq!(size.as_str().parse::<ImageSize>(), Ok(size));
        }
        assert!("huge".parse::<ImageSize>().is_err());
    }

    #[test]
    fn input_types_list_every_field_in_order() {
        let types = GenerationRequest::input_types();
        let required: Vec<&str> = types.required_inputs().iter().map(|spec| spec.name).collect();
        let optional: Vec<&str> = types.optional_inputs().iter().map(|spec| spec.name).collect();
        assert_eq!(
            required,
            vec![
                "prompt",
                "image_size",
                "num_inference_steps",
                "guidance_scale",
                "num_images"
            ]
        );
        assert_eq!(
            optional,
            vec!["seed", "lora_1", "lora_2", "lora_3", "lora_4", "lora_5"]
        );
    }
}
