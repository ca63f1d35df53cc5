use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::GenerationError;

#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    String {
        multiline: bool,
    },
    Int {
        default: u64,
        min: u64,
        max: u64,
    },
    Float {
        default: f64,
        min: f64,
        max: f64,
    },
    Choice {
        options: Vec<&'static str>,
    },
    Custom {
        type_name: &'static str,
    },
}

impl InputKind {
    fn describe(&self) -> Value {
        match self {
            InputKind::String { multiline } => json!(["STRING", { "multiline": multiline }]),
            InputKind::Int { default, min, max } => {
                json!(["INT", { "default": default, "min": min, "max": max }])
            }
            InputKind::Float { default, min, max } => {
                json!(["FLOAT", { "default": default, "min": min, "max": max }])
            }
            InputKind::Choice { options } => json!([options]),
            InputKind::Custom { type_name } => json!([type_name]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub name: &'static str,
    pub kind: InputKind,
}

impl InputSpec {
    pub fn new(name: &'static str, kind: InputKind) -> Self {
        Self { name, kind }
    }

    pub fn string(&self, value: &Value) -> Result<String, GenerationError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(format!("expected a string, got {value}")))
    }

    pub fn int(&self, value: &Value) -> Result<u64, GenerationError> {
        let InputKind::Int { min, max, .. } = self.kind else {
            return Err(self.invalid("not an integer input"));
        };
        let parsed = value
            .as_u64()
            .ok_or_else(|| self.invalid(format!("expected a non-negative integer, got {value}")))?;
        if parsed < min || parsed > max {
            return Err(self.invalid(format!("{parsed} is outside [{min}, {max}]")));
        }
        Ok(parsed)
    }

    pub fn float(&self, value: &Value) -> Result<f64, GenerationError> {
        let InputKind::Float { min, max, .. } = self.kind else {
            return Err(self.invalid("not a float input"));
        };
        let parsed = value
            .as_f64()
            .ok_or_else(|| self.invalid(format!("expected a number, got {value}")))?;
        if !(min..=max).contains(&parsed) {
            return Err(self.invalid(format!("{parsed} is outside [{min}, {max}]")));
        }
        Ok(parsed)
    }

    pub fn choice(&self, value: &Value) -> Result<&'static str, GenerationError> {
        let InputKind::Choice { options } = &self.kind else {
            return Err(self.invalid("not a choice input"));
        };
        let raw = value
            .as_str()
            .ok_or_else(|| self.invalid(format!("expected a string, got {value}")))?;
        options
            .iter()
            .find(|option| **option == raw)
            .copied()
            .ok_or_else(|| {
                self.invalid(format!(
                    "'{raw}' is not one of: {}",
                    options.join(", ")
                ))
            })
    }

    pub fn invalid(&self, reason: impl Into<String>) -> GenerationError {
        GenerationError::invalid_input(self.name, reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTypes {
    required: Vec<InputSpec>,
    optional: Vec<InputSpec>,
}

impl InputTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: InputKind) -> Self {
        self.required.push(InputSpec::new(name, kind));
        self
    }

    pub fn optional(mut self, name: &'static str, kind: InputKind) -> Self {
        self.optional.push(InputSpec::new(name, kind));
        self
    }

    pub fn required_inputs(&self) -> &[InputSpec] {
        self.required.as_slice()
    }

    pub fn optional_inputs(&self) -> &[InputSpec] {
        self.optional.as_slice()
    }

    pub fn get(&self, name: &str) -> Option<&InputSpec> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|spec| spec.name == name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|spec| spec.name == name)
    }

    // `null` counts as absent.
    pub fn lookup<'a>(
        &self,
        inputs: &'a Map<String, Value>,
        name: &str,
    ) -> Result<Option<&'a Value>, GenerationError> {
        let value = inputs.get(name).filter(|value| !value.is_null());
        if value.is_none() && self.is_required(name) {
            return Err(GenerationError::invalid_input(name, "required input is missing"));
        }
        Ok(value)
    }

    // {"required": {name: [TYPE, {options}]}, "optional": {...}}
    pub fn describe(&self) -> IndexMap<&'static str, IndexMap<&'static str, Value>> {
        let group = |specs: &[InputSpec]| {
            specs
                .iter()
                .map(|spec| (spec.name, spec.kind.describe()))
                .collect::<IndexMap<&'static str, Value>>()
        };
        let mut out = IndexMap::new();
        out.insert("required", group(&self.required));
        if !self.optional.is_empty() {
            out.insert("optional", group(&self.optional));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{InputKind, InputTypes};
    use crate::error::GenerationError;

    fn schema() -> InputTypes {
        InputTypes::new()
            .required("text", InputKind::String { multiline: true })
            .required(
                "steps",
                InputKind::Int {
                    default: 10,
                    min: 1,
                    max: 20,
                },
            )
            .optional(
                "scale",
                InputKind::Float {
                    default: 1.0,
                    min: 0.5,
                    max: 2.0,
                },
            )
            .optional(
                "mode",
                InputKind::Choice {
                    options: vec!["a", "b"],
                },
            )
    }

    #[test]
    fn describe_preserves_declaration_order() -> anyhow::Result<()> {
        let rendered = serde_json::to_string(&schema().describe())?;
        assert_eq!(
            rendered,
            r#"{"required":{"text":["STRING",{"multiline":true}],"steps":["INT",{"default":10,"max":20,"min":1}]},"optional":{"scale":["FLOAT",{"default":1.0,"max":2.0,"min":0.5}],"mode":[["a","b"]]}}"#
        );
        Ok(())
    }

    #[test]
    fn lookup_rejects_missing_required_and_null_optional_is_absent() {
        let schema = schema();
        let mut inputs = Map::new();
        inputs.insert("scale".to_string(), Value::Null);

        let err = schema.lookup(&inputs, "steps").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput { ref field, .. } if field == "steps"));
        assert!(schema.lookup(&inputs, "scale").unwrap().is_none());
    }

    #[test]
    fn int_enforces_bounds_and_integrality() {
        let schema = schema();
        let spec = schema.get("steps").unwrap();
        assert_eq!(spec.int(&json!(20)).unwrap(), 20);
        assert!(spec.int(&json!(21)).is_err());
        assert!(spec.int(&json!(0)).is_err());
        assert!(spec.int(&json!(2.5)).is_err());
        assert!(spec.int(&json!(-1)).is_err());
    }

    #[test]
    fn float_accepts_integer_json_numbers() {
        let schema = schema();
        let spec = schema.get("scale").unwrap();
        assert_eq!(spec.float(&json!(1)).unwrap(), 1.0);
        assert!(spec.float(&json!(2.01)).is_err());
        assert!(spec.float(&json!("1.0")).is_err());
    }

    #[test]
    fn choice_lists_options_on_mismatch() {
        let schema = schema();
        let spec = schema.get("mode").unwrap();
        assert_eq!(spec.choice(&json!("b")).unwrap(), "b");
        let err = spec.choice(&json!("c")).unwrap_err();
        assert_eq!(err.to_string(), "invalid input `mode`: 'c' is not one of: a, b");
    }
}
