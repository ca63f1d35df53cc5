use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::GenerationError;
use crate::schema::InputTypes;
use crate::tensor::ImageTensor;

pub type NodeInputs = Map<String, Value>;

pub const IMAGE_TYPE: &str = "IMAGE";

#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    Images(Vec<ImageTensor>),
}

pub trait NodeDefinition: Send + Sync {
    fn class_name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn category(&self) -> &str;
    fn function_name(&self) -> &str;
    fn input_types(&self) -> InputTypes;
    fn return_types(&self) -> &[&'static str];
    fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutput, GenerationError>;
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Box<dyn NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<N: NodeDefinition + 'static>(&mut self, node: N) {
        self.nodes
            .insert(node.class_name().to_string(), Box::new(node));
    }

    pub fn get(&self, class_name: &str) -> Option<&dyn NodeDefinition> {
        self.nodes.get(class_name).map(|node| node.as_ref())
    }

    pub fn class_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.display_name().to_string()))
            .collect()
    }

    pub fn execute(
        &self,
        class_name: &str,
        inputs: &NodeInputs,
    ) -> Result<NodeOutput, GenerationError> {
        let node = self.get(class_name).ok_or_else(|| {
            GenerationError::invalid_input("class_name", format!("unknown node '{class_name}'"))
        })?;
        node.execute(inputs)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
