pub mod config;
pub mod error;
pub mod node;
pub mod request;
pub mod schema;
pub mod tensor;

pub use config::FalConfig;
pub use error::GenerationError;
pub use node::{NodeDefinition, NodeInputs, NodeOutput, NodeRegistry, IMAGE_TYPE};
pub use request::{GenerationPayload, GenerationRequest, ImageSize, LoraSlots};
pub use schema::{InputKind, InputSpec, InputTypes};
pub use tensor::ImageTensor;
