pub mod config;
pub mod dispatch;
pub mod error;
pub mod layers;
pub mod pipeline;

#[cfg(test)]
mod test_utils;

pub use config::GateConfig;
pub use dispatch::{DispatchTable, Route};
pub use error::{AdapterError, ValidationErrors};
pub use pipeline::Pipeline;
