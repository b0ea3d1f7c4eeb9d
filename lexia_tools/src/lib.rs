#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

pub mod attachment;
mod generate_image;

use std::sync::Arc;

use lexia_core::ToolRegistry;

pub use attachment::{AttachmentLoader, PdfExtractor, PlainTextExtractor, TextExtractor};
pub use generate_image::{GENERATE_IMAGE, GenerateImageTool};

/// Registry with every built-in tool.
#[must_use]
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GenerateImageTool));
    registry
}
