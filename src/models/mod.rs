//! Model catalog entities
//!
//! Provides:
//! - `ModelRecord` and its source / family / format classifications
//! - Name-based heuristics for quantization, parameter count and format
//! - Sidecar config.json parsing for local weight files

pub mod infer;
pub mod metadata;
pub mod record;

pub use infer::{infer_format_from_files, infer_parameter_count, infer_quantization};
pub use metadata::{SidecarConfig, parse_sidecar_config};
pub use record::{ModelFormat, ModelRecord, ModelSource, ModelType};
