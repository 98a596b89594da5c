//! Node-graph host registration metadata.
//!
//! Purely declarative: a host that loads this utility as a graph node reads the
//! descriptor to know the node's name, inputs, outputs and category. Nothing
//! here affects the round-trip itself.
//!
//! ```json
//! {
//!   "name": "H265ImageCompress",
//!   "display_name": "H.265 Image Compress",
//!   "category": "image",
//!   "function": "compress_and_decompress",
//!   "inputs": {
//!     "image": { "type": "IMAGE", "tooltip": "..." },
//!     "crf": { "type": "INT", "default": 28, "min": 0, "max": 51, "step": 1, "tooltip": "..." }
//!   },
//!   "return_types": ["IMAGE"]
//! }
//! ```

use crate::codec::{CRF_MAX, CRF_MIN, Crf};
use serde::Serialize;
use std::collections::BTreeMap;

/// Saved host graphs refer to the node by this name; it must not change.
pub const NODE_NAME: &str = "H265ImageCompress";
pub const NODE_DISPLAY_NAME: &str = "H.265 Image Compress";
pub const NODE_CATEGORY: &str = "image";
pub const NODE_FUNCTION: &str = "compress_and_decompress";

/// Everything a host needs to register the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub function: &'static str,
    pub description: &'static str,
    pub inputs: BTreeMap<&'static str, InputSpec>,
    pub return_types: Vec<&'static str>,
}

/// One required input of the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum InputSpec {
    #[serde(rename = "IMAGE")]
    Image { tooltip: &'static str },
    #[serde(rename = "INT")]
    Int {
        default: i32,
        min: i32,
        max: i32,
        step: i32,
        tooltip: &'static str,
    },
}

/// The descriptor for the round-trip node.
pub fn descriptor() -> NodeDescriptor {
    let mut inputs = BTreeMap::new();
    inputs.insert(
        "image",
        InputSpec::Image {
            tooltip: "The input image batch to be compressed and decompressed.",
        },
    );
    inputs.insert(
        "crf",
        InputSpec::Int {
            default: Crf::default().value(),
            min: CRF_MIN,
            max: CRF_MAX,
            step: 1,
            tooltip: "Constant Rate Factor for the video encoder (lower values mean higher quality).",
        },
    );

    NodeDescriptor {
        name: NODE_NAME,
        display_name: NODE_DISPLAY_NAME,
        category: NODE_CATEGORY,
        function: NODE_FUNCTION,
        description: "Encodes each input image as a single video frame at the given CRF and \
                      decodes it back, reproducing the degradation a video model sees.",
        inputs,
        return_types: vec!["IMAGE"],
    }
}

/// Pretty-printed JSON for [`descriptor`].
pub fn descriptor_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&descriptor())
}
