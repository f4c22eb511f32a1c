// src/glb/document.rs
// ============================================================================
// GLB DOCUMENT - Estructuras serde del chunk JSON
// ============================================================================
//
// Subconjunto de glTF 2.0 que emite el transcoder:
//   asset, buffers, bufferViews, accessors, animations, nodes, scenes, scene
//   + extensión VRMC_vrm_animation (mapa hueso → nodo)
//
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Extensión de animación humanoide
pub const EXTENSION_NAME: &str = "VRMC_vrm_animation";
pub const EXTENSION_SPEC_VERSION: &str = "1.0";

/// componentType FLOAT
pub const COMPONENT_FLOAT: u32 = 5126;

pub const ASSET_VERSION: &str = "2.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub animations: Vec<Animation>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
}

impl Document {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Mapa hueso → nodo de la extensión humanoide, si existe
    pub fn human_bones(&self) -> Option<&BTreeMap<String, BoneNode>> {
        self.extensions
            .as_ref()
            .and_then(|e| e.vrm_animation.as_ref())
            .map(|v| &v.humanoid.human_bones)
    }

    /// Accessors referenciados como salida de canales `translation`
    pub fn translation_accessors(&self) -> Vec<usize> {
        self.outputs_for(TargetPath::Translation)
    }

    /// Accessors referenciados como salida de canales `rotation`
    pub fn rotation_accessors(&self) -> Vec<usize> {
        self.outputs_for(TargetPath::Rotation)
    }

    /// Accessors usados como entrada (eje de tiempo) por algún sampler
    pub fn time_accessors(&self) -> Vec<usize> {
        let mut inputs: Vec<usize> = self
            .animations
            .iter()
            .flat_map(|a| a.samplers.iter().map(|s| s.input))
            .collect();
        inputs.sort_unstable();
        inputs.dedup();
        inputs
    }

    fn outputs_for(&self, path: TargetPath) -> Vec<usize> {
        self.animations
            .iter()
            .flat_map(|a| {
                a.channels
                    .iter()
                    .filter(move |c| c.target.path == path)
                    .filter_map(move |c| a.samplers.get(c.sampler).map(|s| s.output))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<AssetExtras>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetExtras {
    /// Texto descriptivo que acompañaba al archivo de entrada
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec3,
    Vec4,
}

impl AccessorType {
    pub fn components(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
}

impl Accessor {
    /// Bytes que ocupa en su bufferView (solo FLOAT)
    pub fn byte_length(&self) -> usize {
        self.count * self.kind.components() * 4
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub channels: Vec<Channel>,
    pub samplers: Vec<Sampler>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub sampler: usize,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub node: usize,
    pub path: TargetPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    pub input: usize,
    pub output: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(rename = "VRMC_vrm_animation", default, skip_serializing_if = "Option::is_none")]
    pub vrm_animation: Option<VrmAnimation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrmAnimation {
    pub spec_version: String,
    pub humanoid: Humanoid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Humanoid {
    pub human_bones: BTreeMap<String, BoneNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneNode {
    pub node: usize,
}
