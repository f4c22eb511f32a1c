// src/mapping/types.rs
// ============================================================================
// MAPPING TYPES - Huesos humanoides y bindings de articulaciones
// ============================================================================

use serde::{Deserialize, Serialize};

/// Hueso humanoide VRM destino
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HumanBone {
    Hips,
    LeftUpperLeg,
    RightUpperLeg,
    Spine,
    LeftLowerLeg,
    RightLowerLeg,
    Chest,
    LeftFoot,
    RightFoot,
    UpperChest,
    LeftToes,
    RightToes,
    Neck,
    LeftShoulder,
    RightShoulder,
    Head,
    LeftUpperArm,
    RightUpperArm,
    LeftLowerArm,
    RightLowerArm,
    LeftHand,
    RightHand,
}

impl HumanBone {
    /// Nombre canónico en la extensión humanoide
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hips => "hips",
            Self::LeftUpperLeg => "leftUpperLeg",
            Self::RightUpperLeg => "rightUpperLeg",
            Self::Spine => "spine",
            Self::LeftLowerLeg => "leftLowerLeg",
            Self::RightLowerLeg => "rightLowerLeg",
            Self::Chest => "chest",
            Self::LeftFoot => "leftFoot",
            Self::RightFoot => "rightFoot",
            Self::UpperChest => "upperChest",
            Self::LeftToes => "leftToes",
            Self::RightToes => "rightToes",
            Self::Neck => "neck",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::Head => "head",
            Self::LeftUpperArm => "leftUpperArm",
            Self::RightUpperArm => "rightUpperArm",
            Self::LeftLowerArm => "leftLowerArm",
            Self::RightLowerArm => "rightLowerArm",
            Self::LeftHand => "leftHand",
            Self::RightHand => "rightHand",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// Solo la cadera lleva canal de traslación
    pub fn allows_translation(&self) -> bool {
        matches!(self, Self::Hips)
    }

    pub const ALL: [HumanBone; 22] = [
        Self::Hips,
        Self::LeftUpperLeg,
        Self::RightUpperLeg,
        Self::Spine,
        Self::LeftLowerLeg,
        Self::RightLowerLeg,
        Self::Chest,
        Self::LeftFoot,
        Self::RightFoot,
        Self::UpperChest,
        Self::LeftToes,
        Self::RightToes,
        Self::Neck,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::Head,
        Self::LeftUpperArm,
        Self::RightUpperArm,
        Self::LeftLowerArm,
        Self::RightLowerArm,
        Self::LeftHand,
        Self::RightHand,
    ];
}

impl std::fmt::Display for HumanBone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Articulación del rig origen y su hueso destino
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointBinding {
    pub joint: usize,
    /// `None`: la articulación no emite pista
    pub bone: Option<HumanBone>,
    /// Articulación padre en la cadena cinemática origen
    pub parent: Option<usize>,
}

impl JointBinding {
    pub const fn new(joint: usize, bone: HumanBone, parent: Option<usize>) -> Self {
        Self { joint, bone: Some(bone), parent }
    }

    pub const fn unmapped(joint: usize, parent: Option<usize>) -> Self {
        Self { joint, bone: None, parent }
    }
}
