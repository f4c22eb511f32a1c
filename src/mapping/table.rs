// src/mapping/table.rs
// ============================================================================
// BONE MAP - Tabla articulación → hueso humanoide
// ============================================================================
//
// Rig origen de 22 articulaciones con raíz en la pelvis:
//
//   0 pelvis    1 l_hip     2 r_hip     3 spine1    4 l_knee    5 r_knee
//   6 spine2    7 l_ankle   8 r_ankle   9 spine3   10 l_foot   11 r_foot
//  12 neck     13 l_collar 14 r_collar 15 head     16 l_shoulder
//  17 r_shoulder 18 l_elbow 19 r_elbow 20 l_wrist  21 r_wrist
//
// ============================================================================

use std::collections::HashSet;

use super::types::{HumanBone, JointBinding};
use crate::error::{Result, TranscodeError};

/// Articulaciones del rig origen
pub const SOURCE_JOINT_COUNT: usize = 22;

const SMPL22: [JointBinding; SOURCE_JOINT_COUNT] = [
    JointBinding::new(0, HumanBone::Hips, None),
    JointBinding::new(1, HumanBone::LeftUpperLeg, Some(0)),
    JointBinding::new(2, HumanBone::RightUpperLeg, Some(0)),
    JointBinding::new(3, HumanBone::Spine, Some(0)),
    JointBinding::new(4, HumanBone::LeftLowerLeg, Some(1)),
    JointBinding::new(5, HumanBone::RightLowerLeg, Some(2)),
    JointBinding::new(6, HumanBone::Chest, Some(3)),
    JointBinding::new(7, HumanBone::LeftFoot, Some(4)),
    JointBinding::new(8, HumanBone::RightFoot, Some(5)),
    JointBinding::new(9, HumanBone::UpperChest, Some(6)),
    JointBinding::new(10, HumanBone::LeftToes, Some(7)),
    JointBinding::new(11, HumanBone::RightToes, Some(8)),
    JointBinding::new(12, HumanBone::Neck, Some(9)),
    JointBinding::new(13, HumanBone::LeftShoulder, Some(9)),
    JointBinding::new(14, HumanBone::RightShoulder, Some(9)),
    JointBinding::new(15, HumanBone::Head, Some(12)),
    JointBinding::new(16, HumanBone::LeftUpperArm, Some(13)),
    JointBinding::new(17, HumanBone::RightUpperArm, Some(14)),
    JointBinding::new(18, HumanBone::LeftLowerArm, Some(16)),
    JointBinding::new(19, HumanBone::RightLowerArm, Some(17)),
    JointBinding::new(20, HumanBone::LeftHand, Some(18)),
    JointBinding::new(21, HumanBone::RightHand, Some(19)),
];

/// Tabla inmutable de bindings, indexada por articulación
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneMap {
    bindings: Vec<JointBinding>,
}

impl Default for BoneMap {
    fn default() -> Self {
        Self::smpl22()
    }
}

impl BoneMap {
    /// Tabla estándar del rig de 22 articulaciones
    pub fn smpl22() -> Self {
        Self { bindings: SMPL22.to_vec() }
    }

    /// Construye una tabla propia; valida índices, padres y huesos únicos
    pub fn from_bindings(mut bindings: Vec<JointBinding>) -> Result<Self> {
        bindings.sort_by_key(|b| b.joint);

        let mut seen = HashSet::new();
        for (i, binding) in bindings.iter().enumerate() {
            if binding.joint != i {
                return Err(TranscodeError::Config(format!(
                    "bone map joints must be contiguous from 0, found joint {} at position {}",
                    binding.joint, i
                )));
            }
            if let Some(parent) = binding.parent {
                if parent >= binding.joint {
                    return Err(TranscodeError::Config(format!(
                        "joint {} has parent {} which does not precede it",
                        binding.joint, parent
                    )));
                }
            }
            if let Some(bone) = binding.bone {
                if !seen.insert(bone) {
                    return Err(TranscodeError::Config(format!("bone '{}' is bound twice", bone)));
                }
                if binding.parent.is_some() && bone == HumanBone::Hips {
                    return Err(TranscodeError::Config("hips must be bound to a root joint".into()));
                }
            }
        }

        Ok(Self { bindings })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, joint: usize) -> Option<&JointBinding> {
        self.bindings.get(joint)
    }

    /// Hueso de una articulación; índices fuera de tabla no tienen hueso
    pub fn bone_for(&self, joint: usize) -> Option<HumanBone> {
        self.binding(joint).and_then(|b| b.bone)
    }

    /// Articulación ligada a un hueso
    pub fn joint_for(&self, bone: HumanBone) -> Option<usize> {
        self.bindings.iter().find(|b| b.bone == Some(bone)).map(|b| b.joint)
    }

    /// Bindings con hueso para un rig que trae `available` articulaciones
    pub fn mapped(&self, available: usize) -> impl Iterator<Item = &JointBinding> {
        self.bindings
            .iter()
            .filter(move |b| b.joint < available && b.bone.is_some())
    }

    /// Primer ancestro con hueso entre las articulaciones disponibles
    pub fn mapped_parent(&self, joint: usize, available: usize) -> Option<usize> {
        let mut current = self.binding(joint)?.parent;
        while let Some(parent) = current {
            let binding = self.binding(parent)?;
            if parent < available && binding.bone.is_some() {
                return Some(parent);
            }
            current = binding.parent;
        }
        None
    }
}
