// src/mapping/mod.rs
// ============================================================================
// MAPPING - Articulaciones del rig origen → huesos humanoides
// ============================================================================

pub mod table;
pub mod types;

// Re-exports
pub use table::{BoneMap, SOURCE_JOINT_COUNT};
pub use types::{HumanBone, JointBinding};
