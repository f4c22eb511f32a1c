// src/lib.rs
// ============================================================================
// VRMA-CONVERT - Transcoder de archivos de movimiento a VRM Animation (GLB)
// ============================================================================

pub mod archive;
pub mod builder;
pub mod error;
pub mod glb;
pub mod mapping;
pub mod npy;
pub mod rotation;

/// Generadores de .npy y zip sintéticos (tests y benches)
#[doc(hidden)]
pub mod fixtures;

// Re-exports principales
pub use archive::{read_archive, ArchiveBackend, ArchiveEntries, ArchiveStrategy, RawArchiveEntry};
pub use builder::{
    spawn_transcode, transcode, CancelToken, TranscodeOptions, TranscodeStats, TranscodeTask,
    Transcoded, Transcoder, TranslationPolicy,
};
pub use error::{Result, TranscodeError};
pub use glb::{validate_container, BinaryContainer, ContainerBuilder, ValidationReport};
pub use mapping::{BoneMap, HumanBone, JointBinding};
pub use npy::{decode_npy, NumericArray};
