// src/glb/mod.rs
// ============================================================================
// GLB - Contenedor binario de escena/animación
// ============================================================================

pub mod builder;
pub mod container;
pub mod document;
pub mod header;
pub mod validate;
pub mod writer;

// Re-exports
pub use builder::{AnimationClip, BoneTrack, ContainerBuilder};
pub use container::BinaryContainer;
pub use document::{Document, EXTENSION_NAME};
pub use header::{ChunkHeader, GlbHeader};
pub use validate::{validate_container, ValidationReport};
pub use writer::BinaryWriter;
