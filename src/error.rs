// src/error.rs
// ============================================================================
// ERRORES - Taxonomía de fallos del transcoder
// ============================================================================

use thiserror::Error;

/// Errores terminales de una transcodificación.
///
/// Ninguno se reintenta: el llamador recibe uno solo y no hay contenedor.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Firma zip desconocida, método de compresión no soportado o datos corruptos
    #[error("archive format error: {0}")]
    ArchiveFormat(String),

    /// Magic/versión NumPy inválida, header mal formado o dtype no soportado
    #[error("array format error: {0}")]
    ArrayFormat(String),

    /// Falta `rot6d` (o no tiene frames)
    #[error("missing required data: {0}")]
    MissingRequiredData(String),

    /// Defecto interno del builder: un bufferView no cae en múltiplo de 4
    #[error("internal alignment violation: bufferView offset {offset} is not 4-byte aligned")]
    AlignmentAssertion { offset: usize },

    /// Solo con `TranslationPolicy::Strict`
    #[error("translation has {translation} frames but rotation has {rotation}")]
    FrameCountMismatch { rotation: usize, translation: usize },

    /// Contenedor GLB ilegible (solo al re-parsear una salida)
    #[error("invalid container: {0}")]
    Container(String),

    /// Opciones o tabla de huesos inválidas
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transcode cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TranscodeError>;

impl TranscodeError {
    pub(crate) fn archive(msg: impl Into<String>) -> Self {
        Self::ArchiveFormat(msg.into())
    }

    pub(crate) fn array(msg: impl Into<String>) -> Self {
        Self::ArrayFormat(msg.into())
    }

    pub(crate) fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Nombre corto de la categoría (para logs y el CLI)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArchiveFormat(_) => "ArchiveFormatError",
            Self::ArrayFormat(_) => "ArrayFormatError",
            Self::MissingRequiredData(_) => "MissingRequiredDataError",
            Self::AlignmentAssertion { .. } => "AlignmentAssertionError",
            Self::FrameCountMismatch { .. } => "FrameCountMismatchError",
            Self::Container(_) => "ContainerError",
            Self::Config(_) => "ConfigError",
            Self::Cancelled => "Cancelled",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }
}
