// src/builder.rs
// ============================================================================
// BUILDER - Orquestador de transcodificación
// ============================================================================
//
// archivo zip → entradas → arrays → pistas por hueso → contenedor
//
// El builder no decide formatos:
// - el backend zip lo elige `archive::select_backend`
// - la tabla de huesos la aporta `mapping::BoneMap`
// - el layout binario lo decide `glb::ContainerBuilder`
//
// ============================================================================

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Deserialize;

use crate::archive::{read_archive, ArchiveEntries, ArchiveStrategy};
use crate::error::{Result, TranscodeError};
use crate::glb::{AnimationClip, BinaryContainer, BoneTrack, ContainerBuilder};
use crate::mapping::{BoneMap, JointBinding};
use crate::npy::{decode_npy, NumericArray};
use crate::rotation::{convert_joint_track, remap_translation};

/// Nombres (stem) de las entradas del archivo
pub const ENTRY_ROTATION: &str = "rot6d";
pub const ENTRY_TRANSLATION: &str = "transl";
pub const ENTRY_DURATION: &str = "duration";
pub const ENTRY_TEXT: &str = "text";

pub const DEFAULT_FPS: f32 = 30.0;
pub const DEFAULT_VERTICAL_OFFSET: f32 = -0.05;
pub const DEFAULT_NAME: &str = "motion";

/// Qué hacer cuando `transl` y `rot6d` no tienen los mismos frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationPolicy {
    /// Descarta la traslación y emite solo rotaciones
    #[default]
    Drop,
    /// Falla con `FrameCountMismatch`
    Strict,
}

/// Opciones de transcodificación (cargables desde JSON)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Frame rate asumido cuando el archivo no trae `duration`
    pub nominal_fps: f32,
    /// Sumado a la altura de la cadera
    pub vertical_offset: f32,
    pub translation_policy: TranslationPolicy,
    pub strategy: ArchiveStrategy,
    pub verify_crc: bool,
    /// Nombre de la animación sin etiqueta ni texto
    pub default_name: String,
    /// Tabla de huesos propia; `None` usa la estándar de 22 articulaciones
    pub bone_map: Option<Vec<JointBinding>>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            nominal_fps: DEFAULT_FPS,
            vertical_offset: DEFAULT_VERTICAL_OFFSET,
            translation_policy: TranslationPolicy::Drop,
            strategy: ArchiveStrategy::Auto,
            verify_crc: true,
            default_name: DEFAULT_NAME.to_string(),
            bone_map: None,
        }
    }
}

impl TranscodeOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.nominal_fps.is_finite() || self.nominal_fps <= 0.0 {
            return Err(TranscodeError::Config(format!(
                "nominal_fps must be positive, got {}",
                self.nominal_fps
            )));
        }
        if !self.vertical_offset.is_finite() {
            return Err(TranscodeError::Config("vertical_offset must be finite".into()));
        }
        Ok(())
    }

    /// Tabla de huesos efectiva
    pub fn resolve_bone_map(&self) -> Result<BoneMap> {
        match &self.bone_map {
            Some(bindings) => BoneMap::from_bindings(bindings.clone()),
            None => Ok(BoneMap::smpl22()),
        }
    }
}

/// Flag de cancelación compartido entre el llamador y el worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TranscodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Estadísticas de una transcodificación
#[derive(Debug, Clone, Default)]
pub struct TranscodeStats {
    pub frames: usize,
    pub joints: usize,
    pub tracks: usize,
    pub translation: bool,
    pub translation_dropped: bool,
    pub duration_seconds: f32,
    pub container_bytes: usize,
    pub backend: &'static str,
}

/// Contenedor + estadísticas
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub container: BinaryContainer,
    pub name: String,
    pub stats: TranscodeStats,
}

/// Rotaciones 6D aplanadas `[frames, joints, 6]`
struct RotationData {
    frames: usize,
    joints: usize,
    values: Vec<f32>,
}

#[derive(Debug)]
pub struct Transcoder {
    options: TranscodeOptions,
    bone_map: BoneMap,
    builder: ContainerBuilder,
    cancel: CancelToken,
}

impl Transcoder {
    pub fn new(options: TranscodeOptions) -> Result<Self> {
        options.validate()?;
        let bone_map = options.resolve_bone_map()?;
        Ok(Self {
            options,
            bone_map,
            builder: ContainerBuilder::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    pub fn bone_map(&self) -> &BoneMap {
        &self.bone_map
    }

    /// Transcodifica un archivo completo
    pub fn transcode(&self, archive: &[u8], label: &str) -> Result<Transcoded> {
        let mut stats = TranscodeStats::default();

        // 1. Archivo
        self.cancel.check()?;
        let (mut entries, backend) = read_archive(archive, self.options.strategy, self.options.verify_crc)?;
        stats.backend = backend;
        debug!("Archive: {} entries via {}", entries.len(), backend);

        // 2. Rotación (obligatoria)
        self.cancel.check()?;
        let rotation = take_array(&mut entries, ENTRY_ROTATION)?.ok_or_else(|| {
            TranscodeError::MissingRequiredData(format!("archive has no {}.npy entry", ENTRY_ROTATION))
        })?;
        let rotation = rotation_data(&rotation)?;
        stats.frames = rotation.frames;
        stats.joints = rotation.joints;
        debug!("Rotation: {} frames x {} joints", rotation.frames, rotation.joints);

        if rotation.joints > self.bone_map.len() {
            debug!(
                "{} joints beyond the bone map are ignored",
                rotation.joints - self.bone_map.len()
            );
        }

        // 3. Opcionales
        let translation = match take_array(&mut entries, ENTRY_TRANSLATION)? {
            Some(array) => {
                let translation = self.translation_data(&array, rotation.frames)?;
                stats.translation_dropped = translation.is_none();
                translation
            }
            None => None,
        };

        let duration_array = take_array(&mut entries, ENTRY_DURATION)?;
        let duration = self.resolve_duration(duration_array.as_ref(), rotation.frames);
        stats.duration_seconds = duration;

        let text = match take_array(&mut entries, ENTRY_TEXT)? {
            Some(array) => text_label(&array),
            None => None,
        };

        for name in entries.names() {
            debug!("Ignoring entry '{}'", name);
        }

        // 4. Pistas
        self.cancel.check()?;
        let times = timestamps(rotation.frames, duration);
        let tracks = self.build_tracks(&rotation, translation.as_deref())?;
        stats.tracks = tracks.len();
        stats.translation = tracks.iter().any(|t| t.translations.is_some());
        if translation.is_some() && !stats.translation {
            warn!("No hips binding in the bone map, translation dropped");
            stats.translation_dropped = true;
        }

        // 5. Contenedor
        self.cancel.check()?;
        let name = self.animation_name(label, text.as_deref());
        let clip = AnimationClip { name: name.clone(), text, times, tracks };
        let container = self.builder.build(&clip)?;
        stats.container_bytes = container.len();

        info!(
            "Transcoded '{}': {} frames, {} tracks, {:.2}s, {} bytes",
            name, stats.frames, stats.tracks, stats.duration_seconds, stats.container_bytes
        );

        Ok(Transcoded { container, name, stats })
    }

    /// Valida `transl` contra los frames de rotación según la política
    fn translation_data(&self, array: &NumericArray, frames: usize) -> Result<Option<Vec<[f32; 3]>>> {
        let values = array
            .to_f32_vec()
            .ok_or_else(|| TranscodeError::array(format!("{} must be numeric", ENTRY_TRANSLATION)))?;
        let rows = match array.shape.as_slice() {
            [rows, 3] => *rows,
            shape => {
                return Err(TranscodeError::array(format!(
                    "{} must have shape [frames, 3], got {:?}",
                    ENTRY_TRANSLATION, shape
                )))
            }
        };

        if rows != frames {
            return match self.options.translation_policy {
                TranslationPolicy::Drop => {
                    warn!(
                        "Translation has {} frames but rotation has {}, emitting rotation only",
                        rows, frames
                    );
                    Ok(None)
                }
                TranslationPolicy::Strict => Err(TranscodeError::FrameCountMismatch {
                    rotation: frames,
                    translation: rows,
                }),
            };
        }

        Ok(Some(
            values
                .chunks_exact(3)
                .map(|t| remap_translation([t[0], t[1], t[2]], self.options.vertical_offset))
                .collect(),
        ))
    }

    /// Duración en segundos: la del archivo si es válida, si no frames / fps
    fn resolve_duration(&self, array: Option<&NumericArray>, frames: usize) -> f32 {
        let inferred = frames as f32 / self.options.nominal_fps;
        let Some(array) = array else {
            return inferred;
        };
        match array.scalar().map(|d| d as f32) {
            // Se valida tras el cast: 1e39 → inf, 1e-50 → 0
            Some(d) if d.is_finite() && d > 0.0 && frames_fit(frames, d) => d,
            Some(d) => {
                warn!("Ignoring duration {}, using {:.3}s", d, inferred);
                inferred
            }
            None => {
                warn!(
                    "Duration entry has shape {:?}, using {:.3}s",
                    array.shape, inferred
                );
                inferred
            }
        }
    }

    fn build_tracks(&self, rotation: &RotationData, translation: Option<&[[f32; 3]]>) -> Result<Vec<BoneTrack>> {
        let bindings: Vec<&JointBinding> = self.bone_map.mapped(rotation.joints).collect();

        bindings
            .par_iter()
            .map(|binding| {
                self.cancel.check()?;
                let bone = binding.bone.ok_or_else(|| {
                    TranscodeError::Config(format!("joint {} has no bone", binding.joint))
                })?;
                let rotations =
                    convert_joint_track(&rotation.values, rotation.frames, rotation.joints, binding.joint);
                let translations = translation
                    .filter(|_| bone.allows_translation())
                    .map(|t| t.to_vec());
                Ok(BoneTrack {
                    bone,
                    joint: binding.joint,
                    parent: self.bone_map.mapped_parent(binding.joint, rotation.joints),
                    rotations,
                    translations,
                })
            })
            .collect()
    }

    /// Etiqueta del llamador → texto del archivo → nombre por defecto
    fn animation_name(&self, label: &str, text: Option<&str>) -> String {
        let label = label.trim();
        if !label.is_empty() {
            return label.to_string();
        }
        text.and_then(|t| t.lines().map(str::trim).find(|l| !l.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.options.default_name.clone())
    }
}

/// Transcodifica con las opciones por defecto
pub fn transcode(archive: &[u8], label: &str) -> Result<BinaryContainer> {
    Ok(Transcoder::new(TranscodeOptions::default())?.transcode(archive, label)?.container)
}

/// Transcodificación en un hilo propio, cancelable
pub struct TranscodeTask {
    handle: JoinHandle<Result<Transcoded>>,
    cancel: CancelToken,
}

impl TranscodeTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Espera el resultado; un pánico del worker se propaga
    pub fn join(self) -> Result<Transcoded> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

pub fn spawn_transcode(archive: Vec<u8>, label: String, options: TranscodeOptions) -> TranscodeTask {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let handle = std::thread::spawn(move || {
        Transcoder::new(options)?
            .with_cancel_token(token)
            .transcode(&archive, &label)
    });
    TranscodeTask { handle, cancel }
}

// ============================================================================
// Helpers
// ============================================================================

fn take_array(entries: &mut ArchiveEntries, stem: &str) -> Result<Option<NumericArray>> {
    match entries.take(stem) {
        Some(entry) => {
            let array = decode_npy(&entry.bytes).map_err(|e| match e {
                TranscodeError::ArrayFormat(msg) => {
                    TranscodeError::ArrayFormat(format!("{}: {}", entry.name, msg))
                }
                other => other,
            })?;
            debug!("{}: dtype {:?}, shape {:?}", entry.name, array.dtype, array.shape);
            Ok(Some(array))
        }
        None => Ok(None),
    }
}

/// Acepta `[F, J, 6]` o `[F, J*6]`
fn rotation_data(array: &NumericArray) -> Result<RotationData> {
    let values = array
        .to_f32_vec()
        .ok_or_else(|| TranscodeError::array(format!("{} must be numeric", ENTRY_ROTATION)))?;

    let (frames, joints) = match array.shape.as_slice() {
        [frames, joints, 6] => (*frames, *joints),
        [frames, width] if width % 6 == 0 => (*frames, width / 6),
        shape => {
            return Err(TranscodeError::array(format!(
                "{} must have shape [frames, joints, 6] or [frames, joints*6], got {:?}",
                ENTRY_ROTATION, shape
            )))
        }
    };

    if frames == 0 {
        return Err(TranscodeError::MissingRequiredData(format!("{} has no frames", ENTRY_ROTATION)));
    }
    if joints == 0 {
        return Err(TranscodeError::MissingRequiredData(format!("{} has no joints", ENTRY_ROTATION)));
    }
    let needed = array.numel()?;
    if values.len() != needed {
        return Err(TranscodeError::array(format!(
            "{} holds {} values, shape needs {}",
            ENTRY_ROTATION,
            values.len(),
            needed
        )));
    }

    Ok(RotationData { frames, joints, values })
}

fn text_label(array: &NumericArray) -> Option<String> {
    match array.as_text() {
        Some(text) if !text.trim().is_empty() => Some(text.to_string()),
        Some(_) => None,
        None => {
            warn!("{} entry is not text, ignored", ENTRY_TEXT);
            None
        }
    }
}

/// El paso `duration / (F - 1)` debe ser positivo en f32
fn frames_fit(frames: usize, duration: f32) -> bool {
    frames <= 1 || duration / (frames - 1) as f32 > 0.0
}

/// `t_i = i * duration / (F - 1)`; un solo frame → `[0]`
pub fn timestamps(frames: usize, duration: f32) -> Vec<f32> {
    if frames <= 1 {
        return vec![0.0; frames];
    }
    let last = frames - 1;
    let step = duration / last as f32;
    // El último tiempo es exactamente `duration`
    (0..frames)
        .map(|i| if i == last { duration } else { i as f32 * step })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{npy_f32, npy_f64, npy_raw, MotionArchive, ZipBuilder, ZipMethod};
    use crate::glb::document::AccessorType;
    use crate::glb::validate_container;
    use crate::mapping::HumanBone;

    fn run(archive: &[u8]) -> Transcoded {
        Transcoder::new(TranscodeOptions::default()).unwrap().transcode(archive, "").unwrap()
    }

    #[test]
    fn test_rotation_only_clip() {
        let archive = MotionArchive::new(10, 22).with_duration(2.0).build();
        let result = run(&archive);
        let doc = result.container.document().unwrap();

        assert_eq!(doc.translation_accessors().len(), 0);
        assert_eq!(doc.rotation_accessors().len(), 22);
        assert_eq!(doc.time_accessors(), vec![0]);

        let time = &doc.accessors[0];
        assert_eq!(time.kind, AccessorType::Scalar);
        assert_eq!(time.count, 10);
        assert_eq!(time.min, Some(vec![0.0]));
        assert_eq!(time.max, Some(vec![2.0]));

        assert_eq!(result.stats.tracks, 22);
        assert!(!result.stats.translation);
        assert!(validate_container(&result.container.to_bytes()).valid);
    }

    #[test]
    fn test_missing_rotation_fails() {
        let archive = MotionArchive::new(10, 22).without_rotation().with_translation().build();
        let err = Transcoder::new(TranscodeOptions::default())
            .unwrap()
            .transcode(&archive, "x")
            .unwrap_err();
        assert!(matches!(err, TranscodeError::MissingRequiredData(_)));
        assert_eq!(err.kind(), "MissingRequiredDataError");

        let err = transcode(&archive, "x").unwrap_err();
        assert!(matches!(err, TranscodeError::MissingRequiredData(_)));
    }

    #[test]
    fn test_bin_chunk_scales_linearly() {
        let small = run(&MotionArchive::new(10, 22).with_translation().build());
        let large = run(&MotionArchive::new(100, 22).with_translation().build());

        // tiempo (1) + 22 rotaciones (4) + traslación (3) floats por frame
        let per_frame = (1 + 22 * 4 + 3) * 4;
        assert_eq!(small.container.bin_chunk().len(), 10 * per_frame);
        assert_eq!(large.container.bin_chunk().len(), 100 * per_frame);

        let header = large.container.header();
        assert_eq!(header.length as usize, large.container.to_bytes().len());
    }

    #[test]
    fn test_buffer_view_offsets_aligned() {
        for frames in [1, 3, 7, 10] {
            let result = run(&MotionArchive::new(frames, 22).with_translation().build());
            let doc = result.container.document().unwrap();
            for view in &doc.buffer_views {
                assert_eq!(view.byte_offset % 4, 0);
            }
        }
    }

    #[test]
    fn test_identity_motion_yields_identity_quaternions() {
        let result = run(&MotionArchive::new(4, 22).identity().build());
        let report = validate_container(&result.container.to_bytes());
        assert!(report.valid, "{:?}", report.errors);

        let bin = result.container.bin_chunk();
        let doc = result.container.document().unwrap();
        let view = &doc.buffer_views[doc.accessors[doc.rotation_accessors()[0]].buffer_view];
        let q: Vec<f32> = bin[view.byte_offset..view.byte_offset + 16]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(q, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_translation_remapped_on_hips() {
        let result = run(&MotionArchive::new(5, 22).with_translation().build());
        let doc = result.container.document().unwrap();

        let translations = doc.translation_accessors();
        assert_eq!(translations.len(), 1);
        let accessor = &doc.accessors[translations[0]];
        assert_eq!(accessor.kind, AccessorType::Vec3);
        assert_eq!(accessor.count, 5);

        // frame 0 del fixture: (0, 0.9, -0) → (0, 0.85, 0)
        let view = &doc.buffer_views[accessor.buffer_view];
        let bin = &result.container.bin_chunk()[view.byte_offset..];
        let y = f32::from_le_bytes([bin[4], bin[5], bin[6], bin[7]]);
        assert!((y - (0.9 + DEFAULT_VERTICAL_OFFSET)).abs() < 1e-6);

        let hips = doc.human_bones().unwrap()["hips"].node;
        let channel = doc.animations[0]
            .channels
            .iter()
            .find(|c| c.target.path == crate::glb::document::TargetPath::Translation)
            .unwrap();
        assert_eq!(channel.target.node, hips);
        assert!(result.stats.translation);
    }

    #[test]
    fn test_translation_mismatch_dropped_by_default() {
        let archive = MotionArchive::new(10, 22).with_translation_frames(9).build();
        let result = run(&archive);
        let doc = result.container.document().unwrap();
        assert!(doc.translation_accessors().is_empty());
        assert_eq!(doc.rotation_accessors().len(), 22);
        assert!(!result.stats.translation);
    }

    #[test]
    fn test_translation_mismatch_strict() {
        let archive = MotionArchive::new(10, 22).with_translation_frames(9).build();
        let options = TranscodeOptions { translation_policy: TranslationPolicy::Strict, ..Default::default() };
        let err = Transcoder::new(options).unwrap().transcode(&archive, "").unwrap_err();
        assert!(matches!(err, TranscodeError::FrameCountMismatch { rotation: 10, translation: 9 }));
    }

    #[test]
    fn test_duration_inferred_from_fps() {
        let result = run(&MotionArchive::new(31, 22).build());
        let doc = result.container.document().unwrap();
        let expected = 31.0 / DEFAULT_FPS;
        assert_eq!(doc.accessors[0].max, Some(vec![expected]));
        assert_eq!(result.stats.duration_seconds, expected);
    }

    #[test]
    fn test_invalid_duration_falls_back() {
        let result = run(&MotionArchive::new(30, 22).with_duration(-1.0).build());
        assert_eq!(result.stats.duration_seconds, 1.0);
    }

    #[test]
    fn test_duration_out_of_f32_range_falls_back() {
        let fixture = MotionArchive::new(10, 22);
        let rot = npy_f32(&[10, 22, 6], &fixture.rot6d_values());

        for duration in [1e39, 1e-50] {
            let archive = ZipBuilder::new()
                .entry("rot6d.npy", &rot, ZipMethod::Stored)
                .entry("duration.npy", &npy_f64(&[1], &[duration]), ZipMethod::Stored)
                .finish();
            let result = run(&archive);
            let doc = result.container.document().unwrap();
            assert_eq!(doc.accessors[0].max, Some(vec![10.0 / DEFAULT_FPS]));
            assert!(validate_container(&result.container.to_bytes()).valid);
        }
    }

    #[test]
    fn test_overflowing_rotation_shape_rejected() {
        let rot = npy_raw("<f4", &[1 << 62, 4, 6], &[]);
        let archive = ZipBuilder::new().entry("rot6d.npy", &rot, ZipMethod::Stored).finish();
        let err = transcode(&archive, "").unwrap_err();
        assert!(matches!(err, TranscodeError::ArrayFormat(_)));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(timestamps(1, 5.0), vec![0.0]);
        assert_eq!(timestamps(0, 5.0), Vec::<f32>::new());
        assert_eq!(timestamps(3, 1.0), vec![0.0, 0.5, 1.0]);
        let t = timestamps(100, 3.3);
        assert!(t.windows(2).all(|w| w[1] > w[0]));
        assert!((t[99] - 3.3).abs() < 1e-5);
    }

    #[test]
    fn test_animation_name_resolution() {
        let archive = MotionArchive::new(3, 22).with_text("a person jumps\nsecond line").build();
        let transcoder = Transcoder::new(TranscodeOptions::default()).unwrap();

        let labelled = transcoder.transcode(&archive, "  jump  ").unwrap();
        assert_eq!(labelled.name, "jump");

        let from_text = transcoder.transcode(&archive, "").unwrap();
        assert_eq!(from_text.name, "a person jumps");
        let doc = from_text.container.document().unwrap();
        assert_eq!(doc.animations[0].name.as_deref(), Some("a person jumps"));
        assert_eq!(
            doc.asset.extras.and_then(|e| e.text).as_deref(),
            Some("a person jumps\nsecond line")
        );

        let plain = transcoder.transcode(&MotionArchive::new(3, 22).build(), "").unwrap();
        assert_eq!(plain.name, DEFAULT_NAME);
    }

    #[test]
    fn test_flat_rotation_shape_and_fewer_joints() {
        let fixture = MotionArchive::new(4, 10);
        let rot = npy_f32(&[4, 60], &fixture.rot6d_values());
        let archive = ZipBuilder::new().entry("motion/rot6d.npy", &rot, ZipMethod::Deflate).finish();

        let result = run(&archive);
        assert_eq!(result.stats.joints, 10);
        assert_eq!(result.stats.tracks, 10);
        let doc = result.container.document().unwrap();
        assert_eq!(doc.rotation_accessors().len(), 10);
        assert!(doc.human_bones().unwrap().contains_key("upperChest"));
        assert!(!doc.human_bones().unwrap().contains_key("leftToes"));
    }

    #[test]
    fn test_extra_joints_ignored() {
        let result = run(&MotionArchive::new(2, 24).build());
        assert_eq!(result.stats.tracks, 22);
    }

    #[test]
    fn test_bad_rotation_shapes() {
        let rot = npy_f32(&[4, 7], &[0.0; 28]);
        let archive = ZipBuilder::new().entry("rot6d.npy", &rot, ZipMethod::Stored).finish();
        assert!(matches!(transcode(&archive, ""), Err(TranscodeError::ArrayFormat(_))));

        let rot = npy_f32(&[0, 22, 6], &[]);
        let archive = ZipBuilder::new().entry("rot6d.npy", &rot, ZipMethod::Stored).finish();
        assert!(matches!(transcode(&archive, ""), Err(TranscodeError::MissingRequiredData(_))));
    }

    #[test]
    fn test_corrupt_archive() {
        assert!(matches!(transcode(b"definitely not a zip", ""), Err(TranscodeError::ArchiveFormat(_))));
    }

    #[test]
    fn test_walker_and_central_directory_agree() {
        let fixture = MotionArchive::new(6, 22).with_translation().with_text("spin");
        let central = run(&fixture.clone().build());
        let walked = run(&fixture.clone().without_central_directory().build());
        let descriptor = run(&fixture.method(ZipMethod::DeflateWithDescriptor).build());

        assert_eq!(walked.stats.backend, "local_headers");
        assert_eq!(central.stats.backend, "central_directory");
        assert_eq!(central.container, walked.container);
        assert_eq!(central.container.fingerprint(), descriptor.container.fingerprint());
    }

    #[test]
    fn test_custom_bone_map() {
        let options = TranscodeOptions::from_json_str(
            r#"{
                "bone_map": [
                    { "joint": 0, "bone": "hips", "parent": null },
                    { "joint": 1, "bone": null, "parent": 0 },
                    { "joint": 2, "bone": "spine", "parent": 1 }
                ]
            }"#,
        )
        .unwrap();
        let result = Transcoder::new(options)
            .unwrap()
            .transcode(&MotionArchive::new(3, 22).build(), "")
            .unwrap();
        let doc = result.container.document().unwrap();

        assert_eq!(result.stats.tracks, 2);
        assert_eq!(doc.nodes[0].children, vec![1]);
        assert_eq!(doc.scenes[0].nodes, vec![0]);
    }

    #[test]
    fn test_options_from_json() {
        let options = TranscodeOptions::from_json_str(
            r#"{ "nominal_fps": 20.0, "translation_policy": "strict", "strategy": "local_headers" }"#,
        )
        .unwrap();
        assert_eq!(options.nominal_fps, 20.0);
        assert_eq!(options.translation_policy, TranslationPolicy::Strict);
        assert_eq!(options.strategy, ArchiveStrategy::LocalHeaders);
        assert!(options.verify_crc);
        assert_eq!(options.vertical_offset, DEFAULT_VERTICAL_OFFSET);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "verify_crc": false }"#).unwrap();
        assert!(!TranscodeOptions::from_json_file(&path).unwrap().verify_crc);

        assert!(matches!(TranscodeOptions::from_json_str("{ nope"), Err(TranscodeError::Json(_))));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = TranscodeOptions { nominal_fps: 0.0, ..Default::default() };
        assert!(matches!(Transcoder::new(options), Err(TranscodeError::Config(_))));
    }

    #[test]
    fn test_cancelled_before_start() {
        let transcoder = Transcoder::new(TranscodeOptions::default()).unwrap();
        transcoder.cancel_token().cancel();
        let err = transcoder.transcode(&MotionArchive::new(3, 22).build(), "").unwrap_err();
        assert!(matches!(err, TranscodeError::Cancelled));
    }

    #[test]
    fn test_spawned_task() {
        let archive = MotionArchive::new(8, 22).build();
        let task = spawn_transcode(archive.clone(), "bg".into(), TranscodeOptions::default());
        let result = task.join().unwrap();
        assert_eq!(result.name, "bg");
        assert_eq!(result.container, transcode(&archive, "bg").unwrap());
    }

    #[test]
    fn test_spawned_task_cancel() {
        let archive = MotionArchive::new(8, 22).build();
        let token = CancelToken::new();
        token.cancel();
        let transcoder = Transcoder::new(TranscodeOptions::default())
            .unwrap()
            .with_cancel_token(token.clone());
        assert!(token.is_cancelled());
        assert!(matches!(transcoder.transcode(&archive, ""), Err(TranscodeError::Cancelled)));
    }

    #[test]
    fn test_hips_only_translation() {
        let result = run(&MotionArchive::new(3, 22).with_translation().build());
        let doc = result.container.document().unwrap();
        let hips = doc.human_bones().unwrap()[HumanBone::Hips.name()].node;
        for channel in &doc.animations[0].channels {
            if channel.target.path == crate::glb::document::TargetPath::Translation {
                assert_eq!(channel.target.node, hips);
            }
        }
    }
}
