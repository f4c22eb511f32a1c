// src/glb/validate.rs
// ============================================================================
// GLB Validator - Re-parsea un contenedor y comprueba sus invariantes
// ============================================================================

use byteorder::{ByteOrder, LittleEndian};

use super::container::BinaryContainer;
use super::document::*;
use crate::mapping::HumanBone;
use crate::rotation::quat_norm;

/// Tolerancia de norma unitaria para cuaterniones
pub const QUAT_NORM_TOLERANCE: f32 = 1e-5;

/// Resultado de validación
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: ContainerInfo,
}

/// Información extraída del contenedor
#[derive(Debug, Default)]
pub struct ContainerInfo {
    pub version: u32,
    pub total_size: usize,
    pub json_size: usize,
    pub bin_size: usize,
    pub fingerprint: u64,
    pub animation_name: Option<String>,
    pub text: Option<String>,
    pub frames: usize,
    pub duration: f32,
    pub nodes: usize,
    pub accessors: usize,
    pub rotation_tracks: usize,
    pub translation_tracks: usize,
    pub bones: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, msg: String) {
        self.valid = false;
        self.errors.push(msg);
    }
}

/// Valida un blob GLB y extrae información
pub fn validate_container(data: &[u8]) -> ValidationReport {
    let mut report = ValidationReport { valid: true, ..Default::default() };

    // 1. Framing
    let container = match BinaryContainer::parse(data) {
        Ok(c) => c,
        Err(e) => {
            report.error(e.to_string());
            return report;
        }
    };
    report.info.version = container.header().version;
    report.info.total_size = container.len();
    report.info.json_size = container.json_chunk().len();
    report.info.bin_size = container.bin_chunk().len();
    report.info.fingerprint = container.fingerprint();

    if container.json_chunk().len() % 4 != 0 {
        report.error(format!("JSON chunk length {} is not 4-byte aligned", container.json_chunk().len()));
    }
    if container.bin_chunk().len() % 4 != 0 {
        report.error(format!("BIN chunk length {} is not 4-byte aligned", container.bin_chunk().len()));
    }

    // 2. Documento
    let doc = match container.document() {
        Ok(d) => d,
        Err(e) => {
            report.error(format!("JSON chunk does not parse: {}", e));
            return report;
        }
    };
    report.info.nodes = doc.nodes.len();
    report.info.accessors = doc.accessors.len();
    report.info.text = doc.asset.extras.as_ref().and_then(|e| e.text.clone());

    if doc.asset.version != ASSET_VERSION {
        report.warnings.push(format!("asset.version is '{}'", doc.asset.version));
    }

    check_extension(&doc, &mut report);
    check_buffers(&doc, container.bin_chunk(), &mut report);
    if !report.valid {
        return report;
    }
    check_animation(&doc, container.bin_chunk(), &mut report);
    check_scenes(&doc, &mut report);

    report
}

fn check_extension(doc: &Document, report: &mut ValidationReport) {
    if !doc.extensions_used.iter().any(|e| e == EXTENSION_NAME) {
        report.error(format!("extensionsUsed does not declare {}", EXTENSION_NAME));
    }

    let Some(bones) = doc.human_bones() else {
        report.error(format!("missing extensions.{}.humanoid", EXTENSION_NAME));
        return;
    };

    for (name, bone) in bones {
        if bone.node >= doc.nodes.len() {
            report.error(format!("humanBones.{} references missing node {}", name, bone.node));
        }
        if HumanBone::from_name(name).is_none() {
            report.warnings.push(format!("unknown humanoid bone '{}'", name));
        }
        report.info.bones.push(name.clone());
    }

    if !bones.contains_key(HumanBone::Hips.name()) {
        report.warnings.push("humanoid map has no hips".to_string());
    }
}

fn check_buffers(doc: &Document, bin: &[u8], report: &mut ValidationReport) {
    if doc.buffers.len() != 1 {
        report.error(format!("expected 1 buffer, found {}", doc.buffers.len()));
        return;
    }
    let buffer_len = doc.buffers[0].byte_length;
    if buffer_len > bin.len() {
        report.error(format!("buffer byteLength {} exceeds BIN chunk {}", buffer_len, bin.len()));
    }

    for (i, view) in doc.buffer_views.iter().enumerate() {
        if view.buffer != 0 {
            report.error(format!("bufferView {} references buffer {}", i, view.buffer));
        }
        if view.byte_offset % 4 != 0 {
            report.error(format!("bufferView {} byteOffset {} is not 4-byte aligned", i, view.byte_offset));
        }
        if view.byte_offset + view.byte_length > buffer_len {
            report.error(format!("bufferView {} overruns the buffer", i));
        }
    }

    for (i, accessor) in doc.accessors.iter().enumerate() {
        if accessor.component_type != COMPONENT_FLOAT {
            report.error(format!("accessor {} has componentType {}", i, accessor.component_type));
        }
        match doc.buffer_views.get(accessor.buffer_view) {
            Some(view) if accessor.byte_length() <= view.byte_length => {}
            Some(_) => report.error(format!("accessor {} overruns its bufferView", i)),
            None => report.error(format!("accessor {} references missing bufferView {}", i, accessor.buffer_view)),
        }
    }
}

fn check_animation(doc: &Document, bin: &[u8], report: &mut ValidationReport) {
    if doc.animations.is_empty() {
        report.error("no animations".to_string());
        return;
    }
    if doc.animations.len() > 1 {
        report.warnings.push(format!("{} animations, only the first is described", doc.animations.len()));
    }

    for animation in &doc.animations {
        for (i, channel) in animation.channels.iter().enumerate() {
            if channel.target.node >= doc.nodes.len() {
                report.error(format!("channel {} targets missing node {}", i, channel.target.node));
            }
            let Some(sampler) = animation.samplers.get(channel.sampler) else {
                report.error(format!("channel {} references missing sampler {}", i, channel.sampler));
                continue;
            };
            let (Some(input), Some(output)) = (doc.accessors.get(sampler.input), doc.accessors.get(sampler.output)) else {
                report.error(format!("sampler {} references missing accessors", channel.sampler));
                continue;
            };
            if input.count != output.count {
                report.error(format!("sampler {}: {} keys vs {} values", channel.sampler, input.count, output.count));
            }
            let expected = match channel.target.path {
                TargetPath::Rotation => AccessorType::Vec4,
                TargetPath::Translation => AccessorType::Vec3,
            };
            if output.kind != expected {
                report.error(format!("sampler {} output has type {:?}", channel.sampler, output.kind));
            }
        }
    }

    // Eje de tiempo
    let first = &doc.animations[0];
    report.info.animation_name = first.name.clone();
    for index in doc.time_accessors() {
        let Some(times) = read_floats(doc, bin, index) else { continue };
        report.info.frames = report.info.frames.max(times.len());
        report.info.duration = times.last().copied().unwrap_or(0.0);

        if times.first().map_or(true, |t| t.abs() > 1e-6) {
            report.error(format!("time accessor {} does not start at 0", index));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            report.error(format!("time accessor {} is not strictly increasing", index));
        }
        let accessor = &doc.accessors[index];
        if accessor.min.as_deref() != times.first().map(std::slice::from_ref) {
            report.warnings.push(format!("time accessor {} min does not match first key", index));
        }
        if accessor.max.as_deref() != times.last().map(std::slice::from_ref) {
            report.warnings.push(format!("time accessor {} max does not match last key", index));
        }
    }

    // Cuaterniones unitarios
    let rotations = doc.rotation_accessors();
    report.info.rotation_tracks = rotations.len();
    report.info.translation_tracks = doc.translation_accessors().len();
    for index in rotations {
        let Some(values) = read_floats(doc, bin, index) else { continue };
        for (frame, q) in values.chunks_exact(4).enumerate() {
            let norm = quat_norm(&[q[0], q[1], q[2], q[3]]);
            if (norm - 1.0).abs() > QUAT_NORM_TOLERANCE {
                report.error(format!("accessor {} frame {}: quaternion norm {}", index, frame, norm));
                break;
            }
        }
    }
}

fn check_scenes(doc: &Document, report: &mut ValidationReport) {
    match doc.scene {
        Some(scene) if scene >= doc.scenes.len() => report.error(format!("scene {} does not exist", scene)),
        None => report.warnings.push("no default scene".to_string()),
        _ => {}
    }
    for scene in &doc.scenes {
        for &node in &scene.nodes {
            if node >= doc.nodes.len() {
                report.error(format!("scene references missing node {}", node));
            }
        }
    }
    for (i, node) in doc.nodes.iter().enumerate() {
        if node.children.iter().any(|&c| c >= doc.nodes.len() || c == i) {
            report.error(format!("node {} has invalid children", i));
        }
    }
}

/// Lee los floats de un accessor; `None` si sus referencias no son válidas
fn read_floats(doc: &Document, bin: &[u8], accessor: usize) -> Option<Vec<f32>> {
    let accessor = doc.accessors.get(accessor)?;
    let view = doc.buffer_views.get(accessor.buffer_view)?;
    let len = accessor.byte_length();
    let bytes = bin.get(view.byte_offset..view.byte_offset.checked_add(len)?)?;
    let mut values = vec![0.0f32; len / 4];
    LittleEndian::read_f32_into(bytes, &mut values);
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb::builder::{AnimationClip, BoneTrack, ContainerBuilder};
    use crate::rotation::IDENTITY;

    fn clip() -> AnimationClip {
        AnimationClip {
            name: "wave".into(),
            text: Some("someone waves".into()),
            times: vec![0.0, 0.5, 1.0],
            tracks: vec![BoneTrack {
                bone: HumanBone::Hips,
                joint: 0,
                parent: None,
                rotations: vec![IDENTITY; 3],
                translations: Some(vec![[0.0, 1.0, 0.0]; 3]),
            }],
        }
    }

    fn build(clip: &AnimationClip) -> Vec<u8> {
        ContainerBuilder::new().build(clip).unwrap().into_bytes()
    }

    /// Reemplaza el chunk JSON por otro documento (re-ensamblando)
    fn with_document(bytes: &[u8], edit: impl FnOnce(&mut Document)) -> Vec<u8> {
        let container = BinaryContainer::parse(bytes).unwrap();
        let mut doc = container.document().unwrap();
        edit(&mut doc);
        BinaryContainer::assemble(doc.to_json_bytes().unwrap(), container.bin_chunk().to_vec())
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_built_container_is_valid() {
        let report = validate_container(&build(&clip()));
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.info.frames, 3);
        assert_eq!(report.info.duration, 1.0);
        assert_eq!(report.info.rotation_tracks, 1);
        assert_eq!(report.info.translation_tracks, 1);
        assert_eq!(report.info.bones, vec!["hips".to_string()]);
        assert_eq!(report.info.text.as_deref(), Some("someone waves"));
        assert_eq!(report.info.animation_name.as_deref(), Some("wave"));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let report = validate_container(b"not a container at all");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_detects_misaligned_view() {
        let bytes = with_document(&build(&clip()), |doc| doc.buffer_views[1].byte_offset += 2);
        let report = validate_container(&bytes);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("not 4-byte aligned")));
    }

    #[test]
    fn test_detects_missing_channel_node() {
        let bytes = with_document(&build(&clip()), |doc| doc.animations[0].channels[0].target.node = 7);
        let report = validate_container(&bytes);
        assert!(report.errors.iter().any(|e| e.contains("missing node 7")));
    }

    #[test]
    fn test_detects_non_unit_quaternion() {
        let mut c = clip();
        c.tracks[0].rotations[1] = [0.0, 0.0, 0.0, 2.0];
        let report = validate_container(&build(&c));
        assert!(report.errors.iter().any(|e| e.contains("quaternion norm")));
    }

    #[test]
    fn test_detects_time_not_starting_at_zero() {
        let mut c = clip();
        c.times = vec![0.25, 0.5, 1.0];
        let report = validate_container(&build(&c));
        assert!(report.errors.iter().any(|e| e.contains("does not start at 0")));
    }

    #[test]
    fn test_detects_missing_extension() {
        let bytes = with_document(&build(&clip()), |doc| {
            doc.extensions = None;
            doc.extensions_used.clear();
        });
        let report = validate_container(&bytes);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }
}
