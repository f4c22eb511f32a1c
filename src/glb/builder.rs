// src/glb/builder.rs
// ============================================================================
// CONTAINER BUILDER - Clip de animación → BinaryContainer
// ============================================================================
//
// Layout del buffer BIN (cada bloque alineado a 4):
//   [0] tiempos        SCALAR  frames
//   [i] rotación hueso VEC4    frames × 4     (uno por pista)
//   [·] traslación     VEC3    frames × 3     (solo hips, opcional)
//
// Nodos: uno por pista, en el orden de las pistas. Los hijos siguen los
// padres del mapa de huesos; sin padre mapeado → raíz de la escena.
//
// ============================================================================

use std::collections::{BTreeMap, HashMap};

use log::debug;

use super::container::BinaryContainer;
use super::document::*;
use super::writer::{BinaryWriter, BLOCK_ALIGN};
use crate::error::{Result, TranscodeError};
use crate::mapping::HumanBone;
use crate::rotation::Quat;

/// Pista de un hueso
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    pub bone: HumanBone,
    /// Articulación origen
    pub joint: usize,
    /// Articulación del primer ancestro con hueso
    pub parent: Option<usize>,
    pub rotations: Vec<Quat>,
    pub translations: Option<Vec<[f32; 3]>>,
}

/// Estado de trabajo del orquestador: eje de tiempo + pistas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub text: Option<String>,
    pub times: Vec<f32>,
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn frames(&self) -> usize {
        self.times.len()
    }

    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn has_translation(&self) -> bool {
        self.tracks.iter().any(|t| t.translations.is_some())
    }
}

/// Serializa clips a contenedores
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    generator: String,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self { generator: format!("vrma-convert {}", env!("CARGO_PKG_VERSION")) }
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(generator: impl Into<String>) -> Self {
        Self { generator: generator.into() }
    }

    pub fn build(&self, clip: &AnimationClip) -> Result<BinaryContainer> {
        check_clip(clip)?;

        let frames = clip.frames();
        let per_frame = 1 + clip.tracks.len() * 4 + if clip.has_translation() { 3 } else { 0 };
        let mut layout = Layout::new(BinaryWriter::with_capacity(frames * per_frame * 4));

        // Eje de tiempo compartido
        let first = clip.times[0];
        let last = clip.duration();
        let time_accessor = layout.push_floats(
            &clip.times,
            frames,
            AccessorType::Scalar,
            Some((vec![first], vec![last])),
        )?;

        // Nodos y jerarquía
        let node_of: HashMap<usize, usize> = clip
            .tracks
            .iter()
            .enumerate()
            .map(|(node, track)| (track.joint, node))
            .collect();

        let mut nodes: Vec<Node> = clip
            .tracks
            .iter()
            .map(|t| Node { name: Some(t.bone.name().to_string()), children: Vec::new() })
            .collect();
        let mut roots = Vec::new();
        for (node, track) in clip.tracks.iter().enumerate() {
            match track.parent.and_then(|p| node_of.get(&p)) {
                Some(&parent) if parent != node => nodes[parent].children.push(node),
                _ => roots.push(node),
            }
        }

        // Canales
        let mut animation = Animation { name: Some(clip.name.clone()), ..Default::default() };
        let mut human_bones = BTreeMap::new();

        for (node, track) in clip.tracks.iter().enumerate() {
            human_bones.insert(track.bone.name().to_string(), BoneNode { node });

            let flat: Vec<f32> = track.rotations.iter().flatten().copied().collect();
            let output = layout.push_floats(&flat, frames, AccessorType::Vec4, None)?;
            push_channel(&mut animation, time_accessor, output, node, TargetPath::Rotation);

            if let Some(translations) = &track.translations {
                let flat: Vec<f32> = translations.iter().flatten().copied().collect();
                let bounds = vec3_bounds(translations);
                let output = layout.push_floats(&flat, frames, AccessorType::Vec3, Some(bounds))?;
                push_channel(&mut animation, time_accessor, output, node, TargetPath::Translation);
            }
        }

        let Layout { writer, buffer_views, accessors } = layout;
        let bin = writer.into_inner();

        let document = Document {
            asset: Asset {
                version: ASSET_VERSION.to_string(),
                generator: Some(self.generator.clone()),
                extras: clip.text.as_ref().map(|text| AssetExtras { text: Some(text.clone()) }),
            },
            extensions_used: vec![EXTENSION_NAME.to_string()],
            extensions: Some(Extensions {
                vrm_animation: Some(VrmAnimation {
                    spec_version: EXTENSION_SPEC_VERSION.to_string(),
                    humanoid: Humanoid { human_bones },
                }),
            }),
            buffers: vec![Buffer { byte_length: bin.len() }],
            buffer_views,
            accessors,
            animations: vec![animation],
            nodes,
            scenes: vec![Scene { nodes: roots }],
            scene: Some(0),
        };

        debug!(
            "Container: {} frames, {} tracks, {} accessors, BIN {} bytes",
            frames,
            clip.tracks.len(),
            document.accessors.len(),
            bin.len()
        );

        BinaryContainer::assemble(document.to_json_bytes()?, bin)
    }
}

/// bufferViews y accessors acumulados sobre el writer
struct Layout {
    writer: BinaryWriter,
    buffer_views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl Layout {
    fn new(writer: BinaryWriter) -> Self {
        Self { writer, buffer_views: Vec::new(), accessors: Vec::new() }
    }

    /// Añade un bloque de floats con su bufferView y accessor
    fn push_floats(
        &mut self,
        values: &[f32],
        count: usize,
        kind: AccessorType,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> Result<usize> {
        let (offset, byte_length) = self.writer.append_f32s(values);
        if offset % BLOCK_ALIGN != 0 {
            return Err(TranscodeError::AlignmentAssertion { offset });
        }

        self.buffer_views.push(BufferView { buffer: 0, byte_offset: offset, byte_length });
        let (min, max) = match bounds {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };
        self.accessors.push(Accessor {
            buffer_view: self.buffer_views.len() - 1,
            component_type: COMPONENT_FLOAT,
            count,
            kind,
            min,
            max,
        });
        Ok(self.accessors.len() - 1)
    }
}

fn push_channel(animation: &mut Animation, input: usize, output: usize, node: usize, path: TargetPath) {
    animation.samplers.push(Sampler { input, output, interpolation: Interpolation::Linear });
    animation.channels.push(Channel {
        sampler: animation.samplers.len() - 1,
        target: Target { node, path },
    });
}

fn vec3_bounds(values: &[[f32; 3]]) -> (Vec<f32>, Vec<f32>) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in values {
        for i in 0..3 {
            min[i] = min[i].min(v[i]);
            max[i] = max[i].max(v[i]);
        }
    }
    (min.to_vec(), max.to_vec())
}

fn check_clip(clip: &AnimationClip) -> Result<()> {
    let frames = clip.frames();
    if frames == 0 {
        return Err(TranscodeError::MissingRequiredData("clip has no frames".into()));
    }
    if clip.times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TranscodeError::container("time axis is not strictly increasing"));
    }
    for track in &clip.tracks {
        if track.rotations.len() != frames {
            return Err(TranscodeError::container(format!(
                "track '{}' has {} rotation keys, time axis has {}",
                track.bone,
                track.rotations.len(),
                frames
            )));
        }
        if let Some(translations) = &track.translations {
            if !track.bone.allows_translation() {
                return Err(TranscodeError::container(format!(
                    "bone '{}' cannot carry translation",
                    track.bone
                )));
            }
            if translations.len() != frames {
                return Err(TranscodeError::container(format!(
                    "track '{}' has {} translation keys, time axis has {}",
                    track.bone,
                    translations.len(),
                    frames
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::IDENTITY;

    fn clip(frames: usize, with_translation: bool) -> AnimationClip {
        let times: Vec<f32> = (0..frames).map(|i| i as f32 / 30.0).collect();
        let hips = BoneTrack {
            bone: HumanBone::Hips,
            joint: 0,
            parent: None,
            rotations: vec![IDENTITY; frames],
            translations: with_translation
                .then(|| (0..frames).map(|i| [i as f32, 1.0, -(i as f32)]).collect()),
        };
        let spine = BoneTrack {
            bone: HumanBone::Spine,
            joint: 3,
            parent: Some(0),
            rotations: vec![IDENTITY; frames],
            translations: None,
        };
        let head = BoneTrack {
            bone: HumanBone::Head,
            joint: 15,
            parent: Some(3),
            rotations: vec![IDENTITY; frames],
            translations: None,
        };
        AnimationClip { name: "clip".into(), text: None, times, tracks: vec![hips, spine, head] }
    }

    #[test]
    fn test_layout_and_accessors() {
        let container = ContainerBuilder::new().build(&clip(5, true)).unwrap();
        let doc = container.document().unwrap();

        // tiempo + 3 rotaciones + 1 traslación
        assert_eq!(doc.accessors.len(), 5);
        assert_eq!(doc.buffer_views.len(), 5);
        assert_eq!(doc.accessors[0].kind, AccessorType::Scalar);
        assert_eq!(doc.accessors[0].min, Some(vec![0.0]));
        assert_eq!(doc.accessors[0].max, Some(vec![4.0 / 30.0]));
        assert_eq!(doc.rotation_accessors().len(), 3);
        assert_eq!(doc.translation_accessors().len(), 1);

        let t = &doc.accessors[doc.translation_accessors()[0]];
        assert_eq!(t.kind, AccessorType::Vec3);
        assert_eq!(t.min, Some(vec![0.0, 1.0, -4.0]));
        assert_eq!(t.max, Some(vec![4.0, 1.0, 0.0]));

        for view in &doc.buffer_views {
            assert_eq!(view.byte_offset % 4, 0);
        }
        let bin_len: usize = doc.buffer_views.iter().map(|v| v.byte_length).sum();
        assert_eq!(doc.buffers[0].byte_length, bin_len);
        assert_eq!(container.bin_chunk().len(), bin_len);
    }

    #[test]
    fn test_nodes_and_hierarchy() {
        let doc = ContainerBuilder::new().build(&clip(2, false)).unwrap().document().unwrap();

        let names: Vec<_> = doc.nodes.iter().map(|n| n.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["hips", "spine", "head"]);
        assert_eq!(doc.nodes[0].children, vec![1]);
        assert_eq!(doc.nodes[1].children, vec![2]);
        assert_eq!(doc.scenes[0].nodes, vec![0]);

        let bones = doc.human_bones().unwrap();
        assert_eq!(bones["hips"].node, 0);
        assert_eq!(bones["head"].node, 2);
        assert_eq!(doc.extensions_used, vec!["VRMC_vrm_animation".to_string()]);
    }

    #[test]
    fn test_channels_reference_existing_nodes() {
        let doc = ContainerBuilder::new().build(&clip(3, true)).unwrap().document().unwrap();
        let animation = &doc.animations[0];
        assert_eq!(animation.channels.len(), 4);
        for channel in &animation.channels {
            assert!(channel.target.node < doc.nodes.len());
            let sampler = &animation.samplers[channel.sampler];
            assert_eq!(sampler.input, 0);
            assert_eq!(sampler.interpolation, Interpolation::Linear);
        }
    }

    #[test]
    fn test_text_goes_to_asset_extras() {
        let mut c = clip(2, false);
        c.text = Some("a person waves".into());
        let doc = ContainerBuilder::with_generator("test").build(&c).unwrap().document().unwrap();
        assert_eq!(doc.asset.generator.as_deref(), Some("test"));
        assert_eq!(doc.asset.extras.unwrap().text.as_deref(), Some("a person waves"));
    }

    #[test]
    fn test_orphan_parent_becomes_root() {
        let mut c = clip(2, false);
        c.tracks.remove(1);
        let doc = ContainerBuilder::new().build(&c).unwrap().document().unwrap();
        assert_eq!(doc.scenes[0].nodes, vec![0, 1]);
        assert!(doc.nodes[0].children.is_empty());
    }

    #[test]
    fn test_rejects_inconsistent_clips() {
        let builder = ContainerBuilder::new();

        let empty = AnimationClip::default();
        assert!(matches!(builder.build(&empty), Err(TranscodeError::MissingRequiredData(_))));

        let mut short = clip(3, false);
        short.tracks[1].rotations.pop();
        assert!(builder.build(&short).is_err());

        let mut bad_time = clip(3, false);
        bad_time.times[2] = bad_time.times[1];
        assert!(builder.build(&bad_time).is_err());

        let mut wrong_bone = clip(2, false);
        wrong_bone.tracks[1].translations = Some(vec![[0.0; 3]; 2]);
        assert!(builder.build(&wrong_bone).is_err());
    }

    #[test]
    fn test_single_frame() {
        let container = ContainerBuilder::new().build(&clip(1, true)).unwrap();
        let doc = container.document().unwrap();
        assert_eq!(doc.accessors[0].min, doc.accessors[0].max);
        assert_eq!(doc.accessors[0].count, 1);
    }
}
