// src/rotation/mod.rs
// ============================================================================
// ROTATION - Representación 6D → cuaternión + remapeo de ejes
// ============================================================================
//
// 6D (a1, a2):
//   b1 = a1 / (|a1| + ε)
//   b2 = (a2 − (a2·b1) b1) / (|…| + ε)       Gram-Schmidt
//   b3 = b1 × b2
//   R  = [b1 | b2 | b3]                       columnas
//
// Matriz → cuaternión por selección de rama (traza o diagonal dominante),
// estable cerca de 180°. Salida en orden glTF (x, y, z, w).
//
// Remapeo rig origen → rig destino: (x, y, z, w) → (−x, y, −z, w)
// Traslación raíz:                   (x, y, z)    → (x, y + offset, −z)
//
// ============================================================================

use glam::Vec3;

/// Sumado a las normas antes de dividir
pub const EPSILON: f32 = 1e-8;

/// Cuaternión (x, y, z, w)
pub type Quat = [f32; 4];

/// Matriz 3x3, `m[fila][columna]`
pub type Mat3 = [[f32; 3]; 3];

pub const IDENTITY: Quat = [0.0, 0.0, 0.0, 1.0];

/// Construye la matriz de rotación a partir de una muestra 6D
pub fn rot6d_to_matrix(sample: &[f32; 6]) -> Mat3 {
    let a1 = Vec3::new(sample[0], sample[1], sample[2]);
    let a2 = Vec3::new(sample[3], sample[4], sample[5]);

    let b1 = a1 / (a1.length() + EPSILON);
    let ortho = a2 - a2.dot(b1) * b1;
    let b2 = ortho / (ortho.length() + EPSILON);
    let b3 = b1.cross(b2);

    [
        [b1.x, b2.x, b3.x],
        [b1.y, b2.y, b3.y],
        [b1.z, b2.z, b3.z],
    ]
}

/// Normaliza; un cuaternión nulo (entrada degenerada) pasa a identidad
pub fn normalize_quat(q: Quat) -> Quat {
    let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if norm < EPSILON {
        return IDENTITY;
    }
    [q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm]
}

/// Matriz de rotación → cuaternión unitario
pub fn matrix_to_quat(m: &Mat3) -> Quat {
    let (m00, m01, m02) = (m[0][0], m[0][1], m[0][2]);
    let (m10, m11, m12) = (m[1][0], m[1][1], m[1][2]);
    let (m20, m21, m22) = (m[2][0], m[2][1], m[2][2]);
    let trace = m00 + m11 + m22;

    let (x, y, z, w) = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        ((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).max(0.0).sqrt() * 2.0 + EPSILON;
        (0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).max(0.0).sqrt() * 2.0 + EPSILON;
        ((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
    } else {
        let s = (1.0 + m22 - m00 - m11).max(0.0).sqrt() * 2.0 + EPSILON;
        ((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
    };

    normalize_quat([x, y, z, w])
}

/// Muestra 6D → cuaternión en la convención del rig origen
pub fn rot6d_to_quat(sample: &[f32; 6]) -> Quat {
    matrix_to_quat(&rot6d_to_matrix(sample))
}

/// Espeja dos ejes: niega x y z
pub fn remap_quat(q: Quat) -> Quat {
    [-q[0], q[1], -q[2], q[3]]
}

/// Conversión completa de una muestra (6D → cuaternión remapeado)
pub fn convert_sample(sample: &[f32; 6]) -> Quat {
    remap_quat(rot6d_to_quat(sample))
}

/// Traslación raíz al sistema del rig destino
pub fn remap_translation(t: [f32; 3], vertical_offset: f32) -> [f32; 3] {
    [t[0], t[1] + vertical_offset, -t[2]]
}

/// Convierte un bloque plano `[frames, joints, 6]` para una articulación.
///
/// Devuelve un cuaternión por frame.
pub fn convert_joint_track(rot6d: &[f32], frames: usize, joints: usize, joint: usize) -> Vec<Quat> {
    (0..frames)
        .map(|f| {
            let base = (f * joints + joint) * 6;
            let mut sample = [0.0f32; 6];
            sample.copy_from_slice(&rot6d[base..base + 6]);
            convert_sample(&sample)
        })
        .collect()
}

pub fn quat_norm(q: &Quat) -> f32 {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    const TOL: f32 = 1e-5;

    fn assert_quat_eq(a: Quat, b: Quat) {
        for i in 0..4 {
            assert!((a[i] - b[i]).abs() < 1e-4, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity() {
        let sample = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_quat_eq(rot6d_to_quat(&sample), IDENTITY);
        assert_quat_eq(convert_sample(&sample), IDENTITY);
    }

    #[test]
    fn test_identity_matrix() {
        let m = rot6d_to_matrix(&[2.0, 0.0, 0.0, 0.5, 3.0, 0.0]);
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((m[r][c] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_quarter_turn_about_y() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let q = rot6d_to_quat(&[0.0, 0.0, -1.0, 0.0, 1.0, 0.0]);
        assert_quat_eq(q, [0.0, h, 0.0, h]);
        // y y w no cambian con el remapeo
        assert_quat_eq(remap_quat(q), [0.0, h, 0.0, h]);
    }

    #[test]
    fn test_quarter_turn_about_x_is_mirrored() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let q = convert_sample(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_quat_eq(q, [-h, 0.0, 0.0, h]);
    }

    #[test]
    fn test_half_turns_use_diagonal_branches() {
        // 180° en x: diag(1, -1, -1), traza -1
        let qx = rot6d_to_quat(&[1.0, 0.0, 0.0, 0.0, -1.0, 0.0]);
        assert_quat_eq(qx, [1.0, 0.0, 0.0, 0.0]);

        // 180° en y: diag(-1, 1, -1)
        let qy = rot6d_to_quat(&[-1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_quat_eq(qy, [0.0, 1.0, 0.0, 0.0]);

        // 180° en z: diag(-1, -1, 1)
        let qz = rot6d_to_quat(&[-1.0, 0.0, 0.0, 0.0, -1.0, 0.0]);
        assert_quat_eq(qz, [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_random_samples_are_unit_and_match_glam() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        let mut checked = 0;

        for _ in 0..2000 {
            let sample: [f32; 6] = std::array::from_fn(|_| rng.gen_range(-1.0..1.0));
            let a1 = Vec3::new(sample[0], sample[1], sample[2]);
            let a2 = Vec3::new(sample[3], sample[4], sample[5]);
            if a1.length() < 1e-2 || a1.normalize().cross(a2).length() < 1e-2 {
                continue;
            }

            let q = convert_sample(&sample);
            assert!((quat_norm(&q) - 1.0).abs() < TOL, "norm {}", quat_norm(&q));

            let m = rot6d_to_matrix(&sample);
            let reference = glam::Quat::from_mat3(&glam::Mat3::from_cols(
                Vec3::new(m[0][0], m[1][0], m[2][0]),
                Vec3::new(m[0][1], m[1][1], m[2][1]),
                Vec3::new(m[0][2], m[1][2], m[2][2]),
            ));
            let ours = rot6d_to_quat(&sample);
            let dot = ours[0] * reference.x + ours[1] * reference.y + ours[2] * reference.z + ours[3] * reference.w;
            assert!((dot.abs() - 1.0).abs() < 1e-3, "dot {}", dot);
            checked += 1;
        }

        assert!(checked > 1500);
    }

    #[test]
    fn test_degenerate_input_does_not_panic() {
        let q = convert_sample(&[0.0; 6]);
        assert!(q.iter().all(|c| c.is_finite()));
        assert!((quat_norm(&q) - 1.0).abs() < TOL);

        // a2 paralelo a a1
        let q = convert_sample(&[1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        assert!(q.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_remap_translation() {
        assert_eq!(remap_translation([1.0, 2.0, 3.0], 0.5), [1.0, 2.5, -3.0]);
    }

    #[test]
    fn test_convert_joint_track_strides() {
        // 2 frames x 2 joints; joint 1 = identidad, joint 0 = 180° en x
        let mut data = Vec::new();
        for _ in 0..2 {
            data.extend_from_slice(&[1.0, 0.0, 0.0, 0.0, -1.0, 0.0]);
            data.extend_from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        }
        let track = convert_joint_track(&data, 2, 2, 1);
        assert_eq!(track.len(), 2);
        assert_quat_eq(track[1], IDENTITY);

        let track0 = convert_joint_track(&data, 2, 2, 0);
        assert_quat_eq(track0[0], [-1.0, 0.0, 0.0, 0.0]);
    }
}
