//! 法线重建
//!
//! OBJ 文件可能不包含法线，此时按面积加权累加面法线得到平滑的顶点法线。

use crate::geometry::vertex::Vertex;
use crate::math::Vector3;

/// 从三角形面重建顶点法线
///
/// 面法线不归一化就累加，较大的三角形贡献更多。
/// 没有被任何三角形引用的顶点法线保持为零。
pub fn reconstruct_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accumulated = vec![Vector3::zeros(); vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }

        let p0 = Vector3::from(vertices[i0].position);
        let p1 = Vector3::from(vertices[i1].position);
        let p2 = Vector3::from(vertices[i2].position);

        let face_normal = (p1 - p0).cross(&(p2 - p0));
        accumulated[i0] += face_normal;
        accumulated[i1] += face_normal;
        accumulated[i2] += face_normal;
    }

    for (vertex, normal) in vertices.iter_mut().zip(accumulated) {
        vertex.normal = normal
            .try_normalize(f32::EPSILON)
            .map(|n| [n.x, n.y, n.z])
            .unwrap_or([0.0, 0.0, 0.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_triangle_normal() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
        ];

        reconstruct_normals(&mut vertices, &[0, 1, 2]);

        for vertex in &vertices {
            assert!((vertex.normal[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unreferenced_vertex_keeps_zero_normal() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
            Vertex::new([5.0, 5.0, 5.0], [1.0, 0.0, 0.0], [0.0; 2]),
        ];

        reconstruct_normals(&mut vertices, &[0, 1, 2]);
        assert_eq!(vertices[3].normal, [0.0, 0.0, 0.0]);
    }
}
