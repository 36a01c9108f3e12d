/// OBJ 文件加载器
///
/// 使用 tobj crate 加载 Wavefront OBJ 格式的3D模型。
use super::MeshLoader;
use crate::core::error::{MeshLoadError, Result};
use crate::geometry::mesh::MeshData;
use crate::geometry::normals::reconstruct_normals;
use crate::geometry::vertex::Vertex;
use std::io::BufReader;
use std::path::Path;

/// OBJ 格式加载器
///
/// # 特性
///
/// - 自动三角化，单一索引
/// - 三角形绕序反转：OBJ 的逆时针正面变为管线要求的顺时针正面
/// - UV 坐标翻转（V轴：1.0 - v）
/// - 文件缺少法线时自动重建
/// - 多个对象合并为一个网格
pub struct ObjLoader;

impl ObjLoader {
    fn load_options() -> tobj::LoadOptions {
        tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        }
    }

    /// 把 tobj 的模型列表合并成一个 `MeshData`
    fn build_mesh(models: &[tobj::Model], name: &str) -> Result<MeshData> {
        if models.is_empty() {
            return Err(MeshLoadError::InvalidGeometry("OBJ contains no models".to_string()).into());
        }

        let mut mesh_data = MeshData::with_name(name);
        let mut has_normals = true;

        for model in models {
            let mesh = &model.mesh;
            let positions = &mesh.positions;
            let normals = &mesh.normals;
            let texcoords = &mesh.texcoords;

            if positions.len() % 3 != 0 {
                return Err(MeshLoadError::InvalidGeometry(format!(
                    "Incomplete position data in '{}': {} floats",
                    model.name,
                    positions.len()
                )).into());
            }

            let vertex_start = mesh_data.vertices.len() as u32;
            let vertex_count = positions.len() / 3;
            has_normals &= normals.len() >= positions.len();

            for i in 0..vertex_count {
                let position = [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];

                let normal = if normals.len() >= (i + 1) * 3 {
                    [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]]
                } else {
                    [0.0, 0.0, 0.0]
                };

                let texcoord = if texcoords.len() >= (i + 1) * 2 {
                    [texcoords[i * 2], 1.0 - texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                };

                mesh_data.vertices.push(Vertex::new(position, normal, texcoord));
            }

            // 反转绕序：(a, b, c) -> (a, c, b)
            for triangle in mesh.indices.chunks_exact(3) {
                mesh_data.indices.extend_from_slice(&[
                    vertex_start + triangle[0],
                    vertex_start + triangle[2],
                    vertex_start + triangle[1],
                ]);
            }
        }

        if !has_normals {
            tracing::info!(mesh = name, "OBJ has no normals, reconstructing");
            reconstruct_normals(&mut mesh_data.vertices, &mesh_data.indices);
        }

        mesh_data.validate()?;

        tracing::info!(
            mesh = name,
            vertices = mesh_data.vertex_count(),
            triangles = mesh_data.triangle_count(),
            "OBJ loaded"
        );

        Ok(mesh_data)
    }
}

impl MeshLoader for ObjLoader {
    fn load_from_file(path: &Path) -> Result<MeshData> {
        if !path.exists() {
            return Err(MeshLoadError::FileNotFound(path.to_path_buf()).into());
        }

        let (models, _materials) = tobj::load_obj(path, &Self::load_options())
            .map_err(|e| MeshLoadError::ParseError(format!("{}: {}", path.display(), e)))?;

        let name = path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unnamed");

        Self::build_mesh(&models, name)
    }

    fn load_from_memory(data: &[u8]) -> Result<MeshData> {
        let mut reader = BufReader::new(data);

        // 内存中的 OBJ 没有可解析的材质库
        let (models, _materials) = tobj::load_obj_buf(&mut reader, &Self::load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .map_err(|e| MeshLoadError::ParseError(e.to_string()))?;

        Self::build_mesh(&models, "memory")
    }

    fn supported_extensions() -> &'static [&'static str] {
        &["obj"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_supported_extensions() {
        assert_eq!(ObjLoader::supported_extensions(), &["obj"]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ObjLoader::load_from_file(Path::new("nonexistent.obj"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_quad_from_memory() {
        let mesh = ObjLoader::load_from_memory(QUAD.as_bytes()).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.validate().is_ok());

        // V 轴翻转
        assert!(mesh.vertices.iter().any(|v| v.texcoord == [0.0, 1.0]));
    }

    #[test]
    fn test_winding_is_reversed_and_normals_rebuilt() {
        let mesh = ObjLoader::load_from_memory(QUAD.as_bytes()).unwrap();

        // 逆时针的 OBJ 面法线指向 +Z，重建法线沿用反转后的绕序，因此指向 -Z
        let first = &mesh.indices[0..3];
        let p = |i: u32| crate::math::Vector3::from(mesh.vertices[i as usize].position);
        let face = (p(first[1]) - p(first[0])).cross(&(p(first[2]) - p(first[0])));
        assert!(face.z < 0.0);

        for vertex in &mesh.vertices {
            assert!((vertex.normal[2] + 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ObjLoader::load_from_memory(b"this is not an obj").is_err());
    }
}
