//! 数学库模块
//!
//! 基于 `nalgebra` 的类型别名和渲染所需的矩阵函数。
//!
//! # 约定
//!
//! - 右手坐标系，相机朝向 -Z
//! - 投影矩阵深度范围为 [0, 1]（D3D 约定）
//! - `nalgebra` 矩阵是列主序、列向量约定；写入常量缓冲区时按行导出，
//!   着色器端以 `mul(v, M)` 的行向量方式使用

pub use nalgebra::{Matrix4 as Mat4, Vector3 as Vec3, Vector4 as Vec4};

// 类型别名，使用更简洁的名称
pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;

/// 角度转弧度
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}

/// 矩阵辅助函数
pub mod matrix {
    use super::*;

    /// 创建平移矩阵
    pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// 右手坐标系透视投影，深度映射到 [0, 1]
    ///
    /// 近平面映射到 0，远平面映射到 1。
    pub fn perspective_rh_zo(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
        let h = 1.0 / (fov_y * 0.5).tan();
        let w = h / aspect;
        let range = far / (near - far);

        Matrix4::new(
            w, 0.0, 0.0, 0.0,
            0.0, h, 0.0, 0.0,
            0.0, 0.0, range, range * near,
            0.0, 0.0, -1.0, 0.0,
        )
    }

    /// 按行导出矩阵
    ///
    /// 每个内层数组是矩阵的一行，等价于把转置后的矩阵按列主序存储。
    pub fn to_rows(m: &Matrix4) -> [[f32; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = m[(r, c)];
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: &Matrix4, z: f32) -> f32 {
        let clip = m * Vector4::new(0.0, 0.0, z, 1.0);
        clip.z / clip.w
    }

    #[test]
    fn test_matrix_translation() {
        let mat = matrix::translation(1.0, 2.0, 3.0);
        let point = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let result = mat * point;

        assert!((result.x - 1.0).abs() < 1e-6);
        assert!((result.y - 2.0).abs() < 1e-6);
        assert!((result.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = matrix::perspective_rh_zo(deg_to_rad(60.0), 4.0 / 3.0, 0.1, 100.0);

        // 右手坐标系：可见物体位于 -Z
        assert!(project(&proj, -0.1).abs() < 1e-5);
        assert!((project(&proj, -100.0) - 1.0).abs() < 1e-5);

        let mid = project(&proj, -10.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_perspective_aspect() {
        let proj = matrix::perspective_rh_zo(deg_to_rad(60.0), 2.0, 0.1, 100.0);
        assert!((proj[(1, 1)] / proj[(0, 0)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_rows_are_transposed_columns() {
        let mat = matrix::translation(1.0, 2.0, 3.0);
        let rows = matrix::to_rows(&mat);

        // nalgebra 的平移位于最后一列，按行导出后是每行的第 4 个元素
        assert_eq!(rows[0][3], 1.0);
        assert_eq!(rows[1][3], 2.0);
        assert_eq!(rows[2][3], 3.0);
        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
