//! 体素坐标到物理空间坐标的仿射变换.

use nifti::NiftiHeader;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// NIfTI `NIFTI_XFORM_SCANNER_ANAT`.
const XFORM_SCANNER_ANAT: i16 = 1;

/// 4x4 仿射矩阵, 将体素索引 `(i, j, k)` 映射到物理坐标 `(x, y, z)`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Affine([[f64; 4]; 4]);

impl Default for Affine {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// 单位变换.
    pub const fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// 由前三行构造, 第四行补 `[0, 0, 0, 1]`.
    pub const fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let [r0, r1, r2] = rows;
        Self([r0, r1, r2, [0.0, 0.0, 0.0, 1.0]])
    }

    /// 由完整的四行构造. 第四行必须是 `[0, 0, 0, 1]`, 否则返回 `None`.
    pub fn from_matrix(m: [[f64; 4]; 4]) -> Option<Self> {
        (m[3] == [0.0, 0.0, 0.0, 1.0]).then_some(Self(m))
    }

    /// 从 nifti header 的 sform 读取; `sform_code` 为 0 时返回 `None`.
    pub fn from_header(header: &NiftiHeader) -> Option<Self> {
        if header.sform_code <= 0 {
            return None;
        }
        let row = |r: [f32; 4]| r.map(f64::from);
        Some(Self::from_rows([
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
        ]))
    }

    /// 矩阵本身.
    #[inline]
    pub fn matrix(&self) -> &[[f64; 4]; 4] {
        &self.0
    }

    /// 将该变换写入 header 的 sform 字段.
    pub fn write_sform(&self, header: &mut NiftiHeader) {
        let row = |r: &[f64; 4]| r.map(|v| v as f32);
        header.srow_x = row(&self.0[0]);
        header.srow_y = row(&self.0[1]);
        header.srow_z = row(&self.0[2]);
        header.sform_code = XFORM_SCANNER_ANAT;
    }
}
