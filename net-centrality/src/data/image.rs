//! 中心度图像的组织与写出.

use std::path::Path;

use ndarray::{Array1, Array3, ArrayView1, ArrayView3};
use nifti::writer::WriterOptions;
use nifti::NiftiError;

use super::{Affine, NiftiHeaderAttr, Template};

/// 单个中心度指标在模板上的取值.
#[derive(Debug, Clone)]
pub struct CentralityMap {
    /// 指标名.
    name: &'static str,

    /// 各节点的中心度.
    values: Array1<f64>,

    /// 散布到体素网格后的图像, 按 `(z, y, x)` 排列.
    volume: Array3<f32>,

    /// 输出图像使用的仿射变换.
    affine: Affine,
}

impl CentralityMap {
    /// 根据节点取值在 `template` 上构造名为 `name` 的中心度图像.
    pub fn new(name: &'static str, template: &Template, values: Array1<f64>, affine: Affine) -> Self {
        let volume = template.scatter(values.view());
        Self {
            name,
            values,
            volume,
            affine,
        }
    }

    /// 指标名.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 各节点的中心度.
    #[inline]
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// 体素图像, 按 `(z, y, x)` 排列.
    #[inline]
    pub fn volume(&self) -> ArrayView3<'_, f32> {
        self.volume.view()
    }

    /// 输出图像使用的仿射变换.
    #[inline]
    pub fn affine(&self) -> &Affine {
        &self.affine
    }
}

/// 以 `template` 的 header 为参考, 将 `map` 写到 `path`.
///
/// 写出的 header 使用 `map` 的仿射变换作为 sform, 且不做强度缩放.
/// 后缀为 `.nii.gz` 时自动压缩.
pub fn write_centrality<P: AsRef<Path>>(
    path: P,
    template: &Template,
    map: &CentralityMap,
) -> Result<(), NiftiError> {
    let mut header = template.header().clone();
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    map.affine.write_sform(&mut header);

    // [z, y, x] -> [x, y, z]
    let data = map.volume.view().permuted_axes([2, 1, 0]);
    log::debug!(
        "写出 {} 图像 {:?}, 形状 {:?}",
        map.name,
        path.as_ref(),
        data.dim()
    );
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::write_template;
    use ndarray::{arr1, Array3};

    #[test]
    fn test_write_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mask_path = dir.path().join("mask.nii");
        let mask = Array3::from_shape_fn((2, 2, 1), |(x, y, _)| if x == y { 1.0 } else { 0.0 });
        write_template(&mask_path, &mask);

        let template = Template::open(&mask_path).unwrap();
        let affine = Affine::from_rows([
            [2.0, 0.0, 0.0, -4.0],
            [0.0, 2.0, 0.0, -4.0],
            [0.0, 0.0, 2.0, 0.0],
        ]);
        let map = CentralityMap::new("test", &template, arr1(&[0.25, 0.75]), affine);
        assert_eq!(map.values().len(), 2);
        assert_eq!(map.name(), "test");

        let out = dir.path().join("out.nii.gz");
        write_centrality(&out, &template, &map).unwrap();

        // 重新读入后, 值应位于原先的前景体素上.
        let back = Template::open(&out).unwrap();
        assert_eq!(back.shape(), (1, 2, 2));
        assert_eq!(back.data()[(0, 0, 0)], 0.25);
        assert_eq!(back.data()[(0, 1, 1)], 0.75);
        assert_eq!(back.data()[(0, 0, 1)], 0.0);
        assert_eq!(back.sform(), Some(affine));
    }
}
