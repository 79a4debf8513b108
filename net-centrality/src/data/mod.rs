use std::collections::BTreeSet;
use std::path::Path;

use ndarray::{Array3, ArrayView1, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use ordered_float::OrderedFloat;

use crate::consts::label::{is_foreground, BACKGROUND};
use crate::consts::TemplateType;
use crate::Idx3d;

mod affine;
mod image;

pub use affine::Affine;
pub use image::{write_centrality, CentralityMap};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 读取模板的错误.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// nifti 文件读取错误.
    #[error("读取 nifti 文件失败: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 模板不是三维体数据 (允许末维长度为 1 的四维数据).
    #[error("模板必须是三维体数据, 实际形状为 {0:?}")]
    NotVolume(Vec<usize>),

    /// 模板中没有任何前景体素.
    #[error("模板中没有任何前景体素")]
    Empty,
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// header 中的 sform 仿射矩阵; 未设置时为 `None`.
    #[inline]
    fn sform(&self) -> Option<Affine> {
        Affine::from_header(self.header())
    }
}

/// 体素到图节点的映射.
#[derive(Debug, Clone)]
enum NodeIndex {
    /// 每个前景体素一个节点. 按一维索引升序保存前景体素.
    Voxels(Vec<usize>),

    /// 每个区域一个节点. 按标签值升序保存.
    Regions(Vec<OrderedFloat<f32>>),
}

/// nii 格式的 mask 或 atlas 模板.
///
/// 数据按 `(z, y, x)` 标准布局保存, 因此行优先的一维索引
/// 与 AFNI 的一维体素索引 `i + j * nx + k * nx * ny` 一致.
#[derive(Debug, Clone)]
pub struct Template {
    header: BoxedHeader,
    data: Array3<f32>,
    kind: TemplateType,
    nodes: NodeIndex,
}

impl NiftiHeaderAttr for Template {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Template {
    /// 打开 nii 文件格式的模板. 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();

        let data = obj.into_volume().into_ndarray::<f32>()?;
        let data = match data.ndim() {
            3 => data,
            4 if data.shape()[3] == 1 => data.index_axis_move(Axis(3), 0),
            _ => return Err(TemplateError::NotVolume(data.shape().to_vec())),
        };
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| TemplateError::NotVolume(vec![]))?;

        Self::from_parts(header, data)
    }

    /// 根据 header 和按 \[x, y, z\] 组织的体素数据创建模板.
    ///
    /// header 中的维度信息会被 `data` 的形状覆盖.
    pub fn from_parts(mut header: NiftiHeader, data: Array3<f32>) -> Result<Self, TemplateError> {
        // [x, y, z] -> [z, y, x]
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        let (z, y, x) = data.dim();
        header.dim = [3, x as u16, y as u16, z as u16, 1, 1, 1, 1];

        let kind = Self::classify(data.view());
        let nodes = match kind {
            TemplateType::Mask => NodeIndex::Voxels(
                data.iter()
                    .enumerate()
                    .filter_map(|(i, &v)| is_foreground(v).then_some(i))
                    .collect(),
            ),
            TemplateType::Atlas => {
                NodeIndex::Regions(distinct_foreground(data.view()).into_iter().collect())
            }
        };

        let ans = Self {
            header: Box::new(header),
            data,
            kind,
            nodes,
        };
        if ans.node_len() == 0 {
            return Err(TemplateError::Empty);
        }
        Ok(ans)
    }

    /// 判断模板类型: 前景 (非零) 取值种类多于 2 时视为 atlas, 否则为 mask.
    pub fn classify(data: ArrayView3<f32>) -> TemplateType {
        if distinct_foreground(data).len() > 2 {
            TemplateType::Atlas
        } else {
            TemplateType::Mask
        }
    }

    /// 模板类型.
    #[inline]
    pub fn template_type(&self) -> TemplateType {
        self.kind
    }

    /// 节点个数: mask 为前景体素数, atlas 为区域数.
    pub fn node_len(&self) -> usize {
        match &self.nodes {
            NodeIndex::Voxels(v) => v.len(),
            NodeIndex::Regions(r) => r.len(),
        }
    }

    /// 一维体素索引对应的节点; 背景或越界时为 `None`.
    pub fn node_of(&self, voxel: usize) -> Option<usize> {
        let value = *self.data.as_slice()?.get(voxel)?;
        if !is_foreground(value) {
            return None;
        }
        match &self.nodes {
            NodeIndex::Voxels(v) => v.binary_search(&voxel).ok(),
            NodeIndex::Regions(r) => r.binary_search(&OrderedFloat(value)).ok(),
        }
    }

    /// atlas 各区域的标签值, 按升序排列; mask 返回 `None`.
    pub fn region_labels(&self) -> Option<Vec<f32>> {
        match &self.nodes {
            NodeIndex::Regions(r) => Some(r.iter().map(|v| v.0).collect()),
            NodeIndex::Voxels(_) => None,
        }
    }

    /// 将节点取值放回体素网格. mask 中每个前景体素取其节点值,
    /// atlas 中同一区域的所有体素取该区域的值, 背景保持为 0.
    ///
    /// `values` 长度必须等于 [`Self::node_len`], 否则程序 panic.
    pub fn scatter(&self, values: ArrayView1<f64>) -> Array3<f32> {
        assert_eq!(values.len(), self.node_len(), "节点取值个数与模板节点数不一致");
        let mut out = Array3::<f32>::from_elem(self.data.dim(), BACKGROUND);
        match &self.nodes {
            NodeIndex::Voxels(v) => {
                // 标准布局, 一维索引即行优先偏移.
                if let Some(flat) = out.as_slice_mut() {
                    for (node, &voxel) in v.iter().enumerate() {
                        flat[voxel] = values[node] as f32;
                    }
                }
            }
            NodeIndex::Regions(r) => {
                for (o, &label) in out.iter_mut().zip(self.data.iter()) {
                    if let Ok(node) = r.binary_search(&OrderedFloat(label)) {
                        *o = values[node] as f32;
                    }
                }
            }
        }
        out
    }

    /// 获得数据的一份不可变 shallow copy, 按 `(z, y, x)` 排列.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 获取模板中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: f32) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }
}

/// 前景取值集合, 升序.
fn distinct_foreground(data: ArrayView3<f32>) -> BTreeSet<OrderedFloat<f32>> {
    data.iter()
        .copied()
        .filter(|&v| is_foreground(v) && !v.is_nan())
        .map(OrderedFloat)
        .collect()
}
