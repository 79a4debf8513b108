//! 通用常量.

/// 外部 AFNI 命令.
pub mod afni {
    /// 度中心度计算命令名. 该命令需要在 `$PATH` 或 AFNI 安装目录下可执行.
    pub const DEGREE_CENTRALITY_CMD: &str = "3dDegreeCentrality";

    /// 需要输出相似度矩阵时, 流水线默认使用的 1D 文件名.
    pub const DEFAULT_ONE_D: &str = "similarity_matrix.1D";

    /// 控制 AFNI 命令内部 OpenMP 线程数的环境变量.
    pub const OMP_NUM_THREADS: &str = "OMP_NUM_THREADS";

    /// 控制 MKL 内部线程数的环境变量.
    pub const MKL_NUM_THREADS: &str = "MKL_NUM_THREADS";

    /// AFNI 安装目录的环境变量. 未设置时回退到 `$HOME/abin`.
    pub const AFNI_DIR_ENV: &str = "AFNI_DIR";
}

/// 模板 (mask / atlas) 像素值.
pub mod label {
    /// 背景体素值.
    pub const BACKGROUND: f32 = 0.0;

    /// 像素是否是背景?
    #[inline]
    pub fn is_background(p: f32) -> bool {
        p == BACKGROUND
    }

    /// 像素是否是前景 (被 mask 选中, 或属于 atlas 的某个区域)?
    #[inline]
    pub fn is_foreground(p: f32) -> bool {
        !is_background(p)
    }
}

/// 求解的特征对个数.
pub const EIGEN_NUM_EIGS: usize = 1;

/// 迭代求解器的最大迭代次数. 超出即视为不收敛.
pub const EIGEN_MAX_ITER: usize = 1000;

/// LOBPCG 残差收敛阈值.
pub const EIGEN_TOL: f32 = 1e-7;

/// 节点数不超过该值时直接做稠密分解.
pub const DENSE_FALLBACK_NODES: usize = 64;

/// 特征向量中心度结果的标签名.
pub const EIGEN_CENTRALITY_NAME: &str = "eigenvector_centrality";

/// 特征向量中心度默认输出文件名.
pub const EIGEN_OUTFILE: &str = "eigenvector_centrality.nii.gz";

/// 模板类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateType {
    /// 二值 mask, 每个前景体素都是一个独立节点. 编码为 `0`.
    Mask,

    /// 多区域 atlas, 每个区域是一个节点. 编码为 `1`.
    Atlas,
}

impl TemplateType {
    /// 数值编码, 与历史流水线的 `template_type` 一致.
    #[inline]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Mask => 0,
            Self::Atlas => 1,
        }
    }
}
