//! 特征向量中心度计算的运行时错误.

use crate::data::TemplateError;
use crate::one_d::ParseError;
use crate::Idx3d;

/// 计算特征向量中心度的错误.
#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    /// 相似度矩阵文件解析失败.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// 模板读取失败.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// 相似度矩阵与模板的网格大小不一致. 均按 `(nx, ny, nz)` 排列.
    #[error("相似度矩阵网格 {sim:?} 与模板网格 {template:?} 不一致")]
    ShapeMismatch {
        /// 相似度矩阵网格.
        sim: Idx3d,
        /// 模板网格.
        template: Idx3d,
    },

    /// 图中没有节点.
    #[error("图中没有节点")]
    EmptyGraph,

    /// 特征值求解在 `max_iter` 次迭代内未收敛.
    #[error("特征值求解在 {max_iter} 次迭代内未收敛: {reason}")]
    NotConverged {
        /// 迭代上限.
        max_iter: usize,
        /// 未收敛的细节, 如最终残差.
        reason: String,
    },

    /// 特征值求解器的其它错误.
    #[error("特征值求解失败: {0}")]
    Solver(String),

    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 写出结果图像失败.
    #[error("写出中心度图像失败: {0}")]
    Write(#[source] nifti::NiftiError),
}

/// 计算结果.
pub type CalcResult<T> = Result<T, CalcError>;
