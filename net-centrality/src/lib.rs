#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 基于 AFNI `3dDegreeCentrality` 计算 fMRI 功能像的网络中心度.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 度中心度由外部 AFNI 命令计算, 本 crate 只负责命令组装, 校验与输出路径解析.
//!   该命令需要在 `$PATH` 或 `$AFNI_DIR` (默认 `$HOME/abin`) 下可执行.
//! 2. 特征向量中心度在进程内计算, 特征值求解交给 `ndarray-linalg`.
//! 3. 所有体数据均按 `(z, y, x)` 标准布局保存, 行优先一维索引与 AFNI 的体素索引一致.
//!
//! # 组成
//!
//! ### 外部命令描述 ✅
//!
//! 参数描述表, 命令行组装与校验, 输出路径解析.
//!
//! 实现位于 `net-centrality/src/interface`.
//!
//! ### 相似度矩阵 1D 文件 ✅
//!
//! `3dDegreeCentrality -out1D` 的文本格式, 支持 gzip 压缩.
//!
//! 实现位于 `net-centrality/src/one_d`.
//!
//! ### mask / atlas 模板与结果图像 ✅
//!
//! 实现位于 `net-centrality/src/data`.
//!
//! ### 特征向量中心度 ✅
//!
//! 节点图构造, LOBPCG / 稠密分解, 线程数约束.
//!
//! 实现位于 `net-centrality/src/eigen`.
//!
//! ### 流水线 ✅
//!
//! 静态的两阶段描述及进程内顺序执行器.
//!
//! 实现位于 `net-centrality/src/pipeline`.

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

/// nii 模板与中心度图像.
pub mod data;

pub mod eigen;
pub mod home;
pub mod interface;
pub mod one_d;
pub mod pipeline;
pub mod prelude;

pub use data::{NiftiHeaderAttr, Template};
pub use eigen::calc_eigen_from_1d;
pub use interface::{DegreeCentrality, DegreeCentralityOutputs};
pub use pipeline::{CentralityOutputs, Pipeline, WorkflowConfig};
