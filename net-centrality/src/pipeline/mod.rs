//! 网络中心度流水线描述.
//!
//! 流水线在构造时一次性确定:
//!
//! 1. `afni_degree_centrality`: 运行 `3dDegreeCentrality`;
//! 2. `run_eigen_node`: 仅在需要特征向量中心度时存在, 读取上一步的相似度矩阵;
//! 3. `output_node`: 汇总各阶段的输出.
//!
//! 描述本身可以序列化后交给外部调度器, 也可以用 [`Pipeline::run`] 在进程内顺序执行.

use std::env;
use std::io;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::consts::afni::DEFAULT_ONE_D;
use crate::eigen::CalcError;
use crate::interface::{CommandError, DegreeCentrality};

mod runner;

pub use runner::CentralityOutputs;

/// 各阶段名称.
pub mod stage {
    /// 运行 `3dDegreeCentrality`.
    pub const DEGREE: &str = "afni_degree_centrality";
    /// 计算特征向量中心度.
    pub const EIGEN: &str = "run_eigen_node";
    /// 汇总输出.
    pub const OUTPUT: &str = "output_node";
}

/// 各阶段的输入输出字段名.
pub mod field {
    /// 度中心度阶段输出: 度中心度图像.
    pub const DEGREE_OUTFILE: &str = "degree_outfile";
    /// 度中心度阶段输出: 相似度矩阵 1D 文件.
    pub const ONE_D_OUTFILE: &str = "one_d_outfile";
    /// 特征向量中心度阶段输入: 相似度矩阵 1D 文件.
    pub const ONE_D_FILE: &str = "one_d_file";
    /// 特征向量中心度阶段输出.
    pub const EIGEN_OUTFILE: &str = "eigen_outfile";
    /// 汇总阶段输入: 度中心度图像.
    pub const DEGREE_OUTPUT: &str = "degree_output";
    /// 汇总阶段输入: 相似度矩阵 1D 文件.
    pub const ONE_D_OUTPUT: &str = "one_d_output";
    /// 汇总阶段输入: 特征向量中心度图像.
    pub const EIGEN_OUTPUT: &str = "eigen_output";
}

/// 流水线配置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct WorkflowConfig {
    /// 流水线名, 同时作为工作目录下的子目录名.
    pub name: String,

    /// 每个计算阶段的线程数.
    pub num_threads: usize,

    /// 每个计算阶段的内存估计 (GB). 仅作为调度提示.
    pub memory_gb: f64,

    /// 是否追加特征向量中心度阶段.
    pub run_eigen: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: "network_centrality".to_owned(),
            num_threads: 1,
            memory_gb: 1.0,
            run_eigen: false,
        }
    }
}

/// 阶段的资源需求提示. 顺序执行器只记录, 不强制.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ResourceHint {
    /// 线程数.
    pub num_threads: usize,

    /// 内存估计 (GB).
    pub memory_gb: f64,
}

/// 从一个阶段的输出字段到另一个阶段输入字段的连接.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Connection {
    /// 上游阶段.
    pub from_stage: &'static str,
    /// 上游输出字段.
    pub from_field: &'static str,
    /// 下游阶段.
    pub to_stage: &'static str,
    /// 下游输入字段.
    pub to_field: &'static str,
}

impl Connection {
    const fn new(
        (from_stage, from_field): (&'static str, &'static str),
        (to_stage, to_field): (&'static str, &'static str),
    ) -> Self {
        Self {
            from_stage,
            from_field,
            to_stage,
            to_field,
        }
    }
}

/// 特征向量中心度阶段的固定参数. 相似度矩阵经连接传入.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct EigenTask {
    /// mask 或 atlas 文件的绝对路径.
    pub mask_file: PathBuf,

    /// 计算线程数.
    pub num_threads: usize,
}

/// 阶段要做的工作.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum StageKind {
    /// 运行外部度中心度命令.
    Degree(DegreeCentrality),
    /// 进程内计算特征向量中心度.
    Eigen(EigenTask),
    /// 汇总上游输出.
    Output,
}

/// 流水线中的一个阶段.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Stage {
    /// 阶段名, 见 [`stage`].
    pub name: &'static str,
    /// 阶段要做的工作.
    pub kind: StageKind,
    /// 输入连接.
    pub inputs: Vec<Connection>,
    /// 输出字段名, 见 [`field`].
    pub outputs: Vec<&'static str>,
    /// 资源需求提示.
    pub resources: ResourceHint,
}

impl Stage {
    /// 输入字段 `field` 的来源.
    pub fn input(&self, field: &str) -> Option<&Connection> {
        self.inputs.iter().find(|c| c.to_field == field)
    }
}

/// 单个阶段的失败原因.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// 外部命令失败.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// 特征向量中心度计算失败.
    #[error(transparent)]
    Calc(#[from] CalcError),
}

/// 流水线构造或执行错误.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 某个阶段执行失败. 后续阶段不会执行.
    #[error("阶段 `{stage}` 失败: {source}")]
    Stage {
        /// 失败的阶段.
        stage: &'static str,
        /// 失败原因.
        #[source]
        source: StageError,
    },

    /// 需要特征向量中心度, 但没有提供 mask.
    #[error("特征向量中心度需要 mask (或 atlas) 文件")]
    MissingMask,

    /// 阶段输入没有上游输出.
    #[error("阶段 `{stage}` 缺少输入 `{field}`")]
    MissingInput {
        /// 阶段名.
        stage: &'static str,
        /// 输入字段名.
        field: &'static str,
    },

    /// 创建工作目录失败.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub(crate) fn stage<E: Into<StageError>>(stage: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Stage {
            stage,
            source: e.into(),
        }
    }
}

/// 流水线运行时结果.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// 静态的多阶段流水线.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Pipeline {
    config: WorkflowConfig,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// 根据配置和已绑定参数的度中心度命令构造流水线.
    ///
    /// 输入文件中的相对路径相对当前工作目录解析.
    /// 需要特征向量中心度时, 强制输出 `similarity_matrix.1D`, 且必须提供 mask.
    pub fn build(config: WorkflowConfig, mut degree: DegreeCentrality) -> PipelineResult<Self> {
        let resources = ResourceHint {
            num_threads: config.num_threads.max(1),
            memory_gb: config.memory_gb,
        };
        degree
            .num_threads(resources.num_threads)
            .absolutize_inputs(env::current_dir()?);

        let mut stages = Vec::with_capacity(3);
        let mut collect = vec![
            Connection::new(
                (stage::DEGREE, field::DEGREE_OUTFILE),
                (stage::OUTPUT, field::DEGREE_OUTPUT),
            ),
            Connection::new(
                (stage::DEGREE, field::ONE_D_OUTFILE),
                (stage::OUTPUT, field::ONE_D_OUTPUT),
            ),
        ];

        let eigen = if config.run_eigen {
            let mask_file = degree
                .mask_file()
                .map(PathBuf::from)
                .ok_or(PipelineError::MissingMask)?;
            degree.out_1d(DEFAULT_ONE_D);
            collect.push(Connection::new(
                (stage::EIGEN, field::EIGEN_OUTFILE),
                (stage::OUTPUT, field::EIGEN_OUTPUT),
            ));
            Some(Stage {
                name: stage::EIGEN,
                kind: StageKind::Eigen(EigenTask {
                    mask_file,
                    num_threads: resources.num_threads,
                }),
                inputs: vec![Connection::new(
                    (stage::DEGREE, field::ONE_D_OUTFILE),
                    (stage::EIGEN, field::ONE_D_FILE),
                )],
                outputs: vec![field::EIGEN_OUTFILE],
                resources,
            })
        } else {
            None
        };

        stages.push(Stage {
            name: stage::DEGREE,
            kind: StageKind::Degree(degree),
            inputs: vec![],
            outputs: vec![field::DEGREE_OUTFILE, field::ONE_D_OUTFILE],
            resources,
        });
        stages.extend(eigen);
        stages.push(Stage {
            name: stage::OUTPUT,
            kind: StageKind::Output,
            inputs: collect,
            outputs: vec![field::DEGREE_OUTPUT, field::ONE_D_OUTPUT, field::EIGEN_OUTPUT],
            resources: ResourceHint {
                num_threads: 1,
                memory_gb: 0.0,
            },
        });

        log::debug!(
            "流水线 `{}`: {:?}",
            config.name,
            stages.iter().map(|s| s.name).collect::<Vec<_>>()
        );
        Ok(Self { config, stages })
    }

    /// 流水线配置.
    #[inline]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// 按执行顺序排列的阶段.
    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// 按名称查找阶段.
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// 所有阶段间的连接.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.stages.iter().flat_map(|s| s.inputs.iter())
    }
}
