//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::consts::afni::{DEFAULT_ONE_D, DEGREE_CENTRALITY_CMD};
pub use crate::consts::{TemplateType, EIGEN_OUTFILE};

pub use crate::data::{write_centrality, Affine, CentralityMap, NiftiHeaderAttr, Template};
pub use crate::eigen::{calc_eigen_from_1d, CalcError, EigenCentrality, EigenSolver};
pub use crate::home::{afni_dir_from_env_or_home, degree_centrality_cmd};
pub use crate::interface::{CommandError, CommandLine, DegreeCentrality, DegreeCentralityOutputs};
pub use crate::one_d::SimilarityMatrix;
pub use crate::pipeline::{
    CentralityOutputs, Pipeline, PipelineError, StageKind, WorkflowConfig,
};
