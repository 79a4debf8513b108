//! 外部命令接口.
//!
//! 一个外部命令由 [`ParamTable`] 声明其全部参数, 由 [`CommandLine`]
//! 绑定参数值与环境变量, 在调用前完成校验并生成顺序固定的命令行.
//! [`DegreeCentrality`] 是 AFNI `3dDegreeCentrality` 的具体描述.

use std::io;
use std::path::PathBuf;

mod command;
mod degree;
mod outputs;
mod param;

pub use command::CommandLine;
pub use degree::{degree_centrality_params, DegreeCentrality, DegreeCentralityOutputs};
pub use outputs::absolutize;
pub use param::{ParamSpec, ParamTable, ParamValue, Position, ValueKind};

/// 命令描述, 校验或执行错误.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// 参数描述表本身不合法.
    #[error("参数描述表不合法: {0}")]
    Descriptor(String),

    /// 描述表中没有该参数.
    #[error("未知参数 `{0}`")]
    UnknownParam(String),

    /// 参数值类型与描述不符.
    #[error("参数 `{name}` 需要 {expected:?} 类型的值")]
    KindMismatch {
        /// 参数名.
        name: &'static str,
        /// 期望类型.
        expected: ValueKind,
    },

    /// 缺少必需参数. 该错误总在启动外部进程之前产生.
    #[error("缺少必需参数 `{0}`")]
    MissingMandatory(&'static str),

    /// `ExistingFile` 参数指向的文件不存在.
    #[error("参数 `{name}` 指向的文件不存在: {}", .path.display())]
    FileNotFound {
        /// 参数名.
        name: &'static str,
        /// 文件路径.
        path: PathBuf,
    },

    /// 无法启动外部进程.
    #[error("无法启动 `{}`: {source}", .cmd.display())]
    Spawn {
        /// 可执行文件.
        cmd: PathBuf,
        /// 底层 I/O 错误.
        #[source]
        source: io::Error,
    },

    /// 外部进程以非零状态退出.
    #[error("`{}` 以非零状态退出 (code = {code:?}): {stderr}", .cmd.display())]
    NonZeroExit {
        /// 可执行文件.
        cmd: PathBuf,
        /// 退出码; 被信号终止时为 `None`.
        code: Option<i32>,
        /// 标准错误输出.
        stderr: String,
    },

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// 命令接口运行时结果.
pub type CommandResult<T> = Result<T, CommandError>;
