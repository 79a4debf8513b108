//! AFNI `3dDegreeCentrality` 命令描述.

use std::env;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::Serialize;

use super::outputs::absolutize;
use super::param::{ParamSpec, ParamTable, ParamValue, Position, ValueKind};
use super::{CommandLine, CommandError, CommandResult};
use crate::consts::afni::{DEGREE_CENTRALITY_CMD, OMP_NUM_THREADS};

static DEGREE_CENTRALITY_PARAMS: Lazy<ParamTable> = Lazy::new(|| {
    use Position::*;
    use ValueKind::*;

    // 该表是静态的, 不会生成 `Err`, 可直接 unwrap.
    ParamTable::new(vec![
        ParamSpec::new("prefix", "-prefix %s", At(0), Str)
            .mandatory()
            .desc("Output file name prefix"),
        ParamSpec::new("mask", "-mask %s", At(1), ExistingFile)
            .desc("Mask file to use on input data"),
        ParamSpec::new("thresh", "-thresh %f", At(2), Float)
            .desc("Threshold to exclude where corr <= thresh"),
        ParamSpec::new("sparsity", "-sparsity %f", At(3), Float)
            .desc("The percentage of correlations to keep"),
        ParamSpec::new("out_1d", "-out1D %s", At(4), Str)
            .desc("Filepath to output 1D file with similarity matrix"),
        ParamSpec::new("polort", "-polort %d", At(5), Int)
            .desc("Polynomial order of detrending"),
        ParamSpec::new("autoclip", "-autoclip", Unordered, Bool)
            .desc("Clip off low-intensity regions in the dataset"),
        ParamSpec::new("automask", "-automask", Unordered, Bool)
            .desc("Mask the dataset to target brain-only voxels"),
        ParamSpec::new("dataset", "%s", Trailing, ExistingFile)
            .desc("Functional input dataset to use"),
    ])
    .unwrap()
});

/// `3dDegreeCentrality` 的参数描述表.
#[inline]
pub fn degree_centrality_params() -> &'static ParamTable {
    &DEGREE_CENTRALITY_PARAMS
}

/// `3dDegreeCentrality` 运行后的输出.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DegreeCentralityOutputs {
    /// 二值化与加权度中心度两个子体组成的 nifti 图像.
    pub degree_outfile: PathBuf,

    /// 阈值化后的相似度矩阵文本 (一维与 ijk 体素索引, 相关值, 图像范围, 仿射矩阵).
    /// 仅当设置了 `out_1d` 时存在.
    pub one_d_outfile: Option<PathBuf>,
}

/// `3dDegreeCentrality` 命令.
///
/// 只提供强类型的绑定方法; 底层 [`CommandLine`] 可以通过 [`Self::command`] 访问.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DegreeCentrality {
    inner: CommandLine,
}

impl Default for DegreeCentrality {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! typed_setter {
    ($(#[$doc: meta])* $fn_name: ident, $param: literal, $ty: ty, $conv: expr) => {
        $(#[$doc])*
        pub fn $fn_name(&mut self, value: $ty) -> &mut Self {
            self.bind($param, $conv(value.into()));
            self
        }
    };
}

impl DegreeCentrality {
    /// 使用 `$PATH` 中的 `3dDegreeCentrality`.
    pub fn new() -> Self {
        Self::with_cmd(DEGREE_CENTRALITY_CMD)
    }

    /// 使用指定的可执行文件.
    pub fn with_cmd<P: Into<PathBuf>>(cmd: P) -> Self {
        Self {
            inner: CommandLine::new(cmd, degree_centrality_params().clone()),
        }
    }

    /// 底层命令.
    #[inline]
    pub fn command(&self) -> &CommandLine {
        &self.inner
    }

    /// 参数名来自静态表, 值类型由各 setter 保证.
    fn bind(&mut self, name: &str, value: ParamValue) {
        self.inner
            .set(name, value)
            .expect("setter 与静态参数表不一致");
    }

    typed_setter!(
        /// 输出文件名前缀 (必需).
        prefix, "prefix", impl Into<String>, |v: String| ParamValue::Str(v)
    );

    typed_setter!(
        /// mask 文件.
        mask, "mask", impl Into<PathBuf>, |v: PathBuf| ParamValue::File(v)
    );

    typed_setter!(
        /// 相关阈值: 相关值 `<= thresh` 的连接被排除.
        thresh, "thresh", f64, ParamValue::Float
    );

    typed_setter!(
        /// 保留的相关值百分比.
        sparsity, "sparsity", f64, ParamValue::Float
    );

    typed_setter!(
        /// 相似度矩阵 1D 输出文件.
        out_1d, "out_1d", impl Into<String>, |v: String| ParamValue::Str(v)
    );

    typed_setter!(
        /// 去趋势多项式阶数.
        polort, "polort", i64, ParamValue::Int
    );

    typed_setter!(
        /// 是否截去低强度区域.
        autoclip, "autoclip", bool, ParamValue::Bool
    );

    typed_setter!(
        /// 是否自动生成脑 mask.
        automask, "automask", bool, ParamValue::Bool
    );

    typed_setter!(
        /// 4D 功能像输入数据.
        dataset, "dataset", impl Into<PathBuf>, |v: PathBuf| ParamValue::File(v)
    );

    /// 限制外部命令内部的 OpenMP 线程数.
    pub fn num_threads(&mut self, n: usize) -> &mut Self {
        self.inner.set_env(OMP_NUM_THREADS, n.max(1).to_string());
        self
    }

    /// 已绑定的 mask 文件.
    pub fn mask_file(&self) -> Option<&Path> {
        match self.inner.get("mask") {
            Some(ParamValue::File(p)) => Some(p),
            _ => None,
        }
    }

    /// 将 `mask` 与 `dataset` 中的相对路径相对 `base` 变为绝对路径,
    /// 以便在其他工作目录下执行.
    pub fn absolutize_inputs<P: AsRef<Path>>(&mut self, base: P) -> &mut Self {
        for name in ["mask", "dataset"] {
            if let Some(ParamValue::File(p)) = self.inner.get(name) {
                let abs = absolutize(base.as_ref(), p);
                self.bind(name, ParamValue::File(abs));
            }
        }
        self
    }

    /// 解析输出路径: `prefix` 总是对应度中心度图像, `out_1d` 仅在设置时对应相似度矩阵.
    ///
    /// 相对路径相对于 `base`. 未设置 `prefix` 时返回 `MissingMandatory`.
    pub fn list_outputs_in<P: AsRef<Path>>(
        &self,
        base: P,
    ) -> CommandResult<DegreeCentralityOutputs> {
        let base = base.as_ref();
        let degree_outfile = match self.inner.get("prefix") {
            Some(ParamValue::Str(prefix)) => absolutize(base, prefix),
            _ => return Err(CommandError::MissingMandatory("prefix")),
        };
        let one_d_outfile = match self.inner.get("out_1d") {
            Some(ParamValue::Str(one_d)) => Some(absolutize(base, one_d)),
            _ => None,
        };
        Ok(DegreeCentralityOutputs {
            degree_outfile,
            one_d_outfile,
        })
    }

    /// 相对于当前进程工作目录解析输出路径.
    pub fn list_outputs(&self) -> CommandResult<DegreeCentralityOutputs> {
        self.list_outputs_in(env::current_dir()?)
    }

    /// 在 `cwd` 下运行命令并返回解析后的输出路径.
    pub fn run<P: AsRef<Path>>(&self, cwd: P) -> CommandResult<DegreeCentralityOutputs> {
        let cwd = cwd.as_ref();
        self.inner.run(cwd)?;
        let outputs = self.list_outputs_in(cwd)?;
        log::info!(
            "度中心度已写入 {}",
            outputs.degree_outfile.display()
        );
        Ok(outputs)
    }
}
