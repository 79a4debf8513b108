//! 网络中心度流水线命令行入口.

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod result;
mod runner;

/// 基于 AFNI 3dDegreeCentrality 计算度中心度 (及特征向量中心度).
#[derive(Parser, Debug)]
#[clap(name = "centrality-wf")]
pub struct Cli {
    /// 4D 功能像.
    #[clap(long)]
    pub dataset: PathBuf,

    /// mask 或 atlas 模板. 计算特征向量中心度时必需.
    #[clap(long)]
    pub mask: Option<PathBuf>,

    /// 相关阈值.
    #[clap(long)]
    pub thresh: Option<f64>,

    /// 保留的相关值百分比.
    #[clap(long)]
    pub sparsity: Option<f64>,

    /// 去趋势多项式阶数.
    #[clap(long)]
    pub polort: Option<i64>,

    #[clap(long)]
    pub autoclip: bool,

    #[clap(long)]
    pub automask: bool,

    /// 度中心度输出文件名.
    #[clap(long, default_value = "degree_centrality.nii.gz")]
    pub prefix: String,

    /// 同时计算特征向量中心度.
    #[clap(long)]
    pub eigen: bool,

    /// 计算线程数. 未指定时读取 `$CENTRALITY_NUM_THREADS`, 默认为 1.
    #[clap(long)]
    pub threads: Option<usize>,

    /// 每个阶段的内存估计 (GB).
    #[clap(long, default_value = "1.0")]
    pub memory_gb: f64,

    /// `3dDegreeCentrality` 可执行文件. 未指定时在 `$AFNI_DIR` 或 `$HOME/abin` 下查找.
    #[clap(long)]
    pub afni_cmd: Option<PathBuf>,

    /// 工作目录.
    #[clap(long, default_value = ".")]
    pub work_dir: PathBuf,

    /// 流水线名.
    #[clap(long, default_value = "network_centrality")]
    pub name: String,

    /// 只打印流水线描述 (JSON), 不执行.
    #[clap(long)]
    pub describe: bool,

    #[clap(long, short)]
    pub verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).env().init()?;

    utils::sep();
    println!("{}", utils::loader::describe());
    utils::sep();

    let report = runner::run(&args)?;
    report.analyze();
    Ok(())
}
