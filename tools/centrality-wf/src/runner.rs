//! 程序运行函数.

use crate::result::RunReport;
use crate::Cli;
use anyhow::Context;
use net_centrality::{DegreeCentrality, Pipeline, WorkflowConfig};
use std::time::Instant;
use utils::loader;

/// 根据命令行参数组装流水线.
pub fn build(args: &Cli) -> anyhow::Result<Pipeline> {
    let num_threads = loader::num_threads_or(args.threads);

    let mut degree = DegreeCentrality::with_cmd(loader::degree_cmd_or(args.afni_cmd.clone()));
    degree
        .prefix(args.prefix.as_str())
        .dataset(&args.dataset)
        .autoclip(args.autoclip)
        .automask(args.automask);
    if let Some(mask) = &args.mask {
        degree.mask(mask);
    }
    if let Some(t) = args.thresh {
        degree.thresh(t);
    }
    if let Some(s) = args.sparsity {
        degree.sparsity(s);
    }
    if let Some(p) = args.polort {
        degree.polort(p);
    }

    let config = WorkflowConfig {
        name: args.name.clone(),
        num_threads,
        memory_gb: args.memory_gb,
        run_eigen: args.eigen,
    };
    Pipeline::build(config, degree).context("组装流水线失败")
}

/// 实际运行.
pub fn run(args: &Cli) -> anyhow::Result<RunReport> {
    let pipeline = build(args)?;

    if args.describe {
        let json = serde_json::to_string_pretty(&pipeline)?;
        println!("{json}");
        return Ok(RunReport::described(pipeline.stages().len()));
    }

    log::info!(
        "运行流水线 `{}`, 共 {} 个阶段",
        pipeline.config().name,
        pipeline.stages().len()
    );
    let start = Instant::now();
    let outputs = pipeline
        .run(&args.work_dir)
        .with_context(|| format!("在 {} 下运行流水线失败", args.work_dir.display()))?;
    Ok(RunReport::finished(outputs, start.elapsed()))
}
