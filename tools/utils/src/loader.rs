//! 对 `net-centrality` 环境配置的一层封装. 提供更直接的配置加载.

use net_centrality::consts::afni::DEGREE_CENTRALITY_CMD;
use net_centrality::home;
use std::env;
use std::path::PathBuf;

/// 覆盖默认计算线程数的环境变量.
pub const NUM_THREADS_ENV: &str = "CENTRALITY_NUM_THREADS";

/// 获取 AFNI 安装目录.
///
/// 1. 若环境变量 `$AFNI_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/abin`.
pub fn afni_dir_from_env_or_home() -> Option<PathBuf> {
    home::afni_dir_from_env_or_home()
}

/// 获取 `3dDegreeCentrality` 可执行文件.
///
/// 1. 若 `explicit` 非空, 则返回其值;
/// 2. 否则若 AFNI 安装目录下存在该命令, 返回其全路径;
/// 3. 否则返回命令名, 由 `$PATH` 查找.
pub fn degree_cmd_or(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(home::degree_centrality_cmd)
}

/// 获取计算线程数.
///
/// 1. 若 `explicit` 非空, 则返回其值;
/// 2. 否则若环境变量 `$CENTRALITY_NUM_THREADS` 是正整数, 返回其值;
/// 3. 否则返回 1.
pub fn num_threads_or(explicit: Option<usize>) -> usize {
    explicit
        .or_else(|| {
            env::var(NUM_THREADS_ENV)
                .ok()
                .and_then(|v| v.trim().parse().ok())
        })
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// 描述当前配置, 用于启动时打印.
pub fn describe() -> String {
    format!(
        "AFNI 目录: {}\n{DEGREE_CENTRALITY_CMD}: {}\n可用核心数: {}",
        afni_dir_from_env_or_home().map_or_else(|| "/".to_string(), |d| d.display().to_string()),
        home::degree_centrality_cmd().display(),
        crate::cpus()
    )
}
