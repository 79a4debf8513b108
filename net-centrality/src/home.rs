//! AFNI 安装目录.

use std::env;
use std::path::{Path, PathBuf};

use crate::consts::afni::{AFNI_DIR_ENV, DEGREE_CENTRALITY_CMD};

/// 获取 `{用户主目录}/abin` 目录下给定继续项组成的全路径.
pub fn home_afni_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("abin");
    ans.extend(it);
    Some(ans)
}

/// 获取 AFNI 安装目录.
///
/// 1. 若环境变量 `$AFNI_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/abin`. 无法确定用户主目录时返回 `None`.
pub fn afni_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var_os(AFNI_DIR_ENV) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_afni_dir_with(std::iter::empty::<&str>()),
    }
}

/// 定位 `3dDegreeCentrality`.
///
/// AFNI 目录下存在该文件时返回其全路径, 否则返回命令名, 交给 `$PATH` 查找.
pub fn degree_centrality_cmd() -> PathBuf {
    afni_dir_from_env_or_home()
        .map(|d| d.join(DEGREE_CENTRALITY_CMD))
        .filter(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from(DEGREE_CENTRALITY_CMD))
}
