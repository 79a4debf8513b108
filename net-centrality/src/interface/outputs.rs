//! 输出路径解析.

use std::path::{Component, Path, PathBuf};

/// 将 `path` 解析为绝对路径: 相对路径拼接到 `base` 之后, 再按字面消去 `.` 与 `..`.
///
/// 该函数不访问文件系统, 不解析符号链接.
pub fn absolutize<P: AsRef<Path>, B: AsRef<Path>>(base: B, path: P) -> PathBuf {
    let path = path.as_ref();
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.as_ref().join(path)
    };

    let mut ans = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                // 根目录的父目录仍是根目录.
                if !matches!(ans.components().next_back(), Some(Component::RootDir) | None) {
                    ans.pop();
                }
            }
            other => ans.push(other.as_os_str()),
        }
    }
    ans
}

#[cfg(test)]
mod tests {
    use super::absolutize;
    use std::path::Path;

    #[test]
    fn test_absolutize() {
        let base = Path::new("/work/node");
        assert_eq!(absolutize(base, "deg.nii"), Path::new("/work/node/deg.nii"));
        assert_eq!(absolutize(base, "./a/../deg.nii"), Path::new("/work/node/deg.nii"));
        assert_eq!(absolutize(base, "../x.1D"), Path::new("/work/x.1D"));
        assert_eq!(absolutize(base, "/abs/y.1D"), Path::new("/abs/y.1D"));
        assert_eq!(absolutize("/", "../../z"), Path::new("/z"));
    }
}
