//! 命令行的组装, 校验与执行.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

#[cfg(feature = "serde")]
use serde::Serialize;

use super::param::{ParamSpec, ParamTable, ParamValue, ValueKind};
use super::{CommandError, CommandResult};

/// 绑定了参数值和环境变量的外部命令.
///
/// 参数以任意顺序绑定, 生成的命令行顺序只由描述表决定.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CommandLine {
    cmd: PathBuf,
    table: ParamTable,
    values: BTreeMap<&'static str, ParamValue>,
    environ: BTreeMap<String, String>,
}

impl CommandLine {
    /// 以可执行文件 `cmd` 和参数描述表 `table` 创建命令.
    pub fn new<P: Into<PathBuf>>(cmd: P, table: ParamTable) -> Self {
        Self {
            cmd: cmd.into(),
            table,
            values: BTreeMap::new(),
            environ: BTreeMap::new(),
        }
    }

    /// 可执行文件.
    #[inline]
    pub fn cmd(&self) -> &Path {
        &self.cmd
    }

    /// 参数描述表.
    #[inline]
    pub fn table(&self) -> &ParamTable {
        &self.table
    }

    /// 绑定参数. 参数名未知或值类型不符时返回 `Err`.
    pub fn set<V: Into<ParamValue>>(&mut self, name: &str, value: V) -> CommandResult<&mut Self> {
        let spec = self
            .table
            .get(name)
            .ok_or_else(|| CommandError::UnknownParam(name.to_owned()))?;
        let value = value.into();
        if !value.fits(spec.kind) {
            return Err(CommandError::KindMismatch {
                name: spec.name,
                expected: spec.kind,
            });
        }
        self.values.insert(spec.name, value);
        Ok(self)
    }

    /// 获取已绑定的值.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// 参数是否已绑定.
    #[inline]
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// 设置一个环境变量. 调用时它会覆盖继承自当前进程的同名变量.
    #[inline]
    pub fn set_env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.environ.insert(key.into(), value.into());
        self
    }

    /// 额外的环境变量.
    #[inline]
    pub fn environ(&self) -> &BTreeMap<String, String> {
        &self.environ
    }

    /// 校验参数: 必需参数必须绑定, `ExistingFile` 参数指向的文件必须存在.
    ///
    /// 相对路径相对于 `cwd` 检查 (为 `None` 时相对于当前进程工作目录).
    pub fn validate(&self, cwd: Option<&Path>) -> CommandResult<()> {
        if let Some(spec) = self.table.mandatory().find(|s| !self.is_set(s.name)) {
            return Err(CommandError::MissingMandatory(spec.name));
        }
        for spec in self.table.iter().filter(|s| s.kind == ValueKind::ExistingFile) {
            if let Some(ParamValue::File(path)) = self.values.get(spec.name) {
                let full = match cwd {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path.clone(),
                };
                if !full.is_file() {
                    return Err(CommandError::FileNotFound {
                        name: spec.name,
                        path: path.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// 生成参数列表 (不含可执行文件本身).
    ///
    /// 顺序: 显式位置参数升序, 无位置开关按声明顺序, 末尾位置参数最后.
    /// 该函数不做校验, 未绑定的参数直接跳过.
    pub fn args(&self) -> Vec<OsString> {
        self.table
            .ordered()
            .filter_map(|spec| self.values.get(spec.name).map(|v| (spec, v)))
            .flat_map(|(spec, v): (&ParamSpec, &ParamValue)| spec.expand(v))
            .collect()
    }

    /// 类 shell 的命令行文本, 仅用于日志.
    pub fn cmdline(&self) -> String {
        std::iter::once(self.cmd.as_os_str().to_owned())
            .chain(self.args())
            .map(|a| {
                let a = a.to_string_lossy();
                if a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 校验后构造 [`Command`]. 额外环境变量合并在继承的进程环境之上.
    pub fn to_command(&self, cwd: Option<&Path>) -> CommandResult<Command> {
        self.validate(cwd)?;
        let mut command = Command::new(&self.cmd);
        command.args(self.args()).envs(&self.environ);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        Ok(command)
    }

    /// 在 `cwd` 下执行命令并等待结束.
    ///
    /// 校验失败时不会启动进程. 非零退出码视为失败, 不做重试.
    pub fn run(&self, cwd: &Path) -> CommandResult<Output> {
        let mut command = self.to_command(Some(cwd))?;
        log::debug!("在 {} 下运行 `{}`", cwd.display(), self.cmdline());

        let output = command.output().map_err(|source| CommandError::Spawn {
            cmd: self.cmd.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                cmd: self.cmd.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}
