//! 命令行参数描述符.
//!
//! 每个外部命令都由一张有序的 [`ParamTable`] 描述. 表中每一项 [`ParamSpec`]
//! 记录参数名, 命令行模板, 位置, 取值类型以及是否必需.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use itertools::Itertools;

#[cfg(feature = "serde")]
use serde::Serialize;

use super::{CommandError, CommandResult};

/// 参数在命令行中的位置.
///
/// 变体的声明顺序即排序顺序: 所有 `At` 按序号升序排在最前,
/// 其后是 `Unordered`, 最后是唯一的 `Trailing`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Position {
    /// 显式位置.
    At(u32),

    /// 无显式位置, 按声明顺序排列.
    Unordered,

    /// 末尾的无 flag 位置参数.
    Trailing,
}

/// 参数取值类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ValueKind {
    /// 任意字符串, 模板占位符 `%s`.
    Str,

    /// 调用前必须存在的文件, 模板占位符 `%s`.
    ExistingFile,

    /// 浮点数, 模板占位符 `%f` (六位小数).
    Float,

    /// 整数, 模板占位符 `%d`.
    Int,

    /// 开关, 模板中没有占位符; 仅当取值为 `true` 时出现.
    Bool,
}

impl ValueKind {
    /// 该类型在模板中对应的占位符.
    #[inline]
    pub const fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Str | Self::ExistingFile => Some("%s"),
            Self::Float => Some("%f"),
            Self::Int => Some("%d"),
            Self::Bool => None,
        }
    }
}

/// 参数值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ParamValue {
    /// 字符串.
    Str(String),

    /// 文件路径.
    File(PathBuf),

    /// 浮点数.
    Float(f64),

    /// 整数.
    Int(i64),

    /// 开关.
    Bool(bool),
}

impl ParamValue {
    /// 该值能否绑定到 `kind` 类型的参数上.
    pub fn fits(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (Self::Str(_), ValueKind::Str)
                | (Self::File(_), ValueKind::ExistingFile)
                | (Self::Float(_), ValueKind::Float)
                | (Self::Int(_), ValueKind::Int)
                | (Self::Bool(_), ValueKind::Bool)
        )
    }

    /// 按 printf 风格渲染: `%f` 六位小数, `%d` 十进制整数.
    fn render(&self) -> OsString {
        match self {
            Self::Str(s) => OsString::from(s),
            Self::File(p) => p.clone().into_os_string(),
            Self::Float(f) => OsString::from(format!("{f:.6}")),
            Self::Int(i) => OsString::from(i.to_string()),
            Self::Bool(_) => OsString::new(),
        }
    }
}

impl From<&str> for ParamValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for ParamValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<PathBuf> for ParamValue {
    #[inline]
    fn from(p: PathBuf) -> Self {
        Self::File(p)
    }
}

impl From<f64> for ParamValue {
    #[inline]
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<i64> for ParamValue {
    #[inline]
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for ParamValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// 单个参数的描述.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ParamSpec {
    /// 参数名.
    pub name: &'static str,

    /// 命令行模板, 如 `-prefix %s`, `-autoclip`, `%s`.
    pub template: &'static str,

    /// 位置.
    pub position: Position,

    /// 取值类型.
    pub kind: ValueKind,

    /// 是否必需.
    pub mandatory: bool,

    /// 描述.
    pub desc: &'static str,
}

impl ParamSpec {
    /// 创建可选参数.
    pub const fn new(
        name: &'static str,
        template: &'static str,
        position: Position,
        kind: ValueKind,
    ) -> Self {
        Self {
            name,
            template,
            position,
            kind,
            mandatory: false,
            desc: "",
        }
    }

    /// 标记为必需参数.
    #[inline]
    pub const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// 附加描述.
    #[inline]
    pub const fn desc(mut self, desc: &'static str) -> Self {
        self.desc = desc;
        self
    }

    /// 将 `value` 展开为命令行 token.
    ///
    /// 模板按空白拆分; 恰为占位符的 token 被整体替换 (值本身不会再被拆分),
    /// 内嵌占位符的 token 做字符串替换. `Bool` 参数为 `false` 时不产生任何 token.
    pub(crate) fn expand(&self, value: &ParamValue) -> Vec<OsString> {
        if let ParamValue::Bool(flag) = value {
            if !flag {
                return Vec::new();
            }
        }
        let rendered = value.render();
        let placeholder = self.kind.placeholder();
        self.template
            .split_whitespace()
            .map(|tok| match placeholder {
                Some(ph) if tok == ph => rendered.clone(),
                Some(ph) if tok.contains(ph) => {
                    OsString::from(tok.replace(ph, &rendered.to_string_lossy()))
                }
                _ => OsString::from(tok),
            })
            .collect()
    }
}

/// 有序的参数描述表.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ParamTable {
    specs: Vec<ParamSpec>,
}

impl ParamTable {
    /// 创建描述表.
    ///
    /// 以下情况返回 `Err`:
    ///
    /// 1. 参数名重复;
    /// 2. 显式位置重复;
    /// 3. `Trailing` 参数个数不为 1;
    /// 4. 模板占位符与取值类型不符.
    pub fn new(specs: Vec<ParamSpec>) -> CommandResult<Self> {
        let mut names = HashSet::new();
        let mut positions = HashSet::new();
        let mut trailing = 0usize;
        for spec in specs.iter() {
            if !names.insert(spec.name) {
                return Err(CommandError::Descriptor(format!("参数名 `{}` 重复", spec.name)));
            }
            match spec.position {
                Position::At(n) if !positions.insert(n) => {
                    return Err(CommandError::Descriptor(format!("位置 {n} 重复")));
                }
                Position::Trailing => trailing += 1,
                _ => {}
            }
            let consistent = match spec.kind.placeholder() {
                Some(ph) => spec.template.contains(ph),
                None => !spec.template.contains('%'),
            };
            if !consistent {
                return Err(CommandError::Descriptor(format!(
                    "参数 `{}` 的模板 `{}` 与类型 {:?} 不符",
                    spec.name, spec.template, spec.kind
                )));
            }
        }
        if trailing != 1 {
            return Err(CommandError::Descriptor(format!(
                "必须恰有一个末尾位置参数, 实际为 {trailing}"
            )));
        }
        Ok(Self { specs })
    }

    /// 按名字查找.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// 按声明顺序迭代.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ParamSpec> {
        self.specs.iter()
    }

    /// 按命令行顺序迭代: 显式位置升序, 无位置参数按声明顺序, 末尾参数最后.
    pub fn ordered(&self) -> impl Iterator<Item = &ParamSpec> {
        // 稳定排序, 保留 `Unordered` 的声明顺序.
        self.specs.iter().sorted_by_key(|s| s.position)
    }

    /// 末尾位置参数.
    pub fn trailing(&self) -> &ParamSpec {
        // 构造时已保证恰有一个.
        self.specs
            .iter()
            .find(|s| s.position == Position::Trailing)
            .unwrap()
    }

    /// 所有必需参数.
    pub fn mandatory(&self) -> impl Iterator<Item = &ParamSpec> {
        self.specs.iter().filter(|s| s.mandatory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailing() -> ParamSpec {
        ParamSpec::new("input", "%s", Position::Trailing, ValueKind::ExistingFile)
    }

    #[test]
    fn test_table_requires_exactly_one_trailing() {
        assert!(ParamTable::new(vec![]).is_err());
        assert!(ParamTable::new(vec![trailing()]).is_ok());

        let mut other = trailing();
        other.name = "other";
        assert!(matches!(
            ParamTable::new(vec![trailing(), other]),
            Err(CommandError::Descriptor(_))
        ));
    }

    #[test]
    fn test_table_rejects_duplicates_and_bad_templates() {
        let a = ParamSpec::new("a", "-a %d", Position::At(0), ValueKind::Int);
        let b = ParamSpec::new("b", "-b %d", Position::At(0), ValueKind::Int);
        assert!(ParamTable::new(vec![a, b, trailing()]).is_err());
        assert!(ParamTable::new(vec![a, a, trailing()]).is_err());

        let bad = ParamSpec::new("c", "-c %s", Position::At(1), ValueKind::Float);
        assert!(ParamTable::new(vec![bad, trailing()]).is_err());
        let bad_flag = ParamSpec::new("d", "-d %s", Position::Unordered, ValueKind::Bool);
        assert!(ParamTable::new(vec![bad_flag, trailing()]).is_err());
    }

    #[test]
    fn test_expand_printf_style() {
        let f = ParamSpec::new("t", "-thresh %f", Position::At(0), ValueKind::Float);
        assert_eq!(f.expand(&ParamValue::Float(0.6)), ["-thresh", "0.600000"]);

        let d = ParamSpec::new("p", "-polort %d", Position::At(1), ValueKind::Int);
        assert_eq!(d.expand(&ParamValue::Int(-1)), ["-polort", "-1"]);

        let b = ParamSpec::new("c", "-autoclip", Position::Unordered, ValueKind::Bool);
        assert_eq!(b.expand(&ParamValue::Bool(true)), ["-autoclip"]);
        assert!(b.expand(&ParamValue::Bool(false)).is_empty());

        let s = ParamSpec::new("x", "--out=%s", Position::At(2), ValueKind::Str);
        assert_eq!(s.expand(&"a b".into()), ["--out=a b"]);

        let spaced = ParamSpec::new("y", "-prefix %s", Position::At(3), ValueKind::Str);
        assert_eq!(spaced.expand(&"with space".into()), ["-prefix", "with space"]);
    }

    #[test]
    fn test_ordered_is_position_then_declaration() {
        let table = ParamTable::new(vec![
            ParamSpec::new("z", "-z", Position::Unordered, ValueKind::Bool),
            trailing(),
            ParamSpec::new("b", "-b %d", Position::At(5), ValueKind::Int),
            ParamSpec::new("a", "-a", Position::Unordered, ValueKind::Bool),
            ParamSpec::new("c", "-c %d", Position::At(1), ValueKind::Int),
        ])
        .unwrap();
        let names: Vec<_> = table.ordered().map(|s| s.name).collect();
        assert_eq!(names, ["c", "b", "z", "a", "input"]);
        assert_eq!(table.trailing().name, "input");
    }
}
