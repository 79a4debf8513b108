//! `3dDegreeCentrality -out1D` 相似度矩阵文本文件.
//!
//! 文件格式如下 (`#` 开头为注释; 无法识别的注释行会被忽略):
//!
//! ```text
//! # Similarity matrix from 3dDegreeCentrality
//! # Dimensions: nx ny nz
//! # Affine:
//! #   a00 a01 a02 a03
//! #   a10 a11 a12 a13
//! #   a20 a21 a22 a23
//! # Voxel1 Voxel2 i1 j1 k1 i2 j2 k2 Corr
//! 0 1 0 0 0 1 0 0 0.812
//! ```
//!
//! 数据行为 3 列 (`v1 v2 corr`) 或 9 列 (额外带两个体素的 ijk 坐标).
//! 一维索引按 AFNI 惯例计算: `i + j * nx + k * nx * ny`.
//! 以 `.gz` 结尾的文件会先经 gzip 解压.

use std::collections::hash_map::{Entry as MapEntry, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::data::Affine;
use crate::Idx3d;

/// 解析 1D 文件的错误. 所有行号从 1 开始.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 底层 I/O 错误.
    #[error("读取 1D 文件失败: {0}")]
    Io(#[from] io::Error),

    /// 缺少 `Dimensions` 头.
    #[error("1D 文件缺少 `Dimensions` 头")]
    MissingDimensions,

    /// 仿射矩阵行数不足.
    #[error("1D 文件缺少完整的仿射矩阵 (至少需要 3 行, 实际 {0} 行)")]
    MissingAffine(usize),

    /// 仿射矩阵第四行不是 `0 0 0 1`.
    #[error("仿射矩阵第四行必须为 `0 0 0 1`")]
    BadAffine,

    /// 数值无法解析.
    #[error("第 {line} 行: 无法解析 `{token}`")]
    BadNumber {
        /// 行号.
        line: usize,
        /// 出错的 token.
        token: String,
    },

    /// 列数不对.
    #[error("第 {line} 行: 需要 3 或 9 列, 实际 {found} 列")]
    BadColumns {
        /// 行号.
        line: usize,
        /// 实际列数.
        found: usize,
    },

    /// 体素索引超出网格.
    #[error("第 {line} 行: 体素索引 {index} 超出网格 (共 {len} 个体素)")]
    OutOfGrid {
        /// 行号.
        line: usize,
        /// 一维索引.
        index: usize,
        /// 网格体素数.
        len: usize,
    },

    /// ijk 坐标与一维索引不一致.
    #[error("第 {line} 行: ijk 坐标与一维索引 {index} 不一致")]
    IjkMismatch {
        /// 行号.
        line: usize,
        /// 一维索引.
        index: usize,
    },

    /// 相似度不是有限数.
    #[error("第 {line} 行: 相似度不是有限数")]
    NonFinite {
        /// 行号.
        line: usize,
    },
}

/// 1D 文件解析结果.
pub type ParseResult<T> = Result<T, ParseError>;

/// 两个体素之间的相似度. 总满足 `a < b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Entry {
    /// 一维索引较小的体素.
    pub a: usize,

    /// 一维索引较大的体素.
    pub b: usize,

    /// 相似度 (相关值).
    pub value: f64,
}

/// 体素级稀疏对称相似度矩阵, 以及图像范围与仿射矩阵.
#[derive(Clone, Debug)]
pub struct SimilarityMatrix {
    extents: [usize; 3],
    affine: Affine,
    entries: Vec<Entry>,
}

impl SimilarityMatrix {
    /// 直接构造. 无序对会被规范化为 `a < b`, 自环被丢弃, 重复对保留最后一次的值.
    ///
    /// 越界索引会导致 panic.
    pub fn new<I: IntoIterator<Item = (usize, usize, f64)>>(
        extents: [usize; 3],
        affine: Affine,
        entries: I,
    ) -> Self {
        let len = extents.iter().product::<usize>();
        let mut ans = Self {
            extents,
            affine,
            entries: Vec::new(),
        };
        let mut seen = HashMap::new();
        for (a, b, value) in entries {
            assert!(a < len && b < len, "体素索引超出网格");
            ans.insert(&mut seen, a, b, value);
        }
        ans
    }

    /// 打开 1D 文件. 以 `.gz` 结尾时先解压.
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let is_gz = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        if is_gz {
            Self::parse(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::parse(BufReader::new(file))
        }
    }

    /// 从文本流解析.
    pub fn parse<R: BufRead>(reader: R) -> ParseResult<Self> {
        let mut extents: Option<[usize; 3]> = None;
        let mut affine_rows: Vec<[f64; 4]> = Vec::with_capacity(4);
        let mut in_affine = false;
        let mut parsed: Option<Self> = None;
        let mut seen = HashMap::new();

        for (no, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = no + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(comment) = trimmed.strip_prefix('#') {
                let comment = comment.trim();
                if in_affine && affine_rows.len() < 4 {
                    if let Some(row) = parse_row4(comment) {
                        affine_rows.push(row);
                        continue;
                    }
                }
                in_affine = false;

                if let Some(rest) = strip_prefix_ignore_case(comment, "dimensions:") {
                    extents = Some(parse_extents(rest, lineno)?);
                } else if comment.eq_ignore_ascii_case("affine:") {
                    in_affine = true;
                    affine_rows.clear();
                }
                continue;
            }
            in_affine = false;

            // 头部在第一行数据之前必须完整.
            if parsed.is_none() {
                parsed = Some(Self {
                    extents: extents.ok_or(ParseError::MissingDimensions)?,
                    affine: build_affine(&affine_rows)?,
                    entries: Vec::new(),
                });
            }
            if let Some(ans) = parsed.as_mut() {
                let (a, b, value) = ans.parse_data_row(trimmed, lineno)?;
                ans.insert(&mut seen, a, b, value);
            }
        }

        match parsed {
            Some(ans) => Ok(ans),
            None => Ok(Self {
                extents: extents.ok_or(ParseError::MissingDimensions)?,
                affine: build_affine(&affine_rows)?,
                entries: Vec::new(),
            }),
        }
    }

    /// 网格范围 `[nx, ny, nz]`.
    #[inline]
    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    /// 与模板一致的形状表示 `(z, y, x)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let [nx, ny, nz] = self.extents;
        (nz, ny, nx)
    }

    /// 网格体素总数.
    #[inline]
    pub fn grid_len(&self) -> usize {
        self.extents.iter().product()
    }

    /// 体素到物理坐标的仿射变换.
    #[inline]
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// 所有非零相似度.
    #[inline]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// 非零相似度个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何相似度.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 一维索引转换为 `(i, j, k)`.
    #[inline]
    pub fn ijk(&self, index: usize) -> Idx3d {
        let [nx, ny, _] = self.extents;
        (index % nx, (index / nx) % ny, index / (nx * ny))
    }

    /// `(i, j, k)` 转换为一维索引.
    #[inline]
    pub fn flat(&self, (i, j, k): Idx3d) -> usize {
        let [nx, ny, _] = self.extents;
        i + j * nx + k * nx * ny
    }

    /// 以本模块描述的格式 (9 列) 写出.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let [nx, ny, nz] = self.extents;
        writeln!(w, "# Similarity matrix from 3dDegreeCentrality")?;
        writeln!(w, "# Dimensions: {nx} {ny} {nz}")?;
        writeln!(w, "# Affine:")?;
        for row in self.affine.matrix().iter().take(3) {
            writeln!(w, "#   {} {} {} {}", row[0], row[1], row[2], row[3])?;
        }
        writeln!(w, "# Voxel1 Voxel2 i1 j1 k1 i2 j2 k2 Corr")?;
        for e in self.entries.iter() {
            let (i1, j1, k1) = self.ijk(e.a);
            let (i2, j2, k2) = self.ijk(e.b);
            writeln!(
                w,
                "{} {} {i1} {j1} {k1} {i2} {j2} {k2} {}",
                e.a, e.b, e.value
            )?;
        }
        Ok(())
    }

    fn parse_data_row(&self, row: &str, line: usize) -> ParseResult<(usize, usize, f64)> {
        let cols: Vec<&str> = row.split_whitespace().collect();
        if !matches!(cols.len(), 3 | 9) {
            return Err(ParseError::BadColumns {
                line,
                found: cols.len(),
            });
        }

        let len = self.grid_len();
        let a = parse_num::<usize>(cols[0], line)?;
        let b = parse_num::<usize>(cols[1], line)?;
        for index in [a, b] {
            if index >= len {
                return Err(ParseError::OutOfGrid { line, index, len });
            }
        }

        if cols.len() == 9 {
            for (index, ijk) in [(a, &cols[2..5]), (b, &cols[5..8])] {
                let i = parse_num::<usize>(ijk[0], line)?;
                let j = parse_num::<usize>(ijk[1], line)?;
                let k = parse_num::<usize>(ijk[2], line)?;
                if self.ijk(index) != (i, j, k) {
                    return Err(ParseError::IjkMismatch { line, index });
                }
            }
        }

        let value = parse_num::<f64>(cols[cols.len() - 1], line)?;
        if !value.is_finite() {
            return Err(ParseError::NonFinite { line });
        }
        Ok((a, b, value))
    }

    fn insert(&mut self, seen: &mut HashMap<(usize, usize), usize>, a: usize, b: usize, value: f64) {
        if a == b {
            return;
        }
        let key = (a.min(b), a.max(b));
        match seen.entry(key) {
            MapEntry::Occupied(slot) => self.entries[*slot.get()].value = value,
            MapEntry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(Entry {
                    a: key.0,
                    b: key.1,
                    value,
                });
            }
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

fn parse_num<T: std::str::FromStr>(token: &str, line: usize) -> ParseResult<T> {
    token.parse::<T>().map_err(|_| ParseError::BadNumber {
        line,
        token: token.to_owned(),
    })
}

fn parse_extents(rest: &str, line: usize) -> ParseResult<[usize; 3]> {
    let nums = rest
        .split_whitespace()
        .map(|t| parse_num::<usize>(t, line))
        .collect::<ParseResult<Vec<_>>>()?;
    // 体素总数必须为正且不溢出.
    let len = |nx: usize, ny: usize, nz: usize| nx.checked_mul(ny)?.checked_mul(nz);
    match nums[..] {
        [nx, ny, nz] if len(nx, ny, nz).is_some_and(|n| n > 0) => Ok([nx, ny, nz]),
        _ => Err(ParseError::BadNumber {
            line,
            token: rest.trim().to_owned(),
        }),
    }
}

fn parse_row4(s: &str) -> Option<[f64; 4]> {
    let mut it = s.split_whitespace().map(|t| t.parse::<f64>().ok());
    let row = [it.next()??, it.next()??, it.next()??, it.next()??];
    it.next().is_none().then_some(row)
}

fn build_affine(rows: &[[f64; 4]]) -> ParseResult<Affine> {
    match rows {
        [r0, r1, r2] => Ok(Affine::from_rows([*r0, *r1, *r2])),
        [r0, r1, r2, r3] => Affine::from_matrix([*r0, *r1, *r2, *r3]).ok_or(ParseError::BadAffine),
        _ => Err(ParseError::MissingAffine(rows.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    const SAMPLE: &str = "\
# Similarity matrix from 3dDegreeCentrality
# Threshold: 0.6
# Dimensions: 2 2 1
# Affine:
#   -3.0 0.0 0.0 90.0
#   0.0 -3.0 0.0 126.0
#   0.0 0.0 3.0 -72.0
# Voxel1 Voxel2 i1 j1 k1 i2 j2 k2 Corr
0 1 0 0 0 1 0 0 0.8
0 2 0 0 0 0 1 0 0.7
3 1 1 1 0 1 0 0 0.9
";

    #[test]
    fn test_parse_sample() {
        let m = SimilarityMatrix::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(m.extents(), [2, 2, 1]);
        assert_eq!(m.shape(), (1, 2, 2));
        assert_eq!(m.affine().matrix()[1], [0.0, -3.0, 0.0, 126.0]);
        assert_eq!(m.len(), 3);
        assert_eq!(
            m.entries()[2],
            Entry {
                a: 1,
                b: 3,
                value: 0.9
            }
        );
    }

    #[test]
    fn test_three_columns_and_duplicates() {
        let text = "\
# Dimensions: 3 1 1
# Affine:
# 1 0 0 0
# 0 1 0 0
# 0 0 1 0
# 0 0 0 1
0 1 0.5
1 0 0.25
2 2 1.0
";
        let m = SimilarityMatrix::parse(text.as_bytes()).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.entries()[0].value, 0.25);
        assert_eq!(*m.affine(), Affine::identity());
    }

    #[test]
    fn test_bad_dimensions() {
        for dims in ["0 4 4", "4 4", "4294967296 4294967296 2"] {
            let text = format!("# Dimensions: {dims}\n# Affine:\n# 1 0 0 0\n# 0 1 0 0\n# 0 0 1 0\n");
            let err = SimilarityMatrix::parse(text.as_bytes()).unwrap_err();
            assert!(matches!(err, ParseError::BadNumber { line: 1, .. }), "{dims}: {err}");
        }
    }

    #[test]
    fn test_header_only_file() {
        let text = "# Dimensions: 4 4 4\n# Affine:\n# 1 0 0 0\n# 0 1 0 0\n# 0 0 1 0\n";
        let m = SimilarityMatrix::parse(text.as_bytes()).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.grid_len(), 64);
    }

    #[test]
    fn test_errors() {
        let no_dims = "# Affine:\n# 1 0 0 0\n# 0 1 0 0\n# 0 0 1 0\n0 1 0.5\n";
        assert!(matches!(
            SimilarityMatrix::parse(no_dims.as_bytes()),
            Err(ParseError::MissingDimensions)
        ));

        let short_affine = "# Dimensions: 2 1 1\n# Affine:\n# 1 0 0 0\n0 1 0.5\n";
        assert!(matches!(
            SimilarityMatrix::parse(short_affine.as_bytes()),
            Err(ParseError::MissingAffine(1))
        ));

        let head = "# Dimensions: 2 1 1\n# Affine:\n# 1 0 0 0\n# 0 1 0 0\n# 0 0 1 0\n";
        let cases = [
            ("0 1\n", "columns"),
            ("0 x 0.5\n", "number"),
            ("0 7 0.5\n", "grid"),
            ("0 1 0 0 0 0 0 0 0.5\n", "ijk"),
            ("0 1 NaN\n", "finite"),
        ];
        for (row, what) in cases {
            let err = SimilarityMatrix::parse(format!("{head}{row}").as_bytes()).unwrap_err();
            let ok = match what {
                "columns" => matches!(err, ParseError::BadColumns { line: 6, found: 2 }),
                "number" => matches!(err, ParseError::BadNumber { line: 6, .. }),
                "grid" => matches!(err, ParseError::OutOfGrid { index: 7, len: 2, .. }),
                "ijk" => matches!(err, ParseError::IjkMismatch { index: 1, .. }),
                _ => matches!(err, ParseError::NonFinite { line: 6 }),
            };
            assert!(ok, "{what}: {err}");
        }
    }

    #[test]
    fn test_write_then_open_gz() {
        let m = SimilarityMatrix::parse(SAMPLE.as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("similarity_matrix.1D.gz");

        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        m.write_to(&mut enc).unwrap();
        enc.finish().unwrap();

        let back = SimilarityMatrix::open(&path).unwrap();
        assert_eq!(back.entries(), m.entries());
        assert_eq!(back.affine(), m.affine());
        assert_eq!(back.extents(), m.extents());
    }
}
