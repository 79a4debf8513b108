//! 对称稀疏矩阵 (CSR).

use ndarray::{Array2, ArrayView2, Axis};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::parallel::prelude::*;
    }
}

/// 以 CSR 格式保存的 `n x n` 对称矩阵. 上下三角均显式保存.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseSym {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseSym {
    /// 由上三角 (或下三角) 三元组构造. 每个三元组 `(a, b, w)` 同时写入
    /// `(a, b)` 与 `(b, a)`, 对角元只写一次. 重复位置的取值相加.
    ///
    /// 索引越界时程序 panic.
    pub fn from_triplets<I>(n: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (a, b, w) in triplets {
            assert!(a < n && b < n, "索引 ({a}, {b}) 超出矩阵阶数 {n}");
            rows[a].push((b, w));
            if a != b {
                rows[b].push((a, w));
            }
        }

        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for mut row in rows {
            row.sort_unstable_by_key(|&(c, _)| c);
            let start = indices.len();
            for (c, w) in row {
                if indices.len() > start && indices.last() == Some(&c) {
                    if let Some(v) = values.last_mut() {
                        *v += w;
                    }
                } else {
                    indices.push(c);
                    values.push(w);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            n,
            indptr,
            indices,
            values,
        }
    }

    /// 矩阵阶数.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// 显式保存的元素个数 (上下三角分别计数).
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 所有元素是否非负.
    pub fn is_nonnegative(&self) -> bool {
        self.values.iter().all(|&v| v >= 0.0)
    }

    /// 第 `r` 行的 `(列, 值)`.
    fn row(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[r]..self.indptr[r + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    /// 计算 `A X`, `X` 的每一列是一个向量.
    pub fn mul_mat(&self, x: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(x.nrows(), self.n);
        let mut ans = Array2::<f64>::zeros((self.n, x.ncols()));

        #[cfg(feature = "rayon")]
        ans.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out)| {
                for (c, w) in self.row(r) {
                    out.scaled_add(w, &x.row(c));
                }
            });

        #[cfg(not(feature = "rayon"))]
        for (r, mut out) in ans.axis_iter_mut(Axis(0)).enumerate() {
            for (c, w) in self.row(r) {
                out.scaled_add(w, &x.row(c));
            }
        }

        ans
    }

    /// 转换为稠密矩阵.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut ans = Array2::<f64>::zeros((self.n, self.n));
        for r in 0..self.n {
            for (c, w) in self.row(r) {
                ans[(r, c)] = w;
            }
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn path3() -> SparseSym {
        // 0 - 1 - 2
        SparseSym::from_triplets(3, [(0, 1, 1.0), (1, 2, 2.0)])
    }

    #[test]
    fn test_symmetric_storage() {
        let m = path3();
        assert_eq!(m.n(), 3);
        assert_eq!(m.nnz(), 4);
        assert_eq!(
            m.to_dense(),
            arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 2.0], [0.0, 2.0, 0.0]])
        );
        assert!(m.is_nonnegative());
    }

    #[test]
    fn test_duplicates_are_summed() {
        let m = SparseSym::from_triplets(2, [(0, 1, 0.5), (1, 0, 0.25), (1, 1, -1.0)]);
        assert_eq!(m.to_dense(), arr2(&[[0.0, 0.75], [0.75, -1.0]]));
        assert!(!m.is_nonnegative());
    }

    #[test]
    fn test_mul() {
        let m = path3();
        let x = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 0.0]]);
        let ax = m.mul_mat(x.view());
        assert_eq!(ax, arr2(&[[1.0, 1.0], [3.0, 0.0], [2.0, 2.0]]));
        assert_eq!(ax, m.to_dense().dot(&x));
    }
}
