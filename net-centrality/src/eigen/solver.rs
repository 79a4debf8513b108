//! 主特征对求解.

use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewMut2};
use ndarray_linalg::lobpcg::{lobpcg, LobpcgResult, TruncatedOrder};
use ndarray_linalg::{Eigh, UPLO};

use super::error::{CalcError, CalcResult};
use super::sparse::SparseSym;
use crate::consts::{DENSE_FALLBACK_NODES, EIGEN_NUM_EIGS};

/// 一个特征值及其特征向量.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPair {
    /// 特征值.
    pub value: f64,

    /// 单位特征向量, 长度等于矩阵阶数.
    pub vector: Array1<f64>,
}

/// 求对称矩阵模最大的特征值及对应特征向量.
pub trait EigenSolver {
    /// `max_iter` 为迭代上限, `tol` 为残差容忍度. 迭代上限内未收敛时返回
    /// [`CalcError::NotConverged`].
    fn leading(&self, m: &SparseSym, max_iter: usize, tol: f32) -> CalcResult<EigenPair>;
}

/// 基于 LOBPCG 的求解器. 阶数不超过 `dense_below` 时改用稠密 `eigh`.
#[derive(Debug, Clone, Copy)]
pub struct LobpcgSolver {
    dense_below: usize,
}

impl Default for LobpcgSolver {
    fn default() -> Self {
        Self {
            dense_below: DENSE_FALLBACK_NODES,
        }
    }
}

impl LobpcgSolver {
    /// 阶数不超过 `n` 的矩阵使用稠密分解. 设为 0 则总是使用 LOBPCG.
    pub fn with_dense_below(n: usize) -> Self {
        Self { dense_below: n }
    }

    fn dense(&self, m: &SparseSym) -> CalcResult<EigenPair> {
        let (vals, vecs) = m
            .to_dense()
            .eigh(UPLO::Lower)
            .map_err(|e| CalcError::Solver(e.to_string()))?;
        // 特征值升序, 模最大者在两端之一.
        let n = vals.len();
        let pick = if vals[0].abs() > vals[n - 1].abs() { 0 } else { n - 1 };
        Ok(EigenPair {
            value: vals[pick],
            vector: vecs.column(pick).to_owned(),
        })
    }

    /// LOBPCG 单次调用最多迭代 `10 * n` 次. 未收敛时以当前近似向量重启,
    /// 直到累计迭代次数达到 `max_iter`.
    fn iterate(
        &self,
        m: &SparseSym,
        max_iter: usize,
        tol: f32,
        order: TruncatedOrder,
    ) -> CalcResult<EigenPair> {
        let n = m.n();
        let cap = n.saturating_mul(10).max(1);
        let op = |x: ArrayView2<f64>| m.mul_mat(x);
        let precond = |_: ArrayViewMut2<f64>| {};

        let mut x = Array2::from_shape_fn((n, EIGEN_NUM_EIGS), |(i, _)| 1.0 + (i % 7) as f64 * 1e-2);
        let mut spent = 0;
        loop {
            let budget = max_iter.saturating_sub(spent).clamp(1, cap);
            match lobpcg(op, x, precond, None, tol, budget, order.clone()) {
                // 迭代次数用尽时同样返回 `Ok`, 需要自行检查残差.
                LobpcgResult::Ok(vals, vecs, norms) => {
                    spent += budget;
                    let residual = norms.first().copied().unwrap_or(f64::INFINITY);
                    if residual <= f64::from(tol) {
                        log::debug!("LOBPCG 迭代 {spent} 次内收敛, 残差 {residual:.3e}");
                        return Ok(EigenPair {
                            value: vals[0],
                            vector: vecs.slice(s![.., 0]).to_owned(),
                        });
                    }
                    if spent >= max_iter {
                        return Err(CalcError::NotConverged {
                            max_iter,
                            reason: format!("残差 {residual:.3e} 大于 {tol:.1e}"),
                        });
                    }
                    log::debug!("LOBPCG 已迭代 {spent} 次, 残差 {residual:.3e}, 重启");
                    x = vecs;
                }
                LobpcgResult::Err(_, _, norms, err) => {
                    log::debug!("LOBPCG 残差 {norms:?}");
                    return Err(CalcError::NotConverged {
                        max_iter,
                        reason: err.to_string(),
                    });
                }
                LobpcgResult::NoResult(err) => return Err(CalcError::Solver(err.to_string())),
            }
        }
    }
}

impl EigenSolver for LobpcgSolver {
    fn leading(&self, m: &SparseSym, max_iter: usize, tol: f32) -> CalcResult<EigenPair> {
        let n = m.n();
        if n == 0 {
            return Err(CalcError::EmptyGraph);
        }
        if n <= self.dense_below {
            log::debug!("矩阵阶数 {n}, 使用稠密分解");
            return self.dense(m);
        }

        let largest = self.iterate(m, max_iter, tol, TruncatedOrder::Largest)?;
        // 非负矩阵的谱半径本身就是特征值.
        if m.is_nonnegative() {
            return Ok(largest);
        }
        let smallest = self.iterate(m, max_iter, tol, TruncatedOrder::Smallest)?;
        Ok(if smallest.value.abs() > largest.value.abs() {
            smallest
        } else {
            largest
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 完全图, 边权均为 `w`.
    fn complete(n: usize, w: f64) -> SparseSym {
        let triplets = (0..n).flat_map(|a| (a + 1..n).map(move |b| (a, b, w)));
        SparseSym::from_triplets(n, triplets)
    }

    #[test]
    fn test_dense_uniform() {
        let m = complete(4, 1.0);
        let pair = LobpcgSolver::default().leading(&m, 1000, 1e-7).unwrap();
        assert!((pair.value - 3.0).abs() < 1e-9);
        for v in pair.vector.iter() {
            assert!((v.abs() - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dense_picks_largest_magnitude() {
        // 特征值为 1 与 -3.
        let m = SparseSym::from_triplets(2, [(0, 0, -1.0), (0, 1, 2.0), (1, 1, -1.0)]);
        let pair = LobpcgSolver::default().leading(&m, 1000, 1e-7).unwrap();
        assert!((pair.value + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_lobpcg_matches_dense() {
        let n = 80;
        // 完全图加一条重边, 让主特征向量不再均匀.
        let triplets = (0..n)
            .flat_map(|a| (a + 1..n).map(move |b| (a, b, 0.5)))
            .chain([(0, 1, 2.0)]);
        let m = SparseSym::from_triplets(n, triplets);

        let sparse = LobpcgSolver::with_dense_below(0)
            .leading(&m, 1000, 1e-6)
            .unwrap();
        let dense = LobpcgSolver::with_dense_below(usize::MAX)
            .leading(&m, 1000, 1e-6)
            .unwrap();

        assert!((sparse.value - dense.value).abs() < 1e-4 * dense.value.abs());
        let dot: f64 = sparse
            .vector
            .iter()
            .zip(dense.vector.iter())
            .map(|(a, b)| a * b)
            .sum();
        assert!((dot.abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_lobpcg_reports_non_convergence() {
        // 路径图的谱聚集在 2 附近, 两次迭代远不足以收敛.
        let n = 100;
        let m = SparseSym::from_triplets(n, (0..n - 1).map(|a| (a, a + 1, 1.0)));
        let err = LobpcgSolver::with_dense_below(0)
            .leading(&m, 2, 1e-12)
            .unwrap_err();
        assert!(
            matches!(err, CalcError::NotConverged { max_iter: 2, .. }),
            "{err}"
        );
    }

    #[test]
    fn test_empty_graph() {
        let m = SparseSym::from_triplets(0, std::iter::empty());
        assert!(matches!(
            LobpcgSolver::default().leading(&m, 10, 1e-7),
            Err(CalcError::EmptyGraph)
        ));
    }
}
