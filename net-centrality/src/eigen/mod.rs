//! 特征向量中心度.
//!
//! 输入为 `3dDegreeCentrality -out1D` 产生的体素对相似度文件和 mask/atlas 模板.
//! 在模板节点上构造对称邻接矩阵, 求模最大特征值对应的特征向量,
//! 取绝对值后写回体素网格.
//!
//! # 示例
//!
//! ```no_run
//! use net_centrality::eigen::calc_eigen_from_1d;
//!
//! let out = calc_eigen_from_1d("similarity_matrix.1D", 4, "mask.nii.gz", ".").unwrap();
//! println!("{}", out.display());
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{EIGEN_CENTRALITY_NAME, EIGEN_MAX_ITER, EIGEN_OUTFILE, EIGEN_TOL};
use crate::data::{write_centrality, CentralityMap, NiftiHeaderAttr, Template};
use crate::interface::absolutize;
use crate::one_d::SimilarityMatrix;

mod error;
mod graph;
mod solver;
mod sparse;
mod threads;

pub use error::{CalcError, CalcResult};
pub use solver::{EigenPair, EigenSolver, LobpcgSolver};
pub use sparse::SparseSym;
pub use threads::ThreadHint;

/// 特征向量中心度计算器.
///
/// 默认求解器为 [`LobpcgSolver`]: 节点数超过 64 时使用 LOBPCG 迭代,
/// 累计迭代 `max_iter` 次 (默认 1000) 仍未收敛即报错. 不超过 64 个节点的小图
/// 直接做稠密 `eigh` 分解, 不受迭代上限约束.
#[derive(Debug, Clone)]
pub struct EigenCentrality<S = LobpcgSolver> {
    solver: S,
    max_iter: usize,
    tol: f32,
    num_threads: usize,
    outfile: String,
}

impl Default for EigenCentrality<LobpcgSolver> {
    fn default() -> Self {
        Self::with_solver(LobpcgSolver::default())
    }
}

impl EigenCentrality<LobpcgSolver> {
    /// 使用默认求解器与参数.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: EigenSolver> EigenCentrality<S> {
    /// 使用指定的特征值求解器.
    pub fn with_solver(solver: S) -> Self {
        Self {
            solver,
            max_iter: EIGEN_MAX_ITER,
            tol: EIGEN_TOL,
            num_threads: 1,
            outfile: EIGEN_OUTFILE.to_owned(),
        }
    }

    /// 迭代上限.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// 残差容忍度.
    pub fn tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// 计算线程数, 0 视为 1.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n.max(1);
        self
    }

    /// 输出文件名 (相对于输出目录).
    pub fn outfile<T: Into<String>>(mut self, name: T) -> Self {
        self.outfile = name.into();
        self
    }

    /// 在已载入的模板与相似度矩阵上计算中心度. 不写文件.
    pub fn compute(&self, template: &Template, sim: &SimilarityMatrix) -> CalcResult<CentralityMap>
    where
        S: Sync,
    {
        let m = template.nodes_for(sim)?;
        if m.n() == 0 {
            return Err(CalcError::EmptyGraph);
        }

        let hint = ThreadHint::acquire(self.num_threads);
        let pair = hint.install(|| self.solver.leading(&m, self.max_iter, self.tol))?;
        drop(hint);
        log::info!("主特征值 = {:.6}", pair.value);

        let values = pair.vector.mapv(f64::abs);
        Ok(CentralityMap::new(
            EIGEN_CENTRALITY_NAME,
            template,
            values,
            *sim.affine(),
        ))
    }

    /// 读取 `one_d_file` 与 `mask_file`, 计算后写入 `out_dir`, 返回输出文件的绝对路径.
    ///
    /// 计算失败时不产生输出文件.
    pub fn run<P, Q, R>(&self, one_d_file: P, mask_file: Q, out_dir: R) -> CalcResult<PathBuf>
    where
        S: Sync,
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let template = Template::open(mask_file.as_ref())?;
        log::info!(
            "模板 {:?}: template_type = {}",
            mask_file.as_ref(),
            template.template_type().code()
        );
        if let Some(labels) = template.region_labels() {
            log::debug!("atlas 区域标签: {labels:?}");
        }
        let sim = SimilarityMatrix::open(one_d_file.as_ref())?;
        log::info!("相似度矩阵 {:?}: {} 个条目", one_d_file.as_ref(), sim.len());
        if template.sform().is_some_and(|a| a != *sim.affine()) {
            log::warn!("模板 sform 与相似度矩阵的仿射变换不一致, 输出使用后者");
        }

        let map = self.compute(&template, &sim)?;

        let cwd = std::env::current_dir()?;
        let out = absolutize(absolutize(cwd, out_dir), &self.outfile);
        write_centrality(&out, &template, &map).map_err(CalcError::Write)?;
        log::info!("特征向量中心度已写入 {}", out.display());
        Ok(out)
    }
}

/// 使用默认求解器与参数计算特征向量中心度, 结果写入
/// `out_dir/eigenvector_centrality.nii.gz`.
pub fn calc_eigen_from_1d<P, Q, R>(
    one_d_file: P,
    num_threads: usize,
    mask_file: Q,
    out_dir: R,
) -> CalcResult<PathBuf>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    EigenCentrality::new()
        .num_threads(num_threads)
        .run(one_d_file, mask_file, out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TemplateType;
    use crate::data::tests::write_template;
    use crate::data::Affine;
    use ndarray::{arr1, Array3};
    use nifti::NiftiHeader;
    use std::fs;

    /// 返回固定特征向量的求解器.
    struct Fixed(Vec<f64>);

    impl EigenSolver for Fixed {
        fn leading(&self, _: &SparseSym, _: usize, _: f32) -> CalcResult<EigenPair> {
            Ok(EigenPair {
                value: 1.0,
                vector: arr1(&self.0),
            })
        }
    }

    /// 永不收敛的求解器.
    struct Stuck;

    impl EigenSolver for Stuck {
        fn leading(&self, _: &SparseSym, max_iter: usize, _: f32) -> CalcResult<EigenPair> {
            Err(CalcError::NotConverged {
                max_iter,
                reason: "residual too large".into(),
            })
        }
    }

    /// 4x3x2 网格, 其中 4 个体素属于 mask.
    const MASKED: [(usize, usize, usize); 4] = [(0, 0, 0), (1, 2, 0), (3, 1, 1), (2, 2, 1)];

    fn mask_data() -> Array3<f32> {
        let mut data = Array3::zeros((4, 3, 2));
        for p in MASKED {
            data[p] = 1.0;
        }
        data
    }

    /// 所有 mask 体素两两相似度均为 1.
    fn uniform_sim() -> SimilarityMatrix {
        let flat = |(i, j, k): (usize, usize, usize)| i + j * 4 + k * 12;
        let voxels: Vec<usize> = MASKED.iter().map(|&p| flat(p)).collect();
        let mut entries = Vec::new();
        for (n, &a) in voxels.iter().enumerate() {
            for &b in &voxels[n + 1..] {
                entries.push((a, b, 1.0));
            }
        }
        SimilarityMatrix::new([4, 3, 2], Affine::identity(), entries)
    }

    #[test]
    fn test_end_to_end_uniform_mask() {
        let dir = tempfile::tempdir().unwrap();
        let mask = dir.path().join("mask.nii.gz");
        write_template(&mask, &mask_data());
        let one_d = dir.path().join("similarity_matrix.1D");
        uniform_sim()
            .write_to(fs::File::create(&one_d).unwrap())
            .unwrap();

        let out = calc_eigen_from_1d(&one_d, 2, &mask, dir.path()).unwrap();
        assert!(out.is_absolute());
        assert!(out.ends_with("eigenvector_centrality.nii.gz"));

        let back = Template::open(&out).unwrap();
        assert_eq!(back.shape(), (2, 3, 4));
        for k in 0..2 {
            for j in 0..3 {
                for i in 0..4 {
                    let v = back.data()[(k, j, i)];
                    if MASKED.contains(&(i, j, k)) {
                        assert!((v - 0.5).abs() < 1e-5, "({i}, {j}, {k}) = {v}");
                    } else {
                        assert_eq!(v, 0.0, "({i}, {j}, {k})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_mixed_sign_vector_is_made_nonnegative() {
        let template = Template::from_parts(NiftiHeader::default(), mask_data()).unwrap();
        assert_eq!(template.template_type(), TemplateType::Mask);

        let calc = EigenCentrality::with_solver(Fixed(vec![-0.5, 0.5, -0.5, 0.5]));
        let map = calc.compute(&template, &uniform_sim()).unwrap();
        assert!(map.values().iter().all(|&v| v >= 0.0));
        assert!(map.volume().iter().all(|&v| v >= 0.0));
        assert_eq!(map.values(), arr1(&[0.5, 0.5, 0.5, 0.5]));
    }

    #[test]
    fn test_not_converged_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mask = dir.path().join("mask.nii");
        write_template(&mask, &mask_data());
        let one_d = dir.path().join("sim.1D");
        uniform_sim()
            .write_to(fs::File::create(&one_d).unwrap())
            .unwrap();

        let calc = EigenCentrality::with_solver(Stuck).max_iter(5);
        let err = calc.run(&one_d, &mask, dir.path()).unwrap_err();
        assert!(matches!(err, CalcError::NotConverged { max_iter: 5, .. }));
        assert!(!dir.path().join(EIGEN_OUTFILE).exists());
    }

    #[test]
    fn test_missing_mask() {
        let dir = tempfile::tempdir().unwrap();
        let one_d = dir.path().join("sim.1D");
        uniform_sim()
            .write_to(fs::File::create(&one_d).unwrap())
            .unwrap();
        let err = calc_eigen_from_1d(&one_d, 1, dir.path().join("nope.nii"), dir.path());
        assert!(matches!(err, Err(CalcError::Template(_))));
    }
}
