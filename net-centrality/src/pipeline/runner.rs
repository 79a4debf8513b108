//! 进程内顺序执行.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::Serialize;

use super::{field, Pipeline, PipelineError, PipelineResult, Stage, StageKind};
use crate::eigen::EigenCentrality;

/// 流水线的最终输出.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CentralityOutputs {
    /// 度中心度图像.
    pub degree_output: PathBuf,

    /// 相似度矩阵 1D 文件.
    pub one_d_output: Option<PathBuf>,

    /// 特征向量中心度图像.
    pub eigen_output: Option<PathBuf>,
}

/// 已产生的输出: `(阶段, 字段) -> 文件`.
type Produced = BTreeMap<(&'static str, &'static str), PathBuf>;

impl Pipeline {
    /// 在 `base_dir/<name>/<stage>` 下依次执行各阶段.
    ///
    /// 任一阶段失败时立即返回, 不执行后续阶段. 不做重试.
    pub fn run<P: AsRef<Path>>(&self, base_dir: P) -> PipelineResult<CentralityOutputs> {
        let root = base_dir.as_ref().join(&self.config.name);
        let mut produced = Produced::new();
        let mut outputs = None;

        for stage in &self.stages {
            let dir = root.join(stage.name);
            fs::create_dir_all(&dir)?;
            log::info!(
                "[{}] 开始, 线程数 {}, 内存 {:.1} GB",
                stage.name,
                stage.resources.num_threads,
                stage.resources.memory_gb
            );

            match &stage.kind {
                StageKind::Degree(degree) => {
                    let outs = degree.run(&dir).map_err(PipelineError::stage(stage.name))?;
                    produced.insert((stage.name, field::DEGREE_OUTFILE), outs.degree_outfile);
                    if let Some(one_d) = outs.one_d_outfile {
                        produced.insert((stage.name, field::ONE_D_OUTFILE), one_d);
                    }
                }
                StageKind::Eigen(task) => {
                    let one_d = required(stage, &produced, field::ONE_D_FILE)?;
                    let out = EigenCentrality::new()
                        .num_threads(task.num_threads)
                        .run(one_d, &task.mask_file, &dir)
                        .map_err(PipelineError::stage(stage.name))?;
                    produced.insert((stage.name, field::EIGEN_OUTFILE), out);
                }
                StageKind::Output => {
                    outputs = Some(CentralityOutputs {
                        degree_output: required(stage, &produced, field::DEGREE_OUTPUT)?.to_owned(),
                        one_d_output: optional(stage, &produced, field::ONE_D_OUTPUT),
                        eigen_output: optional(stage, &produced, field::EIGEN_OUTPUT),
                    });
                }
            }
            log::info!("[{}] 完成", stage.name);
        }

        outputs.ok_or(PipelineError::MissingInput {
            stage: super::stage::OUTPUT,
            field: field::DEGREE_OUTPUT,
        })
    }
}

fn optional(stage: &Stage, produced: &Produced, field: &str) -> Option<PathBuf> {
    let c = stage.input(field)?;
    produced.get(&(c.from_stage, c.from_field)).cloned()
}

fn required<'a>(
    stage: &Stage,
    produced: &'a Produced,
    field: &'static str,
) -> PipelineResult<&'a Path> {
    stage
        .input(field)
        .and_then(|c| produced.get(&(c.from_stage, c.from_field)))
        .map(PathBuf::as_path)
        .ok_or(PipelineError::MissingInput {
            stage: stage.name,
            field,
        })
}

#[cfg(all(test, unix))]
mod tests {
    use super::super::{stage, StageError, WorkflowConfig};
    use super::*;
    use crate::eigen::CalcError;
    use crate::interface::{CommandError, DegreeCentrality};
    use crate::data::tests::write_template;
    use crate::data::Affine;
    use crate::one_d::SimilarityMatrix;
    use ndarray::Array3;
    use std::os::unix::fs::PermissionsExt;

    /// 模拟 `3dDegreeCentrality`: 创建 `-prefix` 指定的文件,
    /// 并把 `-out1D` 指向的文件替换为预先准备好的相似度矩阵.
    fn fake_afni(dir: &Path, one_d_source: Option<&Path>) -> PathBuf {
        let copy = match one_d_source {
            Some(p) => format!("cp '{}' \"$out1d\"", p.display()),
            None => "echo '# Dimensions: 1 1 1' > \"$out1d\"".to_owned(),
        };
        let script = format!(
            r#"#!/bin/sh
prefix=""; out1d=""
while [ $# -gt 0 ]; do
  case "$1" in
    -prefix) prefix="$2"; shift 2 ;;
    -out1D) out1d="$2"; shift 2 ;;
    -mask|-thresh|-sparsity|-polort) shift 2 ;;
    *) shift ;;
  esac
done
[ -n "$prefix" ] || exit 2
: > "$prefix"
if [ -n "$out1d" ]; then {copy}; fi
"#
        );
        let path = dir.join("3dDegreeCentrality");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, b"").unwrap();
        p
    }

    #[test]
    fn test_degree_only_run() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_afni(dir.path(), None);
        let dataset = touch(dir.path(), "func.nii.gz");

        let mut degree = DegreeCentrality::with_cmd(cmd);
        degree.prefix("degree_centrality.nii.gz").dataset(dataset);
        let p = Pipeline::build(WorkflowConfig::default(), degree).unwrap();

        let work = dir.path().join("work");
        let outs = p.run(&work).unwrap();
        let expected = work
            .join("network_centrality")
            .join(stage::DEGREE)
            .join("degree_centrality.nii.gz");
        assert_eq!(outs.degree_output, expected);
        assert!(expected.exists());
        assert_eq!(outs.one_d_output, None);
        assert_eq!(outs.eigen_output, None);
    }

    #[test]
    fn test_eigen_run() {
        let dir = tempfile::tempdir().unwrap();
        // 3 个 mask 体素两两相似.
        let mut mask = Array3::<f32>::zeros((3, 2, 1));
        for p in [(0, 0, 0), (2, 0, 0), (1, 1, 0)] {
            mask[p] = 1.0;
        }
        let mask_path = dir.path().join("mask.nii.gz");
        write_template(&mask_path, &mask);
        let sim = SimilarityMatrix::new(
            [3, 2, 1],
            Affine::identity(),
            [(0, 2, 0.8), (0, 4, 0.8), (2, 4, 0.8)],
        );
        let prepared = dir.path().join("prepared.1D");
        sim.write_to(fs::File::create(&prepared).unwrap()).unwrap();

        let cmd = fake_afni(dir.path(), Some(&prepared));
        let dataset = touch(dir.path(), "func.nii.gz");
        let mut degree = DegreeCentrality::with_cmd(cmd);
        degree
            .prefix("degree_centrality.nii.gz")
            .mask(&mask_path)
            .dataset(dataset);
        let config = WorkflowConfig {
            run_eigen: true,
            num_threads: 2,
            ..Default::default()
        };
        let p = Pipeline::build(config, degree).unwrap();

        let outs = p.run(dir.path()).unwrap();
        let root = dir.path().join("network_centrality");
        assert_eq!(
            outs.one_d_output,
            Some(root.join(stage::DEGREE).join("similarity_matrix.1D"))
        );
        let eigen = outs.eigen_output.unwrap();
        assert_eq!(
            eigen,
            root.join(stage::EIGEN).join("eigenvector_centrality.nii.gz")
        );
        assert!(eigen.exists());
    }

    #[test]
    fn test_failure_stops_downstream() {
        let dir = tempfile::tempdir().unwrap();
        let mask = touch(dir.path(), "mask.nii.gz");
        let dataset = touch(dir.path(), "func.nii.gz");

        // 缺少 prefix: 在启动进程前被拒绝.
        let mut degree = DegreeCentrality::with_cmd(dir.path().join("missing-binary"));
        degree.mask(mask).dataset(dataset);
        let config = WorkflowConfig {
            run_eigen: true,
            ..Default::default()
        };
        let p = Pipeline::build(config, degree).unwrap();
        let err = p.run(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: stage::DEGREE,
                source: StageError::Command(CommandError::MissingMandatory("prefix")),
            }
        ));
        assert!(!dir
            .path()
            .join("network_centrality")
            .join(stage::EIGEN)
            .exists());
    }

    #[test]
    fn test_bad_similarity_file_is_a_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut mask = Array3::<f32>::zeros((2, 1, 1));
        mask[(0, 0, 0)] = 1.0;
        mask[(1, 0, 0)] = 1.0;
        let mask_path = dir.path().join("mask.nii");
        write_template(&mask_path, &mask);

        // 1D 文件只有维度没有仿射矩阵.
        let cmd = fake_afni(dir.path(), None);
        let dataset = touch(dir.path(), "func.nii.gz");
        let mut degree = DegreeCentrality::with_cmd(cmd);
        degree.prefix("deg.nii.gz").mask(&mask_path).dataset(dataset);
        let config = WorkflowConfig {
            run_eigen: true,
            ..Default::default()
        };
        let err = Pipeline::build(config, degree)
            .unwrap()
            .run(dir.path())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: stage::EIGEN,
                source: StageError::Calc(CalcError::Parse(_)),
            }
        ));
    }
}
