//! 由体素级相似度构造节点图.

use std::collections::BTreeMap;

use super::error::{CalcError, CalcResult};
use super::sparse::SparseSym;
use crate::consts::TemplateType;
use crate::data::{NiftiHeaderAttr, Template};
use crate::one_d::SimilarityMatrix;

impl Template {
    /// 将体素对之间的相似度转换为模板节点上的对称稀疏矩阵.
    ///
    /// - mask: 每个前景体素是一个节点, 相似度直接作为边权;
    /// - atlas: 每个区域是一个节点, 边权为两区域间所有体素对相似度的均值,
    ///   区域内部的体素对被丢弃.
    ///
    /// 至少一端落在背景上的条目会被跳过.
    pub fn nodes_for(&self, sim: &SimilarityMatrix) -> CalcResult<SparseSym> {
        let (z, y, x) = self.shape();
        let [nx, ny, nz] = sim.extents();
        if (nx, ny, nz) != (x, y, z) {
            return Err(CalcError::ShapeMismatch {
                sim: (nx, ny, nz),
                template: (x, y, z),
            });
        }

        let n = self.node_len();
        let mut skipped = 0_usize;
        let mut pairs = sim.entries().iter().filter_map(|e| {
            match (self.node_of(e.a), self.node_of(e.b)) {
                (Some(a), Some(b)) => Some((a, b, e.value)),
                _ => {
                    skipped += 1;
                    None
                }
            }
        });

        let ans = match self.template_type() {
            TemplateType::Mask => SparseSym::from_triplets(n, pairs.by_ref()),
            TemplateType::Atlas => {
                let mut acc: BTreeMap<(usize, usize), (f64, usize)> = BTreeMap::new();
                let mut intra = 0_usize;
                for (a, b, v) in pairs.by_ref() {
                    if a == b {
                        intra += 1;
                        continue;
                    }
                    let slot = acc.entry((a.min(b), a.max(b))).or_insert((0.0, 0));
                    slot.0 += v;
                    slot.1 += 1;
                }
                log::debug!("丢弃区域内部体素对 {intra} 个");
                SparseSym::from_triplets(
                    n,
                    acc.into_iter()
                        .map(|((a, b), (sum, cnt))| (a, b, sum / cnt as f64)),
                )
            }
        };
        drop(pairs);

        if skipped > 0 {
            log::warn!("{skipped} 个相似度条目落在模板背景上, 已跳过");
        }
        log::info!(
            "节点图: {n} 个节点, {} 个非零元 ({:?})",
            ans.nnz(),
            self.template_type()
        );
        Ok(ans)
    }
}
