//! 运行结果.

use net_centrality::CentralityOutputs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// 将 `outputs` 的结果写进 `w` 中.
fn describe_into<W: Write>(outputs: &CentralityOutputs, elapsed: Duration, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn path_to_display(p: Option<&PathBuf>) -> String {
        match p {
            Some(p) => p.display().to_string(),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Outputs:")?;
    writeln!(w, "{S4}Degree centrality: {}", outputs.degree_output.display())?;
    writeln!(
        w,
        "{S4}Similarity matrix: {}",
        path_to_display(outputs.one_d_output.as_ref())
    )?;
    writeln!(
        w,
        "{S4}Eigenvector centrality: {}",
        path_to_display(outputs.eigen_output.as_ref())
    )?;
    write!(w, "{S4}Total machine time: {} ms", elapsed.as_millis())?;
    Ok(())
}

/// 一次运行的最终结果.
pub enum RunReport {
    /// 只打印了流水线描述.
    Described { stages: usize },

    /// 流水线执行完毕.
    Finished {
        outputs: CentralityOutputs,
        elapsed: Duration,
    },
}

impl RunReport {
    pub fn described(stages: usize) -> Self {
        Self::Described { stages }
    }

    pub fn finished(outputs: CentralityOutputs, elapsed: Duration) -> Self {
        Self::Finished { outputs, elapsed }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.describe(&mut lock).expect("Writing to stdout error");
    }

    /// 将结果写入 `w`.
    pub fn describe<W: Write>(&self, w: &mut W) -> io::Result<()> {
        utils::sep_to(&mut *w)?;
        match self {
            Self::Described { stages } => write!(w, "Described {stages} stages, nothing executed")?,
            Self::Finished { outputs, elapsed } => describe_into(outputs, *elapsed, w)?,
        }
        writeln!(w)?;
        utils::sep_to(&mut *w)
    }
}
