//! 特征值计算的线程数约束.
//!
//! BLAS/LAPACK 后端只在环境变量中读取线程数. 为了不让并发的计算互相覆盖,
//! 进程内所有特征值计算通过同一把锁串行执行.

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::consts::afni::{MKL_NUM_THREADS, OMP_NUM_THREADS};

static EIGEN_LOCK: Mutex<()> = Mutex::new(());

const THREAD_VARS: [&str; 2] = [MKL_NUM_THREADS, OMP_NUM_THREADS];

/// 持有期间, 当前进程的特征值计算线程数被固定为 `num_threads`.
/// 析构时恢复原先的环境变量.
pub struct ThreadHint {
    num_threads: usize,
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ThreadHint {
    /// 获取线程数约束. 若其它计算正持有约束, 则阻塞等待.
    pub fn acquire(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        // 持锁线程 panic 不影响环境变量的一致性, 直接接管.
        let lock = EIGEN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let saved = THREAD_VARS
            .iter()
            .map(|&k| (k, env::var_os(k)))
            .collect();
        for k in THREAD_VARS {
            env::set_var(k, num_threads.to_string());
        }
        log::debug!("特征值计算线程数 = {num_threads}");

        Self {
            num_threads,
            saved,
            _lock: lock,
        }
    }

    /// 生效的线程数.
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// 在 `num_threads` 个线程的专属线程池中执行 `op`.
    #[cfg(feature = "rayon")]
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("eigen-{i}"))
            .build()
        {
            Ok(pool) => pool.install(op),
            Err(e) => {
                log::warn!("无法创建计算线程池 ({e}), 改用当前线程");
                op()
            }
        }
    }

    /// 在当前线程执行 `op`. 线程数只通过环境变量约束.
    #[cfg(not(feature = "rayon"))]
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        op()
    }
}

impl Drop for ThreadHint {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_set_and_restored() {
        // 锁空闲时环境变量处于未被约束的状态.
        let snapshot = || {
            let _g = EIGEN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            THREAD_VARS.iter().map(|k| env::var_os(k)).collect::<Vec<_>>()
        };
        let before = snapshot();
        {
            let hint = ThreadHint::acquire(3);
            assert_eq!(hint.num_threads(), 3);
            for k in THREAD_VARS {
                assert_eq!(env::var(k).unwrap(), "3");
            }
            #[cfg(feature = "rayon")]
            assert_eq!(hint.install(rayon::current_num_threads), 3);
        }
        assert_eq!(before, snapshot());
    }

    #[test]
    fn test_zero_threads_means_one() {
        let hint = ThreadHint::acquire(0);
        assert_eq!(hint.num_threads(), 1);
        assert_eq!(hint.install(|| 7), 7);
    }
}
