//! The row-parallel execution substrate shared by every CPU pass (§4.J).
//!
//! A single process-lifetime [`rayon::ThreadPool`], built lazily the same way the reference
//! crate's downscaling pool is: a `Lazy` static sized from configuration, with a panic handler
//! that logs instead of silently poisoning the pool.

use std::any::Any;
use std::thread;

use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::CONFIG;

fn handle_panic(e: Box<dyn Any + Send>) {
    let msg = e
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| e.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>");
    error!(
        "Unexpected panic in thread {}: {msg}",
        thread::current().name().unwrap_or("unnamed")
    );
}

static POOL: Lazy<ThreadPool> = Lazy::new(|| {
    ThreadPoolBuilder::new()
        .thread_name(|u| format!("denoise-core-{u}"))
        .panic_handler(handle_panic)
        .num_threads(CONFIG.threads.get())
        .build()
        .expect("error creating denoise-core threadpool")
});

/// Number of workers the row-parallel pool below is built with.
pub fn thread_count() -> usize {
    POOL.current_num_threads()
}

/// Runs `f` inside the shared pool and blocks the caller until it returns, matching the
/// reference crate's "implicit join barrier" pattern between phases (§5).
pub fn install<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    POOL.install(f)
}

/// Splits `[0, height)` into `thread_count()` contiguous, non-overlapping row ranges with static
/// scheduling (no work stealing), per §5's ordering guarantees. Ranges may be empty when
/// `height` is smaller than the thread count.
pub fn row_chunks(height: usize) -> Vec<std::ops::Range<usize>> {
    let workers = thread_count().max(1);
    let base = height / workers;
    let rem = height % workers;

    let mut start = 0;
    (0..workers)
        .map(|t| {
            let len = base + usize::from(t < rem);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Runs `f(row_index, row_slice)` over every row of a `height`-row, `row_len`-wide buffer,
/// partitioned into contiguous per-thread stripes (§5: "static scheduling, contiguous chunks, no
/// work stealing"). Blocks until every worker's stripe has finished (the implicit join barrier).
pub fn for_each_row_mut(buf: &mut [f32], row_len: usize, height: usize, f: impl Fn(usize, &mut [f32]) + Sync) {
    let chunks = row_chunks(height);
    install(|| {
        rayon::scope(|s| {
            let mut rest = buf;
            let mut row_start = 0;
            for range in chunks {
                let rows_in_chunk = range.len();
                let split_at = rows_in_chunk * row_len;
                let (chunk, tail) = rest.split_at_mut(split_at);
                rest = tail;
                let base_row = row_start;
                row_start += rows_in_chunk;
                let f = &f;
                s.spawn(move |_| {
                    for (i, row) in chunk.chunks_exact_mut(row_len).enumerate() {
                        f(base_row + i, row);
                    }
                });
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_each_row_mut_visits_every_row_exactly_once() {
        let height = 37;
        let row_len = 3;
        let mut buf = vec![0.0f32; height * row_len];
        for_each_row_mut(&mut buf, row_len, height, |row_idx, row| {
            row[0] = row_idx as f32;
        });
        for row_idx in 0..height {
            assert_eq!(buf[row_idx * row_len], row_idx as f32);
        }
    }

    #[test]
    fn row_chunks_cover_exactly_once() {
        for height in [0, 1, 7, 64, 1001] {
            let chunks = row_chunks(height);
            let mut covered = vec![false; height];
            for r in chunks {
                for row in r {
                    assert!(!covered[row], "row {row} covered twice");
                    covered[row] = true;
                }
            }
            assert!(covered.iter().all(|&c| c), "not every row covered for height {height}");
        }
    }

    #[test]
    fn install_runs_closure() {
        let out = install(|| 1 + 1);
        assert_eq!(out, 2);
    }
}
