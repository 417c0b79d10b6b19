//! A reference driver writing generated request parameters as JSON lines.
//!
//! Each worker owns one partitioned parameter source. Workers are polled round-robin, mirroring
//! the interleaving of a concurrent driver, and retire once their source is exhausted or they
//! reached the per-worker limit.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use vectorbench_workload::{BoxedParamSource, Emission, Options, Registry, RequestDescriptor};

#[derive(Serialize)]
struct Line<'a> {
    worker: usize,
    params: &'a RequestDescriptor,
}

#[derive(Debug)]
struct Worker {
    index: usize,
    source: BoxedParamSource,
    emitted: usize,
}

/// Per-worker emission counts of a finished run.
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    /// Number of descriptors written for each worker, by worker index.
    pub emitted: Vec<usize>,
}

impl Summary {
    /// Total number of descriptors written.
    pub fn total(&self) -> usize {
        self.emitted.iter().sum()
    }
}

/// Partitions `source` across `workers` and writes every emission to `out`.
///
/// Without a `limit`, unbounded sources run until the process is stopped.
pub fn generate<W: Write>(
    registry: &Registry,
    source: &str,
    options: &Options,
    workers: usize,
    limit: Option<usize>,
    mut out: W,
) -> Result<Summary> {
    let mut active = (0..workers)
        .map(|index| {
            let source = registry
                .param_source(source, options)
                .with_context(|| format!("failed to create source for worker {index}"))?
                .partition(index, workers);
            Ok(Worker {
                index,
                source,
                emitted: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summary = Summary {
        emitted: vec![0; workers],
    };
    tracing::info!(source, workers, ?limit, "generating parameters");

    while !active.is_empty() {
        let mut retired = Vec::new();
        for (slot, worker) in active.iter_mut().enumerate() {
            if limit.is_some_and(|limit| worker.emitted >= limit) {
                retired.push(slot);
                continue;
            }

            match worker.source.params() {
                Emission::Emitted(params) => {
                    let line = Line {
                        worker: worker.index,
                        params: &params,
                    };
                    serde_json::to_writer(&mut out, &line)?;
                    out.write_all(b"\n")?;
                    worker.emitted += 1;
                }
                Emission::Exhausted => {
                    tracing::debug!(worker = worker.index, emitted = worker.emitted, "worker exhausted");
                    retired.push(slot);
                }
            }
        }

        for slot in retired.into_iter().rev() {
            let worker = active.remove(slot);
            summary.emitted[worker.index] = worker.emitted;
        }
    }

    out.flush()?;
    tracing::info!(total = summary.total(), "all workers retired");
    Ok(summary)
}
