use crate::exec::executor::Executor;
use crate::report::{ExecutionResult, SkipReason};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What happened to one accepted command
#[derive(Debug, Clone)]
pub enum SlotResult {
    Ran(ExecutionResult),
    Skipped(SkipReason),
}

/// An accepted command waiting for a worker
#[derive(Debug, Clone)]
pub struct Job {
    pub index: usize,
    pub argv: Vec<String>,
}

/// Bounded-concurrency pool feeding accepted commands to the executor.
///
/// Jobs are dispatched in index order. Before each dispatch the running total
/// of bytes captured by already-finished commands is compared with the batch
/// budget; once it is reached, that job and every later one are skipped. Jobs
/// already running are never cut short by the budget.
#[derive(Debug)]
pub struct Scheduler {
    executor: Arc<Executor>,
    max_parallel: usize,
    max_total_output: usize,
}

impl Scheduler {
    pub fn new(executor: Executor, max_parallel: usize, max_total_output: usize) -> Self {
        Self {
            executor: Arc::new(executor),
            max_parallel: max_parallel.max(1),
            max_total_output,
        }
    }

    /// Run `jobs`, returning one slot per batch index (`slots` long).
    ///
    /// Indices without a job stay `None`.
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        slots: usize,
        cancel: &CancellationToken,
    ) -> Vec<Option<SlotResult>> {
        let mut results: Vec<Option<SlotResult>> = (0..slots).map(|_| None).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let emitted = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();
        let mut dispatched = Vec::with_capacity(jobs.len());
        let mut stopped: Option<SkipReason> = None;

        let mut pending = jobs.into_iter();
        for job in pending.by_ref() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                results[job.index] = Some(SlotResult::Skipped(SkipReason::Cancelled));
                stopped = Some(SkipReason::Cancelled);
                break;
            };

            let total = emitted.load(Ordering::Acquire);
            if total >= self.max_total_output {
                tracing::info!(
                    index = job.index,
                    total,
                    budget = self.max_total_output,
                    "output budget exhausted, skipping remaining commands"
                );
                results[job.index] = Some(SlotResult::Skipped(SkipReason::BudgetExceeded));
                stopped = Some(SkipReason::BudgetExceeded);
                break;
            }

            let executor = Arc::clone(&self.executor);
            let emitted = Arc::clone(&emitted);
            let cancel = cancel.clone();
            dispatched.push(job.index);
            workers.spawn(async move {
                // Released after the byte count is published
                let _permit = permit;
                let result = executor.run(&job.argv, &cancel).await;
                emitted.fetch_add(result.emitted_bytes(), Ordering::AcqRel);
                (job.index, result)
            });
        }

        if let Some(reason) = stopped {
            for job in pending {
                results[job.index] = Some(SlotResult::Skipped(reason));
            }
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(SlotResult::Ran(result)),
                Err(e) => tracing::error!(error = %e, "worker task failed"),
            }
        }

        // A worker that panicked still owes its slot a result
        for index in dispatched {
            if results[index].is_none() {
                results[index] = Some(SlotResult::Ran(ExecutionResult {
                    error: Some("worker task failed".to_string()),
                    ..Default::default()
                }));
            }
        }

        results
    }
}
