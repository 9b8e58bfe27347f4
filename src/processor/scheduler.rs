use crossbeam_channel::unbounded;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::processor::ProcessorError;

/// Fixed set of workers that drain a queue of files.
///
/// Every call to [`FileScheduler::run`] is one pass (or one round): the file
/// list is pushed onto a channel that is closed right away, `workers` tasks
/// pull paths until it is empty, and `run` returns only after all of them
/// have finished.
#[derive(Debug)]
pub struct FileScheduler {
    pool: ThreadPool,
    workers: usize,
}

impl FileScheduler {
    pub fn new(workers: usize) -> Result<Self, ProcessorError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("aggregator-worker-{i}"))
            .build()?;
        Ok(FileScheduler { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` once per file. The first error stops the remaining workers
    /// from picking up new files and is returned once they have all stopped.
    pub fn run<F>(&self, files: &[PathBuf], job: F) -> Result<(), ProcessorError>
    where
        F: Fn(&Path) -> Result<(), ProcessorError> + Sync,
    {
        let (tx, rx) = unbounded::<&Path>();
        for file in files {
            // The receiver is alive until the end of this function.
            let _ = tx.send(file.as_path());
        }
        drop(tx);

        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<ProcessorError>> = Mutex::new(None);
        let job = &job;
        let failed_ref = &failed;
        let error_ref = &first_error;

        self.pool.scope(|s| {
            for _ in 0..self.workers.min(files.len()) {
                let rx = rx.clone();
                s.spawn(move |_| {
                    while let Ok(path) = rx.recv() {
                        if failed_ref.load(Ordering::Acquire) {
                            break;
                        }
                        debug!("processing {}", path.display());
                        if let Err(e) = job(path) {
                            failed_ref.store(true, Ordering::Release);
                            error_ref
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(e);
                            break;
                        }
                    }
                });
            }
        });

        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
