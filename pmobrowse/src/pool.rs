use std::io;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads pulling jobs from one queue.
///
/// Workers exit once the pool is dropped and the queue drained. Dropping does
/// not join them: a worker blocked on a slow server finishes on its own.
pub struct FetchPool {
    jobs: Sender<Job>,
    size: usize,
}

impl FetchPool {
    pub fn new(name: &str, size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (jobs, queue) = unbounded::<Job>();

        for index in 0..size {
            let queue: Receiver<Job> = queue.clone();
            thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    while let Ok(job) = queue.recv() {
                        job();
                    }
                    debug!("Fetch worker exiting");
                })?;
        }

        Ok(Self { jobs, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.jobs.send(Box::new(job)).is_err() {
            // Every worker is gone (they only exit when the sender drops)
            warn!("Fetch pool has no live worker, job dropped");
        }
    }
}
