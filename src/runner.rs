//! Pluggable execution strategies for action bodies.
//!
//! The promise state machine is runner-agnostic: a runner only decides *where*
//! a deferred body executes. Three strategies are provided; anything else
//! (an existing executor, a test harness) implements [`AsyncRunner`] itself.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

/// A unit of work handed to a runner.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where deferred bodies run.
pub trait AsyncRunner: Send + Sync {
    fn run(&self, job: Job);
}

/// Spawns a fresh OS thread per body.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewThreadRunner;

impl AsyncRunner for NewThreadRunner {
    fn run(&self, job: Job) {
        let spawned = thread::Builder::new()
            .name("defer-action".into())
            .spawn(job);
        if let Err(err) = spawned {
            log::warn!("failed to spawn action thread, job dropped: {err}");
        }
    }
}

/// Runs the body on the calling thread, synchronously. Start returns only
/// after the body finished; useful in tests and for bodies known to be cheap.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerRunner;

impl AsyncRunner for CallerRunner {
    fn run(&self, job: Job) {
        job();
    }
}

/// A fixed-size worker pool fed through a channel. Dropping the runner closes
/// the queue and joins the workers; jobs already queued still run.
pub struct ThreadPoolRunner {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolRunner {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("defer-pool-{n}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .expect("failed to spawn pool worker");
            workers.push(worker);
        }
        ThreadPoolRunner {
            sender: Some(sender),
            workers,
        }
    }
}

impl AsyncRunner for ThreadPoolRunner {
    fn run(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                log::warn!("thread pool is shut down, job dropped");
            }
        }
    }
}

impl Drop for ThreadPoolRunner {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// The default strategy wired into builders when the caller supplies nothing:
/// one new thread per body.
pub fn default_runner() -> Arc<dyn AsyncRunner> {
    Arc::new(NewThreadRunner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn count_up(counter: &Arc<AtomicUsize>) -> Job {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn caller_runner_is_synchronous() {
        let counter = Arc::new(AtomicUsize::new(0));
        CallerRunner.run(count_up(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_thread_runner_runs_the_job() {
        let counter = Arc::new(AtomicUsize::new(0));
        NewThreadRunner.run(count_up(&counter));
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 1 {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("job never ran");
    }

    #[test]
    fn pool_drains_queued_jobs_before_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPoolRunner::new(2);
        for _ in 0..16 {
            pool.run(count_up(&counter));
        }
        drop(pool); // joins workers
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }
}
