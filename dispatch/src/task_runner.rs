use std::thread::{spawn, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of workers fed from an unbounded channel, so submitting a
/// job never blocks the caller. Dispatch attempts and backlog replays run
/// here instead of on the arrival or retry threads.
pub struct TaskRunner {
    job_tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskRunner {
    pub fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(worker_count);
        for num in 0..worker_count {
            let job_rx: Receiver<Job> = job_rx.clone();
            workers.push(spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    job();
                }
                debug!("task worker {} exiting", num);
            }));
        }
        TaskRunner { job_tx, workers }
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // fails only once the workers are gone, at which point the job
        // is moot anyway
        let _ = self.job_tx.send(Box::new(job));
    }

    /// Disconnects the job channel and waits for the workers to drain it.
    pub fn shutdown(self) {
        drop(self.job_tx);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn runs_submitted_jobs() {
        let runner = TaskRunner::new(2);
        let (done_tx, done_rx) = unbounded();
        for num in 0..10 {
            let done_tx = done_tx.clone();
            runner.execute(move || done_tx.send(num).unwrap());
        }
        let mut seen: Vec<i32> = (0..10).map(|_| done_rx.recv().unwrap()).collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shutdown_drains_pending_jobs() {
        let runner = TaskRunner::new(1);
        let (done_tx, done_rx) = unbounded();
        for _ in 0..5 {
            let done_tx = done_tx.clone();
            runner.execute(move || done_tx.send(true).unwrap());
        }
        runner.shutdown();
        assert_eq!(done_rx.try_iter().count(), 5);
    }
}
