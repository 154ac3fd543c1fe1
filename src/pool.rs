use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// A unit of work handed to a worker. Created per dispatch, dropped after it runs.
pub type Task = BoxFuture<'static, ()>;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Task>>>;

/// Fixed set of workers fed through a queue that holds at most one task per
/// worker. A full queue blocks the dispatcher, which bounds the number of
/// executing tasks to the worker count.
pub struct WorkerPool {
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    /// Runs the dispatcher on the current task until cancellation, then waits
    /// for every worker to finish whatever it was executing.
    pub async fn run<F>(self, make_task: F)
    where
        F: FnMut() -> Task,
    {
        let (tx, rx) = mpsc::channel::<Task>(self.workers);
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let rx = rx.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(worker_loop(id, rx, cancel)));
        }

        dispatch(tx, make_task, &self.cancel).await;

        for (id, handle) in handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                warn!(worker = id, error = %err, "worker task failed");
            }
        }
    }
}

async fn dispatch<F>(tx: mpsc::Sender<Task>, mut make_task: F, cancel: &CancellationToken)
where
    F: FnMut() -> Task,
{
    while !cancel.is_cancelled() {
        let task = make_task();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(task) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    trace!("dispatcher stopped");
}

async fn worker_loop(id: usize, rx: SharedReceiver, cancel: CancellationToken) {
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = async { rx.lock().await.recv().await } => task,
        };

        match task {
            Some(task) => task.await,
            None => break,
        }
    }
    trace!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[derive(Default)]
    struct Gauge {
        dispatched: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        completed: AtomicUsize,
    }

    fn instrumented(gauge: Arc<Gauge>) -> impl FnMut() -> Task {
        move || {
            gauge.dispatched.fetch_add(1, Ordering::SeqCst);
            let gauge = gauge.clone();
            Box::pin(async move {
                let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
                gauge.completed.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_tasks_never_exceed_worker_count() {
        let cancel = CancellationToken::new();
        let gauge = Arc::new(Gauge::default());
        let pool = WorkerPool::new(3, cancel.clone());

        let run = tokio::spawn(pool.run(instrumented(gauge.clone())));
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        run.await.unwrap();

        assert!(gauge.completed.load(Ordering::SeqCst) > 3);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak in-flight was {peak}");
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_stops_after_cancellation() {
        let cancel = CancellationToken::new();
        let gauge = Arc::new(Gauge::default());
        let pool = WorkerPool::new(2, cancel.clone());

        let run = tokio::spawn(pool.run(instrumented(gauge.clone())));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        cancel.cancel();
        run.await.unwrap();

        let dispatched = gauge.dispatched.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gauge.dispatched.load(Ordering::SeqCst), dispatched);
        assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_task_does_not_stall_the_pool() {
        let cancel = CancellationToken::new();
        let gauge = Arc::new(Gauge::default());
        let mut inner = instrumented(gauge.clone());
        let mut first = true;
        let jobs = move || -> Task {
            if std::mem::take(&mut first) {
                Box::pin(async { panic!("task blew up"); })
            } else {
                inner()
            }
        };

        let run = tokio::spawn(WorkerPool::new(2, cancel.clone()).run(jobs));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert!(run.await.is_ok());
        assert!(gauge.completed.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn cancelled_pool_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let gauge = Arc::new(Gauge::default());

        WorkerPool::new(4, cancel).run(instrumented(gauge.clone())).await;

        assert_eq!(gauge.dispatched.load(Ordering::SeqCst), 0);
        assert_eq!(gauge.completed.load(Ordering::SeqCst), 0);
    }
}
