//! Dedicated worker threads for startable components.

use confgraph_config::ConfigError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Work a component hands to its worker thread.
pub type StartTask = Box<dyn FnOnce(WorkerContext) + Send + 'static>;

/// Context passed to a running start task.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    instance_name: String,
    cancelled: Arc<AtomicBool>,
}

impl WorkerContext {
    /// Instance name the worker was started for.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// One spawned worker.
struct Worker {
    handle: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    /// Its component was evicted; drop the entry once the thread exits.
    released: bool,
}

impl Worker {
    fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Worker threads keyed by instance name.
#[derive(Default)]
pub(crate) struct WorkerSet {
    workers: Mutex<HashMap<String, Worker>>,
}

impl WorkerSet {
    /// Spawn `{name}_thread` running `task`.
    pub(crate) fn spawn(&self, name: &str, task: StartTask) -> Result<(), ConfigError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let context = WorkerContext {
            instance_name: name.to_string(),
            cancelled: cancelled.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("{name}_thread"))
            .spawn(move || task(context))
            .map_err(|err| {
                ConfigError::construction(name, format!("failed to spawn worker thread: {err}"))
            })?;
        info!("started worker thread (name={name})");
        let mut workers = self.workers.lock();
        workers.retain(|_, worker| !(worker.released && worker.is_finished()));
        let previous = workers.insert(
            name.to_string(),
            Worker {
                handle: Some(handle),
                cancelled,
                released: false,
            },
        );
        match previous {
            Some(previous) if previous.released => {
                debug!("detached worker of an evicted component (name={name})");
            }
            Some(previous) => {
                warn!("replacing worker handle for re-created component (name={name})");
                previous.cancelled.store(true, Ordering::Release);
            }
            None => {}
        }
        Ok(())
    }

    /// Request cancellation. Returns false when no worker exists.
    pub(crate) fn cancel(&self, name: &str) -> bool {
        match self.workers.lock().get(name) {
            Some(worker) => {
                debug!("cancelling worker (name={name})");
                worker.cancelled.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every worker.
    pub(crate) fn cancel_all(&self) {
        for worker in self.workers.lock().values() {
            worker.cancelled.store(true, Ordering::Release);
        }
    }

    /// Whether the worker finished, or `None` when there is no worker.
    pub(crate) fn is_done(&self, name: &str) -> Option<bool> {
        self.workers.lock().get(name).map(Worker::is_finished)
    }

    /// Block until the worker exits. Returns false when no worker exists.
    ///
    /// The entry of a released worker is dropped once joined.
    pub(crate) fn join(&self, name: &str) -> Result<bool, ConfigError> {
        let handle = match self.workers.lock().get_mut(name) {
            Some(worker) => worker.handle.take(),
            None => return Ok(false),
        };
        let joined = match handle {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.prune(name);
        joined.map_err(|_| ConfigError::construction(name, "worker thread panicked"))?;
        debug!("joined worker thread (name={name})");
        Ok(true)
    }

    /// Join every worker, returning how many there were.
    pub(crate) fn join_all(&self) -> Result<usize, ConfigError> {
        let names = self.workers.lock().keys().cloned().collect::<Vec<_>>();
        for name in &names {
            self.join(name)?;
        }
        Ok(names.len())
    }

    /// Detach a worker from its evicted component without interrupting it.
    ///
    /// The entry stays joinable until the thread exits.
    pub(crate) fn release(&self, name: &str) {
        if let Some(worker) = self.workers.lock().get_mut(name) {
            worker.released = true;
        }
        self.prune(name);
    }

    fn prune(&self, name: &str) {
        let mut workers = self.workers.lock();
        if workers
            .get(name)
            .is_some_and(|worker| worker.released && worker.is_finished())
        {
            workers.remove(name);
            debug!("dropped finished worker entry (name={name})");
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.workers.lock().len()
    }

    /// Move a worker entry to a new instance name.
    pub(crate) fn rename(&self, old: &str, new: &str) {
        let mut workers = self.workers.lock();
        if let Some(worker) = workers.remove(old) {
            workers.insert(new.to_string(), worker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn worker_runs_until_cancelled_and_joins() {
        let workers = WorkerSet::default();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        workers
            .spawn(
                "ticker",
                Box::new(move |ctx: WorkerContext| {
                    assert_eq!(thread::current().name(), Some("ticker_thread"));
                    while !ctx.is_cancelled() {
                        counter.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                    }
                }),
            )
            .expect("spawn");

        assert_eq!(workers.is_done("ticker"), Some(false));
        assert!(workers.cancel("ticker"));
        assert!(workers.join("ticker").expect("join"));
        assert_eq!(workers.is_done("ticker"), Some(true));
        assert!(!workers.cancel("missing"));
        assert!(!workers.join("missing").expect("join"));
    }

    #[test]
    fn panicking_worker_reports_construction_error() {
        let workers = WorkerSet::default();
        workers
            .spawn("boom", Box::new(|_ctx: WorkerContext| panic!("boom")))
            .expect("spawn");
        let err = workers.join("boom").unwrap_err();
        assert!(matches!(err, ConfigError::Construction { .. }));
    }

    #[test]
    fn released_workers_keep_running_until_they_exit() {
        let workers = WorkerSet::default();
        let spin = |ctx: WorkerContext| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
        };
        workers.spawn("gone", Box::new(spin)).expect("spawn gone");
        workers.spawn("kept", Box::new(spin)).expect("spawn kept");

        workers.release("gone");
        assert_eq!(workers.is_done("gone"), Some(false));
        assert_eq!(workers.len(), 2);

        assert!(workers.cancel("gone"));
        assert!(workers.join("gone").expect("join gone"));
        assert_eq!(workers.is_done("gone"), None);
        assert_eq!(workers.len(), 1);

        workers.cancel("kept");
        workers.join("kept").expect("join kept");
        workers.release("kept");
        assert_eq!(workers.len(), 0);
    }
}
