//! Worker dispatch.
//!
//! Engine calls run on the blocking pool of a dedicated tokio runtime. Each
//! finished task travels back over a channel and its continuation runs on the
//! thread that drains the channel, one at a time.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::config::Config;
use crate::engine::Engine;
use crate::store::Shared;
use crate::task::Task;

pub(crate) type TaskId = u64;

/// Caller-side completion of a task
pub(crate) type Continuation<E> = Box<dyn FnOnce(&Rc<Shared<E>>, Task<E>)>;

enum Completion<E: Engine> {
    Done(TaskId, Box<Task<E>>),
    Panicked(TaskId, Box<dyn Any + Send>),
}

pub(crate) struct Dispatcher<E: Engine> {
    runtime: Runtime,
    sender: UnboundedSender<Completion<E>>,
    receiver: RefCell<UnboundedReceiver<Completion<E>>>,
    continuations: RefCell<HashMap<TaskId, Continuation<E>>>,
    next_id: Cell<TaskId>,
}

impl<E: Engine> Dispatcher<E> {
    pub(crate) fn new(config: &Config) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(
            "dispatcher started with {} worker threads",
            config.worker_threads
        );
        Ok(Dispatcher {
            runtime,
            sender,
            receiver: RefCell::new(receiver),
            continuations: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        })
    }

    /// Tasks submitted whose continuation has not run yet
    pub(crate) fn pending(&self) -> usize {
        self.continuations.borrow().len()
    }

    /// Queue `task` for a worker; `done` runs on the caller's thread afterwards
    pub(crate) fn submit(&self, engine: Arc<E>, task: Task<E>, done: Continuation<E>) {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        debug!("task {} queued: {:?}", id, task);
        self.continuations.borrow_mut().insert(id, done);
        let sender = self.sender.clone();
        self.runtime.spawn_blocking(move || {
            let mut task = task;
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
                task.run(&engine);
                task
            }));
            let completion = match outcome {
                Ok(task) => Completion::Done(id, Box::new(task)),
                Err(payload) => Completion::Panicked(id, payload),
            };
            // the receiver is gone only once the store is dropped
            let _ = sender.send(completion);
        });
    }

    fn complete(shared: &Rc<Shared<E>>, completion: Completion<E>) {
        match completion {
            Completion::Done(id, task) => {
                debug!("task {} completed: {:?}", id, task);
                let done = shared.dispatcher.continuations.borrow_mut().remove(&id);
                if let Some(done) = done {
                    done(shared, *task);
                }
            }
            Completion::Panicked(id, payload) => {
                shared.dispatcher.continuations.borrow_mut().remove(&id);
                warn!("task {} panicked on a worker thread", id);
                panic::resume_unwind(payload);
            }
        }
    }

    /// Block until every submitted task, including ones queued by
    /// continuations, has completed
    pub(crate) fn run(shared: &Rc<Shared<E>>) {
        while shared.dispatcher.pending() > 0 {
            let next = shared.dispatcher.receiver.borrow_mut().blocking_recv();
            match next {
                Some(completion) => Self::complete(shared, completion),
                None => break,
            }
        }
    }

    /// Complete whatever has already finished, without blocking
    pub(crate) fn poll(shared: &Rc<Shared<E>>) -> usize {
        let mut completed = 0;
        loop {
            let next = shared.dispatcher.receiver.borrow_mut().try_recv();
            match next {
                Ok(completion) => {
                    Self::complete(shared, completion);
                    completed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return completed,
            }
        }
    }
}
