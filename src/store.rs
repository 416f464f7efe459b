use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::arena::{Arena, HandleId};
use crate::config::Config;
use crate::database::Database;
use crate::dispatch::{Continuation, Dispatcher};
use crate::engine::{Engine, MemoryEngine};
use crate::env::Environment;
use crate::error::{Error, Result, UsageError};
use crate::task::Task;

/// Engine handles owned by a store, addressed by generation-checked ids
pub(crate) struct Handles<E: Engine> {
    pub envs: Arena<E::Env>,
    pub dbs: Arena<E::Db>,
    pub txns: Arena<E::Txn>,
    pub cursors: Arena<E::Cursor>,
}

impl<E: Engine> Handles<E> {
    /// Live handles of every kind
    pub fn len(&self) -> usize {
        self.envs.len() + self.dbs.len() + self.txns.len() + self.cursors.len()
    }
}

impl<E: Engine> Default for Handles<E> {
    fn default() -> Self {
        Handles {
            envs: Arena::new(),
            dbs: Arena::new(),
            txns: Arena::new(),
            cursors: Arena::new(),
        }
    }
}

/// State shared by a store and every handle object created from it
pub(crate) struct Shared<E: Engine> {
    pub engine: Arc<E>,
    pub config: Config,
    pub handles: RefCell<Handles<E>>,
    pub dispatcher: Dispatcher<E>,
    pub active_env: Cell<Option<HandleId>>,
}

fn stale(kind: &'static str) -> UsageError {
    UsageError::StaleHandle { kind }
}

impl<E: Engine> Shared<E> {
    pub(crate) fn env(&self, id: HandleId) -> std::result::Result<E::Env, UsageError> {
        self.handles.borrow().envs.get(id).cloned().ok_or_else(|| stale("environment"))
    }

    pub(crate) fn db(&self, id: HandleId) -> std::result::Result<E::Db, UsageError> {
        self.handles.borrow().dbs.get(id).cloned().ok_or_else(|| stale("database"))
    }

    pub(crate) fn txn(&self, id: HandleId) -> std::result::Result<E::Txn, UsageError> {
        self.handles.borrow().txns.get(id).cloned().ok_or_else(|| stale("transaction"))
    }

    pub(crate) fn opt_txn(&self, id: Option<HandleId>) -> std::result::Result<Option<E::Txn>, UsageError> {
        id.map(|id| self.txn(id)).transpose()
    }

    pub(crate) fn cursor(&self, id: HandleId) -> std::result::Result<E::Cursor, UsageError> {
        self.handles.borrow().cursors.get(id).cloned().ok_or_else(|| stale("cursor"))
    }

    pub(crate) fn submit(&self, task: Task<E>, done: Continuation<E>) {
        self.dispatcher.submit(Arc::clone(&self.engine), task, done);
    }
}

/// Owner of an engine, its handles and the worker pool.
///
/// Handle objects hold a reference to the store they were created from and
/// can only be used on the thread that owns it. Continuations run inside
/// [`Store::run`] and [`Store::poll`].
pub struct Store<E: Engine = MemoryEngine> {
    shared: Rc<Shared<E>>,
}

impl<E: Engine> Clone for Store<E> {
    fn clone(&self) -> Self {
        Store {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<E: Engine> fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.shared.config)
            .field("handles", &self.shared.handles.borrow().len())
            .field("pending", &self.shared.dispatcher.pending())
            .finish()
    }
}

impl Store<MemoryEngine> {
    /// A store over the in-memory engine, configured from the environment
    pub fn memory() -> io::Result<Self> {
        Store::new(MemoryEngine::new(), Config::from_env())
    }
}

impl<E: Engine> Store<E> {
    pub fn new(engine: E, config: Config) -> io::Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        Ok(Store {
            shared: Rc::new(Shared {
                engine: Arc::new(engine),
                config,
                handles: RefCell::new(Handles::default()),
                dispatcher,
                active_env: Cell::new(None),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    /// Create the store's environment. Only one may be active at a time.
    pub fn create_env(&self) -> Result<Environment<E>> {
        if let Some(active) = self.shared.active_env.get() {
            if self.shared.handles.borrow().envs.contains(active) {
                return Err(UsageError::EnvironmentActive.into());
            }
        }
        let env = self.shared.engine.env_create().map_err(Error::from_code)?;
        let id = self.shared.handles.borrow_mut().envs.insert(env);
        self.shared.active_env.set(Some(id));
        debug!("environment created: {:?}", id);
        Ok(Environment::new(Rc::clone(&self.shared), id))
    }

    /// Create a database, inside `env` when one is given
    pub fn create_db(&self, env: Option<&Environment<E>>) -> Result<Database<E>> {
        let env = match env {
            Some(env) => {
                if !Rc::ptr_eq(env.store(), &self.shared) {
                    return Err(UsageError::ForeignHandle { kind: "environment" }.into());
                }
                Some(self.shared.env(env.id())?)
            }
            None => None,
        };
        let db = self.shared.engine.db_create(env.as_ref()).map_err(Error::from_code)?;
        let id = self.shared.handles.borrow_mut().dbs.insert(db);
        debug!("database created: {:?}", id);
        Ok(Database::new(Rc::clone(&self.shared), id, None))
    }

    /// Run continuations until no submitted task is outstanding
    pub fn run(&self) {
        Dispatcher::run(&self.shared)
    }

    /// Run the continuations of tasks that have already finished; returns how many ran
    pub fn poll(&self) -> usize {
        Dispatcher::poll(&self.shared)
    }

    /// Number of submitted tasks whose continuation has not run
    pub fn pending(&self) -> usize {
        self.shared.dispatcher.pending()
    }
}
