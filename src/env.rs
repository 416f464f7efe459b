use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::arena::HandleId;
use crate::engine::{Engine, MemoryEngine};
use crate::error::{Error, IntoResult, Result, UsageError};
use crate::flags::{translate, Options};
use crate::store::Shared;
use crate::task::{Op, Task};
use crate::transaction::Transaction;

/// Engine environment handle
pub struct Environment<E: Engine = MemoryEngine> {
    /// Owning store
    store: Rc<Shared<E>>,
    /// Arena slot of the engine environment
    id: HandleId,
}

impl<E: Engine> Clone for Environment<E> {
    fn clone(&self) -> Self {
        Environment {
            store: Rc::clone(&self.store),
            id: self.id,
        }
    }
}

impl<E: Engine> fmt::Debug for Environment<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment").field("id", &self.id).finish()
    }
}

impl<E: Engine> Environment<E> {
    pub(crate) fn new(store: Rc<Shared<E>>, id: HandleId) -> Self {
        Environment { store, id }
    }

    pub(crate) fn store(&self) -> &Rc<Shared<E>> {
        &self.store
    }

    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    /// Open the environment rooted at `home`
    pub fn open(&self, home: Option<&str>, options: &Options, mode: u32) -> Result<()> {
        let env = self.store.env(self.id)?;
        self.store
            .engine
            .env_open(&env, home, translate(options), mode)
            .into_result()?;
        debug!("environment {:?} opened at {:?}", self.id, home);
        Ok(())
    }

    /// Turn the named configuration flags on or off
    pub fn flags(&self, options: &Options, on: bool) -> Result<()> {
        let env = self.store.env(self.id)?;
        self.store
            .engine
            .env_set_flags(&env, translate(options), on)
            .into_result()?;
        Ok(())
    }

    /// Close the environment. The handle is unusable afterwards, whatever the outcome.
    pub fn close(&self) -> Result<()> {
        let env = self
            .store
            .handles
            .borrow_mut()
            .envs
            .remove(self.id)
            .ok_or(UsageError::StaleHandle { kind: "environment" })?;
        if self.store.active_env.get() == Some(self.id) {
            self.store.active_env.set(None);
        }
        debug!("environment {:?} closed", self.id);
        self.store.engine.env_close(&env).into_result()?;
        Ok(())
    }

    /// Begin a top-level transaction
    pub fn begin<F>(&self, options: &Options, done: F) -> std::result::Result<(), UsageError>
    where
        F: FnOnce(std::result::Result<Transaction<E>, Error>) + 'static,
    {
        let env = self.store.env(self.id)?;
        let task = Task::new(Op::TxnBegin { env, parent: None }, translate(options));
        let env_id = self.id;
        self.store.submit(
            task,
            Box::new(move |store, task| done(Transaction::from_task(store, env_id, task))),
        );
        Ok(())
    }
}
