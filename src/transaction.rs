use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::arena::HandleId;
use crate::constants::EINVAL;
use crate::database::Database;
use crate::engine::{Engine, MemoryEngine};
use crate::error::{Error, UsageError};
use crate::flags::{translate, Options};
use crate::store::Shared;
use crate::task::{Op, Produced, Task};

type Result<T> = std::result::Result<T, UsageError>;

/// Engine transaction handle
pub struct Transaction<E: Engine = MemoryEngine> {
    /// Owning store
    store: Rc<Shared<E>>,
    /// Arena slot of the engine transaction
    id: HandleId,
    /// Environment the transaction runs in
    env: HandleId,
}

impl<E: Engine> Clone for Transaction<E> {
    fn clone(&self) -> Self {
        Transaction {
            store: Rc::clone(&self.store),
            id: self.id,
            env: self.env,
        }
    }
}

impl<E: Engine> fmt::Debug for Transaction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("env", &self.env)
            .finish()
    }
}

impl<E: Engine> Transaction<E> {
    /// Register the transaction produced by a completed begin
    pub(crate) fn from_task(
        store: &Rc<Shared<E>>,
        env: HandleId,
        task: Task<E>,
    ) -> std::result::Result<Transaction<E>, Error> {
        let mut task = task.into_result()?;
        match task.take_produced() {
            Produced::Txn(txn) => {
                let id = store.handles.borrow_mut().txns.insert(txn);
                debug!("transaction {:?} begun", id);
                Ok(Transaction {
                    store: Rc::clone(store),
                    id,
                    env,
                })
            }
            _ => Err(Error::from_code(EINVAL)),
        }
    }

    /// Begin a transaction nested in this one
    pub fn begin<F>(&self, options: &Options, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<Transaction<E>, Error>) + 'static,
    {
        let parent = self.store.txn(self.id)?;
        let env = self.store.env(self.env)?;
        let task = Task::new(
            Op::TxnBegin {
                env,
                parent: Some(parent),
            },
            translate(options),
        );
        let env_id = self.env;
        self.store.submit(
            task,
            Box::new(move |store, task| done(Transaction::from_task(store, env_id, task))),
        );
        Ok(())
    }

    fn retire(&self) -> Result<E::Txn> {
        self.store
            .handles
            .borrow_mut()
            .txns
            .remove(self.id)
            .ok_or(UsageError::StaleHandle { kind: "transaction" })
    }

    /// Commit the transaction. The handle is unusable once this returns `Ok`.
    pub fn commit<F>(&self, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<(), Error>) + 'static,
    {
        let txn = self.retire()?;
        debug!("transaction {:?} committing", self.id);
        self.store
            .submit(Task::new(Op::TxnCommit(txn), 0), Box::new(move |_, task| done(task.into_unit())));
        Ok(())
    }

    /// Abort the transaction. The handle is unusable once this returns `Ok`.
    pub fn abort<F>(&self, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<(), Error>) + 'static,
    {
        let txn = self.retire()?;
        debug!("transaction {:?} aborting", self.id);
        self.store
            .submit(Task::new(Op::TxnAbort(txn), 0), Box::new(move |_, task| done(task.into_unit())));
        Ok(())
    }

    /// A handle on the same engine database whose operations run in this
    /// transaction. `db` itself is unaffected.
    pub fn wrap(&self, db: &Database<E>) -> Result<Database<E>> {
        if !Rc::ptr_eq(&self.store, db.store()) {
            return Err(UsageError::ForeignHandle { kind: "database" });
        }
        self.store.txn(self.id)?;
        self.store.db(db.id())?;
        Ok(db.scoped(self.id))
    }

    /// Whether the handle still refers to a live transaction
    pub fn is_active(&self) -> bool {
        self.store.handles.borrow().txns.contains(self.id)
    }
}
