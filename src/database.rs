use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::arena::HandleId;
use crate::constants::EINVAL;
use crate::cursor::Cursor;
use crate::dbt::Dbt;
use crate::engine::{Engine, MemoryEngine};
use crate::error::{Error, IntoResult, Result, UsageError};
use crate::flags::{access_method, translate, Options};
use crate::store::Shared;
use crate::task::{Op, Produced, Task};
use crate::types::Reply;

/// Engine database handle, optionally scoped to a transaction
pub struct Database<E: Engine = MemoryEngine> {
    /// Owning store
    store: Rc<Shared<E>>,
    /// Arena slot of the engine database
    id: HandleId,
    /// Transaction every operation runs in
    txn: Option<HandleId>,
}

impl<E: Engine> Clone for Database<E> {
    fn clone(&self) -> Self {
        Database {
            store: Rc::clone(&self.store),
            id: self.id,
            txn: self.txn,
        }
    }
}

impl<E: Engine> fmt::Debug for Database<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("txn", &self.txn)
            .finish()
    }
}

impl<E: Engine> Database<E> {
    pub(crate) fn new(store: Rc<Shared<E>>, id: HandleId, txn: Option<HandleId>) -> Self {
        Database { store, id, txn }
    }

    pub(crate) fn store(&self) -> &Rc<Shared<E>> {
        &self.store
    }

    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    /// Same engine database, bound to `txn`
    pub(crate) fn scoped(&self, txn: HandleId) -> Self {
        Database::new(Rc::clone(&self.store), self.id, Some(txn))
    }

    /// Whether operations on this handle run in a transaction
    pub fn is_wrapped(&self) -> bool {
        self.txn.is_some()
    }

    fn handles(&self) -> std::result::Result<(E::Db, Option<E::Txn>), UsageError> {
        Ok((self.store.db(self.id)?, self.store.opt_txn(self.txn)?))
    }

    /// Open (or create) the database file; the access method comes from `options`
    pub fn open(&self, file: &str, options: &Options, mode: u32) -> Result<()> {
        let (db, txn) = self.handles()?;
        let dbtype = access_method(options);
        self.store
            .engine
            .db_open(&db, txn.as_ref(), file, dbtype, translate(options), mode)
            .into_result()?;
        debug!("database {:?} opened {} as {:?}", self.id, file, dbtype);
        Ok(())
    }

    /// Set configuration flags; must precede `open`
    pub fn flags(&self, options: &Options) -> Result<()> {
        let db = self.store.db(self.id)?;
        self.store
            .engine
            .db_set_flags(&db, translate(options))
            .into_result()?;
        Ok(())
    }

    /// Close the database. Every handle sharing it, wrapped or not, becomes unusable.
    pub fn close(&self) -> Result<()> {
        let db = self
            .store
            .handles
            .borrow_mut()
            .dbs
            .remove(self.id)
            .ok_or(UsageError::StaleHandle { kind: "database" })?;
        debug!("database {:?} closed", self.id);
        self.store.engine.db_close(&db).into_result()?;
        Ok(())
    }

    /// Open a cursor over the database
    pub fn cursor<F>(&self, options: &Options, done: F) -> std::result::Result<(), UsageError>
    where
        F: FnOnce(std::result::Result<Cursor<E>, Error>) + 'static,
    {
        let (db, txn) = self.handles()?;
        let task = Task::new(Op::DbCursor { db, txn }, translate(options));
        self.store.submit(
            task,
            Box::new(move |store, task| {
                let opened = task.into_result().and_then(|mut task| match task.take_produced() {
                    Produced::Cursor(cursor) => {
                        let id = store.handles.borrow_mut().cursors.insert(cursor);
                        debug!("cursor {:?} opened", id);
                        Ok(Cursor::new(Rc::clone(store), id))
                    }
                    _ => Err(Error::from_code(EINVAL)),
                });
                done(opened)
            }),
        );
        Ok(())
    }

    /// Look up `key`. With `multiple` the reply carries every duplicate.
    pub fn get<K, F>(&self, key: K, options: &Options, done: F) -> std::result::Result<(), UsageError>
    where
        K: AsRef<[u8]>,
        F: FnOnce(std::result::Result<Reply, Error>) + 'static,
    {
        let (db, txn) = self.handles()?;
        let flags = translate(options);
        let bulk_len = self.store.config.bulk_buffer_len;
        let task = Task::new(Op::DbGet { db, txn }, flags)
            .with_key(Dbt::for_input(Some(key.as_ref()), 0, bulk_len))
            .with_data(Dbt::for_input(None, flags, bulk_len));
        self.store
            .submit(task, Box::new(move |_, task| done(task.into_reply())));
        Ok(())
    }

    /// Store `value` under `key`
    pub fn put<K, V, F>(&self, key: K, value: V, options: &Options, done: F) -> std::result::Result<(), UsageError>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        F: FnOnce(std::result::Result<Reply, Error>) + 'static,
    {
        let (db, txn) = self.handles()?;
        let flags = translate(options);
        let task = Task::new(Op::DbPut { db, txn }, flags)
            .with_key(Dbt::supplied(key.as_ref()))
            .with_data(Dbt::supplied(value.as_ref()));
        self.store
            .submit(task, Box::new(move |_, task| done(task.into_reply())));
        Ok(())
    }

    /// Delete `key` and all of its data items
    pub fn del<K, F>(&self, key: K, options: &Options, done: F) -> std::result::Result<(), UsageError>
    where
        K: AsRef<[u8]>,
        F: FnOnce(std::result::Result<(), Error>) + 'static,
    {
        let (db, txn) = self.handles()?;
        let task = Task::new(Op::DbDel { db, txn }, translate(options)).with_key(Dbt::supplied(key.as_ref()));
        self.store
            .submit(task, Box::new(move |_, task| done(task.into_unit())));
        Ok(())
    }
}
