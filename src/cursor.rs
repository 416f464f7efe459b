use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::arena::HandleId;
use crate::dbt::Dbt;
use crate::engine::{Engine, MemoryEngine};
use crate::error::{Error, UsageError};
use crate::flags::{translate, Options};
use crate::store::Shared;
use crate::task::{Op, Task};
use crate::types::Reply;

type Result<T> = std::result::Result<T, UsageError>;

/// Engine cursor handle
pub struct Cursor<E: Engine = MemoryEngine> {
    /// Owning store
    store: Rc<Shared<E>>,
    /// Arena slot of the engine cursor
    id: HandleId,
}

impl<E: Engine> Clone for Cursor<E> {
    fn clone(&self) -> Self {
        Cursor {
            store: Rc::clone(&self.store),
            id: self.id,
        }
    }
}

impl<E: Engine> fmt::Debug for Cursor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("id", &self.id).finish()
    }
}

impl<E: Engine> Cursor<E> {
    pub(crate) fn new(store: Rc<Shared<E>>, id: HandleId) -> Self {
        Cursor { store, id }
    }

    /// Move the cursor as the options direct (`first`, `next`, `set`, ...) and
    /// read the record there. `key` is only needed by the searching operations.
    pub fn get<F>(&self, key: Option<&[u8]>, options: &Options, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<Reply, Error>) + 'static,
    {
        let cursor = self.store.cursor(self.id)?;
        let flags = translate(options);
        let bulk_len = self.store.config.bulk_buffer_len;
        let task = Task::new(Op::CursorGet(cursor), flags)
            .with_key(Dbt::for_input(key, 0, bulk_len))
            .with_data(Dbt::for_input(None, flags, bulk_len));
        self.store
            .submit(task, Box::new(move |_, task| done(task.into_reply())));
        Ok(())
    }

    /// Write `value` at or relative to the cursor
    pub fn put<V, F>(&self, key: Option<&[u8]>, value: V, options: &Options, done: F) -> Result<()>
    where
        V: AsRef<[u8]>,
        F: FnOnce(std::result::Result<Reply, Error>) + 'static,
    {
        let cursor = self.store.cursor(self.id)?;
        let task = Task::new(Op::CursorPut(cursor), translate(options))
            .with_key(key.map_or_else(Dbt::empty, Dbt::supplied))
            .with_data(Dbt::supplied(value.as_ref()));
        self.store
            .submit(task, Box::new(move |_, task| done(task.into_reply())));
        Ok(())
    }

    /// Delete the record under the cursor
    pub fn del<F>(&self, options: &Options, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<(), Error>) + 'static,
    {
        let cursor = self.store.cursor(self.id)?;
        self.store.submit(
            Task::new(Op::CursorDel(cursor), translate(options)),
            Box::new(move |_, task| done(task.into_unit())),
        );
        Ok(())
    }

    /// Close the cursor. The handle is unusable once this returns `Ok`.
    pub fn close<F>(&self, done: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<(), Error>) + 'static,
    {
        let cursor = self
            .store
            .handles
            .borrow_mut()
            .cursors
            .remove(self.id)
            .ok_or(UsageError::StaleHandle { kind: "cursor" })?;
        debug!("cursor {:?} closing", self.id);
        self.store.submit(
            Task::new(Op::CursorClose(cursor), 0),
            Box::new(move |_, task| done(task.into_unit())),
        );
        Ok(())
    }
}
