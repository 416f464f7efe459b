//! One engine call in flight.

use std::fmt;

use crate::bulk;
use crate::dbt::Dbt;
use crate::engine::Engine;
use crate::error::{EngineResult, Error, Status};
use crate::types::{BulkMode, Decoded, Reply};

/// The engine call a task performs, with the handles it needs
pub(crate) enum Op<E: Engine> {
    TxnBegin { env: E::Env, parent: Option<E::Txn> },
    TxnCommit(E::Txn),
    TxnAbort(E::Txn),
    DbCursor { db: E::Db, txn: Option<E::Txn> },
    DbGet { db: E::Db, txn: Option<E::Txn> },
    DbPut { db: E::Db, txn: Option<E::Txn> },
    DbDel { db: E::Db, txn: Option<E::Txn> },
    CursorGet(E::Cursor),
    CursorPut(E::Cursor),
    CursorDel(E::Cursor),
    CursorClose(E::Cursor),
}

impl<E: Engine> Op<E> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Op::TxnBegin { .. } => "txn_begin",
            Op::TxnCommit(_) => "txn_commit",
            Op::TxnAbort(_) => "txn_abort",
            Op::DbCursor { .. } => "db_cursor",
            Op::DbGet { .. } => "db_get",
            Op::DbPut { .. } => "db_put",
            Op::DbDel { .. } => "db_del",
            Op::CursorGet(_) => "cursor_get",
            Op::CursorPut(_) => "cursor_put",
            Op::CursorDel(_) => "cursor_del",
            Op::CursorClose(_) => "cursor_close",
        }
    }
}

/// Handle created by a completed task
pub(crate) enum Produced<E: Engine> {
    Nothing,
    Txn(E::Txn),
    Cursor(E::Cursor),
}

/// Handles, buffers and flags for one engine call, plus its completion slot
pub(crate) struct Task<E: Engine> {
    pub op: Op<E>,
    pub flags: u32,
    pub key: Dbt,
    pub data: Dbt,
    pub status: Status,
    pub produced: Produced<E>,
}

impl<E: Engine> fmt::Debug for Task<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("op", &self.op.name())
            .field("flags", &format_args!("{:#x}", self.flags))
            .field("status", &self.status)
            .finish()
    }
}

impl<E: Engine> Task<E> {
    pub(crate) fn new(op: Op<E>, flags: u32) -> Self {
        Task {
            op,
            flags,
            key: Dbt::empty(),
            data: Dbt::empty(),
            status: 0,
            produced: Produced::Nothing,
        }
    }

    pub(crate) fn with_key(mut self, key: Dbt) -> Self {
        self.key = key;
        self
    }

    pub(crate) fn with_data(mut self, data: Dbt) -> Self {
        self.data = data;
        self
    }

    /// Perform the blocking engine call and record its status
    pub(crate) fn run(&mut self, engine: &E) {
        let flags = self.flags;
        let result: EngineResult<()> = match &self.op {
            Op::TxnBegin { env, parent } => engine
                .txn_begin(env, parent.as_ref(), flags)
                .map(|txn| self.produced = Produced::Txn(txn)),
            Op::TxnCommit(txn) => engine.txn_commit(txn, flags),
            Op::TxnAbort(txn) => engine.txn_abort(txn),
            Op::DbCursor { db, txn } => engine
                .db_cursor(db, txn.as_ref(), flags)
                .map(|cursor| self.produced = Produced::Cursor(cursor)),
            Op::DbGet { db, txn } => engine.db_get(db, txn.as_ref(), &mut self.key, &mut self.data, flags),
            Op::DbPut { db, txn } => engine.db_put(db, txn.as_ref(), &mut self.key, &mut self.data, flags),
            Op::DbDel { db, txn } => engine.db_del(db, txn.as_ref(), &mut self.key, flags),
            Op::CursorGet(cursor) => engine.cursor_get(cursor, &mut self.key, &mut self.data, flags),
            Op::CursorPut(cursor) => engine.cursor_put(cursor, &mut self.key, &mut self.data, flags),
            Op::CursorDel(cursor) => engine.cursor_del(cursor, flags),
            Op::CursorClose(cursor) => engine.cursor_close(cursor),
        };
        self.status = match result {
            Ok(()) => 0,
            Err(code) => code,
        };
    }

    /// The task itself on success, the engine error otherwise
    pub(crate) fn into_result(self) -> Result<Self, Error> {
        match self.status {
            0 => Ok(self),
            code => Err(Error::from_code(code)),
        }
    }

    /// Completion without a value
    pub(crate) fn into_unit(self) -> Result<(), Error> {
        self.into_result().map(drop)
    }

    /// Value and key the engine reported, decoding bulk buffers
    pub(crate) fn into_reply(self) -> Result<Reply, Error> {
        let task = self.into_result()?;
        let value = match BulkMode::from_flags(task.flags) {
            Some(mode) if task.data.is_user_mem() => {
                let buf = task.data.data().unwrap_or_default();
                Some(bulk::decode(buf, mode).map_err(Error::from_code)?)
            }
            _ => None,
        };
        let Task { key, data, .. } = task;
        let value = match value {
            Some(decoded) => Some(decoded),
            None => data.into_bytes().map(Decoded::Single),
        };
        Ok(Reply {
            value,
            key: key.into_bytes(),
        })
    }

    /// Handle created by the call, if any
    pub(crate) fn take_produced(&mut self) -> Produced<E> {
        std::mem::replace(&mut self.produced, Produced::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::engine::MemoryEngine;
    use crate::types::DbType;
    use tempfile::TempDir;

    fn open_db(engine: &MemoryEngine, dir: &TempDir, db_flags: u32) -> <MemoryEngine as Engine>::Db {
        let db = engine.db_create(None).unwrap();
        engine.db_set_flags(&db, db_flags).unwrap();
        let path = dir.path().join("task.db");
        engine
            .db_open(&db, None, path.to_str().unwrap(), DbType::Btree, DbOpenFlags::CREATE.bits(), 0)
            .unwrap();
        db
    }

    fn put(engine: &MemoryEngine, db: &<MemoryEngine as Engine>::Db, key: &[u8], value: &[u8]) -> Reply {
        let mut task: Task<MemoryEngine> = Task::new(Op::DbPut { db: db.clone(), txn: None }, 0)
            .with_key(Dbt::supplied(key))
            .with_data(Dbt::supplied(value));
        task.run(engine);
        task.into_reply().unwrap()
    }

    #[test]
    fn put_then_get_echoes_key_and_value() {
        let dir = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let db = open_db(&engine, &dir, 0);
        let reply = put(&engine, &db, b"Bali", b"Denpasar");
        assert_eq!(reply.single(), Some(&b"Denpasar"[..]));

        let mut task: Task<MemoryEngine> =
            Task::new(Op::DbGet { db, txn: None }, 0).with_key(Dbt::supplied(b"Bali"));
        task.run(&engine);
        let reply = task.into_reply().unwrap();
        assert_eq!(reply.single(), Some(&b"Denpasar"[..]));
        assert_eq!(reply.key(), Some(&b"Bali"[..]));
    }

    #[test]
    fn engine_failure_becomes_error() {
        let dir = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let db = open_db(&engine, &dir, 0);
        let mut task: Task<MemoryEngine> =
            Task::new(Op::DbGet { db, txn: None }, 0).with_key(Dbt::supplied(b"Sumatra"));
        task.run(&engine);
        assert_eq!(task.status, DB_NOTFOUND);
        let err = task.into_reply().unwrap_err();
        assert_eq!(err.code, DB_NOTFOUND);
    }

    #[test]
    fn bulk_get_is_decoded() {
        let dir = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let db = open_db(&engine, &dir, DbFlags::DUP.bits());
        put(&engine, &db, b"Java", b"Pasuruan");
        put(&engine, &db, b"Java", b"Bandung");
        let flags = OpFlags::MULTIPLE.bits();
        let mut task: Task<MemoryEngine> = Task::new(Op::DbGet { db, txn: None }, flags)
            .with_key(Dbt::supplied(b"Java"))
            .with_data(Dbt::for_input(None, flags, 4096));
        task.run(&engine);
        let reply = task.into_reply().unwrap();
        assert_eq!(
            reply.value,
            Some(Decoded::Values(vec![b"Pasuruan".to_vec(), b"Bandung".to_vec()]))
        );
    }
}
