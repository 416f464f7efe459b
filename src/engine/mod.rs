//! The storage engine seam.
//!
//! Every method is a blocking call returning the engine's status code on
//! failure. Data operations run on worker threads, so handles must be cheap to
//! clone and safe to share.

pub mod memory;

use crate::dbt::Dbt;
use crate::error::EngineResult;
use crate::types::DbType;

pub use memory::MemoryEngine;

pub trait Engine: Send + Sync + 'static {
    type Env: Clone + Send + Sync + 'static;
    type Db: Clone + Send + Sync + 'static;
    type Txn: Clone + Send + Sync + 'static;
    type Cursor: Clone + Send + Sync + 'static;

    fn env_create(&self) -> EngineResult<Self::Env>;
    fn env_open(&self, env: &Self::Env, home: Option<&str>, flags: u32, mode: u32) -> EngineResult<()>;
    fn env_set_flags(&self, env: &Self::Env, flags: u32, on: bool) -> EngineResult<()>;
    fn env_close(&self, env: &Self::Env) -> EngineResult<()>;

    fn txn_begin(
        &self,
        env: &Self::Env,
        parent: Option<&Self::Txn>,
        flags: u32,
    ) -> EngineResult<Self::Txn>;
    fn txn_commit(&self, txn: &Self::Txn, flags: u32) -> EngineResult<()>;
    fn txn_abort(&self, txn: &Self::Txn) -> EngineResult<()>;

    fn db_create(&self, env: Option<&Self::Env>) -> EngineResult<Self::Db>;
    fn db_set_flags(&self, db: &Self::Db, flags: u32) -> EngineResult<()>;
    fn db_open(
        &self,
        db: &Self::Db,
        txn: Option<&Self::Txn>,
        file: &str,
        dbtype: DbType,
        flags: u32,
        mode: u32,
    ) -> EngineResult<()>;
    fn db_close(&self, db: &Self::Db) -> EngineResult<()>;

    /// Look up `key`; the value, and for some operations the key, are written
    /// back into the descriptors.
    fn db_get(
        &self,
        db: &Self::Db,
        txn: Option<&Self::Txn>,
        key: &mut Dbt,
        data: &mut Dbt,
        flags: u32,
    ) -> EngineResult<()>;
    fn db_put(
        &self,
        db: &Self::Db,
        txn: Option<&Self::Txn>,
        key: &mut Dbt,
        data: &mut Dbt,
        flags: u32,
    ) -> EngineResult<()>;
    fn db_del(&self, db: &Self::Db, txn: Option<&Self::Txn>, key: &mut Dbt, flags: u32) -> EngineResult<()>;
    fn db_cursor(&self, db: &Self::Db, txn: Option<&Self::Txn>, flags: u32) -> EngineResult<Self::Cursor>;

    fn cursor_get(&self, cursor: &Self::Cursor, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()>;
    fn cursor_put(&self, cursor: &Self::Cursor, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()>;
    fn cursor_del(&self, cursor: &Self::Cursor, flags: u32) -> EngineResult<()>;
    fn cursor_close(&self, cursor: &Self::Cursor) -> EngineResult<()>;
}
