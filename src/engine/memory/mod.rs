//! In-process reference engine.
//!
//! Database files live in an engine-wide registry keyed by their resolved
//! path, so separately opened handles on the same file share records. Nothing
//! is written to disk; the directories named must exist.

mod cursor;
mod table;
mod txn;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use self::table::{stored_key, Dups, Placement, Table};
use self::txn::{Binding, DbFile};
use super::Engine;
use crate::bulk::{required_len, BulkWriter};
use crate::constants::*;
use crate::dbt::Dbt;
use crate::error::EngineResult;
use crate::types::{BulkMode, DbType};

pub use self::cursor::MemoryCursor;
pub use self::txn::MemoryTxn;

/// Pack `items` into a receive buffer, or report the size it would take
pub(crate) fn fill_values(data: &mut Dbt, items: &[Vec<u8>]) -> EngineResult<()> {
    let (buf, size) = data.receive_buffer().ok_or(EINVAL)?;
    let payload = items.iter().map(Vec::len).sum();
    let needed = required_len(BulkMode::Values, items.len(), payload);
    if needed > buf.len() {
        *size = needed;
        return Err(DB_BUFFER_SMALL);
    }
    let mut writer = BulkWriter::new(buf, BulkMode::Values);
    for item in items {
        writer.push_value(item);
    }
    *size = writer.finish();
    Ok(())
}

#[derive(Debug, Default)]
struct EnvState {
    home: Option<PathBuf>,
    open_flags: u32,
    flags: u32,
    opened: bool,
    closed: bool,
}

/// Environment handle of the in-memory engine
#[derive(Debug, Clone, Default)]
pub struct MemoryEnv(Arc<Mutex<EnvState>>);

#[derive(Debug, Default)]
struct DbState {
    env: Option<MemoryEnv>,
    flags: u32,
    dbtype: DbType,
    file: Option<Arc<DbFile>>,
    rdonly: bool,
    closed: bool,
}

/// Database handle of the in-memory engine
#[derive(Debug, Clone, Default)]
pub struct MemoryDb(Arc<Mutex<DbState>>);

impl MemoryDb {
    fn binding(&self, txn: Option<&MemoryTxn>) -> EngineResult<(Binding, DbType, bool)> {
        let state = self.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        let file = state.file.clone().ok_or(EINVAL)?;
        let binding = Binding {
            file,
            txn: txn.cloned(),
        };
        Ok((binding, state.dbtype, state.rdonly))
    }
}

/// Reference engine keeping every database file in memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    files: Mutex<HashMap<PathBuf, Arc<DbFile>>>,
    next_id: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registry key for `file`: its directory must exist
    fn resolve(home: Option<&Path>, file: &str) -> EngineResult<PathBuf> {
        let path = match home {
            Some(home) => home.join(file),
            None => PathBuf::from(file),
        };
        let name = path.file_name().ok_or(EINVAL)?.to_owned();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = fs::canonicalize(&dir).map_err(|_| ENOENT)?;
        if !dir.is_dir() {
            return Err(ENOENT);
        }
        Ok(dir.join(name))
    }

    /// Number of database files the engine holds
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

impl Engine for MemoryEngine {
    type Env = MemoryEnv;
    type Db = MemoryDb;
    type Txn = MemoryTxn;
    type Cursor = MemoryCursor;

    fn env_create(&self) -> EngineResult<MemoryEnv> {
        Ok(MemoryEnv::default())
    }

    fn env_open(&self, env: &MemoryEnv, home: Option<&str>, flags: u32, _mode: u32) -> EngineResult<()> {
        let mut state = env.0.lock();
        if state.closed || state.opened {
            return Err(EINVAL);
        }
        if let Some(home) = home {
            let home = fs::canonicalize(home).map_err(|_| ENOENT)?;
            if !home.is_dir() {
                return Err(ENOENT);
            }
            state.home = Some(home);
        }
        state.open_flags = flags;
        state.opened = true;
        debug!("memory env opened at {:?}", state.home);
        Ok(())
    }

    fn env_set_flags(&self, env: &MemoryEnv, flags: u32, on: bool) -> EngineResult<()> {
        let mut state = env.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        if on {
            state.flags |= flags;
        } else {
            state.flags &= !flags;
        }
        Ok(())
    }

    fn env_close(&self, env: &MemoryEnv) -> EngineResult<()> {
        let mut state = env.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        state.closed = true;
        Ok(())
    }

    fn txn_begin(&self, env: &MemoryEnv, parent: Option<&MemoryTxn>, _flags: u32) -> EngineResult<MemoryTxn> {
        {
            let state = env.0.lock();
            let txn_enabled = EnvOpenFlags::from_bits_truncate(state.open_flags).contains(EnvOpenFlags::INIT_TXN);
            if state.closed || !state.opened || !txn_enabled {
                return Err(EINVAL);
            }
        }
        MemoryTxn::begin(self.next_id(), parent)
    }

    fn txn_commit(&self, txn: &MemoryTxn, _flags: u32) -> EngineResult<()> {
        txn.commit()
    }

    fn txn_abort(&self, txn: &MemoryTxn) -> EngineResult<()> {
        txn.abort()
    }

    fn db_create(&self, env: Option<&MemoryEnv>) -> EngineResult<MemoryDb> {
        if let Some(env) = env {
            if env.0.lock().closed {
                return Err(EINVAL);
            }
        }
        Ok(MemoryDb(Arc::new(Mutex::new(DbState {
            env: env.cloned(),
            ..DbState::default()
        }))))
    }

    fn db_set_flags(&self, db: &MemoryDb, flags: u32) -> EngineResult<()> {
        let mut state = db.0.lock();
        if state.closed || state.file.is_some() {
            return Err(EINVAL);
        }
        state.flags |= flags;
        Ok(())
    }

    fn db_open(
        &self,
        db: &MemoryDb,
        _txn: Option<&MemoryTxn>,
        file: &str,
        dbtype: DbType,
        flags: u32,
        _mode: u32,
    ) -> EngineResult<()> {
        let mut state = db.0.lock();
        if state.closed || state.file.is_some() {
            return Err(EINVAL);
        }
        let home = match &state.env {
            Some(env) => {
                let env = env.0.lock();
                if !env.opened || env.closed {
                    return Err(EINVAL);
                }
                env.home.clone()
            }
            None => None,
        };
        let path = Self::resolve(home.as_deref(), file)?;
        let open = DbOpenFlags::from_bits_truncate(flags);
        let mut files = self.files.lock();
        let entry = match files.get(&path) {
            Some(existing) => {
                if open.contains(DbOpenFlags::CREATE | DbOpenFlags::EXCL) {
                    return Err(EEXIST);
                }
                let mut table = existing.table.write();
                if dbtype != DbType::Unknown && dbtype != table.dbtype {
                    return Err(EINVAL);
                }
                if open.contains(DbOpenFlags::TRUNCATE) {
                    table.clear();
                }
                Arc::clone(existing)
            }
            None => {
                if !open.contains(DbOpenFlags::CREATE) {
                    return Err(ENOENT);
                }
                let dups = Dups::from_db_flags(state.flags);
                if dbtype == DbType::Unknown || (dbtype.is_record_based() && dups != Dups::None) {
                    return Err(EINVAL);
                }
                let created = Arc::new(DbFile {
                    id: self.next_id(),
                    path: path.clone(),
                    table: RwLock::new(Table::new(dbtype, dups)),
                });
                files.insert(path.clone(), Arc::clone(&created));
                debug!("memory engine created {} ({:?})", path.display(), dbtype);
                created
            }
        };
        state.dbtype = entry.table.read().dbtype;
        state.rdonly = open.contains(DbOpenFlags::RDONLY);
        state.file = Some(entry);
        Ok(())
    }

    fn db_close(&self, db: &MemoryDb) -> EngineResult<()> {
        let mut state = db.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        state.closed = true;
        state.file = None;
        Ok(())
    }

    fn db_get(
        &self,
        db: &MemoryDb,
        txn: Option<&MemoryTxn>,
        key: &mut Dbt,
        data: &mut Dbt,
        flags: u32,
    ) -> EngineResult<()> {
        let (binding, dbtype, _) = db.binding(txn)?;
        let stored = stored_key(dbtype, key.data().ok_or(EINVAL)?)?;
        let op = flags & OPFLAGS_MASK;
        let bulk = BulkMode::from_flags(flags);
        trace!("db get op {} bulk {:?}", op, bulk);
        binding.read(|table| -> EngineResult<()> {
            let items = table.dups(&stored).ok_or(DB_NOTFOUND)?;
            match (op, bulk) {
                (0, None) => {
                    let first = items.first().ok_or(DB_NOTFOUND)?;
                    data.set_output(first.clone());
                    Ok(())
                }
                (0, Some(BulkMode::Values)) => fill_values(data, items),
                (DB_GET_BOTH, None) => {
                    let wanted = data.data().ok_or(EINVAL)?.to_vec();
                    if !items.contains(&wanted) {
                        return Err(DB_NOTFOUND);
                    }
                    data.set_output(wanted);
                    Ok(())
                }
                _ => Err(EINVAL),
            }
        })?
    }

    fn db_put(
        &self,
        db: &MemoryDb,
        txn: Option<&MemoryTxn>,
        key: &mut Dbt,
        data: &mut Dbt,
        flags: u32,
    ) -> EngineResult<()> {
        let (binding, dbtype, rdonly) = db.binding(txn)?;
        if rdonly {
            return Err(EACCES);
        }
        let value = data.data().ok_or(EINVAL)?.to_vec();
        let op = flags & OPFLAGS_MASK;
        if op == DB_APPEND {
            if !dbtype.is_record_based() {
                return Err(EINVAL);
            }
            let recno = binding.write(|table| -> EngineResult<u32> {
                let recno = table.next_recno()?;
                table.insert(recno.to_be_bytes().to_vec(), value, Placement::Last)?;
                Ok(recno)
            })??;
            key.set_output(recno.to_ne_bytes().to_vec());
            return Ok(());
        }
        let stored = stored_key(dbtype, key.data().ok_or(EINVAL)?)?;
        let placement = match op {
            0 | DB_NOOVERWRITE => Placement::Last,
            DB_NODUPDATA => Placement::NoDupData,
            DB_OVERWRITE_DUP => Placement::OverwriteDup,
            _ => return Err(EINVAL),
        };
        binding.write(|table| -> EngineResult<()> {
            if op == DB_NOOVERWRITE && table.dups(&stored).is_some() {
                return Err(DB_KEYEXIST);
            }
            table.insert(stored, value, placement).map(drop)
        })?
    }

    fn db_del(&self, db: &MemoryDb, txn: Option<&MemoryTxn>, key: &mut Dbt, _flags: u32) -> EngineResult<()> {
        let (binding, dbtype, rdonly) = db.binding(txn)?;
        if rdonly {
            return Err(EACCES);
        }
        let stored = stored_key(dbtype, key.data().ok_or(EINVAL)?)?;
        binding.write(|table| table.remove_key(&stored))?
    }

    fn db_cursor(&self, db: &MemoryDb, txn: Option<&MemoryTxn>, _flags: u32) -> EngineResult<MemoryCursor> {
        let (binding, dbtype, rdonly) = db.binding(txn)?;
        Ok(MemoryCursor::new(binding, dbtype, rdonly))
    }

    fn cursor_get(&self, cursor: &MemoryCursor, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()> {
        cursor.get(key, data, flags)
    }

    fn cursor_put(&self, cursor: &MemoryCursor, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()> {
        cursor.put(key, data, flags)
    }

    fn cursor_del(&self, cursor: &MemoryCursor, _flags: u32) -> EngineResult<()> {
        cursor.del()
    }

    fn cursor_close(&self, cursor: &MemoryCursor) -> EngineResult<()> {
        cursor.close()
    }
}
