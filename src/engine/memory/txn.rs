use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use log::trace;
use parking_lot::{Mutex, RwLock};

use super::table::{Delta, Table};
use crate::constants::EINVAL;
use crate::error::EngineResult;

/// A database file held by the engine registry
#[derive(Debug)]
pub(crate) struct DbFile {
    pub id: u64,
    pub path: PathBuf,
    pub table: RwLock<Table>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug)]
struct TxnState {
    status: TxnStatus,
    parent: Option<MemoryTxn>,
    children: Vec<MemoryTxn>,
    /// Keys this transaction wrote, with their new items, by file id
    writes: HashMap<u64, (Arc<DbFile>, Delta)>,
}

#[derive(Debug)]
struct TxnInner {
    id: u64,
    state: Mutex<TxnState>,
}

/// Transaction handle of the in-memory engine.
///
/// Writes are recorded as key-level deltas laid over the parent's view.
/// A child's delta merges into its parent's on commit; a top-level commit
/// replays it over the live file, leaving keys it never wrote untouched.
/// Locks are taken child before parent.
#[derive(Debug, Clone)]
pub struct MemoryTxn(Arc<TxnInner>);

impl MemoryTxn {
    pub(crate) fn begin(id: u64, parent: Option<&MemoryTxn>) -> EngineResult<MemoryTxn> {
        let txn = MemoryTxn(Arc::new(TxnInner {
            id,
            state: Mutex::new(TxnState {
                status: TxnStatus::Active,
                parent: parent.cloned(),
                children: Vec::new(),
                writes: HashMap::new(),
            }),
        }));
        if let Some(parent) = parent {
            let mut state = parent.0.state.lock();
            if state.status != TxnStatus::Active {
                return Err(EINVAL);
            }
            state.children.push(txn.clone());
        }
        trace!("txn {} begin", id);
        Ok(txn)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn is_active(&self) -> bool {
        self.0.state.lock().status == TxnStatus::Active
    }

    /// This transaction's view of `file`, materialised
    fn snapshot(&self, state: &TxnState, file: &DbFile) -> Table {
        let mut table = match &state.parent {
            Some(parent) => parent.view(file, Table::clone),
            None => file.table.read().clone(),
        };
        if let Some((_, delta)) = state.writes.get(&file.id) {
            table.apply(delta);
        }
        table
    }

    fn view<R>(&self, file: &DbFile, f: impl FnOnce(&Table) -> R) -> R {
        let state = self.0.state.lock();
        if state.writes.contains_key(&file.id) {
            return f(&self.snapshot(&state, file));
        }
        match &state.parent {
            Some(parent) => parent.view(file, f),
            None => f(&file.table.read()),
        }
    }

    /// Run `f` against the transaction's view of `file`
    pub(crate) fn read<R>(&self, file: &DbFile, f: impl FnOnce(&Table) -> R) -> EngineResult<R> {
        if !self.is_active() {
            return Err(EINVAL);
        }
        Ok(self.view(file, f))
    }

    /// Run `f` against the transaction's view of `file`, recording the keys it changes
    pub(crate) fn write<R>(&self, file: &Arc<DbFile>, f: impl FnOnce(&mut Table) -> R) -> EngineResult<R> {
        let mut state = self.0.state.lock();
        if state.status != TxnStatus::Active {
            return Err(EINVAL);
        }
        let mut table = self.snapshot(&state, file);
        table.take_journal();
        let out = f(&mut table);
        let touched = table.take_journal();
        if !touched.is_empty() {
            let changes = table.delta_of(touched);
            state
                .writes
                .entry(file.id)
                .or_insert_with(|| (Arc::clone(file), Delta::new()))
                .1
                .extend(changes);
        }
        Ok(out)
    }

    fn detach_from_parent(&self, parent: &MemoryTxn) {
        parent.0.state.lock().children.retain(|c| !Arc::ptr_eq(&c.0, &self.0));
    }

    fn take_children(&self) -> EngineResult<Vec<MemoryTxn>> {
        let mut state = self.0.state.lock();
        if state.status != TxnStatus::Active {
            return Err(EINVAL);
        }
        Ok(mem::take(&mut state.children))
    }

    /// Commit unresolved children, then this transaction
    pub(crate) fn commit(&self) -> EngineResult<()> {
        for child in self.take_children()? {
            if child.is_active() {
                child.commit()?;
            }
        }
        let (parent, writes) = {
            let mut state = self.0.state.lock();
            if state.status != TxnStatus::Active {
                return Err(EINVAL);
            }
            state.status = TxnStatus::Committed;
            (state.parent.take(), mem::take(&mut state.writes))
        };
        match parent {
            Some(parent) => {
                self.detach_from_parent(&parent);
                let mut state = parent.0.state.lock();
                if state.status == TxnStatus::Active {
                    for (id, (file, delta)) in writes {
                        state.writes.entry(id).or_insert_with(|| (file, Delta::new())).1.extend(delta);
                    }
                }
            }
            None => {
                for (_, (file, delta)) in writes {
                    trace!("txn {} applies {} keys to {}", self.0.id, delta.len(), file.path.display());
                    file.table.write().apply(&delta);
                }
            }
        }
        trace!("txn {} committed", self.0.id);
        Ok(())
    }

    /// Abort unresolved children, then discard this transaction's writes
    pub(crate) fn abort(&self) -> EngineResult<()> {
        for child in self.take_children()? {
            if child.is_active() {
                child.abort()?;
            }
        }
        let parent = {
            let mut state = self.0.state.lock();
            if state.status != TxnStatus::Active {
                return Err(EINVAL);
            }
            state.status = TxnStatus::Aborted;
            state.writes.clear();
            state.parent.take()
        };
        if let Some(parent) = parent {
            self.detach_from_parent(&parent);
        }
        trace!("txn {} aborted", self.0.id);
        Ok(())
    }
}

/// An open file seen either directly or through a transaction
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub file: Arc<DbFile>,
    pub txn: Option<MemoryTxn>,
}

impl Binding {
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Table) -> R) -> EngineResult<R> {
        match &self.txn {
            Some(txn) => txn.read(&self.file, f),
            None => Ok(f(&self.file.table.read())),
        }
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Table) -> R) -> EngineResult<R> {
        match &self.txn {
            Some(txn) => txn.write(&self.file, f),
            None => {
                let mut table = self.file.table.write();
                let out = f(&mut table);
                table.take_journal();
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::table::{Dups, Placement};
    use crate::types::DbType;

    fn file() -> Arc<DbFile> {
        Arc::new(DbFile {
            id: 1,
            path: PathBuf::from("test.db"),
            table: RwLock::new(Table::new(DbType::Btree, Dups::None)),
        })
    }

    fn put(txn: &MemoryTxn, file: &Arc<DbFile>, key: &[u8], value: &[u8]) {
        txn.write(file, |t| t.insert(key.to_vec(), value.to_vec(), Placement::Last))
            .unwrap()
            .unwrap();
    }

    fn visible(file: &DbFile, key: &[u8]) -> bool {
        file.table.read().dups(key).is_some()
    }

    #[test]
    fn commit_installs_writes() {
        let file = file();
        let txn = MemoryTxn::begin(1, None).unwrap();
        put(&txn, &file, b"Bali", b"Denpasar");
        assert!(!visible(&file, b"Bali"));
        assert!(txn.read(&file, |t| t.dups(b"Bali").is_some()).unwrap());
        txn.commit().unwrap();
        assert!(visible(&file, b"Bali"));
        assert_eq!(txn.commit(), Err(EINVAL));
    }

    #[test]
    fn abort_discards_writes() {
        let file = file();
        let txn = MemoryTxn::begin(1, None).unwrap();
        put(&txn, &file, b"Bali", b"Denpasar");
        txn.abort().unwrap();
        assert!(!visible(&file, b"Bali"));
        assert_eq!(txn.read(&file, |_| ()), Err(EINVAL));
    }

    #[test]
    fn child_commit_lands_in_parent() {
        let file = file();
        let parent = MemoryTxn::begin(1, None).unwrap();
        let child = MemoryTxn::begin(2, Some(&parent)).unwrap();
        put(&child, &file, b"Java", b"Bandung");
        child.commit().unwrap();
        assert!(parent.is_active());
        assert!(!visible(&file, b"Java"));
        assert!(parent.read(&file, |t| t.dups(b"Java").is_some()).unwrap());
        parent.commit().unwrap();
        assert!(visible(&file, b"Java"));
    }

    #[test]
    fn parent_abort_aborts_children() {
        let file = file();
        let parent = MemoryTxn::begin(1, None).unwrap();
        let child = MemoryTxn::begin(2, Some(&parent)).unwrap();
        put(&child, &file, b"Java", b"Bandung");
        parent.abort().unwrap();
        assert!(!child.is_active());
        assert!(!visible(&file, b"Java"));
    }

    #[test]
    fn parent_commit_commits_children() {
        let file = file();
        let parent = MemoryTxn::begin(1, None).unwrap();
        let child = MemoryTxn::begin(2, Some(&parent)).unwrap();
        put(&child, &file, b"Java", b"Bandung");
        parent.commit().unwrap();
        assert!(visible(&file, b"Java"));
    }

    #[test]
    fn commit_keeps_live_writes_to_other_keys() {
        let file = file();
        let txn = MemoryTxn::begin(1, None).unwrap();
        put(&txn, &file, b"Bali", b"Denpasar");
        file.table
            .write()
            .insert(b"Java".to_vec(), b"Pasuruan".to_vec(), Placement::Last)
            .unwrap();
        assert!(txn.read(&file, |t| t.dups(b"Java").is_some()).unwrap());
        txn.commit().unwrap();
        assert!(visible(&file, b"Bali"));
        assert!(visible(&file, b"Java"));
    }

    #[test]
    fn sibling_transactions_on_different_keys_both_land() {
        let file = file();
        let first = MemoryTxn::begin(1, None).unwrap();
        let second = MemoryTxn::begin(2, None).unwrap();
        put(&first, &file, b"Bali", b"Denpasar");
        put(&second, &file, b"Java", b"Pasuruan");
        first.commit().unwrap();
        second.commit().unwrap();
        assert!(visible(&file, b"Bali"));
        assert!(visible(&file, b"Java"));
    }

    #[test]
    fn deletes_are_replayed_at_commit() {
        let file = file();
        file.table
            .write()
            .insert(b"Bali".to_vec(), b"Denpasar".to_vec(), Placement::Last)
            .unwrap();
        let txn = MemoryTxn::begin(1, None).unwrap();
        txn.write(&file, |t| t.remove_key(b"Bali")).unwrap().unwrap();
        assert!(visible(&file, b"Bali"));
        assert!(!txn.read(&file, |t| t.dups(b"Bali").is_some()).unwrap());
        txn.commit().unwrap();
        assert!(!visible(&file, b"Bali"));
    }

    #[test]
    fn failed_writes_leave_no_delta() {
        let file = file();
        let txn = MemoryTxn::begin(1, None).unwrap();
        let err = txn.write(&file, |t| t.remove_key(b"Bali")).unwrap();
        assert_eq!(err, Err(crate::constants::DB_NOTFOUND));
        assert!(txn.0.state.lock().writes.is_empty());
        txn.abort().unwrap();
    }

    #[test]
    fn no_children_of_finished_transactions() {
        let parent = MemoryTxn::begin(1, None).unwrap();
        parent.abort().unwrap();
        assert_eq!(MemoryTxn::begin(2, Some(&parent)).unwrap_err(), EINVAL);
    }
}
