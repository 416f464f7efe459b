//! Translation of named boolean options into engine flag words.
//!
//! An option set is a map of flag names (the engine constant without its
//! `DB_` prefix, lower-cased) to booleans. Every name set to `true` contributes
//! its bit; unknown names are ignored.

use std::collections::BTreeMap;
use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::constants::*;
use crate::types::DbType;

/// Declarative set of named boolean options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    entries: BTreeMap<String, bool>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// Set a named option, replacing any earlier value
    pub fn set(mut self, name: impl Into<String>, on: bool) -> Self {
        self.entries.insert(name.into(), on);
        self
    }

    /// Whether `name` is present and true
    pub fn is_set(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for Options {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Options {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<S: Into<String>, const N: usize> From<[(S, bool); N]> for Options {
    fn from(entries: [(S, bool); N]) -> Self {
        entries.into_iter().collect()
    }
}

lazy_static! {
    static ref FLAG_TABLE: HashMap<&'static str, u32> = {
        let mut table = HashMap::new();
        // operation codes
        table.insert("after", DB_AFTER);
        table.insert("append", DB_APPEND);
        table.insert("before", DB_BEFORE);
        table.insert("consume", DB_CONSUME);
        table.insert("consume_wait", DB_CONSUME_WAIT);
        table.insert("current", DB_CURRENT);
        table.insert("first", DB_FIRST);
        table.insert("get_both", DB_GET_BOTH);
        table.insert("get_both_range", DB_GET_BOTH_RANGE);
        table.insert("get_recno", DB_GET_RECNO);
        table.insert("join_item", DB_JOIN_ITEM);
        table.insert("keyfirst", DB_KEYFIRST);
        table.insert("keylast", DB_KEYLAST);
        table.insert("last", DB_LAST);
        table.insert("next", DB_NEXT);
        table.insert("next_dup", DB_NEXT_DUP);
        table.insert("next_nodup", DB_NEXT_NODUP);
        table.insert("nodupdata", DB_NODUPDATA);
        table.insert("nooverwrite", DB_NOOVERWRITE);
        table.insert("overwrite_dup", DB_OVERWRITE_DUP);
        table.insert("prev", DB_PREV);
        table.insert("prev_dup", DB_PREV_DUP);
        table.insert("prev_nodup", DB_PREV_NODUP);
        table.insert("set", DB_SET);
        table.insert("set_range", DB_SET_RANGE);
        table.insert("set_recno", DB_SET_RECNO);
        // operation modifiers
        table.insert("auto_commit", OpFlags::AUTO_COMMIT.bits());
        table.insert("read_uncommitted", OpFlags::READ_UNCOMMITTED.bits());
        table.insert("read_committed", OpFlags::READ_COMMITTED.bits());
        table.insert("multiple", OpFlags::MULTIPLE.bits());
        table.insert("ignore_lease", OpFlags::IGNORE_LEASE.bits());
        table.insert("rmw", OpFlags::RMW.bits());
        table.insert("multiple_key", OpFlags::MULTIPLE_KEY.bits());
        // environment open
        table.insert("create", EnvOpenFlags::CREATE.bits());
        table.insert("recover", EnvOpenFlags::RECOVER.bits());
        table.insert("use_environ", EnvOpenFlags::USE_ENVIRON.bits());
        table.insert("use_environ_root", EnvOpenFlags::USE_ENVIRON_ROOT.bits());
        table.insert("thread", EnvOpenFlags::THREAD.bits());
        table.insert("init_cdb", EnvOpenFlags::INIT_CDB.bits());
        table.insert("init_lock", EnvOpenFlags::INIT_LOCK.bits());
        table.insert("init_log", EnvOpenFlags::INIT_LOG.bits());
        table.insert("init_mpool", EnvOpenFlags::INIT_MPOOL.bits());
        table.insert("failchk", EnvOpenFlags::FAILCHK.bits());
        table.insert("init_rep", EnvOpenFlags::INIT_REP.bits());
        table.insert("init_txn", EnvOpenFlags::INIT_TXN.bits());
        table.insert("lockdown", EnvOpenFlags::LOCKDOWN.bits());
        table.insert("private", EnvOpenFlags::PRIVATE.bits());
        table.insert("recover_fatal", EnvOpenFlags::RECOVER_FATAL.bits());
        table.insert("register", EnvOpenFlags::REGISTER.bits());
        table.insert("system_mem", EnvOpenFlags::SYSTEM_MEM.bits());
        // database open
        table.insert("excl", DbOpenFlags::EXCL.bits());
        table.insert("multiversion", DbOpenFlags::MULTIVERSION.bits());
        table.insert("nommap", DbOpenFlags::NOMMAP.bits());
        table.insert("rdonly", DbOpenFlags::RDONLY.bits());
        table.insert("truncate", DbOpenFlags::TRUNCATE.bits());
        // database configuration
        table.insert("encrypt", DbFlags::ENCRYPT.bits());
        table.insert("dupsort", DbFlags::DUPSORT.bits());
        table.insert("txn_not_durable", DbFlags::TXN_NOT_DURABLE.bits());
        table.insert("chksum", DbFlags::CHKSUM.bits());
        table.insert("dup", DbFlags::DUP.bits());
        table.insert("inorder", DbFlags::INORDER.bits());
        table.insert("recnum", DbFlags::RECNUM.bits());
        table.insert("renumber", DbFlags::RENUMBER.bits());
        table.insert("revsplitoff", DbFlags::REVSPLITOFF.bits());
        table.insert("snapshot", DbFlags::SNAPSHOT.bits());
        // environment configuration
        table.insert("txn_nosync", EnvFlags::TXN_NOSYNC.bits());
        table.insert("txn_snapshot", EnvFlags::TXN_SNAPSHOT.bits());
        table.insert("time_notgranted", EnvFlags::TIME_NOTGRANTED.bits());
        table.insert("txn_nowait", EnvFlags::TXN_NOWAIT.bits());
        table.insert("cdb_alldb", EnvFlags::CDB_ALLDB.bits());
        table.insert("direct_db", EnvFlags::DIRECT_DB.bits());
        table.insert("dsync_db", EnvFlags::DSYNC_DB.bits());
        table.insert("nolocking", EnvFlags::NOLOCKING.bits());
        table.insert("hotbackup_in_progress", EnvFlags::HOTBACKUP_IN_PROGRESS.bits());
        table.insert("nopanic", EnvFlags::NOPANIC.bits());
        table.insert("overwrite", EnvFlags::OVERWRITE.bits());
        table.insert("panic_environment", EnvFlags::PANIC_ENVIRONMENT.bits());
        table.insert("region_init", EnvFlags::REGION_INIT.bits());
        table.insert("txn_write_nosync", EnvFlags::TXN_WRITE_NOSYNC.bits());
        table.insert("yieldcpu", EnvFlags::YIELDCPU.bits());
        // transactions
        table.insert("txn_bulk", TxnFlags::TXN_BULK.bits());
        table.insert("txn_sync", TxnFlags::TXN_SYNC.bits());
        table.insert("txn_wait", TxnFlags::TXN_WAIT.bits());
        // cursors
        table.insert("cursor_bulk", CursorFlags::CURSOR_BULK.bits());
        table.insert("writecursor", CursorFlags::WRITECURSOR.bits());
        // timeouts
        table.insert("set_lock_timeout", TimeoutFlags::SET_LOCK_TIMEOUT.bits());
        table.insert("set_reg_timeout", TimeoutFlags::SET_REG_TIMEOUT.bits());
        table.insert("set_txn_timeout", TimeoutFlags::SET_TXN_TIMEOUT.bits());
        table
    };
}

/// Value of a single named flag, if the name is known
pub fn flag_value(name: &str) -> Option<u32> {
    FLAG_TABLE.get(name).copied()
}

/// OR together the bits of every option set to `true`
pub fn translate(options: &Options) -> u32 {
    options
        .iter()
        .filter(|(_, on)| *on)
        .filter_map(|(name, _)| flag_value(name))
        .fold(0, |flags, bit| flags | bit)
}

/// Access method selected by an option set. Later entries of
/// `hash`, `heap`, `recno`, `queue`, `unknown` take precedence; B-tree otherwise.
pub fn access_method(options: &Options) -> DbType {
    let mut dbtype = DbType::Btree;
    for (name, method) in [
        ("hash", DbType::Hash),
        ("heap", DbType::Heap),
        ("recno", DbType::Recno),
        ("queue", DbType::Queue),
        ("unknown", DbType::Unknown),
    ] {
        if options.is_set(name) {
            dbtype = method;
        }
    }
    dbtype
}
