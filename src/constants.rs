use bitflags::bitflags;

// Flag words are interpreted per call: the same bit means different things to
// env.open, db.open, set_flags and the data operations. A flag name maps to the
// same value in every group it appears in.

// Environment open flags
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnvOpenFlags: u32 {
        const CREATE = 0x01;
        const RECOVER = 0x02;
        const USE_ENVIRON = 0x04;
        const USE_ENVIRON_ROOT = 0x08;
        const THREAD = 0x20;
        const INIT_CDB = 0x80;
        const INIT_LOCK = 0x100;
        const INIT_LOG = 0x200;
        const INIT_MPOOL = 0x400;
        const FAILCHK = 0x800;
        const INIT_REP = 0x1000;
        const INIT_TXN = 0x2000;
        const LOCKDOWN = 0x4000;
        const PRIVATE = 0x10000;
        const RECOVER_FATAL = 0x20000;
        const REGISTER = 0x40000;
        const SYSTEM_MEM = 0x80000;
    }
}

// Database open flags
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DbOpenFlags: u32 {
        const CREATE = 0x01;
        const EXCL = 0x04;
        const MULTIVERSION = 0x08;
        const NOMMAP = 0x10;
        const THREAD = 0x20;
        const AUTO_COMMIT = 0x100;
        const RDONLY = 0x400;
        const TRUNCATE = 0x40000;
    }
}

// Database configuration flags (DB->set_flags)
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DbFlags: u32 {
        const ENCRYPT = 0x01;
        const DUPSORT = 0x02;
        const TXN_NOT_DURABLE = 0x04;
        const CHKSUM = 0x08;
        const DUP = 0x10;
        const INORDER = 0x20;
        const RECNUM = 0x40;
        const RENUMBER = 0x80;
        const REVSPLITOFF = 0x100;
        const SNAPSHOT = 0x200;
    }
}

// Environment configuration flags (DB_ENV->set_flags)
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnvFlags: u32 {
        const TXN_NOSYNC = 0x01;
        const TXN_SNAPSHOT = 0x02;
        const TIME_NOTGRANTED = 0x04;
        const MULTIVERSION = 0x08;
        const NOMMAP = 0x10;
        const TXN_NOWAIT = 0x20;
        const CDB_ALLDB = 0x40;
        const DIRECT_DB = 0x80;
        const AUTO_COMMIT = 0x100;
        const DSYNC_DB = 0x200;
        const NOLOCKING = 0x400;
        const HOTBACKUP_IN_PROGRESS = 0x800;
        const NOPANIC = 0x1000;
        const OVERWRITE = 0x2000;
        const PANIC_ENVIRONMENT = 0x4000;
        const REGION_INIT = 0x8000;
        const TXN_WRITE_NOSYNC = 0x10000;
        const YIELDCPU = 0x20000;
    }
}

// Transaction begin/commit flags
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TxnFlags: u32 {
        const TXN_NOSYNC = 0x01;
        const TXN_SNAPSHOT = 0x02;
        const TXN_NOWAIT = 0x20;
        const TXN_BULK = 0x40;
        const TXN_SYNC = 0x80;
        const READ_UNCOMMITTED = 0x200;
        const READ_COMMITTED = 0x400;
        const TXN_WAIT = 0x800;
        const TXN_WRITE_NOSYNC = 0x10000;
    }
}

// Cursor creation flags (DB->cursor)
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CursorFlags: u32 {
        const CURSOR_BULK = 0x01;
        const TXN_SNAPSHOT = 0x02;
        const WRITECURSOR = 0x08;
        const READ_UNCOMMITTED = 0x200;
        const READ_COMMITTED = 0x400;
    }
}

// Modifier bits carried alongside an operation code on get/put/del
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u32 {
        const AUTO_COMMIT = 0x100;
        const READ_UNCOMMITTED = 0x200;
        const READ_COMMITTED = 0x400;
        const MULTIPLE = 0x800;
        const IGNORE_LEASE = 0x1000;
        const RMW = 0x2000;
        const MULTIPLE_KEY = 0x4000;
    }
}

// Timeout selectors (DB_ENV->set_timeout)
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimeoutFlags: u32 {
        const SET_LOCK_TIMEOUT = 0x01;
        const SET_REG_TIMEOUT = 0x02;
        const SET_TXN_TIMEOUT = 0x04;
    }
}

/// Operation codes occupy the low byte of a data-operation flag word.
pub const OPFLAGS_MASK: u32 = 0xff;

pub const DB_AFTER: u32 = 1;
pub const DB_APPEND: u32 = 2;
pub const DB_BEFORE: u32 = 3;
pub const DB_CONSUME: u32 = 4;
pub const DB_CONSUME_WAIT: u32 = 5;
pub const DB_CURRENT: u32 = 6;
pub const DB_FIRST: u32 = 7;
pub const DB_GET_BOTH: u32 = 8;
pub const DB_GET_BOTH_RANGE: u32 = 10;
pub const DB_GET_RECNO: u32 = 11;
pub const DB_JOIN_ITEM: u32 = 12;
pub const DB_KEYFIRST: u32 = 13;
pub const DB_KEYLAST: u32 = 14;
pub const DB_LAST: u32 = 15;
pub const DB_NEXT: u32 = 16;
pub const DB_NEXT_DUP: u32 = 17;
pub const DB_NEXT_NODUP: u32 = 18;
pub const DB_NODUPDATA: u32 = 19;
pub const DB_NOOVERWRITE: u32 = 20;
pub const DB_OVERWRITE_DUP: u32 = 21;
pub const DB_PREV: u32 = 23;
pub const DB_PREV_DUP: u32 = 24;
pub const DB_PREV_NODUP: u32 = 25;
pub const DB_SET: u32 = 26;
pub const DB_SET_RANGE: u32 = 27;
pub const DB_SET_RECNO: u32 = 28;

/// Engine return codes
pub const DB_BUFFER_SMALL: i32 = -30999;
pub const DB_DONOTINDEX: i32 = -30998;
pub const DB_FOREIGN_CONFLICT: i32 = -30997;
pub const DB_KEYEMPTY: i32 = -30996;
pub const DB_KEYEXIST: i32 = -30995;
pub const DB_LOCK_DEADLOCK: i32 = -30994;
pub const DB_LOCK_NOTGRANTED: i32 = -30993;
pub const DB_LOG_BUFFER_FULL: i32 = -30992;
pub const DB_NOSERVER: i32 = -30991;
pub const DB_NOTFOUND: i32 = -30988;
pub const DB_OLD_VERSION: i32 = -30987;
pub const DB_PAGE_NOTFOUND: i32 = -30986;
pub const DB_RUNRECOVERY: i32 = -30973;
pub const DB_SECONDARY_BAD: i32 = -30972;
pub const DB_VERIFY_BAD: i32 = -30970;
pub const DB_VERSION_MISMATCH: i32 = -30969;
pub const ENOENT: i32 = 2;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;

/// Capacity of the receive buffer allocated for bulk retrieval (5 MiB)
pub const DEFAULT_BULK_BUFFER_LEN: usize = 5 * 1024 * 1024;
/// Default size of the worker pool
pub const DEFAULT_WORKER_THREADS: usize = 4;
/// Name given to worker threads
pub const DEFAULT_THREAD_NAME: &str = "kvbridge-worker";
/// Environment variable overriding the worker pool size
pub const THREADPOOL_SIZE_VAR: &str = "KVBRIDGE_THREADPOOL_SIZE";
/// Width of a slot in the bulk buffer trailer
pub const BULK_SLOT_LEN: usize = std::mem::size_of::<u32>();
/// Marks the end of a bulk buffer trailer
pub const BULK_END: u32 = u32::MAX;
