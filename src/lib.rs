//! Non-blocking access to a transactional key-value engine from a
//! single-threaded caller.
//!
//! Engine calls run on a pool of worker threads; their results come back to
//! the caller's thread, where a continuation receives them from
//! [`Store::run`] or [`Store::poll`].
//!
//! ```no_run
//! use kvbridge::{Options, Store};
//!
//! let store = Store::memory()?;
//! let env = store.create_env()?;
//! env.open(Some("env"), &Options::from([("create", true), ("init_mpool", true)]), 0)?;
//! let db = store.create_db(Some(&env))?;
//! db.open("cities.db", &Options::from([("create", true)]), 0)?;
//! db.put("Bali", "Denpasar", &Options::new(), |res| {
//!     assert!(res.is_ok());
//! })?;
//! store.run();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod arena;
pub mod bulk;
mod config;
pub mod constants;
mod cursor;
mod database;
mod dbt;
mod dispatch;
pub mod engine;
mod env;
mod error;
pub mod flags;
mod store;
mod task;
mod transaction;
mod types;

pub use crate::config::Config;
pub use crate::cursor::Cursor;
pub use crate::database::Database;
pub use crate::dbt::{live_buffers, Dbt};
pub use crate::engine::{Engine, MemoryEngine};
pub use crate::env::Environment;
pub use crate::error::{EngineResult, Error, ErrorKind, HandleError, Result, Status, UsageError};
pub use crate::flags::Options;
pub use crate::store::Store;
pub use crate::transaction::Transaction;
pub use crate::types::{BulkMode, CursorOp, DbType, Decoded, Reply};
