#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use kvbridge::{Config, Database, Environment, Error, MemoryEngine, Options, Reply, Store};
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn store() -> Store {
    init_logging();
    Store::new(MemoryEngine::new(), Config::new().with_worker_threads(2)).unwrap()
}

pub fn opts(names: &[&str]) -> Options {
    names.iter().map(|name| (*name, true)).collect()
}

/// Receives the value handed to a continuation
pub struct Slot<T>(Rc<RefCell<Option<T>>>);

impl<T: 'static> Slot<T> {
    pub fn new() -> Self {
        Slot(Rc::new(RefCell::new(None)))
    }

    pub fn setter(&self) -> impl FnOnce(T) + 'static {
        let inner = Rc::clone(&self.0);
        move |value| *inner.borrow_mut() = Some(value)
    }

    pub fn take(&self) -> T {
        self.0.borrow_mut().take().expect("continuation did not run")
    }
}

/// Records every reply of a chain of operations
pub struct Log<T>(Rc<RefCell<Vec<T>>>);

impl<T: 'static> Clone for Log<T> {
    fn clone(&self) -> Self {
        Log(Rc::clone(&self.0))
    }
}

impl<T: 'static> Log<T> {
    pub fn new() -> Self {
        Log(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.borrow_mut().push(value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

pub fn put(store: &Store, db: &Database, key: &str, value: &str, options: &Options) -> Result<Reply, Error> {
    let slot = Slot::new();
    db.put(key, value, options, slot.setter()).unwrap();
    store.run();
    slot.take()
}

pub fn get(store: &Store, db: &Database, key: &str, options: &Options) -> Result<Reply, Error> {
    let slot = Slot::new();
    db.get(key, options, slot.setter()).unwrap();
    store.run();
    slot.take()
}

pub fn del(store: &Store, db: &Database, key: &str) -> Result<(), Error> {
    let slot = Slot::new();
    db.del(key, &Options::new(), slot.setter()).unwrap();
    store.run();
    slot.take()
}

/// The four records every scenario starts from
pub fn doput(store: &Store, db: &Database) {
    for (key, value) in [("Bali", "Denpasar"), ("Java", "Pasuruan"), ("Java", "Bandung"), ("Java", "Cimahi")] {
        put(store, db, key, value, &Options::new()).unwrap();
    }
}

/// Standalone database file in `dir`, configured with `flags`
pub fn open_db(store: &Store, dir: &TempDir, name: &str, flags: &[&str]) -> Database {
    let db = store.create_db(None).unwrap();
    db.flags(&opts(flags)).unwrap();
    let path = dir.path().join(name);
    db.open(path.to_str().unwrap(), &opts(&["create"]), 0o644).unwrap();
    db
}

/// Transactional environment rooted at `dir`
pub fn open_env(store: &Store, dir: &TempDir) -> Environment {
    let env = store.create_env().unwrap();
    env.open(
        dir.path().to_str(),
        &opts(&["create", "init_mpool", "init_txn", "init_lock", "init_log"]),
        0,
    )
    .unwrap();
    env
}

pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
