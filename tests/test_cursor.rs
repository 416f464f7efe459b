mod common;

use common::*;
use kvbridge::{Cursor, Database, Decoded, Error, ErrorKind, Options, Reply, Store, UsageError};
use tempfile::TempDir;

fn open_cursor(store: &Store, db: &Database) -> Cursor {
    let slot = Slot::new();
    db.cursor(&Options::new(), slot.setter()).unwrap();
    store.run();
    slot.take().unwrap()
}

fn cget(store: &Store, cursor: &Cursor, key: Option<&[u8]>, options: &Options) -> Result<Reply, Error> {
    let slot = Slot::new();
    cursor.get(key, options, slot.setter()).unwrap();
    store.run();
    slot.take()
}

fn cdel(store: &Store, cursor: &Cursor) -> Result<(), Error> {
    let slot = Slot::new();
    cursor.del(&Options::new(), slot.setter()).unwrap();
    store.run();
    slot.take()
}

fn cput(store: &Store, cursor: &Cursor, key: Option<&[u8]>, value: &str, options: &Options) -> Result<Reply, Error> {
    let slot = Slot::new();
    cursor.put(key, value, options, slot.setter()).unwrap();
    store.run();
    slot.take()
}

/// `(key, value)` for every record the walk visits before `DB_NOTFOUND`
fn walk(store: &Store, cursor: &Cursor, options: &Options) -> Vec<(String, String)> {
    let mut seen = Vec::new();
    loop {
        match cget(store, cursor, None, options) {
            Ok(reply) => seen.push((text(reply.key().unwrap()), text(reply.single().unwrap()))),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
                return seen;
            }
        }
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn test_next_walks_every_record() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "walk.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let seen = walk(&store, &cursor, &opts(&["next"]));
    assert_eq!(
        seen,
        pairs(&[("Bali", "Denpasar"), ("Java", "Pasuruan"), ("Java", "Bandung"), ("Java", "Cimahi")])
    );
}

#[test]
fn test_prev_walks_backwards() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "prev.db", &["dupsort"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let seen = walk(&store, &cursor, &opts(&["prev"]));
    assert_eq!(
        seen,
        pairs(&[("Java", "Pasuruan"), ("Java", "Cimahi"), ("Java", "Bandung"), ("Bali", "Denpasar")])
    );
}

#[test]
fn test_next_nodup_skips_unsorted_duplicates() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "nodup.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let seen = walk(&store, &cursor, &opts(&["next_nodup"]));
    assert_eq!(seen, pairs(&[("Bali", "Denpasar"), ("Java", "Pasuruan")]));
}

#[test]
fn test_next_nodup_skips_sorted_duplicates() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "nodupsort.db", &["dupsort"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let seen = walk(&store, &cursor, &opts(&["next_nodup"]));
    assert_eq!(seen, pairs(&[("Bali", "Denpasar"), ("Java", "Bandung")]));
}

#[test]
fn test_multiple_next_returns_duplicates_per_key() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "multiple.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);
    let options = opts(&["next", "multiple"]);

    let reply = cget(&store, &cursor, None, &options).unwrap();
    assert_eq!(reply.value, Some(Decoded::Values(vec![b"Denpasar".to_vec()])));
    assert_eq!(reply.key(), Some(&b"Bali"[..]));

    let reply = cget(&store, &cursor, None, &options).unwrap();
    let expected = vec![b"Pasuruan".to_vec(), b"Bandung".to_vec(), b"Cimahi".to_vec()];
    assert_eq!(reply.value, Some(Decoded::Values(expected)));
    assert_eq!(reply.key(), Some(&b"Java"[..]));

    let err = cget(&store, &cursor, None, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_multiple_key_returns_every_pair() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "multiple_key.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);
    let options = opts(&["next", "multiple_key"]);

    let reply = cget(&store, &cursor, None, &options).unwrap();
    assert_eq!(reply.key(), Some(&b"Bali"[..]));
    let found = match reply.value {
        Some(Decoded::Pairs(found)) => found,
        other => panic!("expected pairs, got {:?}", other),
    };
    let found: Vec<(String, String)> = found.iter().map(|(v, k)| (text(k), text(v))).collect();
    assert_eq!(
        found,
        pairs(&[("Bali", "Denpasar"), ("Java", "Pasuruan"), ("Java", "Bandung"), ("Java", "Cimahi")])
    );

    let err = cget(&store, &cursor, None, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_multiple_key_continues_across_small_buffers() {
    let dir = TempDir::new().unwrap();
    init_logging();
    let store = Store::new(
        kvbridge::MemoryEngine::new(),
        kvbridge::Config::new().with_bulk_buffer_len(64),
    )
    .unwrap();
    let db = open_db(&store, &dir, "partial.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);
    let options = opts(&["next", "multiple_key"]);

    let mut fills = Vec::new();
    let err = loop {
        match cget(&store, &cursor, None, &options) {
            Ok(reply) => match reply.value {
                Some(Decoded::Pairs(found)) => {
                    fills.push(found.iter().map(|(v, k)| (text(k), text(v))).collect::<Vec<_>>())
                }
                other => panic!("expected pairs, got {:?}", other),
            },
            Err(err) => break err,
        }
    };
    assert_eq!(err.code, -30988);
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0], pairs(&[("Bali", "Denpasar"), ("Java", "Pasuruan")]));
    assert_eq!(fills.concat(), pairs(&[("Bali", "Denpasar"), ("Java", "Pasuruan"), ("Java", "Bandung"), ("Java", "Cimahi")]));
}

#[test]
fn test_bulk_result_larger_than_buffer_reports_buffer_small() {
    let dir = TempDir::new().unwrap();
    init_logging();
    let store = Store::new(
        kvbridge::MemoryEngine::new(),
        kvbridge::Config::new().with_bulk_buffer_len(16),
    )
    .unwrap();
    let db = open_db(&store, &dir, "small.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let err = cget(&store, &cursor, Some(&b"Java"[..]), &opts(&["set", "multiple"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BufferSmall);
    assert_eq!(err.code, -30999);
}

#[test]
fn test_delete_then_rewalk() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "delete.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let reply = cget(&store, &cursor, Some(&b"Java"[..]), &opts(&["set"])).unwrap();
    assert_eq!(reply.single(), Some(&b"Pasuruan"[..]));
    cdel(&store, &cursor).unwrap();

    let err = cget(&store, &cursor, None, &opts(&["current"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyEmpty);
    let err = cdel(&store, &cursor).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyEmpty);

    let reply = cget(&store, &cursor, None, &opts(&["next"])).unwrap();
    assert_eq!(reply.single(), Some(&b"Bandung"[..]));

    let fresh = open_cursor(&store, &db);
    let seen = walk(&store, &fresh, &opts(&["next"]));
    assert_eq!(seen, pairs(&[("Bali", "Denpasar"), ("Java", "Bandung"), ("Java", "Cimahi")]));
}

#[test]
fn test_delete_every_record_through_cursor() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "drain.db", &["dupsort"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    while cget(&store, &cursor, None, &opts(&["next"])).is_ok() {
        cdel(&store, &cursor).unwrap();
    }
    let fresh = open_cursor(&store, &db);
    assert!(walk(&store, &fresh, &opts(&["next"])).is_empty());
    let err = get(&store, &db, "Bali", &Options::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_set_range_finds_next_key() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "range.db", &[]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let reply = cget(&store, &cursor, Some(&b"Bo"[..]), &opts(&["set_range"])).unwrap();
    assert_eq!(reply.key(), Some(&b"Java"[..]));
    assert_eq!(reply.single(), Some(&b"Cimahi"[..]));

    let err = cget(&store, &cursor, Some(&b"Kalimantan"[..]), &opts(&["set"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_cursor_put_positions() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "cursor_put.db", &["dup"]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let reply = cput(&store, &cursor, Some(&b"Java"[..]), "Bogor", &opts(&["keyfirst"])).unwrap();
    assert_eq!(reply.key(), Some(&b"Java"[..]));
    cput(&store, &cursor, None, "Malang", &opts(&["after"])).unwrap();
    cput(&store, &cursor, None, "Kediri", &opts(&["current"])).unwrap();

    let reply = get(&store, &db, "Java", &opts(&["multiple"])).unwrap();
    let values = match reply.value {
        Some(Decoded::Values(values)) => values.iter().map(|v| text(v)).collect::<Vec<_>>(),
        other => panic!("expected values, got {:?}", other),
    };
    assert_eq!(values, ["Bogor", "Kediri", "Pasuruan", "Bandung", "Cimahi"]);
}

#[test]
fn test_positional_put_needs_a_position() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "unpositioned.db", &["dup"]);
    let cursor = open_cursor(&store, &db);

    let err = cput(&store, &cursor, None, "Bogor", &opts(&["current"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn test_closed_cursor_is_stale() {
    let dir = TempDir::new().unwrap();
    let store = store();
    let db = open_db(&store, &dir, "close.db", &[]);
    doput(&store, &db);
    let cursor = open_cursor(&store, &db);

    let slot = Slot::new();
    cursor.close(slot.setter()).unwrap();
    store.run();
    slot.take().unwrap();

    let err = cursor.get(None, &opts(&["next"]), |_| panic!("must not run")).unwrap_err();
    assert_eq!(err, UsageError::StaleHandle { kind: "cursor" });
    let err = cursor.close(|_| panic!("must not run")).unwrap_err();
    assert_eq!(err, UsageError::StaleHandle { kind: "cursor" });
}
