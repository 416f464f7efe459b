use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Included, Unbounded};

use crate::constants::{DbFlags, DB_KEYEXIST, DB_NOTFOUND, EINVAL};
use crate::error::EngineResult;
use crate::types::DbType;

/// Duplicate policy of a database file, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dups {
    None,
    /// Duplicates kept in insertion order
    Unsorted,
    /// Duplicates kept in byte order
    Sorted,
}

impl Dups {
    pub(crate) fn from_db_flags(flags: u32) -> Dups {
        let flags = DbFlags::from_bits_truncate(flags);
        if flags.contains(DbFlags::DUPSORT) {
            Dups::Sorted
        } else if flags.contains(DbFlags::DUP) {
            Dups::Unsorted
        } else {
            Dups::None
        }
    }
}

/// Where a put places its data item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    First,
    Last,
    NoDupData,
    OverwriteDup,
    Before(usize),
    After(usize),
}

/// A record location: key plus duplicate index
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Position {
    pub key: Vec<u8>,
    pub idx: usize,
}

impl Position {
    fn new(key: &[u8], idx: usize) -> Self {
        Position { key: key.to_vec(), idx }
    }
}

/// Stored form of a caller key. Record numbers arrive as native-endian
/// `u32` and are kept big-endian so the map orders them numerically.
pub(crate) fn stored_key(dbtype: DbType, key: &[u8]) -> EngineResult<Vec<u8>> {
    if !dbtype.is_record_based() {
        return Ok(key.to_vec());
    }
    let raw: [u8; 4] = key.try_into().map_err(|_| EINVAL)?;
    match u32::from_ne_bytes(raw) {
        0 => Err(EINVAL),
        recno => Ok(recno.to_be_bytes().to_vec()),
    }
}

/// Caller form of a stored key
pub(crate) fn caller_key(dbtype: DbType, stored: &[u8]) -> Vec<u8> {
    match <[u8; 4]>::try_from(stored) {
        Ok(raw) if dbtype.is_record_based() => u32::from_be_bytes(raw).to_ne_bytes().to_vec(),
        _ => stored.to_vec(),
    }
}

/// Key-level changes made by a transaction: the key's full duplicate list
/// after the change, or `None` once the key is gone
pub(crate) type Delta = BTreeMap<Vec<u8>, Option<Vec<Vec<u8>>>>;

/// Contents of one database file
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub dbtype: DbType,
    pub dups: Dups,
    records: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
    /// Keys modified since the last `take_journal`
    journal: BTreeSet<Vec<u8>>,
}

impl Table {
    pub(crate) fn new(dbtype: DbType, dups: Dups) -> Self {
        Table {
            dbtype,
            dups,
            records: BTreeMap::new(),
            journal: BTreeSet::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.journal.clear();
    }

    /// Keys modified since the previous call
    pub(crate) fn take_journal(&mut self) -> BTreeSet<Vec<u8>> {
        std::mem::take(&mut self.journal)
    }

    /// Current state of every key in `keys`, as a delta
    pub(crate) fn delta_of(&self, keys: BTreeSet<Vec<u8>>) -> Delta {
        keys.into_iter()
            .map(|key| {
                let items = self.records.get(&key).cloned();
                (key, items)
            })
            .collect()
    }

    /// Replay `delta` over these records. Keys it does not name are untouched.
    pub(crate) fn apply(&mut self, delta: &Delta) {
        for (key, items) in delta {
            match items {
                Some(items) => {
                    self.records.insert(key.clone(), items.clone());
                }
                None => {
                    self.records.remove(key);
                }
            }
        }
    }

    pub(crate) fn dups(&self, key: &[u8]) -> Option<&[Vec<u8>]> {
        self.records.get(key).map(Vec::as_slice)
    }

    pub(crate) fn value(&self, pos: &Position) -> Option<&[u8]> {
        self.dups(&pos.key)?.get(pos.idx).map(Vec::as_slice)
    }

    /// Record number one past the highest in use
    pub(crate) fn next_recno(&self) -> EngineResult<u32> {
        let last = match self.records.keys().next_back() {
            Some(key) => match <[u8; 4]>::try_from(key.as_slice()) {
                Ok(raw) => u32::from_be_bytes(raw),
                Err(_) => return Err(EINVAL),
            },
            None => 0,
        };
        last.checked_add(1).ok_or(EINVAL)
    }

    /// Store `data` under `key`; returns the duplicate index it landed at.
    pub(crate) fn insert(&mut self, key: Vec<u8>, data: Vec<u8>, placement: Placement) -> EngineResult<usize> {
        let idx = self.place(key.clone(), data, placement)?;
        self.journal.insert(key);
        Ok(idx)
    }

    fn place(&mut self, key: Vec<u8>, data: Vec<u8>, placement: Placement) -> EngineResult<usize> {
        match self.dups {
            Dups::None => match placement {
                Placement::NoDupData | Placement::Before(_) | Placement::After(_) => Err(EINVAL),
                _ => {
                    self.records.insert(key, vec![data]);
                    Ok(0)
                }
            },
            Dups::Unsorted => {
                if placement == Placement::NoDupData {
                    return Err(EINVAL);
                }
                let items = self.records.entry(key).or_default();
                let idx = match placement {
                    Placement::NoDupData | Placement::First => 0,
                    Placement::Last | Placement::OverwriteDup => items.len(),
                    Placement::Before(idx) => idx.min(items.len()),
                    Placement::After(idx) => (idx + 1).min(items.len()),
                };
                items.insert(idx, data);
                Ok(idx)
            }
            Dups::Sorted => {
                if matches!(placement, Placement::Before(_) | Placement::After(_)) {
                    return Err(EINVAL);
                }
                let items = self.records.entry(key).or_default();
                match items.binary_search(&data) {
                    Ok(idx) if placement == Placement::OverwriteDup => Ok(idx),
                    Ok(_) => Err(DB_KEYEXIST),
                    Err(idx) => {
                        items.insert(idx, data);
                        Ok(idx)
                    }
                }
            }
        }
    }

    /// Overwrite the item at `pos`. Sorted duplicates only accept an equal item.
    pub(crate) fn replace(&mut self, pos: &Position, data: Vec<u8>) -> EngineResult<()> {
        let sorted = self.dups == Dups::Sorted;
        let item = self
            .records
            .get_mut(&pos.key)
            .and_then(|items| items.get_mut(pos.idx))
            .ok_or(DB_NOTFOUND)?;
        if sorted && *item != data {
            return Err(EINVAL);
        }
        *item = data;
        self.journal.insert(pos.key.clone());
        Ok(())
    }

    /// Delete one item, dropping the key with its last item
    pub(crate) fn remove(&mut self, pos: &Position) -> EngineResult<()> {
        let items = self.records.get_mut(&pos.key).ok_or(DB_NOTFOUND)?;
        if pos.idx >= items.len() {
            return Err(DB_NOTFOUND);
        }
        items.remove(pos.idx);
        self.journal.insert(pos.key.clone());
        if items.is_empty() {
            self.records.remove(&pos.key);
        }
        Ok(())
    }

    /// Delete a key with all of its items
    pub(crate) fn remove_key(&mut self, key: &[u8]) -> EngineResult<()> {
        self.records.remove(key).ok_or(DB_NOTFOUND)?;
        self.journal.insert(key.to_vec());
        Ok(())
    }

    pub(crate) fn first(&self) -> Option<Position> {
        self.records.keys().next().map(|k| Position::new(k, 0))
    }

    pub(crate) fn last(&self) -> Option<Position> {
        self.records
            .iter()
            .next_back()
            .map(|(k, items)| Position::new(k, items.len() - 1))
    }

    fn first_after(&self, key: &[u8]) -> Option<Position> {
        self.records
            .range::<[u8], _>((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| Position::new(k, 0))
    }

    fn last_before(&self, key: &[u8]) -> Option<Position> {
        self.records
            .range::<[u8], _>((Unbounded, Excluded(key)))
            .next_back()
            .map(|(k, items)| Position::new(k, items.len() - 1))
    }

    /// Following item. A `deleted` position names the gap left by a removed item.
    pub(crate) fn next(&self, pos: &Position, deleted: bool) -> Option<Position> {
        self.next_dup(pos, deleted).or_else(|| self.first_after(&pos.key))
    }

    pub(crate) fn prev(&self, pos: &Position) -> Option<Position> {
        self.prev_dup(pos).or_else(|| self.last_before(&pos.key))
    }

    pub(crate) fn next_dup(&self, pos: &Position, deleted: bool) -> Option<Position> {
        let items = self.dups(&pos.key)?;
        let idx = if deleted { pos.idx } else { pos.idx + 1 };
        (idx < items.len()).then(|| Position::new(&pos.key, idx))
    }

    pub(crate) fn prev_dup(&self, pos: &Position) -> Option<Position> {
        let items = self.dups(&pos.key)?;
        let idx = pos.idx.min(items.len());
        (idx > 0).then(|| Position::new(&pos.key, idx - 1))
    }

    pub(crate) fn next_nodup(&self, pos: &Position) -> Option<Position> {
        self.first_after(&pos.key)
    }

    pub(crate) fn prev_nodup(&self, pos: &Position) -> Option<Position> {
        self.last_before(&pos.key)
    }

    pub(crate) fn set(&self, key: &[u8]) -> Option<Position> {
        self.records.contains_key(key).then(|| Position::new(key, 0))
    }

    pub(crate) fn set_range(&self, key: &[u8]) -> Option<Position> {
        self.records
            .range::<[u8], _>((Included(key), Unbounded))
            .next()
            .map(|(k, _)| Position::new(k, 0))
    }

    pub(crate) fn get_both(&self, key: &[u8], data: &[u8]) -> Option<Position> {
        let idx = self.dups(key)?.iter().position(|item| item == data)?;
        Some(Position::new(key, idx))
    }

    /// Exact key, smallest item not below `data` (exact item unless sorted)
    pub(crate) fn get_both_range(&self, key: &[u8], data: &[u8]) -> Option<Position> {
        if self.dups != Dups::Sorted {
            return self.get_both(key, data);
        }
        let idx = self.dups(key)?.iter().position(|item| item.as_slice() >= data)?;
        Some(Position::new(key, idx))
    }

    /// Items in key order starting at `pos`
    pub(crate) fn iter_from<'a>(&'a self, pos: &Position) -> impl Iterator<Item = (Position, &'a [u8])> + 'a {
        let start = pos.clone();
        self.records
            .range::<[u8], _>((Included(pos.key.as_slice()), Unbounded))
            .flat_map(|(k, items)| {
                items
                    .iter()
                    .enumerate()
                    .map(move |(idx, item)| (Position::new(k, idx), item.as_slice()))
            })
            .skip_while(move |(p, _)| p.key == start.key && p.idx < start.idx)
    }
}
