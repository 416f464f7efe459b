use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use super::fill_values;
use super::table::{caller_key, stored_key, Placement, Position, Table};
use super::txn::Binding;
use crate::bulk::{required_len, BulkWriter};
use crate::constants::*;
use crate::dbt::Dbt;
use crate::error::EngineResult;
use crate::types::{BulkMode, CursorOp, DbType};

#[derive(Debug)]
struct CursorState {
    binding: Binding,
    dbtype: DbType,
    rdonly: bool,
    pos: Option<Position>,
    /// The item at `pos` was deleted through this cursor
    deleted: bool,
    closed: bool,
}

/// Cursor handle of the in-memory engine
#[derive(Debug, Clone)]
pub struct MemoryCursor(Arc<Mutex<CursorState>>);

fn locate(
    table: &Table,
    op: CursorOp,
    current: Option<&Position>,
    deleted: bool,
    key: Option<&[u8]>,
    probe: Option<&[u8]>,
) -> EngineResult<Position> {
    let found = match op {
        CursorOp::First => table.first(),
        CursorOp::Last => table.last(),
        CursorOp::Next => match current {
            Some(pos) => table.next(pos, deleted),
            None => table.first(),
        },
        CursorOp::Prev => match current {
            Some(pos) => table.prev(pos),
            None => table.last(),
        },
        CursorOp::NextDup => table.next_dup(current.ok_or(EINVAL)?, deleted),
        CursorOp::PrevDup => table.prev_dup(current.ok_or(EINVAL)?),
        CursorOp::NextNoDup => match current {
            Some(pos) => table.next_nodup(pos),
            None => table.first(),
        },
        CursorOp::PrevNoDup => match current {
            Some(pos) => table.prev_nodup(pos),
            None => table.last(),
        },
        CursorOp::Current => {
            let pos = current.ok_or(EINVAL)?;
            if deleted || table.value(pos).is_none() {
                return Err(DB_KEYEMPTY);
            }
            Some(pos.clone())
        }
        CursorOp::Set => table.set(key.ok_or(EINVAL)?),
        CursorOp::SetRange => table.set_range(key.ok_or(EINVAL)?),
        CursorOp::GetBoth => table.get_both(key.ok_or(EINVAL)?, probe.ok_or(EINVAL)?),
        CursorOp::GetBothRange => table.get_both_range(key.ok_or(EINVAL)?, probe.ok_or(EINVAL)?),
    };
    found.ok_or(DB_NOTFOUND)
}

/// Every duplicate from `from` to the end of its key; leaves the cursor on the last
fn fill_dups(table: &Table, from: &Position, data: &mut Dbt) -> EngineResult<Position> {
    let items = table.dups(&from.key).ok_or(DB_NOTFOUND)?;
    let items = items.get(from.idx..).ok_or(DB_NOTFOUND)?;
    fill_values(data, items)?;
    Ok(Position {
        key: from.key.clone(),
        idx: from.idx + items.len().saturating_sub(1),
    })
}

/// As many pairs as fit, starting at `from`; leaves the cursor on the last one written
fn fill_pairs(table: &Table, from: &Position, data: &mut Dbt, dbtype: DbType) -> EngineResult<Position> {
    let (buf, size) = data.receive_buffer().ok_or(EINVAL)?;
    let mut writer = BulkWriter::new(buf, BulkMode::Pairs);
    let mut last = None;
    let mut needed = 0;
    for (pos, item) in table.iter_from(from) {
        let key = caller_key(dbtype, &pos.key);
        if !writer.push_pair(&key, item) {
            if last.is_none() {
                needed = required_len(BulkMode::Pairs, 1, key.len() + item.len());
            }
            break;
        }
        last = Some(pos);
    }
    match last {
        Some(pos) => {
            trace!("cursor bulk read of {} pairs", writer.records());
            *size = writer.finish();
            Ok(pos)
        }
        None => {
            *size = needed;
            Err(DB_BUFFER_SMALL)
        }
    }
}

impl MemoryCursor {
    pub(crate) fn new(binding: Binding, dbtype: DbType, rdonly: bool) -> Self {
        MemoryCursor(Arc::new(Mutex::new(CursorState {
            binding,
            dbtype,
            rdonly,
            pos: None,
            deleted: false,
            closed: false,
        })))
    }

    pub(crate) fn get(&self, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        let op = CursorOp::from_code(flags & OPFLAGS_MASK).ok_or(EINVAL)?;
        let bulk = BulkMode::from_flags(flags);
        let dbtype = state.dbtype;
        let search = match op {
            CursorOp::Set | CursorOp::SetRange | CursorOp::GetBoth | CursorOp::GetBothRange => {
                Some(stored_key(dbtype, key.data().ok_or(EINVAL)?)?)
            }
            _ => None,
        };
        let probe = match op {
            CursorOp::GetBoth | CursorOp::GetBothRange if bulk.is_some() => return Err(EINVAL),
            CursorOp::GetBoth | CursorOp::GetBothRange => Some(data.data().ok_or(EINVAL)?.to_vec()),
            _ => None,
        };
        let current = state.pos.clone();
        let deleted = state.deleted;
        let landed = state.binding.read(|table| -> EngineResult<Position> {
            let found = locate(table, op, current.as_ref(), deleted, search.as_deref(), probe.as_deref())?;
            let last = match bulk {
                None => {
                    let value = table.value(&found).ok_or(DB_KEYEMPTY)?;
                    data.set_output(value.to_vec());
                    found.clone()
                }
                Some(BulkMode::Values) => fill_dups(table, &found, data)?,
                Some(BulkMode::Pairs) => fill_pairs(table, &found, data, dbtype)?,
            };
            key.set_output(caller_key(dbtype, &found.key));
            Ok(last)
        })??;
        state.pos = Some(landed);
        state.deleted = false;
        Ok(())
    }

    pub(crate) fn put(&self, key: &mut Dbt, data: &mut Dbt, flags: u32) -> EngineResult<()> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        if state.rdonly {
            return Err(EACCES);
        }
        let op = flags & OPFLAGS_MASK;
        let value = data.data().ok_or(EINVAL)?.to_vec();
        let dbtype = state.dbtype;
        let landed = match op {
            DB_CURRENT | DB_AFTER | DB_BEFORE => {
                let pos = state.pos.clone().ok_or(EINVAL)?;
                if state.deleted {
                    return Err(DB_KEYEMPTY);
                }
                state.binding.write(|table| -> EngineResult<Position> {
                    let idx = match op {
                        DB_CURRENT => {
                            table.replace(&pos, value)?;
                            pos.idx
                        }
                        DB_AFTER => table.insert(pos.key.clone(), value, Placement::After(pos.idx))?,
                        _ => table.insert(pos.key.clone(), value, Placement::Before(pos.idx))?,
                    };
                    Ok(Position { key: pos.key.clone(), idx })
                })??
            }
            0 | DB_KEYFIRST | DB_KEYLAST | DB_NODUPDATA => {
                let stored = stored_key(dbtype, key.data().ok_or(EINVAL)?)?;
                let placement = match op {
                    DB_KEYFIRST => Placement::First,
                    DB_NODUPDATA => Placement::NoDupData,
                    _ => Placement::Last,
                };
                state.binding.write(|table| {
                    table
                        .insert(stored.clone(), value, placement)
                        .map(|idx| Position { key: stored, idx })
                })??
            }
            _ => return Err(EINVAL),
        };
        key.set_output(caller_key(dbtype, &landed.key));
        state.pos = Some(landed);
        state.deleted = false;
        Ok(())
    }

    pub(crate) fn del(&self) -> EngineResult<()> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        if state.rdonly {
            return Err(EACCES);
        }
        let pos = state.pos.clone().ok_or(EINVAL)?;
        if state.deleted {
            return Err(DB_KEYEMPTY);
        }
        state
            .binding
            .write(|table| table.remove(&pos))?
            .map_err(|code| if code == DB_NOTFOUND { DB_KEYEMPTY } else { code })?;
        state.deleted = true;
        Ok(())
    }

    pub(crate) fn close(&self) -> EngineResult<()> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(EINVAL);
        }
        state.closed = true;
        Ok(())
    }
}
