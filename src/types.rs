use crate::constants::*;

/// Access method of a database, fixed when the database file is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DbType {
    #[default]
    Btree,
    Hash,
    Recno,
    Queue,
    /// Open an existing database with whatever access method it was created with
    Unknown,
    Heap,
}

impl DbType {
    /// Record-number access methods key records by a native-endian `u32`.
    pub fn is_record_based(self) -> bool {
        matches!(self, DbType::Recno | DbType::Queue | DbType::Heap)
    }
}

/// Positioning operation decoded from the low byte of a flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    Current,
    First,
    GetBoth,
    GetBothRange,
    Last,
    Next,
    NextDup,
    NextNoDup,
    Prev,
    PrevDup,
    PrevNoDup,
    Set,
    SetRange,
}

impl CursorOp {
    pub fn from_code(code: u32) -> Option<CursorOp> {
        let op = match code {
            DB_CURRENT => CursorOp::Current,
            DB_FIRST => CursorOp::First,
            DB_GET_BOTH => CursorOp::GetBoth,
            DB_GET_BOTH_RANGE => CursorOp::GetBothRange,
            DB_LAST => CursorOp::Last,
            DB_NEXT => CursorOp::Next,
            DB_NEXT_DUP => CursorOp::NextDup,
            DB_NEXT_NODUP => CursorOp::NextNoDup,
            DB_PREV => CursorOp::Prev,
            DB_PREV_DUP => CursorOp::PrevDup,
            DB_PREV_NODUP => CursorOp::PrevNoDup,
            DB_SET => CursorOp::Set,
            DB_SET_RANGE => CursorOp::SetRange,
            _ => return None,
        };
        Some(op)
    }
}

/// Which bulk layout a receive buffer was filled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Data items only
    Values,
    /// Key/data pairs
    Pairs,
}

impl BulkMode {
    /// Bulk mode requested by a flag word, if any. `multiple_key` wins when
    /// both bits are present.
    pub fn from_flags(flags: u32) -> Option<BulkMode> {
        let bits = OpFlags::from_bits_truncate(flags);
        if bits.contains(OpFlags::MULTIPLE_KEY) {
            Some(BulkMode::Pairs)
        } else if bits.contains(OpFlags::MULTIPLE) {
            Some(BulkMode::Values)
        } else {
            None
        }
    }
}

/// A value delivered to a continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// One value
    Single(Vec<u8>),
    /// Values from a `multiple` retrieval, in engine layout order
    Values(Vec<Vec<u8>>),
    /// `(value, key)` pairs from a `multiple_key` retrieval, in engine layout order
    Pairs(Vec<(Vec<u8>, Vec<u8>)>),
}

impl Decoded {
    /// The single value, if this is not a bulk result
    pub fn as_single(&self) -> Option<&[u8]> {
        match self {
            Decoded::Single(v) => Some(v),
            _ => None,
        }
    }

    /// Number of records carried
    pub fn len(&self) -> usize {
        match self {
            Decoded::Single(_) => 1,
            Decoded::Values(v) => v.len(),
            Decoded::Pairs(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Successful result of a get or put: the value and the key the engine reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub value: Option<Decoded>,
    pub key: Option<Vec<u8>>,
}

impl Reply {
    /// The value as a single byte string, if present and not a bulk result
    pub fn single(&self) -> Option<&[u8]> {
        self.value.as_ref().and_then(Decoded::as_single)
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }
}
