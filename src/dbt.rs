use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::BulkMode;

/// Number of descriptor allocations currently alive
static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Count of buffer allocations owned by live descriptors.
///
/// Every allocation a descriptor makes or takes over is counted once and
/// uncounted when it is dropped, so the value returns to its starting point
/// once every task that created descriptors has completed.
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.load(Ordering::SeqCst)
}

/// An owned allocation tracked by [`live_buffers`]
#[derive(Debug)]
pub struct OwnedBuf(Vec<u8>);

impl OwnedBuf {
    fn new(bytes: Vec<u8>) -> Self {
        LIVE_BUFFERS.fetch_add(1, Ordering::SeqCst);
        OwnedBuf(bytes)
    }

    fn into_inner(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl Drop for OwnedBuf {
    fn drop(&mut self) {
        LIVE_BUFFERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Byte buffer passed to or received from the engine, tagged by who allocates it
#[derive(Debug)]
pub enum Dbt {
    /// Caller content copied into an owned allocation before queueing
    Supplied(OwnedBuf),
    /// Nothing allocated at call time; the engine hands back an allocation
    Malloc(Option<OwnedBuf>),
    /// Fixed-capacity receive buffer filled in place by a bulk retrieval.
    /// `size` is the number of bytes the engine reports using, or the size
    /// it would have needed when the buffer was too small.
    UserMem { buf: OwnedBuf, size: usize },
}

impl Dbt {
    /// Descriptor for one side of an engine call.
    ///
    /// Input is copied; otherwise a bulk request gets a `bulk_len` receive
    /// buffer and anything else is left for the engine to allocate.
    pub fn for_input(input: Option<&[u8]>, flags: u32, bulk_len: usize) -> Dbt {
        match input {
            Some(bytes) => Dbt::supplied(bytes),
            None if BulkMode::from_flags(flags).is_some() => Dbt::user_mem(bulk_len),
            None => Dbt::empty(),
        }
    }

    pub fn supplied(bytes: &[u8]) -> Dbt {
        Dbt::Supplied(OwnedBuf::new(bytes.to_vec()))
    }

    pub fn user_mem(capacity: usize) -> Dbt {
        Dbt::UserMem {
            buf: OwnedBuf::new(vec![0; capacity]),
            size: 0,
        }
    }

    pub fn empty() -> Dbt {
        Dbt::Malloc(None)
    }

    /// Current content; for a receive buffer, the bytes the engine reported.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Dbt::Supplied(buf) => Some(&buf.0),
            Dbt::Malloc(buf) => buf.as_ref().map(|b| b.0.as_slice()),
            Dbt::UserMem { buf, size } => buf.0.get(..*size),
        }
    }

    pub fn is_user_mem(&self) -> bool {
        matches!(self, Dbt::UserMem { .. })
    }

    /// Capacity available to the engine for in-place writes
    pub fn ulen(&self) -> usize {
        match self {
            Dbt::UserMem { buf, .. } => buf.0.len(),
            _ => 0,
        }
    }

    /// Replace the content with an engine-produced allocation. A supplied or
    /// previous engine allocation is released first. Receive buffers are
    /// written in place through [`Dbt::receive_buffer`] instead.
    pub fn set_output(&mut self, bytes: Vec<u8>) {
        if !self.is_user_mem() {
            *self = Dbt::Malloc(Some(OwnedBuf::new(bytes)));
        }
    }

    /// Writable receive buffer and its reported size, for bulk retrieval
    pub fn receive_buffer(&mut self) -> Option<(&mut [u8], &mut usize)> {
        match self {
            Dbt::UserMem { buf, size } => Some((buf.0.as_mut_slice(), size)),
            _ => None,
        }
    }

    /// Take the content out, releasing the descriptor.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Dbt::Supplied(buf) => Some(buf.into_inner()),
            Dbt::Malloc(buf) => buf.map(OwnedBuf::into_inner),
            Dbt::UserMem { buf, size } => {
                let mut bytes = buf.into_inner();
                bytes.truncate(size);
                Some(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DB_NEXT, OpFlags};

    #[test]
    fn input_is_copied() {
        let dbt = Dbt::for_input(Some(b"Bali"), 0, 64);
        assert!(matches!(dbt, Dbt::Supplied(_)));
        assert_eq!(dbt.data(), Some(&b"Bali"[..]));
    }

    #[test]
    fn bulk_flags_allocate_receive_buffer() {
        let flags = DB_NEXT | OpFlags::MULTIPLE_KEY.bits();
        let dbt = Dbt::for_input(None, flags, 128);
        assert!(dbt.is_user_mem());
        assert_eq!(dbt.ulen(), 128);
        assert_eq!(dbt.data(), Some(&[][..]));
    }

    #[test]
    fn plain_output_is_left_to_the_engine() {
        let mut dbt = Dbt::for_input(None, DB_NEXT, 128);
        assert_eq!(dbt.data(), None);
        dbt.set_output(b"Denpasar".to_vec());
        assert_eq!(dbt.into_bytes(), Some(b"Denpasar".to_vec()));
    }

    #[test]
    fn output_replaces_supplied_content() {
        let mut dbt = Dbt::supplied(b"Ba");
        dbt.set_output(b"Bali".to_vec());
        assert_eq!(dbt.data(), Some(&b"Bali"[..]));
    }

    #[test]
    fn receive_buffer_reports_written_size() {
        let mut dbt = Dbt::user_mem(16);
        {
            let (buf, size) = dbt.receive_buffer().unwrap();
            buf[..3].copy_from_slice(b"abc");
            *size = 3;
        }
        assert_eq!(dbt.data(), Some(&b"abc"[..]));
        assert_eq!(dbt.into_bytes(), Some(b"abc".to_vec()));
    }
}
