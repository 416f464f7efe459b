//! Bulk receive buffers.
//!
//! Records are packed from the start of the buffer; a trailer of native-endian
//! `u32` slots grows down from the end of the buffer. In value mode each record
//! takes two slots (`offset`, `length`); in pair mode four (`key offset`,
//! `key length`, `data offset`, `data length`). An offset of [`BULK_END`] ends
//! the trailer.

use log::trace;

use crate::constants::{BULK_END, BULK_SLOT_LEN, EINVAL};
use crate::error::EngineResult;
use crate::types::{BulkMode, Decoded};

fn slots_per_record(mode: BulkMode) -> usize {
    match mode {
        BulkMode::Values => 2,
        BulkMode::Pairs => 4,
    }
}

/// Buffer length needed to hold `payload` bytes in `records` records,
/// trailer included
pub fn required_len(mode: BulkMode, records: usize, payload: usize) -> usize {
    payload + (records * slots_per_record(mode) + 1) * BULK_SLOT_LEN
}

/// `n` as a trailer word. `None` once it collides with the terminator or
/// does not fit in 32 bits.
fn trailer_word(n: usize) -> Option<u32> {
    u32::try_from(n).ok().filter(|&word| word != BULK_END)
}

/// Fills a receive buffer in bulk layout
pub struct BulkWriter<'a> {
    buf: &'a mut [u8],
    mode: BulkMode,
    data_end: usize,
    slot_end: usize,
    records: usize,
}

impl<'a> BulkWriter<'a> {
    pub fn new(buf: &'a mut [u8], mode: BulkMode) -> Self {
        let slot_end = buf.len();
        BulkWriter {
            buf,
            mode,
            data_end: 0,
            slot_end,
            records: 0,
        }
    }

    pub fn records(&self) -> usize {
        self.records
    }

    fn fits(&self, payload: usize) -> bool {
        // leave room for the terminator
        let slots = (slots_per_record(self.mode) + 1) * BULK_SLOT_LEN;
        self.data_end + payload + slots <= self.slot_end
    }

    fn put_slot(&mut self, value: u32) {
        self.slot_end -= BULK_SLOT_LEN;
        self.buf[self.slot_end..self.slot_end + BULK_SLOT_LEN].copy_from_slice(&value.to_ne_bytes());
    }

    fn put_data(&mut self, bytes: &[u8]) {
        let offset = self.data_end;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.data_end += bytes.len();
    }

    /// Append one value. Returns `false`, writing nothing, if it does not fit.
    pub fn push_value(&mut self, value: &[u8]) -> bool {
        debug_assert_eq!(self.mode, BulkMode::Values);
        let (Some(offset), Some(len)) = (trailer_word(self.data_end), trailer_word(value.len())) else {
            return false;
        };
        if !self.fits(value.len()) {
            return false;
        }
        self.put_data(value);
        self.put_slot(offset);
        self.put_slot(len);
        self.records += 1;
        true
    }

    /// Append one key/data pair. Returns `false`, writing nothing, if it does not fit.
    pub fn push_pair(&mut self, key: &[u8], data: &[u8]) -> bool {
        debug_assert_eq!(self.mode, BulkMode::Pairs);
        let words = (
            trailer_word(self.data_end),
            trailer_word(key.len()),
            trailer_word(self.data_end + key.len()),
            trailer_word(data.len()),
        );
        let (Some(key_offset), Some(key_len), Some(data_offset), Some(data_len)) = words else {
            return false;
        };
        if !self.fits(key.len() + data.len()) {
            return false;
        }
        self.put_data(key);
        self.put_data(data);
        self.put_slot(key_offset);
        self.put_slot(key_len);
        self.put_slot(data_offset);
        self.put_slot(data_len);
        self.records += 1;
        true
    }

    /// Write the terminator and return the size to report for the buffer
    pub fn finish(mut self) -> usize {
        if self.slot_end >= self.data_end + BULK_SLOT_LEN {
            self.put_slot(BULK_END);
        }
        self.buf.len()
    }
}

/// Walks the trailer of a filled receive buffer. Not restartable.
pub struct BulkReader<'a> {
    buf: &'a [u8],
    slot_end: usize,
    done: bool,
}

impl<'a> BulkReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BulkReader {
            buf,
            slot_end: buf.len(),
            done: buf.is_empty(),
        }
    }

    fn slot(&mut self) -> EngineResult<u32> {
        if self.slot_end < BULK_SLOT_LEN {
            return Err(EINVAL);
        }
        self.slot_end -= BULK_SLOT_LEN;
        let mut word = [0u8; BULK_SLOT_LEN];
        word.copy_from_slice(&self.buf[self.slot_end..self.slot_end + BULK_SLOT_LEN]);
        Ok(u32::from_ne_bytes(word))
    }

    fn record(&mut self, offset: u32) -> EngineResult<Vec<u8>> {
        let len = self.slot()? as usize;
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(EINVAL)?;
        if end > self.slot_end {
            return Err(EINVAL);
        }
        Ok(self.buf[start..end].to_vec())
    }

    /// Next value in value mode, `None` at the terminator
    pub fn next_value(&mut self) -> EngineResult<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let offset = self.slot()?;
        if offset == BULK_END {
            self.done = true;
            return Ok(None);
        }
        self.record(offset).map(Some)
    }

    /// Next `(key, data)` pair in pair mode, `None` at the terminator
    pub fn next_pair(&mut self) -> EngineResult<Option<(Vec<u8>, Vec<u8>)>> {
        let key = match self.next_value()? {
            Some(key) => key,
            None => return Ok(None),
        };
        let offset = self.slot()?;
        let data = self.record(offset)?;
        Ok(Some((key, data)))
    }
}

/// Decode a whole receive buffer into values or `(value, key)` pairs
pub fn decode(buf: &[u8], mode: BulkMode) -> EngineResult<Decoded> {
    let mut reader = BulkReader::new(buf);
    let decoded = match mode {
        BulkMode::Values => {
            let mut values = Vec::new();
            while let Some(value) = reader.next_value()? {
                values.push(value);
            }
            Decoded::Values(values)
        }
        BulkMode::Pairs => {
            let mut pairs = Vec::new();
            while let Some((key, data)) = reader.next_pair()? {
                pairs.push((data, key));
            }
            Decoded::Pairs(pairs)
        }
    };
    trace!("decoded {} bulk records", decoded.len());
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_values(values: &[&[u8]], capacity: usize) -> Vec<u8> {
        let mut buf = vec![0u8; capacity];
        let mut writer = BulkWriter::new(&mut buf, BulkMode::Values);
        for value in values {
            assert!(writer.push_value(value));
        }
        let size = writer.finish();
        buf.truncate(size);
        buf
    }

    #[test]
    fn values_decode_in_layout_order() {
        let buf = filled_values(&[b"Denpasar", b"Ubud", b"Kuta"], 128);
        let decoded = decode(&buf, BulkMode::Values).unwrap();
        assert_eq!(
            decoded,
            Decoded::Values(vec![b"Denpasar".to_vec(), b"Ubud".to_vec(), b"Kuta".to_vec()])
        );
    }

    #[test]
    fn offsets_past_the_trailer_range_are_refused() {
        assert_eq!(trailer_word(0), Some(0));
        assert_eq!(trailer_word(4096), Some(4096));
        assert_eq!(trailer_word(BULK_END as usize - 1), Some(BULK_END - 1));
        assert_eq!(trailer_word(BULK_END as usize), None);
        assert_eq!(trailer_word(usize::MAX), None);
    }

    #[test]
    fn pairs_decode_as_value_then_key() {
        let mut buf = vec![0u8; 128];
        let mut writer = BulkWriter::new(&mut buf, BulkMode::Pairs);
        assert!(writer.push_pair(b"Bali", b"Denpasar"));
        assert!(writer.push_pair(b"Java", b"Jakarta"));
        writer.finish();
        let decoded = decode(&buf, BulkMode::Pairs).unwrap();
        assert_eq!(
            decoded,
            Decoded::Pairs(vec![
                (b"Denpasar".to_vec(), b"Bali".to_vec()),
                (b"Jakarta".to_vec(), b"Java".to_vec()),
            ])
        );
    }

    #[test]
    fn empty_buffer_has_no_records() {
        let buf = filled_values(&[], 32);
        assert!(decode(&buf, BulkMode::Values).unwrap().is_empty());
        assert!(decode(&[], BulkMode::Pairs).unwrap().is_empty());
    }

    #[test]
    fn empty_values_are_kept() {
        let buf = filled_values(&[b"", b"x"], 64);
        assert_eq!(
            decode(&buf, BulkMode::Values).unwrap(),
            Decoded::Values(vec![Vec::new(), b"x".to_vec()])
        );
    }

    #[test]
    fn writer_refuses_records_that_do_not_fit() {
        let mut buf = vec![0u8; required_len(BulkMode::Values, 1, 4)];
        let mut writer = BulkWriter::new(&mut buf, BulkMode::Values);
        assert!(writer.push_value(b"abcd"));
        assert!(!writer.push_value(b"e"));
        assert_eq!(writer.records(), 1);
        writer.finish();
        assert_eq!(decode(&buf, BulkMode::Values).unwrap().len(), 1);
    }

    #[test]
    fn out_of_bounds_slot_is_invalid() {
        let mut buf = vec![0u8; 16];
        let end = buf.len();
        buf[end - 4..].copy_from_slice(&100u32.to_ne_bytes());
        buf[end - 8..end - 4].copy_from_slice(&8u32.to_ne_bytes());
        assert_eq!(decode(&buf, BulkMode::Values), Err(EINVAL));
    }

    #[test]
    fn missing_terminator_is_invalid() {
        let mut buf = vec![0u8; 8];
        buf[4..].copy_from_slice(&0u32.to_ne_bytes());
        buf[..4].copy_from_slice(&0u32.to_ne_bytes());
        assert_eq!(decode(&buf, BulkMode::Values), Err(EINVAL));
    }
}
