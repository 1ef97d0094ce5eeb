//! Copy-on-write UTF-16 strings
//!
//! A [`PString`] is a `(buffer, start, len)` view into a shared, reference
//! counted buffer of UTF-16 code units. Slicing never copies: the new view
//! shares the buffer and only stores a different window. Mutating operations
//! consume the string and write in place only while the view is the sole owner
//! of its buffer; otherwise they copy the visible window into a fresh buffer
//! first, so every other handle keeps observing the old contents.
//!
//! Buffer capacity is bucketed to bound over-allocation: powers of two below
//! [`LINEAR_GROWTH_THRESHOLD`] code units, multiples of it above.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::AllocError;

/// Below this many code units capacities grow in powers of two
pub const LINEAR_GROWTH_THRESHOLD: usize = 4096;

const MIN_CAPACITY: usize = 8;

/// Capacity (in code units) reserved for a buffer holding `len` code units
pub fn capacity_for(len: usize) -> usize {
    if len < LINEAR_GROWTH_THRESHOLD {
        len.max(MIN_CAPACITY).next_power_of_two()
    } else {
        len.div_ceil(LINEAR_GROWTH_THRESHOLD)
            .saturating_mul(LINEAR_GROWTH_THRESHOLD)
    }
}

#[derive(Debug, Clone)]
struct StringBuffer {
    units: Vec<u16>,
}

impl StringBuffer {
    fn with_len(len: usize) -> Self {
        let mut units = Vec::with_capacity(capacity_for(len));
        units.resize(len, 0);
        StringBuffer { units }
    }

    fn try_with_len(len: usize) -> Result<Self, AllocError> {
        let mut units = Vec::new();
        units
            .try_reserve_exact(capacity_for(len))
            .map_err(|_| AllocError { requested: len })?;
        units.resize(len, 0);
        Ok(StringBuffer { units })
    }

    fn from_units(src: &[u16], extra: usize) -> Self {
        let mut units = Vec::with_capacity(capacity_for(src.len() + extra));
        units.extend_from_slice(src);
        StringBuffer { units }
    }
}

/// Immutable string handle with O(1) slicing
#[derive(Clone)]
pub struct PString {
    buffer: Arc<StringBuffer>,
    start: usize,
    len: usize,
}

impl PString {
    /// A zero-filled string of `len` code units
    pub fn new_buffer(len: usize) -> Self {
        PString {
            buffer: Arc::new(StringBuffer::with_len(len)),
            start: 0,
            len,
        }
    }

    /// Like [`PString::new_buffer`] but reports allocation failure
    pub fn try_new_buffer(len: usize) -> Result<Self, AllocError> {
        Ok(PString {
            buffer: Arc::new(StringBuffer::try_with_len(len)?),
            start: 0,
            len,
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self::from_units(&s.encode_utf16().collect::<Vec<_>>())
    }

    pub fn from_units(units: &[u16]) -> Self {
        PString {
            buffer: Arc::new(StringBuffer::from_units(units, 0)),
            start: 0,
            len: units.len(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The visible code units
    #[inline]
    pub fn units(&self) -> &[u16] {
        &self.buffer.units[self.start..self.start + self.len]
    }

    pub fn code_unit(&self, index: usize) -> Option<u16> {
        self.units().get(index).copied()
    }

    /// True when this handle views only part of its buffer
    pub fn is_slice(&self) -> bool {
        self.start != 0 || self.len != self.buffer.units.len()
    }

    /// Number of handles sharing the underlying buffer
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// Identity of the underlying buffer
    pub fn buffer_id(&self) -> usize {
        Arc::as_ptr(&self.buffer) as usize
    }

    /// Capacity of the underlying buffer in code units
    pub fn capacity(&self) -> usize {
        self.buffer.units.capacity()
    }

    /// Same buffer and same window
    pub fn ptr_eq(&self, other: &PString) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer) && self.start == other.start && self.len == other.len
    }

    /// O(1) view of `len` code units starting at `start`, clamped to bounds.
    ///
    /// Slicing a slice references the root buffer directly.
    pub fn slice(&self, start: usize, len: usize) -> PString {
        let start = start.min(self.len);
        let len = len.min(self.len - start);
        PString {
            buffer: Arc::clone(&self.buffer),
            start: self.start + start,
            len,
        }
    }

    /// Make this handle the sole owner of a buffer holding exactly its window,
    /// with room for `extra` more code units.
    fn make_unique(&mut self, extra: usize) -> &mut Vec<u16> {
        if Arc::get_mut(&mut self.buffer).is_none() {
            self.buffer = Arc::new(StringBuffer::from_units(self.units(), extra));
            self.start = 0;
        }
        let start = self.start;
        let len = self.len;
        let buf = Arc::make_mut(&mut self.buffer);
        if start != 0 {
            buf.units.copy_within(start..start + len, 0);
            self.start = 0;
        }
        buf.units.truncate(len);
        let wanted = len + extra;
        if buf.units.capacity() < wanted {
            let target = capacity_for(wanted);
            buf.units.reserve_exact(target - buf.units.len());
        }
        &mut buf.units
    }

    /// Replace one code unit; out-of-range indices leave the string unchanged.
    pub fn set_code_unit(mut self, index: usize, unit: u16) -> PString {
        if index >= self.len {
            return self;
        }
        let units = self.make_unique(0);
        units[index] = unit;
        self
    }

    /// Append `other`, writing into this string's buffer when it is not shared.
    pub fn concat(mut self, other: &PString) -> PString {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other.clone();
        }
        let extra = other.len;
        let tail: Vec<u16>;
        let src: &[u16] = if Arc::ptr_eq(&self.buffer, &other.buffer) {
            tail = other.units().to_vec();
            &tail
        } else {
            other.units()
        };
        let units = self.make_unique(extra);
        units.extend_from_slice(src);
        self.len += extra;
        self
    }

    /// Write the string quoted, escaping quotes, backslashes and control characters.
    pub fn write_escaped<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        out.write_char('"')?;
        for ch in char::decode_utf16(self.units().iter().copied()) {
            match ch {
                Ok('"') => out.write_str("\\\"")?,
                Ok('\\') => out.write_str("\\\\")?,
                Ok('\n') => out.write_str("\\n")?,
                Ok('\t') => out.write_str("\\t")?,
                Ok('\r') => out.write_str("\\r")?,
                Ok(c) if c.is_control() => write!(out, "\\x{{{:02x}}}", c as u32)?,
                Ok(c) => out.write_char(c)?,
                Err(e) => write!(out, "\\x{{{:04x}}}", e.unpaired_surrogate())?,
            }
        }
        out.write_char('"')
    }
}

impl fmt::Display for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in char::decode_utf16(self.units().iter().copied()) {
            fmt::Write::write_char(f, ch.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_escaped(f)
    }
}

impl PartialEq for PString {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.units() == other.units()
    }
}

impl Eq for PString {}

impl PartialOrd for PString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.units().cmp(other.units())
    }
}

impl Hash for PString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.units().hash(state)
    }
}
