//! Linear memory map and tagged value layouts.
//!
//! ```text
//! 0..16       fd_write scratch (iovec data pointer, iovec length, nwritten)
//! 16..        runtime text ("null", "true", ...)
//! 1024..      string literal pool
//! heap base.. bump allocated values
//! ```

use std::collections::HashMap;

pub const PAGE_SIZE: u32 = 64 * 1024;

pub const IOVEC_PTR: u32 = 0;
pub const IOVEC_LEN: u32 = 4;
pub const NWRITTEN: u32 = 8;

pub const RUNTIME_TEXT_BASE: u32 = 16;
pub const POOL_BASE: u32 = 1024;

pub mod tag {
    pub const NULL: i32 = 0;
    pub const NUMBER: i32 = 1;
    pub const STRING: i32 = 2;
    pub const CLOSURE: i32 = 3;
    pub const BOOLEAN: i32 = 4;
}

/// Byte sizes of each value kind.
pub mod size {
    pub const NULL: u32 = 4;
    pub const NUMBER: u32 = 8;
    pub const STRING: u32 = 12;
    pub const BOOLEAN: u32 = 8;
    /// Closures are followed by one slot per upvalue.
    pub const CLOSURE_HEADER: u32 = 12;
    pub const SLOT: u32 = 4;
}

/// Field offsets within a value. Every value starts with its tag.
pub mod offset {
    pub const TAG: u64 = 0;
    /// Number bits, or the 0/1 of a boolean.
    pub const PAYLOAD: u64 = 4;
    pub const STRING_LEN: u64 = 4;
    pub const STRING_DATA: u64 = 8;
    pub const CLOSURE_INDEX: u64 = 4;
    pub const CLOSURE_COUNT: u64 = 8;

    pub const fn upvalue_slot(index: u32) -> u64 {
        (super::size::CLOSURE_HEADER + index * super::size::SLOT) as u64
    }
}

/// Texts the runtime prints for non-string values. The shorter ones are
/// suffixes of the longer ones where possible.
pub const RUNTIME_TEXT: &[u8] = b"nulltruefalse<fn>NaN-inf";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Text {
    pub offset: u32,
    pub len: u32,
}

impl Text {
    const fn runtime(start: u32, len: u32) -> Text {
        Text {
            offset: RUNTIME_TEXT_BASE + start,
            len,
        }
    }

    pub const NULL: Text = Text::runtime(0, 4);
    pub const TRUE: Text = Text::runtime(4, 4);
    pub const FALSE: Text = Text::runtime(8, 5);
    pub const FN: Text = Text::runtime(13, 4);
    pub const NAN: Text = Text::runtime(17, 3);
    pub const NEG_INF: Text = Text::runtime(20, 4);
    pub const INF: Text = Text::runtime(21, 3);
}

/// Bytes of every string literal in the program, stored once per distinct
/// content in first-use order.
#[derive(Default)]
pub struct StringPool {
    bytes: Vec<u8>,
    entries: HashMap<Box<str>, Text>,
}

impl StringPool {
    pub fn intern(&mut self, s: &str) -> Text {
        if let Some(text) = self.entries.get(s) {
            return *text;
        }
        let text = Text {
            offset: POOL_BASE + len_u32(self.bytes.len()),
            len: len_u32(s.len()),
        };
        self.bytes.extend_from_slice(s.as_bytes());
        self.entries.insert(s.into(), text);
        text
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First address past the pool.
    pub fn end(&self) -> u32 {
        POOL_BASE + len_u32(self.bytes.len())
    }
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).expect("string pool exceeds the address space")
}

/// Where the heap starts for the given configured base.
pub fn heap_start(heap_base: u32, pool_end: u32) -> u32 {
    heap_base.max(align8(pool_end))
}

pub const fn align8(addr: u32) -> u32 {
    (addr + 7) & !7
}

/// Number of pages needed to hold `bytes` bytes.
pub const fn pages_for(bytes: u32) -> u32 {
    bytes.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_texts() {
        let text = |t: Text| {
            let start = (t.offset - RUNTIME_TEXT_BASE) as usize;
            std::str::from_utf8(&RUNTIME_TEXT[start..start + t.len as usize]).unwrap()
        };
        assert_eq!(text(Text::NULL), "null");
        assert_eq!(text(Text::TRUE), "true");
        assert_eq!(text(Text::FALSE), "false");
        assert_eq!(text(Text::FN), "<fn>");
        assert_eq!(text(Text::NAN), "NaN");
        assert_eq!(text(Text::NEG_INF), "-inf");
        assert_eq!(text(Text::INF), "inf");
        assert!(RUNTIME_TEXT_BASE + (RUNTIME_TEXT.len() as u32) <= POOL_BASE);
    }

    #[test]
    fn test_pool_dedups_in_first_use_order() {
        let mut pool = StringPool::default();
        let abc = pool.intern("abc");
        let de = pool.intern("de");
        assert_eq!(pool.intern("abc"), abc);
        assert_eq!(abc, Text { offset: 1024, len: 3 });
        assert_eq!(de, Text { offset: 1027, len: 2 });
        assert_eq!(pool.bytes(), b"abcde");
        assert_eq!(pool.end(), 1029);
    }

    #[test]
    fn test_heap_start() {
        assert_eq!(heap_start(8192, 1029), 8192);
        assert_eq!(heap_start(0, 1029), 1032);
        assert_eq!(pages_for(8192), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
    }
}
