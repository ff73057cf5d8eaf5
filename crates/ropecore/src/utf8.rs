//! Byte-length lookups for single-codepoint navigation.
//!
//! No validation happens here: a byte that cannot start a sequence is treated
//! as a one-byte unit so cursor movement always makes progress.

/// Length of the UTF-8 sequence introduced by `lead`.
pub fn sequence_len(lead: u8) -> usize {
    if lead < 0x80 {
        1
    } else if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else if lead & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

pub fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
