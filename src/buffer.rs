//! Endian-aware reads of pointer-sized values out of an immutable byte
//! buffer. This is the one place in the crate that touches raw bytes.

use zerocopy::byteorder::{BigEndian, LittleEndian, U32, U64};
use zerocopy::FromBytes;

use crate::arch::{Architecture, Endianness};

/// Reads a pointer-sized value at `offset` under the given architecture
/// and endianness, zero-extended to `u64`.
///
/// # Panics
///
/// Panics if `offset + arch.pointer_size() > buf.len()`. Callers must
/// bound-check before calling; this mirrors the original tool's
/// undefined behavior for out-of-range offsets.
pub fn read_ptr(buf: &[u8], offset: usize, arch: Architecture, endian: Endianness) -> u64 {
    let size = arch.pointer_size();
    let slice = &buf[offset..offset + size];
    match (arch, endian) {
        (Architecture::Arch32, Endianness::Be) => {
            U32::<BigEndian>::ref_from_bytes(slice).unwrap().get() as u64
        }
        (Architecture::Arch32, _) => {
            U32::<LittleEndian>::ref_from_bytes(slice).unwrap().get() as u64
        }
        (Architecture::Arch64, Endianness::Be) => {
            U64::<BigEndian>::ref_from_bytes(slice).unwrap().get()
        }
        (Architecture::Arch64, _) => {
            U64::<LittleEndian>::ref_from_bytes(slice).unwrap().get()
        }
    }
}

/// Whether `offset` has room for one more pointer-sized read.
pub fn can_read_ptr(buf_len: usize, offset: usize, arch: Architecture) -> bool {
    offset + arch.pointer_size() <= buf_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_be_are_byteswap_related() {
        let buf = [0x11u8, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let le32 = read_ptr(&buf, 0, Architecture::Arch32, Endianness::Le);
        let be32 = read_ptr(&buf, 0, Architecture::Arch32, Endianness::Be);
        assert_eq!(le32, (be32 as u32).swap_bytes() as u64);

        let le64 = read_ptr(&buf, 0, Architecture::Arch64, Endianness::Le);
        let be64 = read_ptr(&buf, 0, Architecture::Arch64, Endianness::Be);
        assert_eq!(le64, be64.swap_bytes());
    }

    #[test]
    fn reads_expected_value() {
        let buf = [0x00u8, 0x80, 0x00, 0x00];
        assert_eq!(
            read_ptr(&buf, 0, Architecture::Arch32, Endianness::Le),
            0x0000_8000
        );
        assert_eq!(
            read_ptr(&buf, 0, Architecture::Arch32, Endianness::Be),
            0x0080_0000
        );
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_panics() {
        let buf = [0u8; 2];
        read_ptr(&buf, 0, Architecture::Arch32, Endianness::Le);
    }
}
