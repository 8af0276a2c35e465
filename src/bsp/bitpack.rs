//! Bit-packed fields sharing one storage word
//!
//! `dleaf_t` stores `area:9` (signed) and `flags:7` in one 16-bit word;
//! overlays pack a 14-bit face count with a 2-bit render order.

/// Split a leaf's area/flags word into `(area, flags)`.
///
/// Only the low 16 bits of `word` are used. The area is the low 9 bits,
/// sign-extended by shifting them to the top of an `i16` and back; the
/// flags are the 7 bits above it.
pub fn unpack16(word: u32) -> (i16, i16) {
    let w = word as u16;
    let area = ((w << 7) as i16) >> 7;
    let flags = (w >> 9) as i16;
    (area, flags)
}

/// Inverse of [`unpack16`]. `area` is truncated to 9 bits, `flags` to 7.
pub fn pack16(area: i16, flags: i16) -> u16 {
    ((area as u16) & 0x01FF) | (((flags as u16) & 0x7F) << 9)
}

pub const OVERLAY_FACE_COUNT_BITS: u32 = 14;
const OVERLAY_FACE_COUNT_MASK: u16 = (1 << OVERLAY_FACE_COUNT_BITS) - 1;

/// Split an overlay's `m_nFaceCountAndRenderOrder` into `(face_count, render_order)`
pub fn unpack_face_count_render_order(word: u16) -> (u16, u8) {
    (
        word & OVERLAY_FACE_COUNT_MASK,
        (word >> OVERLAY_FACE_COUNT_BITS) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_full_range() {
        for area in -256i16..=255 {
            for flags in 0i16..128 {
                let word = pack16(area, flags);
                assert_eq!(unpack16(word as u32), (area, flags), "area={area} flags={flags}");
            }
        }
    }

    #[test]
    fn test_known_words() {
        assert_eq!(unpack16(pack16(-5, 0x3) as u32), (-5, 3));
        // bit 8 set sign-extends
        assert_eq!(unpack16(0x0100), (-256, 0));
        assert_eq!(unpack16(0x01FF), (-1, 0));
        assert_eq!(unpack16(0x00FF), (255, 0));
        assert_eq!(unpack16(0xFE00), (0, 127));
        // upper half of a 32-bit word is ignored
        assert_eq!(unpack16(0xFFFF_0003), (3, 0));
    }

    #[test]
    fn test_overlay_split() {
        assert_eq!(unpack_face_count_render_order(0x0005), (5, 0));
        assert_eq!(unpack_face_count_render_order(0xC001), (1, 3));
        assert_eq!(unpack_face_count_render_order(0x7FFF), (0x3FFF, 1));
    }
}
