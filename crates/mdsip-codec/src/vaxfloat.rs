//! Bit-level conversion of VMS-era floating point formats to IEEE.
//!
//! The VMS formats store their fields in 16-bit words with the low word
//! first, so the mantissa arrives split into word-aligned fragments that
//! have to be reassembled before the IEEE bit pattern can be composed.
//! All functions are pure reinterpretations; exponent arithmetic is
//! masked to the destination field width, matching the historical
//! converter's union-based behavior.
//!
//! H_floating (128-bit) is deliberately not implemented; callers must
//! surface it as an unsupported feature rather than truncate.

/// Convert a VMS F_floating bit pattern to an IEEE single.
///
/// Layout (from bit 0 of the little-endian u32): fraction:7, exponent:8,
/// sign:1, fraction2:16. The 23-bit IEEE mantissa is `fraction` followed
/// by `fraction2`; the exponent moves from excess-128 to excess-127 with
/// the hidden-bit convention shift (net offset -2).
pub fn f_to_f32(raw: [u8; 4]) -> f32 {
    let v = u32::from_le_bytes(raw);

    let fraction = v & 0x7F;
    let exponent = (v >> 7) & 0xFF;
    let sign = (v >> 15) & 1;
    let fraction2 = v >> 16;

    let mantissa = (fraction << 16) | fraction2;
    let exponent = exponent.wrapping_add(126).wrapping_sub(128) & 0xFF;

    f32::from_bits((sign << 31) | (exponent << 23) | mantissa)
}

/// Convert a VMS D_floating bit pattern to an IEEE double.
///
/// Layout: fraction:7, exponent:8, sign:1, then three 16-bit fraction
/// words. D_floating carries 55 mantissa bits; the low 3 are dropped by
/// the 52-bit IEEE field mask.
pub fn d_to_f64(raw: [u8; 8]) -> f64 {
    let v = u64::from_le_bytes(raw);

    let fraction = v & 0x7F;
    let exponent = (v >> 7) & 0xFF;
    let sign = (v >> 15) & 1;
    let fraction2 = (v >> 16) & 0xFFFF;
    let fraction3 = (v >> 32) & 0xFFFF;
    let fraction4 = (v >> 48) & 0xFFFF;

    let mantissa =
        ((fraction << 48) | (fraction2 << 32) | (fraction3 << 16) | fraction4) & ((1 << 52) - 1);
    let exponent = exponent.wrapping_add(1022).wrapping_sub(128) & 0x7FF;

    f64::from_bits((sign << 63) | (exponent << 52) | mantissa)
}

/// Convert a VMS G_floating bit pattern to an IEEE double.
///
/// Layout: fraction:4, exponent:11, sign:1, then three 16-bit fraction
/// words; 52 mantissa bits total, excess-1024 exponent.
pub fn g_to_f64(raw: [u8; 8]) -> f64 {
    let v = u64::from_le_bytes(raw);

    let fraction = v & 0xF;
    let exponent = (v >> 4) & 0x7FF;
    let sign = (v >> 15) & 1;
    let fraction2 = (v >> 16) & 0xFFFF;
    let fraction3 = (v >> 32) & 0xFFFF;
    let fraction4 = (v >> 48) & 0xFFFF;

    let mantissa = (fraction << 48) | (fraction2 << 32) | (fraction3 << 16) | fraction4;
    let exponent = exponent.wrapping_add(1022).wrapping_sub(1024) & 0x7FF;

    f64::from_bits((sign << 63) | (exponent << 52) | mantissa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f_floating_pi() {
        // Known F_floating encoding of single-precision pi.
        let value = f_to_f32([0x49, 0x41, 0xD0, 0x0F]);
        assert!((value - 3.14159).abs() < 1e-5, "got {value}");
    }

    #[test]
    fn f_floating_sign() {
        // Same pattern with the sign bit (bit 15) set.
        let v = u32::from_le_bytes([0x49, 0x41, 0xD0, 0x0F]) | (1 << 15);
        let value = f_to_f32(v.to_le_bytes());
        assert!((value + 3.14159).abs() < 1e-5, "got {value}");
    }

    #[test]
    fn g_floating_pi() {
        // G_floating pi: stored exponent 0x402, mantissa 0x921FB54442D18
        // split into word fragments low word first.
        let value = g_to_f64([0x29, 0x40, 0xFB, 0x21, 0x44, 0x54, 0x18, 0x2D]);
        assert!((value - std::f64::consts::PI).abs() < 1e-12, "got {value}");
    }

    #[test]
    fn d_floating_pi() {
        // Excess-128 exponent 0x82 and mantissa fragments that reassemble
        // to the IEEE mantissa of pi (0x921FB54442D18).
        let v: u64 = 0x09
            | (0x82u64 << 7)
            | (0x21FBu64 << 16)
            | (0x5444u64 << 32)
            | (0x2D18u64 << 48);
        let value = d_to_f64(v.to_le_bytes());
        assert!((value - std::f64::consts::PI).abs() < 1e-12, "got {value}");
    }
}
