/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! PackBits run-length decoding for channel scanlines.
//!
//! Each row of an RLE channel is packed independently; the per-row
//! packed lengths sit in a table just before the pixel data and rows
//! never share runs.

use log::warn;

use crate::errors::PsdDecodeErrors;

/// Unpack a PackBits-compressed buffer into `dst`.
///
/// Control byte `n`: `0..=127` copies the next `n + 1` bytes
/// literally, `-127..=-1` repeats the next byte `1 - n` times, `-128`
/// is a no-op.
///
/// Exhausting the packed input between runs while output remains is
/// tolerated, the rest of `dst` is zero-filled; some producers emit
/// short rows. Exhausting it *inside* a run, or a run overrunning
/// `dst`, is a hard error since that means the payload is truncated
/// or corrupt.
pub(crate) fn decode_packbits(src: &[u8], dst: &mut [u8]) -> Result<(), PsdDecodeErrors> {
    let mut sp = 0;
    let mut dp = 0;

    while dp < dst.len() && sp < src.len() {
        let control = src[sp] as i8;
        sp += 1;

        if control == -128 {
            continue;
        }

        if control >= 0 {
            let run = usize::from(control as u8) + 1;

            if sp + run > src.len() {
                return Err(PsdDecodeErrors::BadRle("input exhausted in literal copy"));
            }
            if dp + run > dst.len() {
                return Err(PsdDecodeErrors::BadRle("output exhausted in literal copy"));
            }
            dst[dp..dp + run].copy_from_slice(&src[sp..sp + run]);
            sp += run;
            dp += run;
        } else {
            let run = (1 - i32::from(control)) as usize;

            if sp >= src.len() {
                return Err(PsdDecodeErrors::BadRle("input exhausted in replicate"));
            }
            if dp + run > dst.len() {
                return Err(PsdDecodeErrors::BadRle("overrun in replicate"));
            }
            let value = src[sp];
            sp += 1;

            dst[dp..dp + run].fill(value);
            dp += run;
        }
    }

    if dp < dst.len() {
        warn!("Packed row ended {} bytes early, zero filling", dst.len() - dp);
        dst[dp..].fill(0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference PackBits encoder, runs capped at 128.
    fn encode_packbits(src: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < src.len() {
            // measure the repeat run at i
            let mut run = 1;
            while i + run < src.len() && src[i + run] == src[i] && run < 128 {
                run += 1;
            }
            if run >= 2 {
                out.push((1_i32 - run as i32) as u8);
                out.push(src[i]);
                i += run;
                continue;
            }
            // literal run until the next repeat of length >= 3
            let mut end = i + 1;
            while end < src.len() && end - i < 128 {
                if end + 2 < src.len() && src[end] == src[end + 1] && src[end] == src[end + 2] {
                    break;
                }
                end += 1;
            }
            out.push((end - i - 1) as u8);
            out.extend_from_slice(&src[i..end]);
            i = end;
        }
        out
    }

    fn round_trip(data: &[u8]) {
        let packed = encode_packbits(data);
        let mut unpacked = vec![0_u8; data.len()];
        decode_packbits(&packed, &mut unpacked).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn round_trip_mixed() {
        round_trip(b"");
        round_trip(b"a");
        round_trip(b"abcdef");
        round_trip(b"aaaabbbcdddddddddddddddef");
        round_trip(&[0, 0, 0, 1, 2, 3, 3, 3, 3, 3, 255, 255]);
    }

    #[test]
    fn long_run_splits_into_capped_replicates() {
        let data = vec![0x7F_u8; 130];
        let packed = encode_packbits(&data);
        // 128-byte replicate plus a 2-byte replicate
        assert_eq!(packed, vec![0x81, 0x7F, 0xFF, 0x7F]);

        let mut unpacked = vec![0_u8; 130];
        decode_packbits(&packed, &mut unpacked).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn sentinel_is_noop() {
        let mut dst = vec![0xCC_u8; 2];
        decode_packbits(&[0x80, 0x80, 0x01, 9, 8], &mut dst).unwrap();
        assert_eq!(dst, vec![9, 8]);
    }

    #[test]
    fn clean_underrun_zero_fills() {
        // one literal byte packed, four expected out
        let mut dst = vec![0xCC_u8; 4];
        decode_packbits(&[0x00, 42], &mut dst).unwrap();
        assert_eq!(dst, vec![42, 0, 0, 0]);
    }

    #[test]
    fn truncated_literal_is_fatal() {
        // control byte promises 4 literals, only 2 present
        let mut dst = vec![0_u8; 8];
        let err = decode_packbits(&[0x03, 1, 2], &mut dst).unwrap_err();
        assert!(matches!(err, PsdDecodeErrors::BadRle(_)));
    }

    #[test]
    fn truncated_replicate_is_fatal() {
        // replicate control byte with no value byte following
        let mut dst = vec![0_u8; 8];
        let err = decode_packbits(&[0xFE], &mut dst).unwrap_err();
        assert!(matches!(err, PsdDecodeErrors::BadRle(_)));
    }

    #[test]
    fn replicate_overrunning_output_is_fatal() {
        // 5-byte replicate into a 3-byte target
        let mut dst = vec![0_u8; 3];
        let err = decode_packbits(&[0xFC, 7], &mut dst).unwrap_err();
        assert!(matches!(err, PsdDecodeErrors::BadRle(_)));
    }

    #[test]
    fn literal_overrunning_output_is_fatal() {
        let mut dst = vec![0_u8; 2];
        let err = decode_packbits(&[0x03, 1, 2, 3, 4], &mut dst).unwrap_err();
        assert!(matches!(err, PsdDecodeErrors::BadRle(_)));
    }
}
