//! Per-segment header rewrite and check-value composition for merging
//! multiple `.br` files into one.
//!
//! Grounded on `braid.c`'s `copy()` (per-segment rewrite) and `main()`'s
//! trailer-assembly tail. Existing check values (XXH32/XXH64/CRC-32C/
//! SHA-256) are copied through byte-for-byte rather than recomputed — only
//! the running "check of checks" over those bytes and the rewritten header
//! checks are computed fresh, exactly as `braid.c` does.

use crate::error::{safety_check, YeastResult};
use crate::framing::*;
use xxhash_rust::xxh32::Xxh32;

struct Segment<'a> {
    data: &'a [u8],
    header_start: usize,
    trailer_start: usize,
}

/// Parses one input `.br` file's segment chain (every brotli-stream header
/// plus its trailer) using [`crate::framing::scan_bytes`].
fn segments_of<'a>(data: &'a [u8]) -> YeastResult<Vec<Segment<'a>>> {
    let scan = scan_bytes(data)?;
    let mut bounds = vec![4usize];
    bounds.extend(scan.header_offsets.iter().copied());
    bounds.push(scan.trailer_offset);

    let mut segments = Vec::new();
    for w in bounds.windows(2) {
        segments.push(Segment { data, header_start: w[0], trailer_start: w[1] });
    }
    Ok(segments)
}

/// Merges the segment chains of several `.br` files, in order, into one
/// `.br` byte stream. Mirrors `braid.c`'s main loop: every segment's header
/// is rewritten with a fresh back-distance and (if present) a fresh 16-bit
/// header check; mod-time and filename are stripped from every header but
/// the very first; the trailer reports a total uncompressed length only if
/// every input segment reported one, and a check-of-checks only when more
/// than one brotli stream was merged.
pub fn merge(files: &[&[u8]]) -> YeastResult<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&BR_SIG);

    let mut last_header_offset: usize = 0;
    let mut stream_count: u32 = 0;
    let mut total_len: Option<u64> = None;
    let mut checks = Xxh32::new(0);

    for &file in files {
        let segments = segments_of(file)?;
        for seg in &segments {
            copy_segment(seg, &mut out, &mut last_header_offset, &mut checks)?;
            stream_count += 1;
        }

        // Inspect this file's own trailer to fold in its reported total
        // length, same as braid.c's post-copy trailer peek.
        let scan = scan_bytes(file)?;
        let trail = file[scan.trailer_offset];
        if total_len != Some(u64::MAX) {
            if trail & BR_CONTENT_LEN != 0 {
                let mut pos = scan.trailer_offset + 1;
                if trail & BR_CONTENT_OFF != 0 {
                    let (_, c) = read_bidirectional_varint_forward(file, pos)?;
                    pos += c;
                }
                let (len, _) = read_bidirectional_varint_forward(file, pos)?;
                total_len = Some(total_len.unwrap_or(0) + len);
            } else if !segments.is_empty() {
                total_len = Some(u64::MAX); // sentinel: "no longer trackable"
            }
        }
    }

    let mut trail = BR_CONTENT_TRAIL | if stream_count > 1 { BR_CHECK_XXH32_4 } else { 7 };
    let have_len = matches!(total_len, Some(v) if v != u64::MAX);
    if have_len {
        trail |= BR_CONTENT_LEN;
    }
    if last_header_offset != 0 {
        trail |= BR_CONTENT_OFF;
    }
    trail ^= parity(trail);
    out.push(trail);

    if last_header_offset != 0 {
        out.extend_from_slice(&write_bidirectional_varint((out.len() as u64) - last_header_offset as u64));
    }
    if have_len {
        out.extend_from_slice(&write_bidirectional_varint(total_len.unwrap()));
    }
    if stream_count > 1 {
        out.extend_from_slice(&checks.digest().to_le_bytes());
    }
    if trail != (BR_CONTENT_TRAIL | 7) {
        out.push(trail);
    }

    Ok(out)
}

fn copy_segment(seg: &Segment, out: &mut Vec<u8>, last_header_offset: &mut usize, checks: &mut Xxh32) -> YeastResult<()> {
    let mut pos = seg.header_start;
    let mut mask = seg.data[pos];
    pos += 1;
    if mask & BR_CONTENT_OFF != 0 {
        let (_, c) = read_forward_varint(seg.data, pos)?;
        pos += c;
    }

    let mut header_check = Xxh32::new(0);
    let is_first_overall = *last_header_offset == 0;

    let here = out.len();
    if !is_first_overall {
        mask |= BR_CONTENT_OFF;
        mask ^= parity(mask);
    }
    out.push(mask);
    header_check.update(&[mask]);
    if !is_first_overall {
        let dist_bytes = write_forward_varint((here - *last_header_offset) as u64);
        out.extend_from_slice(&dist_bytes);
        header_check.update(&dist_bytes);
    }
    *last_header_offset = here;

    let mut check_id = None;
    if (mask & BR_CONTENT_CHECK) == 7 {
        let id = seg.data[pos];
        pos += 1;
        out.push(id);
        header_check.update(&[id]);
        check_id = Some(id);
    }

    let mut recompute_header_check = false;
    if mask & BR_CONTENT_EXTRA_MASK != 0 {
        let extra = seg.data[pos];
        pos += 1;
        recompute_header_check = extra & BR_EXTRA_CHECK != 0;
        let mut strip = extra;
        if !is_first_overall {
            strip &= !(BR_EXTRA_MOD | BR_EXTRA_NAME);
        }
        out.push(strip);
        header_check.update(&[strip]);

        if extra & BR_EXTRA_MOD != 0 {
            let (mod_time, c) = read_forward_varint(seg.data, pos)?;
            pos += c;
            if strip & BR_EXTRA_MOD != 0 {
                let bytes = write_forward_varint(mod_time);
                out.extend_from_slice(&bytes);
                header_check.update(&bytes);
            }
        }
        if extra & BR_EXTRA_NAME != 0 {
            let (len, c) = read_forward_varint(seg.data, pos)?;
            pos += c;
            if strip & BR_EXTRA_NAME != 0 {
                let len_bytes = write_forward_varint(len);
                out.extend_from_slice(&len_bytes);
                header_check.update(&len_bytes);
                let name = &seg.data[pos..pos + len as usize];
                out.extend_from_slice(name);
                header_check.update(name);
            }
            pos += len as usize;
        }
        if extra & BR_EXTRA_EXTRA != 0 {
            let (len, c) = read_forward_varint(seg.data, pos)?;
            pos += c;
            let len_bytes = write_forward_varint(len);
            out.extend_from_slice(&len_bytes);
            header_check.update(&len_bytes);
            let field = &seg.data[pos..pos + len as usize];
            pos += len as usize;
            out.extend_from_slice(field);
            header_check.update(field);
        }
        if extra & BR_EXTRA_COMPRESSION_MASK != 0 {
            let method = seg.data[pos];
            pos += 1;
            out.push(method);
            header_check.update(&[method]);
        }
        if recompute_header_check {
            pos += 2; // skip the old 16-bit header check
            let x = header_check.digest() & 0xffff;
            out.push((x & 0xff) as u8);
            out.push((x >> 8) as u8);
        }
    }

    let check_len = if (mask & BR_CONTENT_CHECK) == 7 {
        safety_check!(check_id == Some(BR_CHECKID_SHA256), "cannot merge a segment with an unrecognized check-id length");
        32
    } else {
        check_value_len(mask)
    };
    safety_check!(seg.trailer_start >= pos + check_len, "segment shorter than its declared check value");
    let brotli_len = seg.trailer_start - pos - check_len;
    out.extend_from_slice(&seg.data[pos..pos + brotli_len]);
    let check_bytes = &seg.data[pos + brotli_len..pos + brotli_len + check_len];
    out.extend_from_slice(check_bytes);
    checks.update(check_bytes);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_of_empty_file_list_is_just_signature_and_trailer() {
        let out = merge(&[]).unwrap();
        assert_eq!(&out[0..4], &BR_SIG);
        // stream_count == 0 -> trail has check field 7 (BR_CHECK_ID), no length, no offset.
        let trail = out[4];
        assert_eq!(trail & BR_CONTENT_CHECK, 7);
        assert_eq!(trail & BR_CONTENT_OFF, 0);
        assert_eq!(out.len(), 5);
    }
}
