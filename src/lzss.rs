//! LZSS codec: a flag/literal, flag/offset/length token stream over a
//! configurable sliding window. Hand-rolled per spec — no external codec
//! crate — grounded on `original_source/src/compress.cpp`'s
//! `CompressBuffer`/`DecompressBuffer`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::config::{CodecConfig, MIN_MATCH};
use crate::error::{KdatError, Result};

const FLAG_MATCH: u8 = 0x00;
const FLAG_LITERAL: u8 = 0x01;

/// Greedy longest-match encoder. At each position, searches backwards in
/// `[max(0, p - window), p)` for the longest prefix match bounded by
/// `lookahead`, breaking ties by nearest origin (smallest offset). Matches
/// shorter than `MIN_MATCH` are not emitted; the position advances by one
/// literal instead.
pub fn encode(input: &[u8], config: &CodecConfig) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let window = config.window();
    let lookahead = config.lookahead();
    let mut output = Vec::with_capacity(input.len());
    let mut pos = 0usize;

    while pos < input.len() {
        let start = pos.saturating_sub(window);
        let mut best_len = 0usize;
        let mut best_offset = 0usize;

        for i in start..pos {
            let max_len = lookahead.min(input.len() - pos);
            let mut len = 0usize;
            while len < max_len && input[i + len] == input[pos + len] {
                len += 1;
            }
            if len > best_len && len >= MIN_MATCH {
                best_len = len;
                best_offset = pos - i;
            }
        }

        if best_len >= MIN_MATCH {
            if best_offset as u64 >= u32::MAX as u64 {
                return Err(KdatError::LzssOffsetOverflow);
            }
            output.push(FLAG_MATCH);
            output.write_u32::<LittleEndian>(best_offset as u32)?;
            output.push(best_len as u8);
            pos += best_len;
        } else {
            output.push(FLAG_LITERAL);
            output.push(input[pos]);
            pos += 1;
        }
    }

    debug!(
        "lzss encode: {} bytes -> {} bytes (window={}, lookahead={})",
        input.len(),
        output.len(),
        window,
        lookahead
    );
    Ok(output)
}

/// Decodes a token stream produced by [`encode`] back into `original_size`
/// bytes. Overlapping copies (match offset smaller than match length) are
/// permitted and implement run-length behaviour.
pub fn decode(stream: &[u8], original_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(original_size);
    if original_size == 0 {
        return Ok(out);
    }

    let mut cursor = std::io::Cursor::new(stream);
    while (cursor.position() as usize) < stream.len() {
        let flag = cursor.read_u8()?;
        match flag {
            FLAG_LITERAL => {
                let byte = cursor.read_u8()?;
                out.push(byte);
            }
            FLAG_MATCH => {
                let offset = cursor.read_u32::<LittleEndian>()?;
                let length = cursor.read_u8()? as usize;

                if offset == 0 || offset as usize > out.len() {
                    return Err(KdatError::LzssBadOffset(offset, out.len()));
                }

                let start = out.len() - offset as usize;
                for i in 0..length {
                    if out.len() >= original_size {
                        return Err(KdatError::SizeMismatch(
                            out.len(),
                            original_size as u64,
                            String::from("lzss stream"),
                        ));
                    }
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
            other => {
                return Err(KdatError::LzssBadOffset(other as u32, out.len()));
            }
        }
    }

    if out.len() != original_size {
        return Err(KdatError::SizeMismatch(
            out.len(),
            original_size as u64,
            String::from("lzss stream"),
        ));
    }

    Ok(out)
}
