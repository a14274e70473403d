//! Fixed binary encoding for cached vectors.
//!
//! Layout: version byte, u32 LE dimension, then `dimension` f32 LE values.
//! The version byte allows the layout to evolve without corrupting old
//! stores; unknown versions and truncated records decode as `CacheIo` and
//! are treated as misses upstream.

use kbsearch_core::error::{Error, Result};

pub const CODEC_VERSION: u8 = 1;

pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 + v.len() * 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&(v.len() as u32).to_le_bytes());
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < 5 {
        return Err(Error::CacheIo(format!("record too short: {} bytes", bytes.len())));
    }
    if bytes[0] != CODEC_VERSION {
        return Err(Error::CacheIo(format!("unknown codec version {}", bytes[0])));
    }
    let mut dim_bytes = [0u8; 4];
    dim_bytes.copy_from_slice(&bytes[1..5]);
    let dim = u32::from_le_bytes(dim_bytes) as usize;
    let payload = &bytes[5..];
    if payload.len() != dim * 4 {
        return Err(Error::CacheIo(format!(
            "dimension {} does not match payload of {} bytes",
            dim,
            payload.len()
        )));
    }
    let mut v = Vec::with_capacity(dim);
    for chunk in payload.chunks_exact(4) {
        let mut b = [0u8; 4];
        b.copy_from_slice(chunk);
        v.push(f32::from_le_bytes(b));
    }
    Ok(v)
}
