//! Small AML assembler for building test images
#![allow(dead_code)]

use emerald_aml::canonicalize;

/// Encode a `PkgLength` for a body of `body_len` bytes, the encoded value
/// counts the `PkgLength` field itself.
pub fn pkg_length(body_len: usize) -> Vec<u8> {
    if body_len + 1 < 0x40 {
        return vec![(body_len + 1) as u8];
    }
    for following in 1..=3usize {
        let total = body_len + following + 1;
        if total < 1 << (4 + 8 * following) {
            let mut out = vec![((following as u8) << 6) | (total & 0xF) as u8];
            for i in 0..following {
                out.push((total >> (4 + 8 * i)) as u8);
            }
            return out;
        }
    }
    panic!("body too large for PkgLength: {body_len}");
}

pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

pub fn seg(name: &str) -> [u8; 4] {
    *canonicalize(name).unwrap().as_bytes()
}

/// `op PkgLength body`
pub fn scoped(op: &[u8], body: &[u8]) -> Vec<u8> {
    concat(&[op, &pkg_length(body.len()), body])
}

pub fn name(name: &str, value: &[u8]) -> Vec<u8> {
    concat(&[&[0x08], &seg(name), value])
}

/// `Scope` with an already encoded name string
pub fn scope(path: &[u8], body: &[u8]) -> Vec<u8> {
    scoped(&[0x10], &concat(&[path, body]))
}

pub fn device(name: &str, body: &[u8]) -> Vec<u8> {
    scoped(&[0x5B, 0x82], &concat(&[&seg(name), body]))
}

pub fn method(name: &str, arg_count: u8, body: &[u8]) -> Vec<u8> {
    scoped(&[0x14], &concat(&[&seg(name), &[arg_count], body]))
}

pub fn buffer(size: u8, bytes: &[u8]) -> Vec<u8> {
    scoped(&[0x11], &concat(&[&[0x0A, size], bytes]))
}

/// `\_SB_`
pub const SB: &[u8] = b"\\_SB_";
