//! BER encoder.

use crate::common::{TagClass, TagStructure};
use crate::structure::{PL, StructureTag};

use bytes::BytesMut;

use std::io;

/// Serialize `tag` and append the result to `buf`.
pub fn encode_into(buf: &mut BytesMut, tag: StructureTag) -> io::Result<()> {
    let mut out = Vec::new();
    encode_rec(&mut out, tag);
    buf.extend(out);
    Ok(())
}

fn encode_rec(out: &mut Vec<u8>, tag: StructureTag) {
    match tag.payload {
        PL::P(content) => {
            put_header(out, tag.class, TagStructure::Primitive, tag.id);
            put_length(out, content.len());
            out.extend(content);
        }
        PL::C(children) => {
            let mut body = Vec::new();
            for child in children {
                encode_rec(&mut body, child);
            }
            put_header(out, tag.class, TagStructure::Constructed, tag.id);
            put_length(out, body.len());
            out.extend(body);
        }
    }
}

fn put_header(out: &mut Vec<u8>, class: TagClass, form: TagStructure, id: u64) {
    let lead = (class as u8) << 6 | (form as u8) << 5;
    if id <= 30 {
        out.push(lead | id as u8);
        return;
    }
    // High tag number: 0x1F marker, then the number base-128. LDAP never
    // needs this, but control payloads from elsewhere might.
    out.push(lead | 0x1F);
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut v = id;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (1..n).rev() {
        out.push(groups[i] | 0x80);
    }
    out.push(groups[0]);
}

fn put_length(out: &mut Vec<u8>, len: usize) {
    if len < 128 {
        out.push(len as u8);
        return;
    }
    let repr = len.to_be_bytes();
    let skip = repr.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (repr.len() - skip) as u8);
    out.extend_from_slice(&repr[skip..]);
}
