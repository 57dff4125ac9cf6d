//! LDAP message framing.
//!
//! Every request travels as `SEQUENCE { INTEGER messageID, protocolOp,
//! [0] controls OPTIONAL }`. This module builds that envelope on the way
//! out and, on the way in, reads exactly one framed message off the
//! stream and splits it back into its parts.

use std::io::Read;

use crate::RequestId;
use crate::conn::LdapStream;
use crate::controls::{Control, RawControl, build_tag, parse_controls};
use crate::result::{LdapError, Result};

use adber::common::TagClass;
use adber::parse::{parse_tag, parse_uint};
use adber::structure::{PL, StructureTag};
use adber::tags::{ASNTag, Int, Seq, Tag};
use adber::universal::Types;
use adber::write;

use bytes::BytesMut;
use log::trace;

/// A response envelope with its parts separated.
pub(crate) struct Envelope {
    pub msgid: RequestId,
    /// The protocol operation; its tag is the response code.
    pub op: StructureTag,
    pub controls: Vec<Control>,
}

/// Serialize one request envelope.
pub(crate) fn encode_request(
    msgid: RequestId,
    op: Tag,
    controls: Option<Vec<RawControl>>,
) -> Result<Vec<u8>> {
    let mut parts = vec![
        Tag::Int(Int {
            inner: msgid as i64,
            ..Default::default()
        }),
        op,
    ];
    if let Some(controls) = controls {
        parts.push(Tag::Structure(StructureTag {
            class: TagClass::Context,
            id: 0,
            payload: PL::C(controls.into_iter().map(build_tag).collect()),
        }));
    }
    let envelope = Tag::Seq(Seq {
        inner: parts,
        ..Default::default()
    })
    .into_structure();
    let mut buf = BytesMut::new();
    write::encode_into(&mut buf, envelope)?;
    trace!("encoded request {} ({} bytes)", msgid, buf.len());
    Ok(Vec::from(&buf[..]))
}

/// Read one complete frame off the stream: the outer SEQUENCE tag, its
/// length (short or long form), and the declared number of content
/// octets. Returns the raw frame, header included.
pub(crate) fn read_frame(stream: &mut LdapStream) -> Result<Vec<u8>> {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head)?;
    if head[0] != 0x30 {
        return Err(LdapError::Decoding("expected outer SEQUENCE"));
    }
    let mut frame = head.to_vec();
    let len = if head[1] < 0x80 {
        head[1] as usize
    } else {
        let n = (head[1] & 0x7F) as usize;
        if n == 0 || n > 8 {
            return Err(LdapError::Decoding("unsupported length form"));
        }
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext[..n])?;
        frame.extend_from_slice(&ext[..n]);
        let mut len: u64 = 0;
        for &b in &ext[..n] {
            len = (len << 8) | u64::from(b);
        }
        usize::try_from(len).map_err(|_| LdapError::Decoding("frame too large"))?
    };
    let mark = frame.len();
    frame.resize(mark + len, 0);
    stream.read_exact(&mut frame[mark..])?;
    trace!("read frame of {} bytes", frame.len());
    Ok(frame)
}

/// Split a raw frame into message ID, protocol operation, and controls.
pub(crate) fn decode_envelope(frame: &[u8]) -> Result<Envelope> {
    let (rest, outer) = parse_tag(frame).map_err(|_| LdapError::Decoding("envelope"))?;
    if !rest.is_empty() {
        return Err(LdapError::Decoding("trailing bytes after envelope"));
    }
    let mut tags = outer
        .match_id(Types::Sequence as u64)
        .and_then(|t| t.expect_constructed())
        .ok_or(LdapError::Decoding("envelope sequence"))?;
    if tags.len() < 2 {
        return Err(LdapError::Decoding("envelope too short"));
    }
    let mut maybe_controls = tags.pop().ok_or(LdapError::Decoding("envelope element"))?;
    let has_controls = match maybe_controls {
        StructureTag {
            id,
            class,
            ref payload,
        } if class == TagClass::Context && id == 0 => match *payload {
            PL::C(_) => true,
            PL::P(_) => return Err(LdapError::Decoding("primitive controls element")),
        },
        StructureTag { id, class, .. } if class == TagClass::Context && id == 10 => {
            // Active Directory bug workaround.
            //
            // AD misencodes Notice of Disconnection: the OID of the
            // Unsolicited Notification, which belongs inside the
            // ExtendedResponse sequence, is appended where the optional
            // controls go. Drop the stray element.
            maybe_controls = tags.pop().ok_or(LdapError::Decoding("envelope element"))?;
            false
        }
        _ => false,
    };
    let (op, controls) = if has_controls {
        let op = tags.pop().ok_or(LdapError::Decoding("envelope element"))?;
        (op, parse_controls(maybe_controls)?)
    } else {
        (maybe_controls, vec![])
    };
    let msgid_content = tags
        .pop()
        .and_then(|t| t.match_class(TagClass::Universal))
        .and_then(|t| t.match_id(Types::Integer as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(LdapError::Decoding("message id"))?;
    let (_, msgid) = parse_uint(&msgid_content).map_err(|_| LdapError::Decoding("message id"))?;
    Ok(Envelope {
        msgid: msgid as RequestId,
        op,
        controls,
    })
}
