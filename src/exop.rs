//! Extended operation construction and parsing.
//!
//! A generic exop is represented by [`Exop`](struct.Exop.html). The only
//! operation published here by OID is StartTLS; note that after a
//! successful StartTLS response the TLS handshake on the underlying
//! stream must be arranged by the caller.

use adber::common::TagClass;
use adber::tags::{OctetStr, Tag};

/// OID of the StartTLS extended operation.
pub const STARTTLS_OID: &str = "1.3.6.1.4.1.1466.20037";

/// Generic extended operation.
///
/// The same struct is used for requests and responses, so both fields
/// are optional; a request must have a `name`.
#[derive(Clone, Debug)]
pub struct Exop {
    /// OID of the operation. May be absent in a response.
    pub name: Option<String>,
    /// Request or response value. May be absent in both cases.
    pub val: Option<Vec<u8>>,
}

impl Exop {
    /// Build a request from an OID and an optional value.
    pub fn new(name: &str, val: Option<&[u8]>) -> Exop {
        Exop {
            name: Some(name.to_owned()),
            val: val.map(Vec::from),
        }
    }
}

/// StartTLS request marker.
#[derive(Clone, Debug)]
pub struct StartTLS;

impl From<StartTLS> for Exop {
    fn from(_: StartTLS) -> Exop {
        Exop::new(STARTTLS_OID, None)
    }
}

/// ExtendedRequest body: `[0]` requestName, optional `[1]` requestValue.
pub(crate) fn construct_exop(exop: Exop) -> Vec<Tag> {
    let name = exop.name.expect("exop name");
    let mut seq = vec![Tag::OctetStr(OctetStr {
        id: 0,
        class: TagClass::Context,
        inner: name.into_bytes(),
    })];
    if let Some(val) = exop.val {
        seq.push(Tag::OctetStr(OctetStr {
            id: 1,
            class: TagClass::Context,
            inner: val,
        }));
    }
    seq
}
