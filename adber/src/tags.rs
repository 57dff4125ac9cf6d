//! Typed builders for the ASN.1 types LDAP uses.
//!
//! Each builder carries its tag number and class so that the implicit
//! tagging LDAP relies on amounts to overriding two fields; `Default`
//! fills in the universal tag of the type. [`ASNTag::into_structure`]
//! reduces a builder to a generic [`StructureTag`] ready for encoding.

use crate::common::TagClass;
use crate::structure::{PL, StructureTag};
use crate::universal::Types;

/// Conversion of a typed value into the generic serializable form.
///
/// Only the payload encoding differs between types; class and tag number
/// are handled uniformly by the encoder, so converting early keeps the
/// per-type code down to producing content octets.
pub trait ASNTag {
    fn into_structure(self) -> StructureTag;
}

/// The types a hand-built LDAP protocol element can be composed of.
#[derive(Clone, Debug, PartialEq)]
pub enum Tag {
    Bool(Bool),
    Int(Int),
    Enum(Enum),
    OctetStr(OctetStr),
    Null(Null),
    Oid(Oid),
    Seq(Seq),
    Set(Set),
    /// Explicitly tagged value. LDAP itself tags implicitly, but some
    /// control payloads do not.
    Explicit(Explicit),
    /// Pre-reduced value, passed through unchanged.
    Structure(StructureTag),
}

impl ASNTag for Tag {
    fn into_structure(self) -> StructureTag {
        match self {
            Tag::Bool(t) => t.into_structure(),
            Tag::Int(t) => t.into_structure(),
            Tag::Enum(t) => t.into_structure(),
            Tag::OctetStr(t) => t.into_structure(),
            Tag::Null(t) => t.into_structure(),
            Tag::Oid(t) => t.into_structure(),
            Tag::Seq(t) => t.into_structure(),
            Tag::Set(t) => t.into_structure(),
            Tag::Explicit(t) => t.into_structure(),
            Tag::Structure(t) => t,
        }
    }
}

/// BOOLEAN. Encodes as a single octet, `0xFF` for true.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bool {
    pub id: u64,
    pub class: TagClass,
    pub inner: bool,
}

impl ASNTag for Bool {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(vec![if self.inner { 0xFF } else { 0x00 }]),
        }
    }
}

impl Default for Bool {
    fn default() -> Bool {
        Bool {
            id: Types::Boolean as u64,
            class: TagClass::Universal,
            inner: false,
        }
    }
}

/// INTEGER. Minimum-length two's complement content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Int {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// ENUMERATED. Content rules are those of INTEGER.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Enum {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// Shortest two's-complement representation of `v`, big-endian. A
/// leading octet is redundant when it is all-zero (or all-one) and the
/// next octet repeats the sign bit.
pub(crate) fn int_content(v: i64) -> Vec<u8> {
    let repr = v.to_be_bytes();
    let mut start = 0;
    while start < repr.len() - 1 {
        let sign_run = match repr[start] {
            0x00 => repr[start + 1] & 0x80 == 0,
            0xFF => repr[start + 1] & 0x80 != 0,
            _ => false,
        };
        if !sign_run {
            break;
        }
        start += 1;
    }
    repr[start..].to_vec()
}

impl ASNTag for Int {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(int_content(self.inner)),
        }
    }
}

impl ASNTag for Enum {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(int_content(self.inner)),
        }
    }
}

impl Default for Int {
    fn default() -> Int {
        Int {
            id: Types::Integer as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

impl Default for Enum {
    fn default() -> Enum {
        Enum {
            id: Types::Enumerated as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

/// OCTET STRING, a plain byte string.
#[derive(Clone, Debug, PartialEq)]
pub struct OctetStr {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<u8>,
}

impl ASNTag for OctetStr {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(self.inner),
        }
    }
}

impl Default for OctetStr {
    fn default() -> OctetStr {
        OctetStr {
            id: Types::OctetString as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

/// NULL. Empty content.
#[derive(Clone, Debug, PartialEq)]
pub struct Null {
    pub id: u64,
    pub class: TagClass,
}

impl ASNTag for Null {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(Vec::new()),
        }
    }
}

impl Default for Null {
    fn default() -> Null {
        Null {
            id: Types::Null as u64,
            class: TagClass::Universal,
        }
    }
}

/// OBJECT IDENTIFIER.
///
/// The first two arcs are folded into one subidentifier as
/// `first * 40 + second`; every subidentifier is then written base-128,
/// most significant group first, with the high bit set on all octets but
/// the last.
#[derive(Clone, Debug, PartialEq)]
pub struct Oid {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<u64>,
}

impl Oid {
    /// Build from the numeric arcs, e.g. `&[1, 2, 840, 113556, 1, 4, 319]`.
    pub fn new(arcs: &[u64]) -> Oid {
        Oid {
            inner: arcs.to_vec(),
            ..Default::default()
        }
    }

    /// Build from dotted-decimal text. Needs at least two arcs, with the
    /// first in `0..=2`.
    pub fn from_dotted(s: &str) -> Option<Oid> {
        let arcs = s
            .split('.')
            .map(|a| a.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;
        if arcs.len() < 2 || arcs[0] > 2 {
            return None;
        }
        Some(Oid::new(&arcs))
    }

    /// Decode content octets back into arcs. Fails on an empty input or
    /// a subidentifier cut off mid-group.
    pub fn decode(content: &[u8]) -> Option<Vec<u64>> {
        if content.is_empty() {
            return None;
        }
        let mut arcs = Vec::new();
        let mut acc: u64 = 0;
        let mut open = false;
        for &b in content {
            acc = (acc << 7) | u64::from(b & 0x7F);
            open = b & 0x80 != 0;
            if !open {
                if arcs.is_empty() {
                    let first = match acc {
                        v if v < 40 => 0,
                        v if v < 80 => 1,
                        _ => 2,
                    };
                    arcs.push(first);
                    arcs.push(acc - first * 40);
                } else {
                    arcs.push(acc);
                }
                acc = 0;
            }
        }
        if open { None } else { Some(arcs) }
    }

    /// Dotted-decimal rendering of decoded arcs.
    pub fn dotted(arcs: &[u64]) -> String {
        arcs.iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl ASNTag for Oid {
    fn into_structure(self) -> StructureTag {
        let mut content = Vec::with_capacity(self.inner.len() + 1);
        let mut arcs = self.inner.into_iter();
        let first = arcs.next().unwrap_or(0);
        let second = arcs.next().unwrap_or(0);
        put_base128(&mut content, first * 40 + second);
        for arc in arcs {
            put_base128(&mut content, arc);
        }
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::P(content),
        }
    }
}

fn put_base128(out: &mut Vec<u8>, mut v: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
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

impl Default for Oid {
    fn default() -> Oid {
        Oid {
            id: Types::ObjectIdentifier as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

/// SEQUENCE of heterogeneous values.
#[derive(Clone, Debug, PartialEq)]
pub struct Seq {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl ASNTag for Seq {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(self.inner.into_iter().map(Tag::into_structure).collect()),
        }
    }
}

impl Default for Seq {
    fn default() -> Seq {
        Seq {
            id: Types::Sequence as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

/// SET OF. Wire order of members is kept as given.
#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl ASNTag for Set {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(self.inner.into_iter().map(Tag::into_structure).collect()),
        }
    }
}

impl Default for Set {
    fn default() -> Set {
        Set {
            id: Types::Set as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

/// Explicitly tagged value: a constructed wrapper around one inner value.
#[derive(Clone, Debug, PartialEq)]
pub struct Explicit {
    pub id: u64,
    pub class: TagClass,
    pub inner: Box<Tag>,
}

impl ASNTag for Explicit {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            class: self.class,
            id: self.id,
            payload: PL::C(vec![self.inner.into_structure()]),
        }
    }
}
