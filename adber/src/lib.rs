//! BER encoding and parsing for the ASN.1 subset used by LDAP.
//!
//! LDAPv3 messages are BER-encoded values built from a small set of
//! universal types (BOOLEAN, INTEGER, ENUMERATED, OCTET STRING, NULL,
//! OBJECT IDENTIFIER, SEQUENCE, SET) and implicitly tagged variants of
//! those types in the application and context classes. This crate models
//! a value prepared for serialization as a [`StructureTag`](structure::StructureTag),
//! provides typed builders for the universal types in [`tags`], an
//! incremental parser in [`parse`], and an encoder in [`write`].
//!
//! There is no schema layer and no DER canonicalization; the crate encodes
//! exactly what it is given and parses exactly what is on the wire.

pub mod common;
pub mod parse;
pub mod structure;
pub mod tags;
pub mod universal;
pub mod write;

pub use nom::IResult;
