//! Operation result structures and helpers.
//!
//! Most LDAP operations produce an [`LdapResult`](struct.LdapResult.html),
//! the standard's bundle of result code, matched DN and diagnostic text.
//! This module defines it, the crate's error enum, and the wrapper structs
//! that adapt the protocol's numeric outcomes to Rust error handling.

use std::error::Error;
use std::fmt;
use std::io;
use std::result::Result as StdResult;

use crate::controls::Control;
use crate::exop::Exop;
use crate::search::parse_ref_urls;

use adber::common::TagClass;
use adber::parse::parse_uint;
use adber::structure::StructureTag;
use adber::universal::Types;

use thiserror::Error;

/// Type alias for the standard `Result` with the fixed `LdapError` error part.
pub type Result<T> = std::result::Result<T, LdapError>;

/// Error variants recognized by the library.
///
/// Transport and protocol failures are reported through this enum; an LDAP
/// operation that completes with a non-zero result code is _not_ an error
/// at this level, and is inspected through [`LdapResult::success()`].
#[derive(Debug, Error)]
pub enum LdapError {
    /// Encapsulated I/O error. The connection is no longer usable.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[cfg(feature = "tls")]
    /// TLS setup error.
    #[error("TLS error: {source}")]
    Tls {
        #[from]
        source: native_tls::Error,
    },

    #[cfg(feature = "tls")]
    /// TLS handshake failure.
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Operation attempted without an open connection.
    #[error("not connected")]
    NotConnected,

    /// Error parsing the string representation of a search filter.
    #[error("filter parse error")]
    FilterParsing,

    /// Malformed BER data received from the server.
    #[error("protocol decoding error: {0}")]
    Decoding(&'static str),

    /// The response's message ID does not match the request's.
    #[error("message id mismatch: sent {sent}, received {received}")]
    IdMismatch { sent: i32, received: i32 },

    /// A response carried an operation tag the current call can't accept.
    #[error("unexpected response tag {0}")]
    UnexpectedResponse(u64),

    /// Error converting a server-supplied octet string to UTF-8.
    #[error("utf8 decoding error")]
    DecodingUTF8,

    /// A distinguished name the caller supplied could not be parsed.
    #[error("invalid DN: {0}")]
    InvalidDN(String),

    /// A Compare assertion without the `attribute=value` shape.
    #[error("invalid compare assertion: {0}")]
    InvalidAssertion(String),

    /// A malformed or unusable SASL challenge.
    #[error("SASL error: {0}")]
    Sasl(String),

    /// No values provided for an attribute of an Add operation.
    #[error("empty value set for Add")]
    AddNoValues,

    /// LDAP operation result with an error return code.
    #[error("LDAP operation result: {result}")]
    LdapResult {
        #[from]
        result: LdapResult,
    },
}

impl From<LdapError> for io::Error {
    fn from(le: LdapError) -> io::Error {
        match le {
            LdapError::Io { source, .. } => source,
            _ => io::Error::new(io::ErrorKind::Other, format!("{}", le)),
        }
    }
}

/// Common components of an LDAP operation result.
///
/// This structure faithfully replicates the components dictated by the
/// standard, numeric result code included. The helper methods
/// [`success()`](#method.success) and [`non_error()`](#method.non_error)
/// convert an error-bearing instance into an `LdapError` for ergonomic `?`
/// handling when plain condition checking suffices.
#[derive(Clone, Debug)]
pub struct LdapResult {
    /// Result code. Zero is success; see [Section A.1 of RFC 4511](https://tools.ietf.org/html/rfc4511#appendix-A.1)
    /// for the other values.
    pub rc: u32,
    /// Matched component DN, where applicable.
    pub matched: String,
    /// Diagnostic text. When the server sends an empty message, the
    /// textual name of the result code is substituted.
    pub text: String,
    /// Referral URLs; absence is represented by an empty vector.
    pub refs: Vec<String>,
    /// Response controls; missing and empty are both an empty vector.
    pub ctrls: Vec<Control>,
}

/// Textual name of an LDAP result code, used when a server returns an
/// empty diagnostic message. Covers the standard set plus the client-side
/// and Active Directory extensions this client encounters.
pub fn result_name(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        35 => "isLeaf",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        60 => "sortControlMissing",
        61 => "offsetRangeError",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        70 => "resultsTooLarge",
        71 => "affectsMultipleDSAs",
        76 => "virtualListViewError",
        80 => "other",
        81 => "serverDown",
        82 => "localError",
        83 => "encodingError",
        84 => "decodingError",
        85 => "timeout",
        86 => "authUnknown",
        87 => "filterError",
        88 => "userCanceled",
        89 => "paramError",
        90 => "noMemory",
        91 => "connectError",
        92 => "notSupported",
        93 => "controlNotFound",
        94 => "noResultsReturned",
        95 => "moreResultsToReturn",
        96 => "clientLoop",
        97 => "referralLimitExceeded",
        100 => "invalidResponse",
        101 => "ambiguousResponse",
        112 => "tlsNotSupported",
        113 => "intermediateResponse",
        114 => "unknownType",
        118 => "canceled",
        119 => "noSuchOperation",
        120 => "tooLate",
        121 => "cannotCancel",
        122 => "assertionFailed",
        123 => "authorizationDenied",
        4096 => "syncRefreshRequired",
        16654 => "noOperation",
        _ => "unknown",
    }
}

impl Error for LdapResult {}

impl fmt::Display for LdapResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        write!(
            f,
            "rc={} ({}), dn: \"{}\", text: \"{}\"",
            self.rc,
            result_name(self.rc),
            self.matched,
            self.text
        )
    }
}

impl LdapResult {
    /// If the result code is zero, return the instance itself wrapped
    /// in `Ok()`, otherwise wrap the instance in an `LdapError`.
    pub fn success(self) -> Result<Self> {
        if self.rc == 0 {
            Ok(self)
        } else {
            Err(LdapError::from(self))
        }
    }

    /// If the result code is 0 or 10 (referral), return the instance
    /// itself wrapped in `Ok()`, otherwise wrap the instance in an
    /// `LdapError`.
    pub fn non_error(self) -> Result<Self> {
        if self.rc == 0 || self.rc == 10 {
            Ok(self)
        } else {
            Err(LdapError::from(self))
        }
    }
}

/// Fully decoded body of a result-bearing response.
#[derive(Clone, Debug)]
pub(crate) struct ParsedResult {
    pub result: LdapResult,
    pub exop: Exop,
    /// Server SASL credentials from a BindResponse, if any.
    pub sasl_creds: Option<Vec<u8>>,
}

/// Decode the LDAPResult components common to Bind, SearchResultDone,
/// Modify, Add, Del, ModifyDN, Compare and Extended responses: result
/// code, matched DN, diagnostic text, then any of referrals `[3]`,
/// server SASL credentials `[7]`, and extended-response name `[10]` /
/// value `[11]`.
pub(crate) fn parse_result(op: StructureTag) -> Result<ParsedResult> {
    let mut tags = op
        .expect_constructed()
        .ok_or(LdapError::Decoding("result sequence"))?
        .into_iter();
    let rc_content = tags
        .next()
        .and_then(|t| t.match_class(TagClass::Universal))
        .and_then(|t| t.match_id(Types::Enumerated as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(LdapError::Decoding("result code"))?;
    let (_, rc) = parse_uint(&rc_content).map_err(|_| LdapError::Decoding("result code"))?;
    let rc = rc as u32;
    let matched = octet_string(tags.next(), "matched dn")?;
    let mut text = octet_string(tags.next(), "diagnostic message")?;
    if text.is_empty() {
        text = result_name(rc).to_owned();
    }
    let mut refs = Vec::new();
    let mut exop_name = None;
    let mut exop_val = None;
    let mut sasl_creds = None;
    for comp in tags {
        if comp.class != TagClass::Context {
            continue;
        }
        match comp.id {
            3 => refs.extend(parse_ref_urls(comp)?),
            7 => {
                sasl_creds = Some(
                    comp.expect_primitive()
                        .ok_or(LdapError::Decoding("server SASL creds"))?,
                );
            }
            10 => {
                exop_name = Some(
                    String::from_utf8(
                        comp.expect_primitive()
                            .ok_or(LdapError::Decoding("exop name"))?,
                    )
                    .map_err(|_| LdapError::DecodingUTF8)?,
                );
            }
            11 => {
                exop_val = Some(
                    comp.expect_primitive()
                        .ok_or(LdapError::Decoding("exop value"))?,
                );
            }
            _ => (),
        }
    }
    Ok(ParsedResult {
        result: LdapResult {
            rc,
            matched,
            text,
            refs,
            ctrls: vec![],
        },
        exop: Exop {
            name: exop_name,
            val: exop_val,
        },
        sasl_creds,
    })
}

fn octet_string(tag: Option<StructureTag>, what: &'static str) -> Result<String> {
    String::from_utf8(
        tag.and_then(|t| t.expect_primitive())
            .ok_or(LdapError::Decoding(what))?,
    )
    .map_err(|_| LdapError::DecodingUTF8)
}

/// Wrapper for the results of one Search protocol round.
///
/// Methods [`success()`](#method.success) and [`non_error()`](#method.non_error)
/// destructure the wrapper and return its components as elements of an
/// anonymous tuple.
#[derive(Clone, Debug)]
pub struct SearchResult(pub crate::search::ResultList, pub LdapResult);

impl SearchResult {
    /// If the result code is zero, return an anonymous tuple of component
    /// structs wrapped in `Ok()`, otherwise wrap the `LdapResult` part in
    /// an `LdapError`.
    pub fn success(self) -> Result<(crate::search::ResultList, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }

    /// If the result code is 0 or 10 (referral), return an anonymous tuple
    /// of component structs wrapped in `Ok()`, otherwise wrap the
    /// `LdapResult` part in an `LdapError`.
    pub fn non_error(self) -> Result<(crate::search::ResultList, LdapResult)> {
        if self.1.rc == 0 || self.1.rc == 10 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }
}

/// Wrapper for the result of a Compare operation.
///
/// Compare signals the outcome of a successful comparison through two
/// dedicated result codes, 6 (`compareTrue`) and 5 (`compareFalse`); a
/// result code of zero never occurs on a conforming server. This
/// interface has nevertheless always had a reading that reports "true"
/// only for a zero result code, so a Compare that matched comes back as
/// false from it; [`ok()`](#method.ok) keeps that reading for existing
/// callers, and [`equal()`](#method.equal) gives the answer callers
/// actually want.
#[derive(Clone, Debug)]
pub struct CompareResult(pub LdapResult);

impl CompareResult {
    /// If the result code is 5 (compareFalse) or 6 (compareTrue), return
    /// the corresponding boolean value wrapped in `Ok()`, otherwise wrap
    /// the `LdapResult` part in an `LdapError`.
    pub fn equal(self) -> Result<bool> {
        match self.0.rc {
            5 => Ok(false),
            6 => Ok(true),
            _ => Err(LdapError::from(self.0)),
        }
    }

    /// Legacy reading: true only when the result code is zero, which,
    /// for Compare, a conforming server never sends. Kept for
    /// compatibility; check [`equal()`](#method.equal) or the result
    /// code instead.
    pub fn ok(&self) -> bool {
        self.0.rc == 0
    }

    /// If the result code is 5, 6, or 10 (referral), return the inner
    /// `LdapResult`, otherwise rewrap it in an `LdapError`.
    pub fn non_error(self) -> Result<LdapResult> {
        if self.0.rc == 5 || self.0.rc == 6 || self.0.rc == 10 {
            Ok(self.0)
        } else {
            Err(LdapError::from(self.0))
        }
    }
}

/// Wrapper for the result of an Extended operation. The extended
/// response's name and value, if any, travel in the [`Exop`] part.
#[derive(Clone, Debug)]
pub struct ExopResult(pub Exop, pub LdapResult);

impl ExopResult {
    /// If the result code is zero, return an anonymous tuple of component
    /// structs wrapped in `Ok()`, otherwise wrap the `LdapResult` part in
    /// an `LdapError`.
    pub fn success(self) -> Result<(Exop, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use adber::tags::{ASNTag, Enum, OctetStr, Seq, Tag};

    fn result_tag(rc: i64, matched: &str, text: &str) -> StructureTag {
        Seq {
            id: 1,
            class: TagClass::Application,
            inner: vec![
                Tag::Enum(Enum {
                    inner: rc,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    inner: matched.as_bytes().to_vec(),
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    inner: text.as_bytes().to_vec(),
                    ..Default::default()
                }),
            ],
        }
        .into_structure()
    }

    #[test]
    fn empty_diagnostic_gets_code_name() {
        let parsed = parse_result(result_tag(49, "", "")).unwrap();
        assert_eq!(parsed.result.rc, 49);
        assert_eq!(parsed.result.text, "invalidCredentials");
    }

    #[test]
    fn server_diagnostic_kept() {
        let parsed = parse_result(result_tag(0, "", "all good")).unwrap();
        assert_eq!(parsed.result.text, "all good");
    }

    #[test]
    fn truncated_result_is_decoding_error() {
        let short = Seq {
            id: 1,
            class: TagClass::Application,
            inner: vec![Tag::Enum(Enum {
                inner: 0,
                ..Default::default()
            })],
        }
        .into_structure();
        assert!(matches!(parse_result(short), Err(LdapError::Decoding(_))));
    }

    #[test]
    fn compare_result_readings() {
        let matched = CompareResult(LdapResult {
            rc: 6,
            matched: String::new(),
            text: String::new(),
            refs: vec![],
            ctrls: vec![],
        });
        assert!(!matched.ok());
        assert!(matched.equal().unwrap());
    }
}
