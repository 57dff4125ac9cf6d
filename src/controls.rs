//! Control construction and parsing.
//!
//! A control can be attached to a request or returned with a response.
//! The one control this client implements directly is
//! [`PagedResults`](struct.PagedResults.html), which the Search machinery
//! uses for cookie-based paging; anything else can be passed through as a
//! [`RawControl`](struct.RawControl.html) and parsed by the caller.

use crate::result::{LdapError, Result};

use adber::common::TagClass;
use adber::parse::{parse_tag, parse_uint};
use adber::structure::{PL, StructureTag};
use adber::tags::{ASNTag, Bool, Int, OctetStr, Seq, Tag};
use adber::universal::Types;
use adber::write;

use bytes::BytesMut;

/// Recognized control types.
///
/// The variants can't be exhaustively matched, since the list of
/// internally implemented controls can grow from one release to the next.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlType {
    PagedResults,
}

fn known_type(oid: &str) -> Option<ControlType> {
    match oid {
        PAGED_RESULTS_OID => Some(ControlType::PagedResults),
        _ => None,
    }
}

/// Response control: the recognized type, if any, plus the raw form.
#[derive(Clone, Debug)]
pub struct Control(pub Option<ControlType>, pub RawControl);

/// Generic control, used for both requests and responses.
///
/// A request control implemented outside this library produces an
/// instance of this type; a response control is wrapped in
/// [`Control`](struct.Control.html) and can be decoded by calling
/// [`parse()`](#method.parse) when a [`ControlParser`] implementation
/// exists for the target type.
#[derive(Clone, Debug)]
pub struct RawControl {
    /// OID of the control.
    pub ctype: String,
    /// Criticality; has no meaning on response.
    pub crit: bool,
    /// Raw value of the control, if any.
    pub val: Option<Vec<u8>>,
}

impl RawControl {
    /// Decode the control value into a control-specific struct.
    ///
    /// Panics if the control has no value or the value is malformed;
    /// use the target type's fallible constructor when the input isn't
    /// trusted.
    pub fn parse<T: ControlParser>(&self) -> T {
        T::parse(self.val.as_ref().expect("control value"))
    }
}

/// Conversion trait for response control values.
pub trait ControlParser {
    /// Convert the raw BER value into a control-specific struct.
    fn parse(val: &[u8]) -> Self;
}

/// Mark a control as critical.
///
/// Controls are non-critical by default unless their specification says
/// otherwise; this trait provides the opt-in.
pub trait MakeCritical {
    /// Consume the control and wrap it so its criticality encodes as true.
    fn critical(self) -> CriticalControl<Self>
    where
        Self: Sized,
    {
        CriticalControl { control: self }
    }
}

/// Wrapper for a control marked as critical.
pub struct CriticalControl<T> {
    control: T,
}

impl<T> From<CriticalControl<T>> for RawControl
where
    T: Into<RawControl>,
{
    fn from(cc: CriticalControl<T>) -> RawControl {
        let mut rc = cc.control.into();
        rc.crit = true;
        rc
    }
}

/// Serialize one control into the element shape the Controls sequence
/// expects: OID, optional criticality, optional value.
pub(crate) fn build_tag(rc: RawControl) -> StructureTag {
    let mut seq = vec![Tag::OctetStr(OctetStr {
        inner: rc.ctype.into_bytes(),
        ..Default::default()
    })];
    if rc.crit {
        seq.push(Tag::Bool(Bool {
            inner: true,
            ..Default::default()
        }));
    }
    if let Some(val) = rc.val {
        seq.push(Tag::OctetStr(OctetStr {
            inner: val,
            ..Default::default()
        }));
    }
    Tag::Seq(Seq {
        inner: seq,
        ..Default::default()
    })
    .into_structure()
}

/// Decode the `[0]` Controls element of a response envelope.
pub(crate) fn parse_controls(t: StructureTag) -> Result<Vec<Control>> {
    let tags = t
        .expect_constructed()
        .ok_or(LdapError::Decoding("controls sequence"))?;
    let mut ctrls = Vec::new();
    for ctrl in tags {
        let mut components = ctrl
            .expect_constructed()
            .ok_or(LdapError::Decoding("control components"))?
            .into_iter();
        let ctype = String::from_utf8(
            components
                .next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::Decoding("control type"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let (crit, maybe_val) = match components.next() {
            None => (false, None),
            Some(c) if c.id == Types::Boolean as u64 => match c.payload {
                PL::P(ref v) if !v.is_empty() => (v[0] != 0, components.next()),
                _ => return Err(LdapError::Decoding("control criticality")),
            },
            Some(c) if c.id == Types::OctetString as u64 => (false, Some(c)),
            _ => return Err(LdapError::Decoding("control element")),
        };
        let val = match maybe_val {
            Some(v) => Some(
                v.expect_primitive()
                    .ok_or(LdapError::Decoding("control value"))?,
            ),
            None => None,
        };
        ctrls.push(Control(known_type(&ctype), RawControl { ctype, crit, val }));
    }
    Ok(ctrls)
}

/// Paged Results control ([RFC 2696](https://tools.ietf.org/html/rfc2696)).
///
/// The same struct serves requests and responses; `size` is the desired
/// page size on a request and the server's estimate of the result set
/// size on a response, if it supplies one.
#[derive(Clone, Debug)]
pub struct PagedResults {
    pub size: i32,
    /// Paging cookie. Empty on the first request and on the final response.
    pub cookie: Vec<u8>,
}

/// OID of the Paged Results control.
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

impl MakeCritical for PagedResults {}

impl From<PagedResults> for RawControl {
    fn from(pr: PagedResults) -> RawControl {
        let cval = Tag::Seq(Seq {
            inner: vec![
                Tag::Int(Int {
                    inner: pr.size as i64,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    inner: pr.cookie,
                    ..Default::default()
                }),
            ],
            ..Default::default()
        })
        .into_structure();
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, cval).expect("encoded control");
        RawControl {
            ctype: PAGED_RESULTS_OID.to_owned(),
            crit: false,
            val: Some(Vec::from(&buf[..])),
        }
    }
}

impl PagedResults {
    /// Fallible decoding of a response control value.
    pub fn try_parse(val: &[u8]) -> Option<PagedResults> {
        let mut comps = parse_tag(val)
            .ok()?
            .1
            .expect_constructed()?
            .into_iter();
        let size_content = comps
            .next()?
            .match_class(TagClass::Universal)?
            .match_id(Types::Integer as u64)?
            .expect_primitive()?;
        let (_, size) = parse_uint(&size_content).ok()?;
        let cookie = comps.next()?.expect_primitive()?;
        Some(PagedResults {
            size: size as i32,
            cookie,
        })
    }
}

impl ControlParser for PagedResults {
    fn parse(val: &[u8]) -> PagedResults {
        PagedResults::try_parse(val).expect("paged results value")
    }
}
