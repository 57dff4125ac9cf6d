//! Search filter compiler.
//!
//! Compiles the string representation of a search filter
//! ([RFC 4515](https://tools.ietf.org/html/rfc4515)) into the tagged BER
//! form the SearchRequest grammar expects. The parser accepts the full
//! grammar: and/or/not composites, the six item comparisons, substring
//! and presence matches, extensible matches with optional matching rule
//! and `:dn` flag, and `\NN` hex escapes in assertion values.

#![allow(clippy::result_unit_err)]

use crate::result::{LdapError, Result};

use adber::common::TagClass;
use adber::tags::{Bool, Explicit, Null, OctetStr, Seq, Tag};

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::character::{is_alphabetic, is_alphanumeric, is_hex_digit};
use nom::combinator::{map_res, opt, recognize, verify};
use nom::multi::{fold_many0, many0};
use nom::number::complete::be_u8;
use nom::sequence::{delimited, preceded};

const AND_FILT: u64 = 0;
const OR_FILT: u64 = 1;
const NOT_FILT: u64 = 2;

const EQ_MATCH: u64 = 3;
const SUBSTR_MATCH: u64 = 4;
const GTE_MATCH: u64 = 5;
const LTE_MATCH: u64 = 6;
const PRES_MATCH: u64 = 7;
const APPROX_MATCH: u64 = 8;
const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

/// Compile a filter string into its BER form.
///
/// The outer parentheses may be omitted around a single item. An empty
/// input compiles to BER NULL, which keeps a SearchRequest well-formed
/// when the caller deliberately sends no filter.
pub fn parse(input: impl AsRef<[u8]>) -> Result<Tag> {
    let input = input.as_ref();
    if input.is_empty() {
        return Ok(Tag::Null(Null::default()));
    }
    match filtexpr(input) {
        Ok((r, t)) if r.is_empty() => Ok(t),
        _ => Err(LdapError::FilterParsing),
    }
}

fn filtexpr(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((filter, item))(i)
}

fn filter(i: &[u8]) -> IResult<&[u8], Tag> {
    delimited(tag(b"("), filtercomp, tag(b")"))(i)
}

fn filtercomp(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((and, or, not, item))(i)
}

fn filterlist(i: &[u8]) -> IResult<&[u8], Vec<Tag>> {
    many0(filter)(i)
}

fn and(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, children) = preceded(tag(b"&"), filterlist)(i)?;
    Ok((
        i,
        Tag::Seq(Seq {
            class: TagClass::Context,
            id: AND_FILT,
            inner: children,
        }),
    ))
}

fn or(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, children) = preceded(tag(b"|"), filterlist)(i)?;
    Ok((
        i,
        Tag::Seq(Seq {
            class: TagClass::Context,
            id: OR_FILT,
            inner: children,
        }),
    ))
}

fn not(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, inner) = preceded(tag(b"!"), filter)(i)?;
    Ok((
        i,
        Tag::Explicit(Explicit {
            class: TagClass::Context,
            id: NOT_FILT,
            inner: Box::new(inner),
        }),
    ))
}

fn item(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((eq, non_eq, extensible))(i)
}

/// Hex-escape decoder driven one byte at a time.
///
/// `\NN` produces the named byte; a backslash followed by CR or LF is
/// line folding and swallows the newline. Anything else after a
/// backslash is an error.
pub(crate) enum Unescaper {
    WantFirst,
    WantSecond(u8),
    Value(u8),
    Fold,
    Error,
}

fn hex_value(c: u8) -> u8 {
    c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 }
}

impl Unescaper {
    pub(crate) fn feed(&self, c: u8) -> Unescaper {
        match *self {
            Unescaper::Error => Unescaper::Error,
            Unescaper::WantFirst => {
                if is_hex_digit(c) {
                    Unescaper::WantSecond(hex_value(c))
                } else if c == b'\r' || c == b'\n' {
                    Unescaper::Fold
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::WantSecond(hi) => {
                if is_hex_digit(c) {
                    Unescaper::Value((hi << 4) + hex_value(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::Fold => match c {
                b'\r' | b'\n' => Unescaper::Fold,
                b'\\' => Unescaper::WantFirst,
                c => Unescaper::Value(c),
            },
            Unescaper::Value(_) => {
                if c == b'\\' {
                    Unescaper::WantFirst
                } else {
                    Unescaper::Value(c)
                }
            }
        }
    }

    fn complete(&self) -> bool {
        matches!(self, Unescaper::Value(_) | Unescaper::Fold)
    }
}

// Any byte of an assertion value may be written as \NN, where N is a hex
// digit. Parentheses, the asterisk and the backslash itself must be.
fn unescaped(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map_res(
        fold_many0(
            verify(be_u8, is_value_char),
            || (Unescaper::Value(0), Vec::new()),
            |(u, mut vec): (Unescaper, Vec<_>), c: u8| {
                let u = u.feed(c);
                if let Unescaper::Value(c) = u {
                    vec.push(c);
                }
                (u, vec)
            },
        ),
        |(u, vec): (Unescaper, Vec<_>)| -> std::result::Result<Vec<u8>, ()> {
            if u.complete() { Ok(vec) } else { Err(()) }
        },
    )(i)
}

fn is_value_char(&c: &u8) -> bool {
    c != 0 && c != b'(' && c != b')' && c != b'*'
}

fn octet_string(bytes: Vec<u8>) -> Tag {
    Tag::OctetStr(OctetStr {
        inner: bytes,
        ..Default::default()
    })
}

fn non_eq(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, attr) = attributedescription(i)?;
    let (i, filterop) = alt((tag(b">="), tag(b"<="), tag(b"~=")))(i)?;
    let (i, value) = unescaped(i)?;
    let id = match filterop {
        b">=" => GTE_MATCH,
        b"<=" => LTE_MATCH,
        b"~=" => APPROX_MATCH,
        _ => unreachable!(),
    };
    Ok((
        i,
        Tag::Seq(Seq {
            class: TagClass::Context,
            id,
            inner: vec![octet_string(attr.to_vec()), octet_string(value)],
        }),
    ))
}

fn eq(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, attr) = attributedescription(i)?;
    let (i, _) = tag(b"=")(i)?;
    let (i, initial) = unescaped(i)?;
    let (i, mid_final) = map_res(
        many0(preceded(tag(b"*"), unescaped)),
        |v: Vec<Vec<u8>>| -> std::result::Result<Vec<Vec<u8>>, ()> {
            // an empty fragment is only legal in final position
            let misplaced_empty = v
                .iter()
                .enumerate()
                .any(|(n, frag)| frag.is_empty() && n + 1 != v.len());
            if misplaced_empty { Err(()) } else { Ok(v) }
        },
    )(i)?;
    let tag = if mid_final.is_empty() {
        // simple equality, no asterisks in the assertion value
        Tag::Seq(Seq {
            class: TagClass::Context,
            id: EQ_MATCH,
            inner: vec![octet_string(attr.to_vec()), octet_string(initial)],
        })
    } else if initial.is_empty() && mid_final.len() == 1 && mid_final[0].is_empty() {
        // presence, a single asterisk
        Tag::OctetStr(OctetStr {
            class: TagClass::Context,
            id: PRES_MATCH,
            inner: attr.to_vec(),
        })
    } else {
        let mut subs = vec![];
        if !initial.is_empty() {
            subs.push(Tag::OctetStr(OctetStr {
                class: TagClass::Context,
                id: SUB_INITIAL,
                inner: initial,
            }));
        }
        let n = mid_final.len();
        for (ix, frag) in mid_final.into_iter().enumerate() {
            if frag.is_empty() {
                break;
            }
            subs.push(Tag::OctetStr(OctetStr {
                class: TagClass::Context,
                id: if ix + 1 != n { SUB_ANY } else { SUB_FINAL },
                inner: frag,
            }));
        }
        Tag::Seq(Seq {
            class: TagClass::Context,
            id: SUBSTR_MATCH,
            inner: vec![
                octet_string(attr.to_vec()),
                Tag::Seq(Seq {
                    inner: subs,
                    ..Default::default()
                }),
            ],
        })
    };
    Ok((i, tag))
}

fn extensible(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((attr_dn_mrule, dn_mrule))(i)
}

fn attr_dn_mrule(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, attr) = attributedescription(i)?;
    let (i, dn) = opt(tag(b":dn"))(i)?;
    let (i, mrule) = opt(preceded(tag(b":"), attributetype))(i)?;
    let (i, _) = tag(b":=")(i)?;
    let (i, value) = unescaped(i)?;
    Ok((i, extensible_tag(mrule, Some(attr), value, dn.is_some())))
}

fn dn_mrule(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, dn) = opt(tag(b":dn"))(i)?;
    let (i, mrule) = preceded(tag(b":"), attributetype)(i)?;
    let (i, _) = tag(b":=")(i)?;
    let (i, value) = unescaped(i)?;
    Ok((i, extensible_tag(Some(mrule), None, value, dn.is_some())))
}

fn extensible_tag(mrule: Option<&[u8]>, attr: Option<&[u8]>, value: Vec<u8>, dn: bool) -> Tag {
    let mut inner = vec![];
    if let Some(mrule) = mrule {
        inner.push(Tag::OctetStr(OctetStr {
            class: TagClass::Context,
            id: 1,
            inner: mrule.to_vec(),
        }));
    }
    if let Some(attr) = attr {
        inner.push(Tag::OctetStr(OctetStr {
            class: TagClass::Context,
            id: 2,
            inner: attr.to_vec(),
        }));
    }
    inner.push(Tag::OctetStr(OctetStr {
        class: TagClass::Context,
        id: 3,
        inner: value,
    }));
    if dn {
        inner.push(Tag::Bool(Bool {
            class: TagClass::Context,
            id: 4,
            inner: dn,
        }));
    }
    Tag::Seq(Seq {
        class: TagClass::Context,
        id: EXT_MATCH,
        inner,
    })
}

fn attributedescription(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = attributetype(i)?;
        let (i, _) = many0(preceded(tag(b";"), take_while1(is_alnum_hyphen)))(i)?;
        Ok((i, ()))
    })(i)
}

fn is_alnum_hyphen(c: u8) -> bool {
    is_alphanumeric(c) || c == b'-'
}

fn attributetype(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((numericoid, descr))(i)
}

fn numericoid(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = number(i)?;
        let (i, _) = many0(preceded(tag(b"."), number))(i)?;
        Ok((i, ()))
    })(i)
}

// A number may be zero, but must not have superfluous leading zeroes
fn number(i: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(digit1, |d: &[u8]| d.len() == 1 || d[0] != b'0')(i)
}

fn descr(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = verify(be_u8, |c| is_alphabetic(*c))(i)?;
        let (i, _) = take_while(is_alnum_hyphen)(i)?;
        Ok((i, ()))
    })(i)
}

#[cfg(test)]
mod test {
    use super::parse;

    fn ber_vec_eq(filter: &str, ber: &[u8]) {
        use adber::tags::ASNTag;
        use adber::write;
        use bytes::BytesMut;

        let mut buf = BytesMut::new();
        let tag = parse(filter).unwrap();
        write::encode_into(&mut buf, tag.into_structure()).unwrap();
        assert_eq!(buf, ber);
    }

    #[test]
    fn filt_bare_item() {
        ber_vec_eq("a=v", b"\xa3\x06\x04\x01a\x04\x01v");
    }

    #[test]
    fn filt_simple_eq() {
        ber_vec_eq("(a=v)", b"\xa3\x06\x04\x01a\x04\x01v");
    }

    #[test]
    fn filt_empty_is_null() {
        ber_vec_eq("", b"\x05\x00");
    }

    #[test]
    fn filt_extra_garbage() {
        assert!(parse("(a=v)garbage").is_err());
    }

    #[test]
    fn filt_simple_noneq() {
        ber_vec_eq("(a<=2)", b"\xa6\x06\x04\x01a\x04\x012");
        ber_vec_eq("(a>=2)", b"\xa5\x06\x04\x01a\x04\x012");
        ber_vec_eq("(a~=2)", b"\xa8\x06\x04\x01a\x04\x012");
    }

    #[test]
    fn filt_pres() {
        ber_vec_eq("(a=*)", b"\x87\x01a");
        ber_vec_eq("(objectclass=*)", b"\x87\x0bobjectclass");
    }

    #[test]
    fn filt_ast_ini() {
        ber_vec_eq("(a=*v)", b"\xa4\x08\x04\x01a0\x03\x82\x01v");
    }

    #[test]
    fn filt_ast_fin() {
        ber_vec_eq("(a=v*)", b"\xa4\x08\x04\x01a0\x03\x80\x01v");
    }

    #[test]
    fn filt_ast_multi() {
        ber_vec_eq(
            "(a=v*x*y)",
            b"\xa4\x0e\x04\x01a0\t\x80\x01v\x81\x01x\x82\x01y",
        );
    }

    #[test]
    fn filt_substr_three_part() {
        // initial "ab", any "cd", final "ef"
        ber_vec_eq(
            "(cn=ab*cd*ef)",
            b"\xa4\x12\x04\x02cn0\x0c\x80\x02ab\x81\x02cd\x82\x02ef",
        );
    }

    #[test]
    fn filt_ast_double() {
        assert!(parse("(a=f**)").is_err());
    }

    #[test]
    fn filt_not_wraps() {
        ber_vec_eq("(!(cn=x))", b"\xa2\x09\xa3\x07\x04\x02cn\x04\x01x");
    }

    #[test]
    fn filt_and_ordered() {
        ber_vec_eq(
            "(&(a=1)(b=2))",
            b"\xa0\x10\xa3\x06\x04\x01a\x04\x011\xa3\x06\x04\x01b\x04\x012",
        );
    }

    #[test]
    fn filt_esc_ok() {
        ber_vec_eq("(cn=a\\2Ab)", b"\xa3\x09\x04\x02cn\x04\x03a*b");
    }

    #[test]
    fn filt_esc_fold() {
        // backslash-newline is line folding
        ber_vec_eq("(a=v\\\nw)", b"\xa3\x07\x04\x01a\x04\x02vw");
    }

    #[test]
    fn filt_esc_runt() {
        assert!(parse("(a=v\\2)").is_err());
    }

    #[test]
    fn filt_esc_invalid() {
        assert!(parse("(a=v\\0x)").is_err());
    }

    #[test]
    fn filt_oid() {
        ber_vec_eq("(2.5.4.3=v)", b"\xa3\x0c\x04\x072.5.4.3\x04\x01v");
    }

    #[test]
    fn filt_oid_leading_zero() {
        assert!(parse("(2.5.04.0=top)").is_err());
    }

    #[test]
    fn filt_complex() {
        ber_vec_eq(
            "(&(a=v)(b=x)(!(c=y)))",
            b"\xa0\x1a\xa3\x06\x04\x01a\x04\x01v\xa3\x06\x04\x01b\x04\x01x\xa2\x08\xa3\x06\x04\x01c\x04\x01y",
        );
    }

    #[test]
    fn filt_abs_true_false() {
        ber_vec_eq("(&)", b"\xa0\0");
        ber_vec_eq("(|)", b"\xa1\0");
    }

    #[test]
    fn filt_ext_dn() {
        ber_vec_eq(
            "(ou:dn:=People)",
            b"\xa9\x0f\x82\x02ou\x83\x06People\x84\x01\xff",
        );
    }

    #[test]
    fn filt_ext_mrule() {
        ber_vec_eq(
            "(cn:2.5.13.5:=J D)",
            b"\xa9\x13\x81\x082.5.13.5\x82\x02cn\x83\x03J D",
        );
    }

    #[test]
    fn filt_simple_utf8() {
        ber_vec_eq("(a=ć)", b"\xa3\x07\x04\x01a\x04\x02\xc4\x87");
    }
}
