//! Incremental BER parser.
//!
//! Parsers are written against `nom`'s streaming combinators, so a buffer
//! that ends before the declared length of a value yields `Incomplete`
//! rather than an error; the caller reads more and retries. Malformed
//! data (a bad class, a length overflowing `usize`) is a hard error.

use std::convert::TryFrom;

use crate::common::{TagClass, TagStructure};
use crate::structure::{PL, StructureTag};

use nom::bits::streaming as bits;
use nom::bytes::streaming::take;
use nom::combinator::map_opt;
use nom::error::{Error, ErrorKind, ParseError};
use nom::number::streaming as number;
use nom::sequence::tuple;
use nom::InputLength;

fn class_bits(i: (&[u8], usize)) -> nom::IResult<(&[u8], usize), TagClass> {
    map_opt(bits::take(2usize), TagClass::from_u8)(i)
}

fn form_bit(i: (&[u8], usize)) -> nom::IResult<(&[u8], usize), TagStructure> {
    map_opt(bits::take(1usize), TagStructure::from_u8)(i)
}

fn tagnr_bits(i: (&[u8], usize)) -> nom::IResult<(&[u8], usize), u64> {
    bits::take(5usize)(i)
}

fn parse_header(i: &[u8]) -> nom::IResult<&[u8], (TagClass, TagStructure, u64)> {
    nom::bits(tuple((class_bits, form_bit, tagnr_bits)))(i)
}

/// One length octet, or `0x80 | n` followed by `n` big-endian octets.
fn parse_length(i: &[u8]) -> nom::IResult<&[u8], usize> {
    let (i, first) = number::be_u8(i)?;
    if first < 0x80 {
        return Ok((i, first as usize));
    }
    let (i, ext) = take(first & 0x7F)(i)?;
    let (_, len) = parse_uint(ext)?;
    let len = usize::try_from(len)
        .map_err(|_| nom::Err::Failure(Error::from_error_kind(i, ErrorKind::TooLarge)))?;
    Ok((i, len))
}

/// Fold content octets into an unsigned integer. The input slice must be
/// exactly the content of an INTEGER-shaped value.
pub fn parse_uint(i: &[u8]) -> nom::IResult<&[u8], u64> {
    Ok((i, i.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))))
}

/// Fold content octets into a signed integer, sign-extending from bit 7
/// of the first octet.
pub fn parse_int(i: &[u8]) -> nom::IResult<&[u8], i64> {
    let init: i64 = match i.first() {
        Some(&b) if b & 0x80 != 0 => -1,
        _ => 0,
    };
    Ok((i, i.iter().fold(init, |acc, &b| (acc << 8) | i64::from(b))))
}

/// Parse one TLV off the front of `i`. Constructed values are recursed
/// into eagerly, so the result owns its whole subtree.
pub fn parse_tag(i: &[u8]) -> nom::IResult<&[u8], StructureTag> {
    let (i, ((class, form, id), len)) = tuple((parse_header, parse_length))(i)?;
    let (i, content) = take(len)(i)?;

    let payload = match form {
        TagStructure::Primitive => PL::P(content.to_vec()),
        TagStructure::Constructed => {
            let mut inner = Vec::new();
            let mut rest = content;
            while rest.input_len() > 0 {
                let (j, sub) = parse_tag(rest)?;
                rest = j;
                inner.push(sub);
            }
            PL::C(inner)
        }
    };

    Ok((i, StructureTag { class, id, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TagClass;
    use crate::tags::{ASNTag, OctetStr};
    use crate::write;
    use bytes::BytesMut;

    #[test]
    fn primitive_integer() {
        let tag = parse_tag(&[0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(
            tag,
            Ok((
                &[][..],
                StructureTag {
                    class: TagClass::Universal,
                    id: 2,
                    payload: PL::P(vec![0xFF, 0x7F]),
                }
            ))
        );
    }

    #[test]
    fn constructed_sequence() {
        let bytes = [0x30, 0x05, 0x04, 0x03, b'a', b'b', b'c'];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            tag.expect_constructed().unwrap(),
            vec![StructureTag {
                class: TagClass::Universal,
                id: 4,
                payload: PL::P(b"abc".to_vec()),
            }]
        );
    }

    #[test]
    fn truncated_is_incomplete() {
        // declared two content octets, only one present
        assert!(matches!(
            parse_tag(&[0x04, 0x02, 0x61]),
            Err(nom::Err::Incomplete(_))
        ));
        // length octets themselves cut short
        assert!(matches!(
            parse_tag(&[0x04, 0x82, 0x01]),
            Err(nom::Err::Incomplete(_))
        ));
    }

    #[test]
    fn length_forms_round_trip() {
        for len in [0usize, 1, 127, 128, 255, 256, 65535, 65536, 1 << 24] {
            let st = OctetStr {
                inner: vec![0x55; len],
                ..Default::default()
            }
            .into_structure();
            let mut buf = BytesMut::new();
            write::encode_into(&mut buf, st.clone()).unwrap();
            let (rest, back) = parse_tag(&buf).unwrap();
            assert!(rest.is_empty());
            assert_eq!(back, st);
        }
    }

    #[test]
    fn long_form_length_decodes() {
        // 0x82 0x01 0x00 = 256 content octets
        let mut bytes = vec![0x04, 0x82, 0x01, 0x00];
        bytes.extend(std::iter::repeat(0xAA).take(256));
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.expect_primitive().unwrap().len(), 256);
    }

    #[test]
    fn oversize_long_form_accepted() {
        // eight length octets, value still small
        let mut bytes = vec![0x04, 0x88, 0, 0, 0, 0, 0, 0, 0, 3];
        bytes.extend_from_slice(b"xyz");
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.expect_primitive().unwrap(), b"xyz".to_vec());
    }

    #[test]
    fn int_folding() {
        assert_eq!(parse_uint(&[0x04, 0x82, 0x37]).unwrap().1, 295479);
        assert_eq!(parse_int(&[0x7F]).unwrap().1, 127);
        assert_eq!(parse_int(&[0x00, 0x80]).unwrap().1, 128);
        assert_eq!(parse_int(&[0x80]).unwrap().1, -128);
        assert_eq!(parse_int(&[0xFF, 0x7F]).unwrap().1, -129);
        assert_eq!(parse_int(&[0xFF]).unwrap().1, -1);
        assert_eq!(
            parse_int(&[0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap().1,
            i64::MIN
        );
    }

    #[test]
    fn integer_round_trip() {
        use crate::tags::Int;
        for v in [
            0i64,
            1,
            -1,
            127,
            128,
            -128,
            -129,
            255,
            256,
            i32::MAX as i64,
            i32::MIN as i64,
            i64::MAX,
            i64::MIN,
        ] {
            let st = Int {
                inner: v,
                ..Default::default()
            }
            .into_structure();
            let mut buf = BytesMut::new();
            write::encode_into(&mut buf, st).unwrap();
            let (_, tag) = parse_tag(&buf).unwrap();
            let content = tag.expect_primitive().unwrap();
            assert_eq!(parse_int(&content).unwrap().1, v, "value {}", v);
        }
    }
}
