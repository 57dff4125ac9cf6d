//! Escaping helpers for filter literals and RDN values.

use std::borrow::Cow;

#[inline]
fn xdigit(c: u8) -> u8 {
    c + if c < 10 { b'0' } else { b'a' - 10 }
}

fn escape_with<'a, S, F>(input: S, needs_escape: F) -> Cow<'a, str>
where
    S: Into<Cow<'a, str>>,
    F: Fn(usize, usize, u8) -> bool,
{
    let input = input.into();
    let len = input.len();
    let mut output: Option<Vec<u8>> = None;
    for (i, &c) in input.as_bytes().iter().enumerate() {
        if needs_escape(i, len, c) {
            let out = output.get_or_insert_with(|| {
                let mut v = Vec::with_capacity(len + 12);
                v.extend_from_slice(input[..i].as_bytes());
                v
            });
            out.push(b'\\');
            out.push(xdigit(c >> 4));
            out.push(xdigit(c & 0xF));
        } else if let Some(out) = output.as_mut() {
            out.push(c);
        }
    }
    match output {
        Some(out) => Cow::Owned(String::from_utf8(out).expect("escaped string")),
        None => input,
    }
}

/// Escape a filter literal.
///
/// Literal values appearing in a search filter can contain any character,
/// but parentheses, the asterisk, the backslash and NUL must be written
/// as hex escapes in the filter's string representation. The return value
/// is borrowed unless escaping was actually needed.
pub fn ldap_escape<'a, S: Into<Cow<'a, str>>>(lit: S) -> Cow<'a, str> {
    escape_with(lit, |_, _, c| {
        matches!(c, b'\\' | b'*' | b'(' | b')' | 0)
    })
}

/// Escape an attribute value used in a relative distinguished name,
/// according to [RFC 4514](https://tools.ietf.org/html/rfc4514): the
/// special characters always, space and `#` when leading, space when
/// trailing. The return value is borrowed unless escaping was needed.
pub fn dn_escape<'a, S: Into<Cow<'a, str>>>(val: S) -> Cow<'a, str> {
    escape_with(val, |i, len, c| {
        matches!(c, b'"' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\' | 0)
            || (i == 0 && (c == b' ' || c == b'#'))
            || (i + 1 == len && c == b' ')
    })
}

#[cfg(test)]
mod test {
    use super::{dn_escape, ldap_escape};

    #[test]
    fn filter_literal_escapes() {
        assert_eq!(ldap_escape("plain"), "plain");
        assert_eq!(ldap_escape("a*b"), "a\\2ab");
        assert_eq!(ldap_escape("(x)"), "\\28x\\29");
        assert_eq!(ldap_escape("a\\b"), "a\\5cb");
    }

    #[test]
    fn dn_special_characters() {
        assert_eq!(dn_escape("Smith, John"), "Smith\\2c John");
        assert_eq!(dn_escape("a=b"), "a\\3db");
    }

    #[test]
    fn dn_leading_trailing() {
        assert_eq!(dn_escape(" foo"), "\\20foo");
        assert_eq!(dn_escape("foo "), "foo\\20");
        assert_eq!(dn_escape("f o o"), "f o o");
        assert_eq!(dn_escape("#rust"), "\\23rust");
        assert_eq!(dn_escape("  "), "\\20\\20");
    }
}
