//! Search parameters and the search result model.
//!
//! A Search returns zero or more entries, each carrying a distinguished
//! name and an ordered list of attributes. LDAP delivers every attribute
//! value as a bare octet string with no type information, so the model
//! here keeps raw bytes and layers a "readable" projection on top rather
//! than guessing a syntax per attribute.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::ad;
use crate::result::{LdapError, Result};

use adber::structure::StructureTag;

/// Possible values for search scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// Search only the object named by the base DN.
    Base = 0,
    /// Search the objects immediately below the base DN.
    OneLevel = 1,
    /// Search the base object and the whole subtree below it.
    #[default]
    Subtree = 2,
}

/// Possible values for alias dereferencing during search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DerefAliases {
    /// Never dereference.
    Never = 0,
    /// Dereference while retrieving objects according to search scope.
    Searching = 1,
    /// Dereference while finding the base object.
    Finding = 2,
    /// Always dereference.
    #[default]
    Always = 3,
}

/// Search parameters held on the client between operations.
///
/// Values are picked up by every Search until changed. Limits of zero
/// mean "unlimited"; a page size of zero disables the Paged Results
/// control.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub scope: Scope,
    pub deref: DerefAliases,
    pub typesonly: bool,
    /// Server-side entry count limit for one operation; not a network
    /// timeout.
    pub sizelimit: i32,
    /// Server-side time limit, in seconds, for one operation.
    pub timelimit: i32,
    /// Entries per page when positive; engages the Paged Results control.
    pub page_size: i32,
}

impl SearchOptions {
    pub fn new() -> Self {
        SearchOptions {
            ..Default::default()
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn deref(mut self, deref: DerefAliases) -> Self {
        self.deref = deref;
        self
    }

    pub fn typesonly(mut self, typesonly: bool) -> Self {
        self.typesonly = typesonly;
        self
    }

    pub fn sizelimit(mut self, sizelimit: i32) -> Self {
        self.sizelimit = sizelimit;
        self
    }

    pub fn timelimit(mut self, timelimit: i32) -> Self {
        self.timelimit = timelimit;
        self
    }

    pub fn page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// One attribute of a result entry: its description, the binary marker,
/// and the values in wire order.
#[derive(Clone, Debug)]
pub struct Attribute {
    /// Attribute description as sent by the server, options included.
    pub name: String,
    /// True when the description carries the `;binary` transfer option.
    pub is_binary: bool,
    /// Values in the order received. LDAP does not guarantee any value
    /// ordering; the wire order is preserved as-is.
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    pub fn new(name: &str, values: Vec<Vec<u8>>) -> Attribute {
        Attribute {
            is_binary: name.to_ascii_lowercase().contains(";binary"),
            name: name.to_owned(),
            values,
        }
    }

    /// Display projection of one value: base64 for `;binary` attributes,
    /// a `\NN`-escaped string when the value contains control bytes
    /// (a single trailing NUL is tolerated and dropped), and the raw
    /// UTF-8 text otherwise.
    pub fn readable(&self, ix: usize) -> Option<String> {
        let val = self.values.get(ix)?;
        if self.is_binary {
            return Some(BASE64.encode(val));
        }
        let val = match val.split_last() {
            Some((&0, rest)) => rest,
            _ => &val[..],
        };
        if val.iter().any(|&b| matches!(b, 0..=8 | 10..=31)) {
            let mut out = String::with_capacity(val.len());
            for &b in val {
                if matches!(b, 0..=31 | b'\\') || b >= 0x7F {
                    out.push('\\');
                    out.push_str(&format!("{:02X}", b));
                } else {
                    out.push(b as char);
                }
            }
            Some(out)
        } else {
            Some(String::from_utf8_lossy(val).into_owned())
        }
    }

    /// Readable projection of the first value.
    pub fn first_readable(&self) -> Option<String> {
        self.readable(0)
    }

    /// First value as raw bytes.
    pub fn first(&self) -> Option<&[u8]> {
        self.values.first().map(Vec::as_slice)
    }
}

/// Ordered collection of attributes with case-insensitive lookup.
///
/// Servers do not send duplicate descriptions in one entry; if a
/// duplicate does appear, lookup returns the first match.
#[derive(Clone, Debug, Default)]
pub struct AttributeList {
    attrs: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> AttributeList {
        AttributeList { attrs: Vec::new() }
    }

    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// First attribute whose description equals `name`, ASCII
    /// case-insensitively.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.iter()
    }
}

/// One search result entry.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Entry DN.
    pub dn: String,
    /// Attributes in the order received.
    pub attrs: AttributeList,
}

impl Entry {
    /// Decode a SearchResultEntry protocol element.
    pub(crate) fn parse(op: StructureTag) -> Result<Entry> {
        let mut tags = op
            .expect_constructed()
            .ok_or(LdapError::Decoding("search entry"))?
            .into_iter();
        let dn = String::from_utf8(
            tags.next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::Decoding("entry dn"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let mut attrs = AttributeList::new();
        let attr_tags = tags
            .next()
            .and_then(|t| t.expect_constructed())
            .ok_or(LdapError::Decoding("entry attributes"))?;
        for partial in attr_tags {
            let mut parts = partial
                .expect_constructed()
                .ok_or(LdapError::Decoding("partial attribute"))?
                .into_iter();
            let name = String::from_utf8(
                parts
                    .next()
                    .and_then(|t| t.expect_primitive())
                    .ok_or(LdapError::Decoding("attribute type"))?,
            )
            .map_err(|_| LdapError::DecodingUTF8)?;
            let values = parts
                .next()
                .and_then(|t| t.expect_constructed())
                .ok_or(LdapError::Decoding("attribute values"))?
                .into_iter()
                .map(|t| t.expect_primitive().ok_or(LdapError::Decoding("value")))
                .collect::<Result<Vec<Vec<u8>>>>()?;
            attrs.push(Attribute::new(&name, values));
        }
        Ok(Entry { dn, attrs })
    }

    /// The entry's `objectSid`, rendered in the `S-1-…` textual form.
    pub fn object_sid(&self) -> Option<String> {
        self.attrs
            .get("objectSid")
            .and_then(Attribute::first)
            .and_then(ad::format_sid)
    }

    /// The entry's `objectGUID`, rendered with dashes and the mixed
    /// endianness Active Directory uses.
    pub fn object_guid(&self) -> Option<String> {
        self.attrs
            .get("objectGUID")
            .and_then(Attribute::first)
            .and_then(ad::format_guid)
    }
}

/// Ordered collection of the entries of one Search call.
///
/// Rebuilt from scratch by every Search; a paged loop that wants the
/// union of all pages appends each page's list to its own storage.
#[derive(Clone, Debug, Default)]
pub struct ResultList {
    entries: Vec<Entry>,
}

impl ResultList {
    pub fn new() -> ResultList {
        ResultList {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&Entry> {
        self.entries.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Consume the list, yielding the entries.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl std::ops::Index<usize> for ResultList {
    type Output = Entry;

    fn index(&self, ix: usize) -> &Entry {
        &self.entries[ix]
    }
}

impl IntoIterator for ResultList {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultList {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Decode the URIs of a SearchResultReference or of the referral
/// component of a result.
pub fn parse_ref_urls(t: StructureTag) -> Result<Vec<String>> {
    t.expect_constructed()
        .ok_or(LdapError::Decoding("referrals"))?
        .into_iter()
        .map(|t| {
            String::from_utf8(
                t.expect_primitive()
                    .ok_or(LdapError::Decoding("referral uri"))?,
            )
            .map_err(|_| LdapError::DecodingUTF8)
        })
        .collect()
}
