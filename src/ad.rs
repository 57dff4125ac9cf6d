//! Active Directory conventions: well-known object GUIDs, canonical
//! names, and the textual forms of SIDs and GUIDs.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::result::{LdapError, Result};

/// Well-known object containers of a domain naming context.
///
/// Each maps to the GUID embedded in the `wellKnownObjects` attribute of
/// the domain object, written as 32 uppercase hex digits without dashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WellKnownContainer {
    Computers,
    DeletedObjects,
    DomainControllers,
    ForeignSecurityPrincipals,
    Infrastructure,
    LostAndFound,
    MicrosoftProgramData,
    NtdsQuotas,
    ProgramData,
    Systems,
    Users,
    ManagedServiceAccounts,
}

impl WellKnownContainer {
    /// The container's GUID as it appears inside `wellKnownObjects`
    /// values.
    pub fn guid(self) -> &'static str {
        use WellKnownContainer::*;
        match self {
            Computers => "AA312825768811D1ADED00C04FD8D5CD",
            DeletedObjects => "18E2EA80684F11D2B9AA00C04F79F805",
            DomainControllers => "A361B2FFFFD211D1AA4B00C04FD7D83A",
            ForeignSecurityPrincipals => "22B70C67D56E4EFB91E9300FCA3DC1AA",
            Infrastructure => "2FBAC1870ADE11D297C400C04FD8D5CD",
            LostAndFound => "AB8153B7768811D1ADED00C04FD8D5CD",
            MicrosoftProgramData => "F4BE92A4C777485E878E9421D53087DB",
            NtdsQuotas => "6227F0AF1FC2410D8E3BB10615BB5B0F",
            ProgramData => "09460C08AE1E4A4EA0F64AEE7DAA1E5A",
            Systems => "AB1D30F3768811D1ADED00C04FD8D5CD",
            Users => "A9D1CA15768811D1ADED00C04FD8D5CD",
            ManagedServiceAccounts => "1EB93889E40C45DF9F0C64D23BBB6237",
        }
    }
}

/// The flag value of a workstation/server computer account's
/// `userAccountControl`.
pub const UAC_WORKSTATION_TRUST_ACCOUNT: u32 = 4096;

/// Render a binary security identifier in the `S-R-I-S-S…` form:
/// revision, the 48-bit authority, then each 32-bit subauthority.
/// Subauthorities are little-endian on the wire; the authority is
/// big-endian.
pub fn format_sid(sid: &[u8]) -> Option<String> {
    if sid.len() < 8 {
        return None;
    }
    let revision = sid[0];
    let sub_count = sid[1] as usize;
    if sid.len() != 8 + 4 * sub_count {
        return None;
    }
    let mut authority: u64 = 0;
    for &b in &sid[2..8] {
        authority = (authority << 8) | u64::from(b);
    }
    let mut out = format!("S-{}-{}", revision, authority);
    for ix in 0..sub_count {
        let sub = LittleEndian::read_u32(&sid[8 + 4 * ix..12 + 4 * ix]);
        out.push_str(&format!("-{}", sub));
    }
    Some(out)
}

/// Render a binary GUID in the dashed form. The first three groups are
/// stored little-endian, the last two big-endian.
pub fn format_guid(guid: &[u8]) -> Option<String> {
    if guid.len() != 16 {
        return None;
    }
    Some(format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:04x}{:08x}",
        LittleEndian::read_u32(&guid[0..4]),
        LittleEndian::read_u16(&guid[4..6]),
        LittleEndian::read_u16(&guid[6..8]),
        BigEndian::read_u16(&guid[8..10]),
        BigEndian::read_u16(&guid[10..12]),
        BigEndian::read_u32(&guid[12..16]),
    ))
}

/// UTF-16LE encoding of the password in literal double quotes, the form
/// the `unicodePwd` attribute requires.
pub fn unicode_pwd(password: &str) -> Vec<u8> {
    let quoted = format!("\"{}\"", password);
    let mut out = Vec::with_capacity(quoted.len() * 2);
    for unit in quoted.encode_utf16() {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, unit);
        out.extend_from_slice(&b);
    }
    out
}

/// Convert a distinguished name to its canonical form: `DC` components
/// joined with dots make the domain, then the `OU` and `CN` components
/// follow outside-in, separated by slashes, everything lowercased.
///
/// `CN=User1,OU=Users,OU=London,DC=xyz,DC=local` becomes
/// `xyz.local/london/users/user1`.
pub fn dn_to_cn(dn: &str) -> Result<String> {
    let rdns = split_rdns(dn);
    if rdns.is_empty() {
        return Err(LdapError::InvalidDN(dn.to_owned()));
    }
    let mut domain_parts = Vec::new();
    let mut path_parts = Vec::new();
    for rdn in &rdns {
        let (key, value) = rdn
            .split_once('=')
            .ok_or_else(|| LdapError::InvalidDN(dn.to_owned()))?;
        let value = unescape_rdn_value(value.trim());
        if value.is_empty() {
            return Err(LdapError::InvalidDN(dn.to_owned()));
        }
        match key.trim().to_ascii_uppercase().as_str() {
            "DC" => domain_parts.push(value),
            "OU" | "CN" => path_parts.push(value),
            _ => return Err(LdapError::InvalidDN(dn.to_owned())),
        }
    }
    let mut out = domain_parts.join(".");
    for part in path_parts.iter().rev() {
        out.push('/');
        out.push_str(part);
    }
    Ok(out.to_lowercase())
}

/// Split a DN at unescaped commas.
fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = dn.as_bytes();
    let mut start = 0;
    let mut escaped = false;
    for (ix, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b',' {
            parts.push(dn[start..ix].trim());
            start = ix + 1;
        }
    }
    let last = dn[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

fn unescape_rdn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_name_round_trip() {
        assert_eq!(
            dn_to_cn("CN=User1,OU=Users,OU=London,DC=xyz,DC=local").unwrap(),
            "xyz.local/london/users/user1"
        );
    }

    #[test]
    fn canonical_name_escaped_comma() {
        assert_eq!(
            dn_to_cn("CN=Smith\\, John,DC=example,DC=com").unwrap(),
            "example.com/smith, john"
        );
    }

    #[test]
    fn malformed_dn_rejected() {
        assert!(dn_to_cn("").is_err());
        assert!(dn_to_cn("no-equals-here").is_err());
        assert!(dn_to_cn("UID=x,DC=example").is_err());
    }

    #[test]
    fn sid_rendering() {
        // S-1-5-21-2127521184-1604012920-1887927527-72713
        let sid = [
            0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x15, 0x00, 0x00, 0x00, 0xA0, 0x65,
            0xCF, 0x7E, 0x78, 0x4B, 0x9B, 0x5F, 0xE7, 0x7C, 0x87, 0x70, 0x09, 0x1C, 0x01, 0x00,
        ];
        assert_eq!(
            format_sid(&sid).unwrap(),
            "S-1-5-21-2127521184-1604012920-1887927527-72713"
        );
    }

    #[test]
    fn sid_length_must_match_count() {
        assert!(format_sid(&[1, 2, 0, 0, 0, 0, 0, 5]).is_none());
        assert!(format_sid(&[]).is_none());
    }

    #[test]
    fn guid_mixed_endianness() {
        let guid = [
            0x25, 0x28, 0x31, 0xAA, 0x88, 0x76, 0xD1, 0x11, 0xAD, 0xED, 0x00, 0xC0, 0x4F, 0xD8,
            0xD5, 0xCD,
        ];
        assert_eq!(
            format_guid(&guid).unwrap(),
            "aa312825-7688-11d1-aded-00c04fd8d5cd"
        );
        assert!(format_guid(&guid[..15]).is_none());
    }

    #[test]
    fn unicode_pwd_is_quoted_utf16le() {
        assert_eq!(
            unicode_pwd("aB"),
            vec![b'"', 0, b'a', 0, b'B', 0, b'"', 0]
        );
    }
}
