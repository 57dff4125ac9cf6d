//! SASL DIGEST-MD5 challenge/response computation
//! ([RFC 2831](https://tools.ietf.org/html/rfc2831)).
//!
//! The mechanism is deprecated (RFC 6331) but still widely deployed on
//! directory servers, Active Directory included. Only `qop=auth` is
//! implemented; integrity and confidentiality layers are not.

use std::collections::HashMap;

use crate::result::{LdapError, Result};

/// Parse a server challenge: a comma-separated list of `key=value`
/// pairs, values optionally quoted, whitespace around keys tolerated.
/// Pair order is arbitrary.
pub(crate) fn parse_challenge(challenge: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(challenge).map_err(|_| LdapError::DecodingUTF8)?;
    let mut fields = HashMap::new();
    let mut rest = text;
    while !rest.is_empty() {
        let eq = match rest.find('=') {
            Some(ix) => ix,
            None => break,
        };
        let key = rest[..eq].trim().to_ascii_lowercase();
        rest = &rest[eq + 1..];
        let value;
        if let Some(stripped) = rest.strip_prefix('"') {
            let close = stripped
                .find('"')
                .ok_or_else(|| LdapError::Sasl("unterminated quote in challenge".into()))?;
            value = stripped[..close].to_owned();
            let after = stripped[close + 1..].trim_start();
            rest = after.strip_prefix(',').unwrap_or(after);
        } else {
            match rest.find(',') {
                Some(ix) => {
                    value = rest[..ix].trim().to_owned();
                    rest = &rest[ix + 1..];
                }
                None => {
                    value = rest.trim().to_owned();
                    rest = "";
                }
            }
        }
        if key.is_empty() {
            return Err(LdapError::Sasl("empty key in challenge".into()));
        }
        fields.insert(key, value);
    }
    Ok(fields)
}

/// The fixed parameters of this client's digest exchange.
const NC: &str = "00000001";
const QOP: &str = "auth";

/// Compute the `response` directive value.
///
/// `ha1` starts from the raw 16-byte `MD5(user:realm:pass)`, not its hex
/// form; everything after that point is hex-rendered before further
/// hashing.
#[allow(clippy::too_many_arguments)]
fn response_digest(
    username: &str,
    realm: &str,
    password: &str,
    nonce: &str,
    cnonce: &str,
    authzid: Option<&str>,
    uri: &str,
) -> String {
    let ha0 = md5::compute(format!("{}:{}:{}", username, realm, password));
    let mut a1 = Vec::from(&ha0[..]);
    a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
    if let Some(authzid) = authzid {
        a1.extend_from_slice(format!(":{}", authzid).as_bytes());
    }
    let ha1 = format!("{:x}", md5::compute(a1));
    let ha2 = format!("{:x}", md5::compute(format!("AUTHENTICATE:{}", uri)));
    format!(
        "{:x}",
        md5::compute(format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, nonce, NC, cnonce, QOP, ha2
        ))
    )
}

/// Build the digest-response string sent as the credentials of the
/// second BindRequest, from the server's challenge.
pub(crate) fn digest_response(
    challenge: &[u8],
    host: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let fields = parse_challenge(challenge)?;
    let nonce = fields
        .get("nonce")
        .ok_or_else(|| LdapError::Sasl("challenge carries no nonce".into()))?;
    let realm = fields.get("realm").map(String::as_str).unwrap_or("");
    let authzid = fields.get("authzid").map(String::as_str);
    let cnonce = format!("{:016x}", rand::random::<u64>());
    let uri = format!("ldap/{}", host.to_ascii_lowercase());
    let digest = response_digest(username, realm, password, nonce, &cnonce, authzid, &uri);
    let mut reply = format!(
        "username=\"{}\",realm=\"{}\",nonce=\"{}\",cnonce=\"{}\",nc={},qop={},digest-uri=\"{}\",response={}",
        username, realm, nonce, cnonce, NC, QOP, uri, digest
    );
    if let Some(authzid) = authzid {
        reply.push_str(&format!(",authzid=\"{}\"", authzid));
    }
    Ok(reply)
}
