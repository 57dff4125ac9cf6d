//! A synchronous LDAP v2/v3 client for directory administration.
//!
//! The crate speaks the LDAP protocol over TCP, optionally wrapped in
//! TLS, with blocking I/O and exactly one request in flight per
//! connection. Besides the standard operations (bind, simple and SASL
//! DIGEST-MD5, search with paging, compare, add, modify, rename,
//! delete, extended), it carries the Active Directory conveniences
//! administrative tooling needs: root naming context discovery,
//! well-known container lookup, and computer account creation.
//!
//! ## Usage
//!
//! In `Cargo.toml`:
//!
//! ```toml
//! [dependencies.adldap]
//! version = "0.1"
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use adldap::{LdapClient, Scope};
//! use adldap::result::Result;
//!
//! fn main() -> Result<()> {
//!     let mut ldap = LdapClient::new();
//!     ldap.set_host("dc1.example.com")
//!         .set_credentials("CN=admin,DC=example,DC=com", "secret");
//!     ldap.login()?.success()?;
//!     ldap.search_options_mut().scope = Scope::Subtree;
//!     let (entries, _res) = ldap
//!         .search("DC=example,DC=com", "(objectClass=person)", &["cn", "mail"])?
//!         .success()?;
//!     for entry in &entries {
//!         println!("{}", entry.dn);
//!     }
//!     ldap.unbind()
//! }
//! ```
//!
//! ## Compile-time features
//!
//! * __tls__ (enabled by default): LDAPS support, backed by the
//!   `native-tls` crate and its platform TLS backend.
//!
//! The client is deliberately not multiplexed: responses are matched to
//! the single outstanding request by message ID, and a mismatch is
//! treated as a protocol fault. Callers that need concurrent operations
//! open one client per thread of work.

/// Type alias for the LDAP message ID.
pub type RequestId = i32;

pub mod ad;
mod client;
mod conn;
pub mod controls;
pub mod exop;
mod filter;
mod protocol;
pub mod result;
mod sasl;
pub mod search;
mod util;

pub use ad::{WellKnownContainer, dn_to_cn, format_guid, format_sid, unicode_pwd};
pub use client::{LdapClient, Mod};
pub use conn::{ConnSettings, DEFAULT_TIMEOUT};
pub use filter::parse as parse_filter;
pub use result::{CompareResult, ExopResult, LdapError, LdapResult, SearchResult, result_name};
pub use search::{
    Attribute, AttributeList, DerefAliases, Entry, ResultList, Scope, SearchOptions,
};
pub use util::{dn_escape, ldap_escape};
