//! The LDAP client state machine.
//!
//! [`LdapClient`] owns one connection, the message ID counter, the bound
//! flag and the results of the last operation. Exactly one request is in
//! flight at any time: every operation writes a request and then blocks
//! reading its response(s), bounded by the configured operation timeout.
//! The client is not `Sync`; callers that need parallelism open more
//! clients.

use std::io::Write;

use crate::RequestId;
use crate::ad::{self, WellKnownContainer};
use crate::conn::{ConnSettings, LdapStream};
use crate::controls::{Control, ControlType, PagedResults, RawControl};
use crate::exop::{Exop, construct_exop};
use crate::filter;
use crate::protocol::{self, Envelope};
use crate::result::{
    CompareResult, ExopResult, LdapError, LdapResult, ParsedResult, Result, SearchResult,
    parse_result,
};
use crate::search::{Entry, ResultList, Scope, SearchOptions, parse_ref_urls};
use crate::util::dn_escape;

use adber::common::TagClass;
use adber::tags::{Bool, Enum, Int, Null, OctetStr, Seq, Set, Tag};

use log::{debug, warn};

/// Application tags of the search responses this client dispatches on.
const APP_SEARCH_ENTRY: u64 = 4;
const APP_SEARCH_DONE: u64 = 5;
const APP_SEARCH_REFERENCE: u64 = 19;

const RC_SASL_BIND_IN_PROGRESS: u32 = 14;

/// Possible sub-operations of Modify.
#[derive(Clone, Debug, PartialEq)]
pub enum Mod<S: AsRef<[u8]>> {
    /// Add an attribute, with at least one value.
    Add(S, Vec<S>),
    /// Delete the entire attribute, or the given values of an attribute.
    Delete(S, Vec<S>),
    /// Replace an existing attribute, setting its values to those given,
    /// or delete it if no values are given.
    Replace(S, Vec<S>),
    /// Increment the attribute by the given value (RFC 4525).
    Increment(S, S),
}

/// Outcome fields of the most recent operation, kept on the client for
/// inspection after the call.
#[derive(Clone, Debug, Default)]
struct LastResult {
    rc: u32,
    matched: String,
    text: String,
    response_tag: u64,
    referrals: Vec<String>,
    raw: Vec<u8>,
    exop_name: Option<String>,
    exop_val: Option<Vec<u8>>,
}

/// Synchronous connection to an LDAP server.
///
/// Connection parameters and search parameters live on the client and
/// may be changed between operations; an operation in progress uses the
/// values read at its start. Simple Bind sends the password in the
/// clear; use TLS, or the DIGEST-MD5 bind, on untrusted networks.
pub struct LdapClient {
    host: String,
    port: Option<u16>,
    use_tls: bool,
    version: i32,
    username: String,
    password: String,
    settings: ConnSettings,
    search_opts: SearchOptions,

    stream: Option<LdapStream>,
    msgid: RequestId,
    bound: bool,
    root_dn: Option<String>,
    search_cookie: Vec<u8>,
    last: LastResult,
}

impl Default for LdapClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LdapClient {
    /// A disconnected client with default configuration: `localhost`,
    /// port 389 (636 with TLS), protocol version 3, whole-subtree
    /// searches dereferencing aliases, no paging.
    pub fn new() -> LdapClient {
        LdapClient {
            host: String::from("localhost"),
            port: None,
            use_tls: false,
            version: 3,
            username: String::new(),
            password: String::new(),
            settings: ConnSettings::new(),
            search_opts: SearchOptions::new(),
            stream: None,
            msgid: 0,
            bound: false,
            root_dn: None,
            search_cookie: Vec::new(),
            last: LastResult::default(),
        }
    }

    // --- configuration ---------------------------------------------------

    pub fn set_host(&mut self, host: &str) -> &mut Self {
        self.host = host.to_owned();
        self
    }

    /// Set an explicit port. Without one, 389 is used in the clear and
    /// 636 with TLS.
    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    pub fn set_tls(&mut self, use_tls: bool) -> &mut Self {
        self.use_tls = use_tls;
        self
    }

    /// Set the protocol version sent in Bind requests; 2 and 3 are
    /// meaningful, 3 is the default.
    pub fn set_version(&mut self, version: i32) -> &mut Self {
        self.version = version;
        self
    }

    /// Set the identity [`login()`](#method.login) binds with.
    pub fn set_credentials(&mut self, username: &str, password: &str) -> &mut Self {
        self.username = username.to_owned();
        self.password = password.to_owned();
        self
    }

    pub fn set_conn_settings(&mut self, settings: ConnSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    pub fn set_search_options(&mut self, opts: SearchOptions) -> &mut Self {
        self.search_opts = opts;
        self
    }

    /// Mutable access to the standing search parameters.
    pub fn search_options_mut(&mut self) -> &mut SearchOptions {
        &mut self.search_opts
    }

    fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls { 636 } else { 389 })
    }

    // --- observable state ------------------------------------------------

    /// Whether the last Bind succeeded and no Unbind or disconnect has
    /// happened since.
    ///
    /// The `and_bound` argument is accepted for interface compatibility
    /// and ignored: the check always requires a bound connection, so the
    /// `and_bound=false` reading has never meant anything different.
    pub fn is_connected(&self, _and_bound: bool) -> bool {
        self.stream.is_some() && self.bound
    }

    /// Result code of the last completed operation.
    pub fn result_code(&self) -> u32 {
        self.last.rc
    }

    /// Diagnostic text of the last completed operation; never empty for
    /// a decoded result, since an empty server message is replaced by
    /// the result code's name.
    pub fn result_text(&self) -> &str {
        &self.last.text
    }

    /// Matched DN reported with the last result.
    pub fn matched_dn(&self) -> &str {
        &self.last.matched
    }

    /// Application tag of the last decoded response.
    pub fn response_tag(&self) -> u64 {
        self.last.response_tag
    }

    /// Referral URLs accumulated by the last operation.
    pub fn referrals(&self) -> &[String] {
        &self.last.referrals
    }

    /// The raw bytes of the last response frame, for debugging.
    pub fn last_raw_response(&self) -> &[u8] {
        &self.last.raw
    }

    /// Name reported by the last Extended response, if any.
    pub fn exop_name(&self) -> Option<&str> {
        self.last.exop_name.as_deref()
    }

    /// Value reported by the last Extended response, if any.
    pub fn exop_value(&self) -> Option<&[u8]> {
        self.last.exop_val.as_deref()
    }

    /// Paged-search continuation cookie left by the last Search. Empty
    /// when the server has no more pages.
    pub fn search_cookie(&self) -> &[u8] {
        &self.search_cookie
    }

    /// True when a paged Search has another page to fetch.
    pub fn has_more_pages(&self) -> bool {
        !self.search_cookie.is_empty()
    }

    // --- connection lifecycle --------------------------------------------

    /// Open the transport. Resets the message ID counter and the bound
    /// flag; any previous connection is dropped.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.stream.take() {
            old.shutdown();
        }
        self.reset_conn_state();
        let stream = LdapStream::connect(
            &self.host,
            self.effective_port(),
            self.use_tls,
            &self.settings,
        )?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Connect if necessary, then Simple Bind with the configured
    /// credentials. Empty credentials select an anonymous bind.
    pub fn login(&mut self) -> Result<LdapResult> {
        if self.stream.is_none() {
            self.connect()?;
        }
        let (username, password) = (self.username.clone(), self.password.clone());
        self.simple_bind(&username, &password)
    }

    /// Send an UnbindRequest, close the socket, and clear the bound
    /// flag, the message ID counter, and the cached root DN. Transport
    /// errors are ignored: the point of the operation is reached either
    /// way.
    pub fn unbind(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let req = Tag::Null(Null {
                id: 2,
                class: TagClass::Application,
            });
            let id = self.next_msgid();
            if let Ok(frame) = protocol::encode_request(id, req, None) {
                let _ = stream.write_all(&frame);
            }
            stream.shutdown();
        }
        self.reset_conn_state();
        self.root_dn = None;
        Ok(())
    }

    fn reset_conn_state(&mut self) {
        self.msgid = 0;
        self.bound = false;
        self.search_cookie.clear();
    }

    /// Drop the connection after a transport failure.
    fn fail_conn(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.reset_conn_state();
    }

    // --- request/response plumbing ---------------------------------------

    fn next_msgid(&mut self) -> RequestId {
        self.msgid = if self.msgid == RequestId::MAX {
            1
        } else {
            self.msgid + 1
        };
        self.msgid
    }

    fn send_op(&mut self, op: Tag, controls: Option<Vec<RawControl>>) -> Result<RequestId> {
        let id = self.next_msgid();
        let frame = protocol::encode_request(id, op, controls)?;
        let stream = self.stream.as_mut().ok_or(LdapError::NotConnected)?;
        if let Err(e) = stream.write_all(&frame) {
            self.fail_conn();
            return Err(e.into());
        }
        Ok(id)
    }

    /// Read one response frame and check its message ID against the
    /// request's. A mismatched reply is a protocol fault: the frame is
    /// discarded, the error is surfaced, and no client state advances.
    fn recv_envelope(&mut self, id: RequestId) -> Result<Envelope> {
        let stream = self.stream.as_mut().ok_or(LdapError::NotConnected)?;
        let frame = match protocol::read_frame(stream) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail_conn();
                return Err(e);
            }
        };
        self.last.raw = frame.clone();
        let env = protocol::decode_envelope(&frame)?;
        if env.msgid != id {
            warn!("discarding reply {} while waiting for {}", env.msgid, id);
            return Err(LdapError::IdMismatch {
                sent: id,
                received: env.msgid,
            });
        }
        Ok(env)
    }

    fn record(&mut self, res: &LdapResult) {
        self.last.rc = res.rc;
        self.last.matched = res.matched.clone();
        self.last.text = res.text.clone();
        self.last.referrals = res.refs.clone();
    }

    /// One request, one result-bearing response.
    fn op_call(
        &mut self,
        op: Tag,
        controls: Option<Vec<RawControl>>,
    ) -> Result<(LdapResult, Exop, Option<Vec<u8>>)> {
        let id = self.send_op(op, controls)?;
        let env = self.recv_envelope(id)?;
        self.last.response_tag = env.op.id;
        let ParsedResult {
            mut result,
            exop,
            sasl_creds,
        } = parse_result(env.op)?;
        result.ctrls = env.controls;
        self.record(&result);
        Ok((result, exop, sasl_creds))
    }

    // --- bind family ------------------------------------------------------

    /// Simple Bind with the provided DN and password. The password
    /// travels in plaintext; pair with TLS on untrusted networks. Empty
    /// DN and password perform an anonymous bind.
    pub fn simple_bind(&mut self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        let req = Tag::Seq(Seq {
            id: 0,
            class: TagClass::Application,
            inner: vec![
                Tag::Int(Int {
                    inner: self.version as i64,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    inner: Vec::from(bind_dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    id: 0,
                    class: TagClass::Context,
                    inner: Vec::from(bind_pw.as_bytes()),
                }),
            ],
        });
        let res = self.op_call(req, None)?.0;
        self.bound = res.rc == 0;
        debug!("simple bind as {:?}: rc={}", bind_dn, res.rc);
        Ok(res)
    }

    fn sasl_bind_req(&self, mech: &str, creds: Option<&[u8]>) -> Tag {
        let mut sasl = vec![Tag::OctetStr(OctetStr {
            inner: Vec::from(mech.as_bytes()),
            ..Default::default()
        })];
        if let Some(creds) = creds {
            sasl.push(Tag::OctetStr(OctetStr {
                inner: creds.to_vec(),
                ..Default::default()
            }));
        }
        Tag::Seq(Seq {
            id: 0,
            class: TagClass::Application,
            inner: vec![
                Tag::Int(Int {
                    inner: self.version as i64,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr::default()),
                Tag::Seq(Seq {
                    id: 3,
                    class: TagClass::Context,
                    inner: sasl,
                }),
            ],
        })
    }

    /// SASL DIGEST-MD5 bind (RFC 2831): request a challenge, answer it,
    /// and repeat while the server keeps the exchange open. The server
    /// is given up on after a handful of rounds, since a conforming
    /// exchange needs only one.
    pub fn sasl_digest_md5_bind(&mut self, username: &str, password: &str) -> Result<LdapResult> {
        for _ in 0..3 {
            let req = self.sasl_bind_req("DIGEST-MD5", None);
            let (res, _, creds) = self.op_call(req, None)?;
            if res.rc != RC_SASL_BIND_IN_PROGRESS {
                self.bound = res.rc == 0;
                return Ok(res);
            }
            let challenge = creds
                .ok_or_else(|| LdapError::Sasl("server sent no DIGEST-MD5 challenge".into()))?;
            let reply = crate::sasl::digest_response(&challenge, &self.host, username, password)?;
            let req = self.sasl_bind_req("DIGEST-MD5", Some(reply.as_bytes()));
            let (res, _, _) = self.op_call(req, None)?;
            if res.rc != RC_SASL_BIND_IN_PROGRESS {
                self.bound = res.rc == 0;
                debug!("DIGEST-MD5 bind as {:?}: rc={}", username, res.rc);
                return Ok(res);
            }
        }
        Err(LdapError::Sasl(
            "DIGEST-MD5 exchange did not converge".into(),
        ))
    }

    // --- search family ----------------------------------------------------

    /// Perform a Search under `base` with the client's standing scope,
    /// dereference policy and limits. An empty `filter` means
    /// `(objectClass=*)`. An empty `attrs` list returns all user
    /// attributes.
    ///
    /// When a positive page size is configured, the Paged Results
    /// control is attached and the continuation cookie is stored on the
    /// client afterward: loop while [`has_more_pages()`](#method.has_more_pages)
    /// to fetch the full result, collecting each returned page. Every
    /// call builds a fresh [`ResultList`](crate::search::ResultList).
    pub fn search<S: AsRef<str>>(
        &mut self,
        base: &str,
        filter_str: &str,
        attrs: &[S],
    ) -> Result<SearchResult> {
        let opts = self.search_opts.clone();
        let filter_str = if filter_str.is_empty() {
            "(objectClass=*)"
        } else {
            filter_str
        };
        let filter_tag = filter::parse(filter_str)?;
        let req = Tag::Seq(Seq {
            id: 3,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetStr(OctetStr {
                    inner: Vec::from(base.as_bytes()),
                    ..Default::default()
                }),
                Tag::Enum(Enum {
                    inner: opts.scope as i64,
                    ..Default::default()
                }),
                Tag::Enum(Enum {
                    inner: opts.deref as i64,
                    ..Default::default()
                }),
                Tag::Int(Int {
                    inner: opts.sizelimit as i64,
                    ..Default::default()
                }),
                Tag::Int(Int {
                    inner: opts.timelimit as i64,
                    ..Default::default()
                }),
                Tag::Bool(Bool {
                    inner: opts.typesonly,
                    ..Default::default()
                }),
                filter_tag,
                Tag::Seq(Seq {
                    inner: attrs
                        .iter()
                        .map(|a| {
                            Tag::OctetStr(OctetStr {
                                inner: Vec::from(a.as_ref().as_bytes()),
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        let controls = if opts.page_size > 0 {
            Some(vec![
                PagedResults {
                    size: opts.page_size,
                    cookie: std::mem::take(&mut self.search_cookie),
                }
                .into(),
            ])
        } else {
            None
        };
        let id = self.send_op(req, controls)?;

        let mut list = ResultList::new();
        let mut refs = Vec::new();
        loop {
            let env = self.recv_envelope(id)?;
            self.last.response_tag = env.op.id;
            if env.op.class != TagClass::Application {
                return Err(LdapError::UnexpectedResponse(env.op.id));
            }
            match env.op.id {
                APP_SEARCH_ENTRY => list.push(Entry::parse(env.op)?),
                APP_SEARCH_REFERENCE => refs.extend(parse_ref_urls(env.op)?),
                APP_SEARCH_DONE => {
                    let ParsedResult { mut result, .. } = parse_result(env.op)?;
                    result.ctrls = env.controls;
                    result.refs.extend(refs);
                    self.search_cookie.clear();
                    if opts.page_size > 0 {
                        for Control(ctype, raw) in &result.ctrls {
                            if *ctype == Some(ControlType::PagedResults) {
                                if let Some(pr) =
                                    raw.val.as_deref().and_then(PagedResults::try_parse)
                                {
                                    self.search_cookie = pr.cookie;
                                }
                            }
                        }
                    }
                    self.record(&result);
                    debug!(
                        "search under {:?} done: rc={}, {} entries",
                        base,
                        result.rc,
                        list.len()
                    );
                    return Ok(SearchResult(list, result));
                }
                other => return Err(LdapError::UnexpectedResponse(other)),
            }
        }
    }

    /// Search and return only the first entry, if any.
    pub fn search_first<S: AsRef<str>>(
        &mut self,
        base: &str,
        filter_str: &str,
        attrs: &[S],
    ) -> Result<Option<Entry>> {
        let SearchResult(list, _) = self.search(base, filter_str, attrs)?;
        Ok(list.into_entries().into_iter().next())
    }

    /// Read one object: a base-scope search of `dn` itself. The standing
    /// scope is restored afterward.
    pub fn search_object<S: AsRef<str>>(
        &mut self,
        dn: &str,
        filter_str: &str,
        attrs: &[S],
    ) -> Result<Option<Entry>> {
        let saved = self.search_opts.scope;
        self.search_opts.scope = Scope::Base;
        let res = self.search_first(dn, filter_str, attrs);
        self.search_opts.scope = saved;
        res
    }

    // --- update family ----------------------------------------------------

    /// Add an entry named by `dn` with the given attributes. Value order
    /// is preserved on the wire. No attribute may have an empty value
    /// list.
    pub fn add<S: AsRef<[u8]>>(&mut self, dn: &str, attrs: Vec<(S, Vec<S>)>) -> Result<LdapResult> {
        if attrs.iter().any(|(_, vals)| vals.is_empty()) {
            return Err(LdapError::AddNoValues);
        }
        let req = Tag::Seq(Seq {
            id: 8,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetStr(OctetStr {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Seq(Seq {
                    inner: attrs
                        .into_iter()
                        .map(|(name, vals)| attribute_tag(name, vals))
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        Ok(self.op_call(req, None)?.0)
    }

    /// Modify an entry named by `dn` by applying `mods` in order.
    pub fn modify<S: AsRef<[u8]>>(&mut self, dn: &str, mods: Vec<Mod<S>>) -> Result<LdapResult> {
        let mut changes = Vec::with_capacity(mods.len());
        for m in mods {
            let (op, attr, vals) = match m {
                Mod::Add(attr, vals) => {
                    if vals.is_empty() {
                        return Err(LdapError::AddNoValues);
                    }
                    (0, attr, vals)
                }
                Mod::Delete(attr, vals) => (1, attr, vals),
                Mod::Replace(attr, vals) => (2, attr, vals),
                Mod::Increment(attr, val) => (3, attr, vec![val]),
            };
            changes.push(Tag::Seq(Seq {
                inner: vec![
                    Tag::Enum(Enum {
                        inner: op,
                        ..Default::default()
                    }),
                    attribute_tag(attr, vals),
                ],
                ..Default::default()
            }));
        }
        let req = Tag::Seq(Seq {
            id: 6,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetStr(OctetStr {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Seq(Seq {
                    inner: changes,
                    ..Default::default()
                }),
            ],
        });
        Ok(self.op_call(req, None)?.0)
    }

    /// Delete the entry named by `dn`. The DelRequest carries the DN as
    /// its direct content, without a sequence wrapper.
    pub fn delete(&mut self, dn: &str) -> Result<LdapResult> {
        let req = Tag::OctetStr(OctetStr {
            id: 10,
            class: TagClass::Application,
            inner: Vec::from(dn.as_bytes()),
        });
        Ok(self.op_call(req, None)?.0)
    }

    /// Rename and/or move the entry named by `dn`. `new_rdn` is the new
    /// relative name; `delete_old` removes the previous naming value;
    /// `new_superior`, when given, re-anchors the entry elsewhere.
    pub fn modify_dn(
        &mut self,
        dn: &str,
        new_rdn: &str,
        delete_old: bool,
        new_superior: Option<&str>,
    ) -> Result<LdapResult> {
        let mut parts = vec![
            Tag::OctetStr(OctetStr {
                inner: Vec::from(dn.as_bytes()),
                ..Default::default()
            }),
            Tag::OctetStr(OctetStr {
                inner: Vec::from(new_rdn.as_bytes()),
                ..Default::default()
            }),
            Tag::Bool(Bool {
                inner: delete_old,
                ..Default::default()
            }),
        ];
        if let Some(sup) = new_superior {
            parts.push(Tag::OctetStr(OctetStr {
                id: 0,
                class: TagClass::Context,
                inner: Vec::from(sup.as_bytes()),
            }));
        }
        let req = Tag::Seq(Seq {
            id: 12,
            class: TagClass::Application,
            inner: parts,
        });
        Ok(self.op_call(req, None)?.0)
    }

    /// Compare an entry's attribute against a value, given as one
    /// `attribute=value` string split at the first `=`. The outcome
    /// arrives as result code 6 (`compareTrue`) or 5 (`compareFalse`);
    /// see [`CompareResult`] for the two readings of it.
    pub fn compare(&mut self, dn: &str, attr_value: &str) -> Result<CompareResult> {
        let (attr, value) = attr_value
            .split_once('=')
            .ok_or_else(|| LdapError::InvalidAssertion(attr_value.to_owned()))?;
        let req = Tag::Seq(Seq {
            id: 14,
            class: TagClass::Application,
            inner: vec![
                Tag::OctetStr(OctetStr {
                    inner: Vec::from(dn.as_bytes()),
                    ..Default::default()
                }),
                Tag::Seq(Seq {
                    inner: vec![
                        Tag::OctetStr(OctetStr {
                            inner: Vec::from(attr.as_bytes()),
                            ..Default::default()
                        }),
                        Tag::OctetStr(OctetStr {
                            inner: Vec::from(value.as_bytes()),
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                }),
            ],
        });
        Ok(CompareResult(self.op_call(req, None)?.0))
    }

    /// Perform an Extended operation. The response's name and value, if
    /// present, are kept on the client and returned in the
    /// [`ExopResult`].
    pub fn extended<E: Into<Exop>>(&mut self, exop: E) -> Result<ExopResult> {
        let req = Tag::Seq(Seq {
            id: 23,
            class: TagClass::Application,
            inner: construct_exop(exop.into()),
        });
        let (result, exop, _) = self.op_call(req, None)?;
        self.last.exop_name = exop.name.clone();
        self.last.exop_val = exop.val.clone();
        Ok(ExopResult(exop, result))
    }

    /// Ask the server to abandon the operation identified by `msgid`.
    /// Abandon has no response; a timed-out Search is its main customer.
    pub fn abandon(&mut self, msgid: RequestId) -> Result<()> {
        let req = Tag::Int(Int {
            id: 16,
            class: TagClass::Application,
            inner: msgid as i64,
        });
        self.send_op(req, None)?;
        Ok(())
    }

    /// Message ID of the most recent request.
    pub fn last_id(&self) -> RequestId {
        self.msgid
    }

    // --- directory helpers ------------------------------------------------

    /// Discover the root naming context: a base-scope search of the root
    /// DSE for `rootDomainNamingContext`. The answer is cached until the
    /// next Unbind.
    pub fn discover_root_dn(&mut self) -> Result<String> {
        if let Some(dn) = &self.root_dn {
            return Ok(dn.clone());
        }
        let entry = self
            .search_object("", "", &["rootDomainNamingContext"])?
            .ok_or(LdapError::Decoding("empty root DSE"))?;
        let dn = entry
            .attrs
            .get("rootDomainNamingContext")
            .and_then(|a| a.first_readable())
            .ok_or(LdapError::Decoding("no rootDomainNamingContext"))?;
        self.root_dn = Some(dn.clone());
        Ok(dn)
    }

    /// Resolve a well-known container to its DN by matching the GUID in
    /// the root object's `wellKnownObjects` values, which have the form
    /// `B:32:<guid>:<dn>`.
    pub fn well_known_object_dn(
        &mut self,
        container: WellKnownContainer,
    ) -> Result<Option<String>> {
        let root = self.discover_root_dn()?;
        let entry = match self.search_object(&root, "", &["wellKnownObjects"])? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let guid = container.guid();
        if let Some(attr) = entry.attrs.get("wellKnownObjects") {
            for val in &attr.values {
                let text = String::from_utf8_lossy(val);
                let mut fields = text.splitn(4, ':');
                let (marker, _, val_guid, dn) = (
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                );
                if marker == Some("B")
                    && val_guid.map(|g| g.eq_ignore_ascii_case(guid)) == Some(true)
                {
                    return Ok(dn.map(str::to_owned));
                }
            }
        }
        Ok(None)
    }

    /// Create a computer account named `name` under `parent_dn`.
    ///
    /// If the object already exists it is first deleted when
    /// `delete_if_present` is set; otherwise the method still returns
    /// `Ok(true)` and notes "already present" in
    /// [`result_text()`](#method.result_text), a long-standing quirk of
    /// this interface, so callers must check the text, not just the
    /// boolean. With a password given, the
    /// account's `unicodePwd` is set in the same Add; servers require
    /// TLS for that.
    pub fn add_computer(
        &mut self,
        parent_dn: &str,
        name: &str,
        password: Option<&str>,
        delete_if_present: bool,
    ) -> Result<bool> {
        let dn = format!("CN={},{}", dn_escape(name), parent_dn);
        let existing = self.search_object(&dn, "", &["cn"])?;
        if existing.is_some() {
            if delete_if_present {
                self.delete(&dn)?.success()?;
            } else {
                self.last.text = format!("computer object {} already present", dn);
                return Ok(true);
            }
        }
        let sam = format!("{}$", name.to_uppercase());
        let uac = ad::UAC_WORKSTATION_TRUST_ACCOUNT.to_string();
        let mut attrs: Vec<(&[u8], Vec<Vec<u8>>)> = vec![
            (b"objectClass", vec![b"computer".to_vec()]),
            (b"cn", vec![name.as_bytes().to_vec()]),
            (b"sAMAccountName", vec![sam.into_bytes()]),
            (b"userAccountControl", vec![uac.into_bytes()]),
        ];
        if let Some(password) = password {
            attrs.push((b"unicodePwd", vec![ad::unicode_pwd(password)]));
        }
        let attrs = attrs
            .into_iter()
            .map(|(name, vals)| (name.to_vec(), vals))
            .collect();
        let res = self.add(&dn, attrs)?;
        Ok(res.rc == 0)
    }
}

/// `PartialAttribute`: the name/value-set pair shared by Add and Modify.
fn attribute_tag<S: AsRef<[u8]>>(name: S, vals: Vec<S>) -> Tag {
    Tag::Seq(Seq {
        inner: vec![
            Tag::OctetStr(OctetStr {
                inner: Vec::from(name.as_ref()),
                ..Default::default()
            }),
            Tag::Set(Set {
                inner: vals
                    .into_iter()
                    .map(|v| {
                        Tag::OctetStr(OctetStr {
                            inner: Vec::from(v.as_ref()),
                            ..Default::default()
                        })
                    })
                    .collect(),
                ..Default::default()
            }),
        ],
        ..Default::default()
    })
}
