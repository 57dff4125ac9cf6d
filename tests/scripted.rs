//! End-to-end tests against a scripted in-process server.
//!
//! Each test starts a listener on a loopback port and a thread that
//! plays the server side of one exchange, building its responses with
//! the same BER encoder the client uses. Assertions on the server side
//! propagate through the joined thread handle.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use adber::common::TagClass;
use adber::structure::{PL, StructureTag};
use adber::tags::{ASNTag, Enum, Int, OctetStr, Seq, Set, Tag};
use adber::universal::Types;
use adber::write;

use adldap::{LdapClient, LdapError, Scope, WellKnownContainer};

struct ScriptedServer {
    handle: JoinHandle<()>,
    port: u16,
}

impl ScriptedServer {
    fn start<F>(script: F) -> ScriptedServer
    where
        F: FnOnce(ServerConn) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            script(ServerConn {
                stream,
                buf: Vec::new(),
            });
        });
        ScriptedServer { handle, port }
    }

    fn client(&self) -> LdapClient {
        let mut client = LdapClient::new();
        client.set_host("127.0.0.1").set_port(self.port);
        client.connect().unwrap();
        client
    }

    fn finish(self) {
        self.handle.join().unwrap();
    }
}

struct ServerConn {
    stream: TcpStream,
    buf: Vec<u8>,
}

/// A request envelope as the server sees it.
struct Request {
    msgid: i64,
    op: StructureTag,
    controls: Option<StructureTag>,
}

impl ServerConn {
    /// Read one complete LDAP message off the socket.
    fn recv(&mut self) -> Request {
        loop {
            if !self.buf.is_empty() {
                match adber::parse::parse_tag(&self.buf) {
                    Ok((rest, tag)) => {
                        let consumed = self.buf.len() - rest.len();
                        self.buf.drain(..consumed);
                        return split_envelope(tag);
                    }
                    Err(nom::Err::Incomplete(_)) => (),
                    Err(e) => panic!("malformed client message: {:?}", e),
                }
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed while a message was expected");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn send(&mut self, msgid: i64, op: Tag, controls: Option<StructureTag>) {
        let mut parts = vec![
            Int {
                inner: msgid,
                ..Default::default()
            }
            .into_structure(),
            op.into_structure(),
        ];
        if let Some(controls) = controls {
            parts.push(controls);
        }
        let envelope = StructureTag {
            class: TagClass::Universal,
            id: Types::Sequence as u64,
            payload: PL::C(parts),
        };
        let mut buf = bytes::BytesMut::new();
        write::encode_into(&mut buf, envelope).unwrap();
        self.stream.write_all(&buf).unwrap();
    }
}

fn split_envelope(tag: StructureTag) -> Request {
    let mut parts = tag
        .match_id(Types::Sequence as u64)
        .and_then(|t| t.expect_constructed())
        .expect("request envelope")
        .into_iter();
    let msgid_content = parts
        .next()
        .and_then(|t| t.expect_primitive())
        .expect("message id");
    let msgid = msgid_content.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64);
    let op = parts.next().expect("protocol op");
    let controls = parts.next();
    Request {
        msgid,
        op,
        controls,
    }
}

/// A result-bearing response: `{ ENUM rc, OCTET STRING matched, OCTET
/// STRING text }` under the given application tag.
fn result_op(app_id: u64, rc: i64) -> Tag {
    Tag::Seq(Seq {
        id: app_id,
        class: TagClass::Application,
        inner: vec![
            Tag::Enum(Enum {
                inner: rc,
                ..Default::default()
            }),
            Tag::OctetStr(OctetStr::default()),
            Tag::OctetStr(OctetStr::default()),
        ],
    })
}

fn entry_op(dn: &str, attrs: &[(&str, &[&str])]) -> Tag {
    Tag::Seq(Seq {
        id: 4,
        class: TagClass::Application,
        inner: vec![
            Tag::OctetStr(OctetStr {
                inner: dn.as_bytes().to_vec(),
                ..Default::default()
            }),
            Tag::Seq(Seq {
                inner: attrs
                    .iter()
                    .map(|(name, vals)| {
                        Tag::Seq(Seq {
                            inner: vec![
                                Tag::OctetStr(OctetStr {
                                    inner: name.as_bytes().to_vec(),
                                    ..Default::default()
                                }),
                                Tag::Set(Set {
                                    inner: vals
                                        .iter()
                                        .map(|v| {
                                            Tag::OctetStr(OctetStr {
                                                inner: v.as_bytes().to_vec(),
                                                ..Default::default()
                                            })
                                        })
                                        .collect(),
                                    ..Default::default()
                                }),
                            ],
                            ..Default::default()
                        })
                    })
                    .collect(),
                ..Default::default()
            }),
        ],
    })
}

/// The `[0]` Controls element holding one Paged Results control.
fn paged_control(size: i64, cookie: &[u8]) -> StructureTag {
    let mut value = bytes::BytesMut::new();
    write::encode_into(
        &mut value,
        Seq {
            inner: vec![
                Tag::Int(Int {
                    inner: size,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr {
                    inner: cookie.to_vec(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        }
        .into_structure(),
    )
    .unwrap();
    let control = Seq {
        inner: vec![
            Tag::OctetStr(OctetStr {
                inner: b"1.2.840.113556.1.4.319".to_vec(),
                ..Default::default()
            }),
            Tag::OctetStr(OctetStr {
                inner: value.to_vec(),
                ..Default::default()
            }),
        ],
        ..Default::default()
    }
    .into_structure();
    StructureTag {
        class: TagClass::Context,
        id: 0,
        payload: PL::C(vec![control]),
    }
}

/// Paging cookie of a search request, if the control is attached.
fn request_cookie(req: &Request) -> Option<Vec<u8>> {
    let controls = req.controls.clone()?;
    let control = controls.expect_constructed()?.into_iter().next()?;
    let mut parts = control.expect_constructed()?.into_iter();
    let oid = parts.next()?.expect_primitive()?;
    assert_eq!(oid, b"1.2.840.113556.1.4.319".to_vec());
    let value = loop {
        let part = parts.next()?;
        // skip the optional criticality boolean
        if part.id == Types::OctetString as u64 {
            break part.expect_primitive()?;
        }
    };
    let inner = adber::parse::parse_tag(&value).ok()?.1;
    let mut inner = inner.expect_constructed()?.into_iter();
    inner.next()?; // page size
    inner.next()?.expect_primitive()
}

#[test]
fn anonymous_bind_succeeds() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        assert_eq!(req.msgid, 1);
        assert_eq!(req.op.class, TagClass::Application);
        assert_eq!(req.op.id, 0);
        // version 3, empty name, empty simple password
        let parts = req.op.expect_constructed().unwrap();
        assert_eq!(parts[0].clone().expect_primitive().unwrap(), vec![3]);
        assert!(parts[1].clone().expect_primitive().unwrap().is_empty());
        assert!(parts[2].clone().expect_primitive().unwrap().is_empty());
        conn.send(1, result_op(1, 0), None);
    });
    let mut client = server.client();
    let res = client.simple_bind("", "").unwrap();
    assert_eq!(res.rc, 0);
    assert!(client.is_connected(true));
    server.finish();
}

#[test]
fn failed_bind_leaves_unbound() {
    let server = ScriptedServer::start(|mut conn| {
        conn.recv();
        conn.send(1, result_op(1, 49), None);
    });
    let mut client = server.client();
    let res = client.simple_bind("cn=x", "wrong").unwrap();
    assert_eq!(res.rc, 49);
    assert_eq!(res.text, "invalidCredentials");
    assert!(!client.is_connected(true));
    server.finish();
}

#[test]
fn mismatched_message_id_is_rejected() {
    let server = ScriptedServer::start(|mut conn| {
        conn.recv();
        conn.send(99, result_op(1, 0), None);
    });
    let mut client = server.client();
    match client.simple_bind("", "") {
        Err(LdapError::IdMismatch { sent: 1, received: 99 }) => (),
        other => panic!("expected IdMismatch, got {:?}", other.map(|r| r.rc)),
    }
    assert!(!client.is_connected(true));
    server.finish();
}

#[test]
fn search_collects_entries_in_order() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        assert_eq!(req.op.id, 3);
        conn.send(
            req.msgid,
            entry_op(
                "cn=alice,dc=example,dc=com",
                &[("cn", &["alice"]), ("mail", &["a@example.com"])],
            ),
            None,
        );
        conn.send(
            req.msgid,
            Tag::Seq(Seq {
                id: 19,
                class: TagClass::Application,
                inner: vec![Tag::OctetStr(OctetStr {
                    inner: b"ldap://other.example.com/dc=example,dc=com".to_vec(),
                    ..Default::default()
                })],
            }),
            None,
        );
        conn.send(
            req.msgid,
            entry_op("cn=bob,dc=example,dc=com", &[("cn", &["bob"])]),
            None,
        );
        conn.send(req.msgid, result_op(5, 0), None);
    });
    let mut client = server.client();
    let (entries, res) = client
        .search("dc=example,dc=com", "(objectClass=person)", &["cn", "mail"])
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].dn, "cn=alice,dc=example,dc=com");
    assert_eq!(entries[1].dn, "cn=bob,dc=example,dc=com");
    assert_eq!(
        entries[0].attrs.get("MAIL").unwrap().first_readable().unwrap(),
        "a@example.com"
    );
    assert_eq!(res.refs.len(), 1);
    assert!(res.refs[0].starts_with("ldap://other.example.com"));
    assert_eq!(client.response_tag(), 5);
    server.finish();
}

#[test]
fn paged_search_runs_the_cookie_loop() {
    // five people, two per page
    let server = ScriptedServer::start(|mut conn| {
        let pages: [(&[&str], &[u8]); 3] = [
            (&["cn=p1", "cn=p2"], b"cookie-1"),
            (&["cn=p3", "cn=p4"], b"cookie-2"),
            (&["cn=p5"], b""),
        ];
        let mut expected_cookie: Vec<u8> = Vec::new();
        for (dns, next_cookie) in pages {
            let req = conn.recv();
            assert_eq!(req.op.id, 3);
            assert_eq!(request_cookie(&req).unwrap(), expected_cookie);
            for &dn in dns {
                conn.send(req.msgid, entry_op(dn, &[("cn", &[&dn[3..]])]), None);
            }
            conn.send(
                req.msgid,
                result_op(5, 0),
                Some(paged_control(0, next_cookie)),
            );
            expected_cookie = next_cookie.to_vec();
        }
    });
    let mut client = server.client();
    client.search_options_mut().page_size = 2;
    let mut all = Vec::new();
    loop {
        let (entries, res) = client
            .search("dc=example,dc=com", "(objectClass=person)", &["cn"])
            .unwrap()
            .success()
            .unwrap();
        assert_eq!(res.rc, 0);
        all.extend(entries.into_entries());
        if !client.has_more_pages() {
            break;
        }
    }
    assert_eq!(all.len(), 5);
    assert_eq!(all[4].dn, "cn=p5");
    server.finish();
}

#[test]
fn compare_reports_both_readings() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        assert_eq!(req.op.id, 14);
        let mut parts = req.op.expect_constructed().unwrap().into_iter();
        assert_eq!(
            parts.next().unwrap().expect_primitive().unwrap(),
            b"cn=alice,dc=example,dc=com".to_vec()
        );
        let ava = parts.next().unwrap().expect_constructed().unwrap();
        assert_eq!(ava[0].clone().expect_primitive().unwrap(), b"sn".to_vec());
        assert_eq!(ava[1].clone().expect_primitive().unwrap(), b"Smith".to_vec());
        conn.send(req.msgid, result_op(15, 6), None);
    });
    let mut client = server.client();
    let cmp = client
        .compare("cn=alice,dc=example,dc=com", "sn=Smith")
        .unwrap();
    assert_eq!(client.result_code(), 6);
    assert!(!cmp.ok());
    assert!(cmp.equal().unwrap());
    server.finish();
}

#[test]
fn add_delete_then_missing() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        assert_eq!(req.op.id, 8);
        conn.send(req.msgid, result_op(9, 0), None);
        let req = conn.recv();
        assert_eq!(req.op.id, 10);
        // DelRequest content is the bare DN
        assert_eq!(
            req.op.expect_primitive().unwrap(),
            b"cn=tmp,dc=example,dc=com".to_vec()
        );
        conn.send(req.msgid, result_op(11, 0), None);
        let req = conn.recv();
        conn.send(req.msgid, result_op(11, 32), None);
    });
    let mut client = server.client();
    let attrs = vec![
        ("objectClass", vec!["person"]),
        ("cn", vec!["tmp"]),
        ("sn", vec!["tmp"]),
    ];
    client
        .add("cn=tmp,dc=example,dc=com", attrs)
        .unwrap()
        .success()
        .unwrap();
    client
        .delete("cn=tmp,dc=example,dc=com")
        .unwrap()
        .success()
        .unwrap();
    let res = client.delete("cn=tmp,dc=example,dc=com").unwrap();
    assert_eq!(res.rc, 32);
    assert_eq!(res.text, "noSuchObject");
    server.finish();
}

#[test]
fn digest_md5_bind_roundtrips() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        assert_eq!(req.op.id, 0);
        // initial request names the mechanism without credentials
        let parts = req.op.expect_constructed().unwrap();
        let sasl = parts[2].clone().expect_constructed().unwrap();
        assert_eq!(
            sasl[0].clone().expect_primitive().unwrap(),
            b"DIGEST-MD5".to_vec()
        );
        assert_eq!(sasl.len(), 1);
        // challenge travels in serverSaslCreds [7]
        let challenge = b"realm=\"corp.local\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",charset=utf-8,algorithm=md5-sess";
        let op = Tag::Seq(Seq {
            id: 1,
            class: TagClass::Application,
            inner: vec![
                Tag::Enum(Enum {
                    inner: 14,
                    ..Default::default()
                }),
                Tag::OctetStr(OctetStr::default()),
                Tag::OctetStr(OctetStr::default()),
                Tag::OctetStr(OctetStr {
                    id: 7,
                    class: TagClass::Context,
                    inner: challenge.to_vec(),
                }),
            ],
        });
        conn.send(req.msgid, op, None);
        let req = conn.recv();
        let parts = req.op.expect_constructed().unwrap();
        let sasl = parts[2].clone().expect_constructed().unwrap();
        let reply = String::from_utf8(sasl[1].clone().expect_primitive().unwrap()).unwrap();
        assert!(reply.contains("username=\"jdoe\""));
        assert!(reply.contains("nonce=\"OA6MG9tEQGm2hh\""));
        assert!(reply.contains("digest-uri=\"ldap/127.0.0.1\""));
        assert!(reply.contains("nc=00000001"));
        conn.send(req.msgid, result_op(1, 0), None);
    });
    let mut client = server.client();
    let res = client.sasl_digest_md5_bind("jdoe", "secret").unwrap();
    assert_eq!(res.rc, 0);
    assert!(client.is_connected(true));
    server.finish();
}

#[test]
fn root_dn_discovery_and_well_known_lookup() {
    let server = ScriptedServer::start(|mut conn| {
        // root DSE read
        let req = conn.recv();
        assert_eq!(req.op.id, 3);
        let parts = req.op.clone().expect_constructed().unwrap();
        assert!(parts[0].clone().expect_primitive().unwrap().is_empty());
        // scope must be base
        assert_eq!(parts[1].clone().expect_primitive().unwrap(), vec![0]);
        conn.send(
            req.msgid,
            entry_op("", &[("rootDomainNamingContext", &["DC=corp,DC=local"])]),
            None,
        );
        conn.send(req.msgid, result_op(5, 0), None);
        // wellKnownObjects read off the root object
        let req = conn.recv();
        let parts = req.op.clone().expect_constructed().unwrap();
        assert_eq!(
            parts[0].clone().expect_primitive().unwrap(),
            b"DC=corp,DC=local".to_vec()
        );
        conn.send(
            req.msgid,
            entry_op(
                "DC=corp,DC=local",
                &[(
                    "wellKnownObjects",
                    &[
                        "B:32:A9D1CA15768811D1ADED00C04FD8D5CD:CN=Users,DC=corp,DC=local",
                        "B:32:AA312825768811D1ADED00C04FD8D5CD:CN=Computers,DC=corp,DC=local",
                    ],
                )],
            ),
            None,
        );
        conn.send(req.msgid, result_op(5, 0), None);
    });
    let mut client = server.client();
    assert_eq!(client.discover_root_dn().unwrap(), "DC=corp,DC=local");
    let dn = client
        .well_known_object_dn(WellKnownContainer::Computers)
        .unwrap();
    assert_eq!(dn.as_deref(), Some("CN=Computers,DC=corp,DC=local"));
    // cached: no further round trip
    assert_eq!(client.discover_root_dn().unwrap(), "DC=corp,DC=local");
    server.finish();
}

#[test]
fn search_object_restores_scope() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        let parts = req.op.clone().expect_constructed().unwrap();
        assert_eq!(parts[1].clone().expect_primitive().unwrap(), vec![0]);
        conn.send(req.msgid, entry_op("cn=x,dc=e", &[("cn", &["x"])]), None);
        conn.send(req.msgid, result_op(5, 0), None);
    });
    let mut client = server.client();
    client.search_options_mut().scope = Scope::Subtree;
    let entry = client.search_object("cn=x,dc=e", "", &["cn"]).unwrap();
    assert_eq!(entry.unwrap().dn, "cn=x,dc=e");
    assert_eq!(client.search_options_mut().scope, Scope::Subtree);
    server.finish();
}

#[test]
fn unbind_resets_client_state() {
    let server = ScriptedServer::start(|mut conn| {
        let req = conn.recv();
        conn.send(req.msgid, result_op(1, 0), None);
        // the unbind notification may or may not arrive before the
        // client closes; accept either
        let mut rest = Vec::new();
        let _ = conn.stream.read_to_end(&mut rest);
    });
    let mut client = server.client();
    client.simple_bind("", "").unwrap();
    assert!(client.is_connected(true));
    client.unbind().unwrap();
    assert!(!client.is_connected(true));
    assert_eq!(client.last_id(), 0);
    server.finish();
}
