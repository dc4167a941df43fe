//! Get Tests
//!
//! Tests for direct fetches and redirect following.

#[path = "../common/mod.rs"]
mod common;

use common::{connect, spawn_peer, PeerConn};
use fcpstore::ops::{Event, GetOptions};
use fcpstore::protocol::MessageName;
use fcpstore::FcpError;

/// Answer one ClientGet with a redirect; returns the requested URI
fn redirect(conn: &mut PeerConn, code: &str, to: &str) -> String {
    let get = conn.expect("ClientGet");
    conn.send(
        "GetFailed",
        &[
            ("Identifier", get.identifier()),
            ("Code", code),
            ("ShortCodeDescription", "New URI"),
            ("RedirectURI", to),
        ],
    );
    get.get("URI").unwrap_or("").to_string()
}

#[test]
fn test_get_returns_all_data() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        let id = get.identifier();
        conn.send("DataFound", &[("Identifier", id), ("DataLength", "5")]);
        conn.send_data("AllData", &[("Identifier", id)], b"\x00\n\r\xffz");
        get
    });

    let mut node = connect(&peer);
    let data = node.get("CHK@abc/file").unwrap();
    let get = peer.join();

    assert_eq!(&data[..], b"\x00\n\r\xffz");
    assert_eq!(get.get("URI"), Some("CHK@abc/file"));
    assert_eq!(get.get("ReturnType"), Some("direct"));
    assert!(get.identifier().starts_with("get-"));
}

#[test]
fn test_get_empty_data() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"");
    });

    let mut node = connect(&peer);
    let data = node.get("CHK@empty").unwrap();
    peer.join();

    assert!(data.is_empty());
}

#[test]
fn test_get_follows_redirects_in_order() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let mut requested = vec![
            redirect(conn, "27", "USK@k/site/2"),
            redirect(conn, "24", "USK@k/site/3"),
            redirect(conn, "27", "USK@k/site/4"),
        ];
        requested.push(conn.serve_get(b"final"));
        requested
    });

    let mut node = connect(&peer);
    let mut events = Vec::new();
    let data = node
        .get_with(
            "USK@k/site/1",
            &GetOptions::default(),
            &mut |e: &Event| events.push(e.clone()),
        )
        .unwrap();
    let requested = peer.join();

    assert_eq!(&data[..], b"final");
    assert_eq!(
        requested,
        vec!["USK@k/site/1", "USK@k/site/2", "USK@k/site/3", "USK@k/site/4"]
    );

    let hops: Vec<(String, String)> = events
        .into_iter()
        .filter_map(|e| match e {
            Event::Redirect { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        hops,
        vec![
            ("USK@k/site/1".to_string(), "USK@k/site/2".to_string()),
            ("USK@k/site/2".to_string(), "USK@k/site/3".to_string()),
            ("USK@k/site/3".to_string(), "USK@k/site/4".to_string()),
        ]
    );
}

#[test]
fn test_get_redirect_limit() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        for n in 1..=3 {
            redirect(conn, "27", &format!("USK@k/loop/{}", n + 1));
        }
        conn.drain()
    });

    let mut node = connect(&peer);
    let options = GetOptions {
        max_redirects: 2,
        ..node.get_options()
    };
    let result = node.get_with("USK@k/loop/1", &options, &mut |_: &Event| {});
    node.shutdown();
    let extra = peer.join();

    match result {
        Err(FcpError::RedirectLoopExceeded { hops, last_uri }) => {
            assert_eq!(hops, 2);
            assert_eq!(last_uri, "USK@k/loop/4");
        }
        other => panic!("Expected RedirectLoopExceeded, got {:?}", other),
    }
    // No fourth request after giving up
    assert!(extra.is_empty());
}

#[test]
fn test_get_zero_redirects_allowed() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        redirect(conn, "24", "USK@k/site/9");
    });

    let mut node = connect(&peer);
    let options = GetOptions {
        max_redirects: 0,
        ..GetOptions::default()
    };
    let result = node.get_with("USK@k/site/8", &options, &mut |_: &Event| {});
    peer.join();

    assert!(matches!(
        result,
        Err(FcpError::RedirectLoopExceeded { hops: 0, .. })
    ));
}

#[test]
fn test_get_failure_code_is_fatal() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        conn.send(
            "GetFailed",
            &[
                ("Identifier", get.identifier()),
                ("Code", "28"),
                ("ShortCodeDescription", "All data not found"),
                ("CodeDescription", "Not enough data found"),
                // Ignored for non-redirect codes
                ("RedirectURI", "CHK@elsewhere"),
            ],
        );
    });

    let mut node = connect(&peer);
    let result = node.get("CHK@missing");
    peer.join();

    match result {
        Err(FcpError::OperationFailed {
            operation,
            code,
            short,
            ..
        }) => {
            assert_eq!(operation, "ClientGet");
            assert_eq!(code, 28);
            assert_eq!(short, "All data not found");
        }
        other => panic!("Expected OperationFailed, got {:?}", other),
    }
}

#[test]
fn test_get_redirect_code_without_target_is_fatal() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        conn.send("GetFailed", &[("Identifier", get.identifier()), ("Code", "27")]);
    });

    let mut node = connect(&peer);
    let result = node.get("USK@k/site/1");
    peer.join();

    assert!(matches!(
        result,
        Err(FcpError::OperationFailed { code: 27, .. })
    ));
}

#[test]
fn test_get_protocol_error_is_fatal() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.expect("ClientGet");
        conn.send(
            "ProtocolError",
            &[("Code", "15"), ("CodeDescription", "Invalid URI")],
        );
    });

    let mut node = connect(&peer);
    let result = node.get("not-a-uri");
    peer.join();

    assert!(matches!(result, Err(FcpError::Protocol { code: 15, .. })));
}

#[test]
fn test_get_reports_progress_and_info() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        let id = get.identifier();
        conn.send(
            "SimpleProgress",
            &[("Identifier", id), ("Succeeded", "1"), ("Required", "2")],
        );
        conn.send("ExpectedHashes", &[("Identifier", id)]);
        conn.send_data("AllData", &[("Identifier", id)], b"ok");
    });

    let mut node = connect(&peer);
    let mut events = Vec::new();
    let data = node
        .get_with("CHK@x", &GetOptions::default(), &mut |e: &Event| {
            events.push(e.clone())
        })
        .unwrap();
    peer.join();

    assert_eq!(&data[..], b"ok");
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Progress { progress, .. } if progress.required == 2));
    assert!(matches!(
        &events[1],
        Event::Info { name: MessageName::ExpectedHashes, .. }
    ));
}

#[test]
fn test_sequential_gets_on_one_connection() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"first");
        conn.serve_get(b"second");
    });

    let mut node = connect(&peer);
    assert_eq!(&node.get("CHK@1").unwrap()[..], b"first");
    assert_eq!(&node.get("CHK@2").unwrap()[..], b"second");
    peer.join();
}

#[test]
fn test_get_identifier_collision_is_fatal() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        conn.send("IdentifierCollision", &[("Identifier", get.identifier())]);
        conn.drain();
    });

    let mut node = connect(&peer);
    let result = node.get("CHK@dup");
    node.shutdown();
    peer.join();

    match result {
        Err(FcpError::IdentifierCollision(identifier)) => assert!(identifier.starts_with("get-")),
        other => panic!("Expected IdentifierCollision, got {:?}", other),
    }
}
