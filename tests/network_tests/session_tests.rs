//! Session Tests
//!
//! Tests for the handshake, peer version check and payload discipline.

#[path = "../common/mod.rs"]
mod common;

use common::{spawn_peer, GOOD_BUILD, GOOD_EXT_BUILD};
use fcpstore::config::VersionRequirement;
use fcpstore::network::{check_peer_version, Session};
use fcpstore::protocol::{Command, Message, NodeHello};
use fcpstore::{FcpError, Result};

// =============================================================================
// Helpers
// =============================================================================

/// Handshake against a peer that greets with `fields`
fn handshake_with(fields: &'static [(&'static str, &'static str)], check: bool) -> Result<Session> {
    let mut peer = spawn_peer(move |conn| {
        conn.hello_with(fields);
    });
    peer.config.check_version = check;

    let result = Session::connect(&peer.config);
    peer.join();
    result
}

fn assert_incompatible(result: Result<Session>, expected_field: &str) {
    match result {
        Err(FcpError::IncompatiblePeer { field, .. }) => assert_eq!(field, expected_field),
        Err(other) => panic!("Expected IncompatiblePeer, got {:?}", other),
        Ok(_) => panic!("Expected IncompatiblePeer, handshake succeeded"),
    }
}

fn hello(build: Option<u32>, ext_build: Option<u32>, revision: Option<&str>) -> NodeHello {
    NodeHello {
        build,
        ext_build,
        revision: revision.map(str::to_string),
        ..NodeHello::default()
    }
}

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_client_hello_fields() {
    let peer = spawn_peer(|conn| conn.accept_hello());

    let session = Session::connect(&peer.config).unwrap();
    let frame = peer.join();

    assert_eq!(frame.get("ExpectedVersion"), Some("2.0"));
    assert_eq!(frame.get("Name"), Some(session.client_name()));
    assert!(session.client_name().starts_with("fcpstore-"));
    assert_eq!(frame.terminator, "EndMessage");
}

#[test]
fn test_handshake_records_node_hello() {
    let session = handshake_with(
        &[
            ("Build", GOOD_BUILD),
            ("ExtBuild", GOOD_EXT_BUILD),
            ("Version", "Fred,0.7,1.0,1500"),
            ("FCPVersion", "2.0"),
            ("ConnectionIdentifier", "conn-42"),
        ],
        true,
    )
    .unwrap();

    let node = session.node();
    assert_eq!(node.build, Some(1500));
    assert_eq!(node.ext_build, Some(30));
    assert_eq!(node.fcp_version.as_deref(), Some("2.0"));
    assert_eq!(node.connection_identifier.as_deref(), Some("conn-42"));
}

#[test]
fn test_handshake_rejects_old_build() {
    let result = handshake_with(&[("Build", "1000"), ("ExtBuild", GOOD_EXT_BUILD)], true);
    assert_incompatible(result, "Build");
}

#[test]
fn test_handshake_build_one_below_with_new_revision() {
    let result = handshake_with(
        &[("Build", "1106"), ("ExtBuild", "24"), ("Revision", "16181")],
        true,
    );
    assert!(result.is_ok());
}

#[test]
fn test_handshake_build_one_below_with_old_revision() {
    let result = handshake_with(
        &[("Build", "1106"), ("ExtBuild", "24"), ("Revision", "16180")],
        true,
    );
    assert_incompatible(result, "Revision");
}

#[test]
fn test_handshake_build_one_below_with_custom_revision() {
    let result = handshake_with(
        &[("Build", "1106"), ("ExtBuild", "24"), ("Revision", "@custom@")],
        true,
    );
    assert!(result.is_ok());
}

#[test]
fn test_handshake_rejects_old_ext_build() {
    let result = handshake_with(&[("Build", GOOD_BUILD), ("ExtBuild", "23")], true);
    assert_incompatible(result, "ExtBuild");
}

#[test]
fn test_handshake_check_disabled() {
    let session = handshake_with(&[("Build", "1")], false).unwrap();
    assert_eq!(session.node().build, Some(1));
}

#[test]
fn test_handshake_rejects_other_reply() {
    let mut peer = spawn_peer(|conn| {
        conn.expect("ClientHello");
        conn.send("CloseConnectionDuplicateClientName", &[]);
    });
    peer.config.check_version = false;

    let result = Session::connect(&peer.config);
    peer.join();

    assert!(matches!(result, Err(FcpError::HandshakeFailed(_))));
}

#[test]
fn test_handshake_rejects_greeting_with_payload() {
    let peer = spawn_peer(|conn| {
        conn.expect("ClientHello");
        conn.send_data(
            "NodeHello",
            &[("Build", GOOD_BUILD), ("ExtBuild", GOOD_EXT_BUILD)],
            b"xx",
        );
    });

    let result = Session::connect(&peer.config);
    peer.join();

    assert!(matches!(result, Err(FcpError::HandshakeFailed(_))));
}

#[test]
fn test_handshake_peer_hangs_up() {
    let peer = spawn_peer(|conn| {
        conn.expect("ClientHello");
    });

    let result = Session::connect(&peer.config);
    peer.join();

    assert!(matches!(result, Err(FcpError::ConnectionClosed)));
}

// =============================================================================
// Version Check Tests
// =============================================================================

#[test]
fn test_check_peer_version_thresholds() {
    let required = VersionRequirement::default();

    assert!(check_peer_version(&hello(Some(1107), Some(24), None), &required).is_ok());
    assert!(check_peer_version(&hello(Some(1106), Some(24), Some("20000")), &required).is_ok());
    assert!(check_peer_version(&hello(Some(1105), Some(24), Some("@custom@")), &required).is_err());
    assert!(check_peer_version(&hello(Some(1106), Some(24), None), &required).is_err());
    assert!(check_peer_version(&hello(Some(1106), Some(23), Some("@custom@")), &required).is_err());
}

#[test]
fn test_check_peer_version_missing_fields() {
    let required = VersionRequirement::default();

    let err = check_peer_version(&hello(None, Some(24), None), &required).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Incompatible peer: Build is missing, need at least 1107"
    );

    let err = check_peer_version(&hello(Some(1200), None, None), &required).unwrap_err();
    assert!(matches!(err, FcpError::IncompatiblePeer { field: "ExtBuild", .. }));
}

#[test]
fn test_check_peer_version_custom_requirement() {
    let required = VersionRequirement {
        min_build: 10,
        min_ext_build: 1,
        min_revision: 5,
        custom_revision: "dev".to_string(),
    };

    assert!(check_peer_version(&hello(Some(9), Some(1), Some("dev")), &required).is_ok());
    assert!(check_peer_version(&hello(Some(9), Some(1), Some("5")), &required).is_ok());
    assert!(check_peer_version(&hello(Some(9), Some(1), Some("4")), &required).is_err());
}

// =============================================================================
// Payload Discipline Tests
// =============================================================================

#[test]
fn test_unread_payload_blocks_next_frame() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.send_data("AllData", &[("Identifier", "x")], b"abc");
        conn.send("SimpleProgress", &[("Identifier", "x"), ("Total", "1")]);
    });

    let mut session = Session::connect(&peer.config).unwrap();

    let first = session.read_message().unwrap();
    assert!(matches!(first, Message::AllData { data_length: 3, .. }));
    assert_eq!(session.pending_payload(), Some(3));

    assert!(matches!(session.read_message(), Err(FcpError::UnreadPayload(3))));
    assert!(matches!(
        session.send_command(&Command::new("WatchGlobal")),
        Err(FcpError::UnreadPayload(3))
    ));

    assert_eq!(&session.read_payload().unwrap()[..], b"abc");
    assert_eq!(session.pending_payload(), None);
    assert!(matches!(
        session.read_message().unwrap(),
        Message::SimpleProgress { .. }
    ));

    peer.join();
}

#[test]
fn test_skip_payload_realigns_stream() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.send_data("ExpectedHashes", &[("Identifier", "x")], b"\nEndMessage\n");
        conn.send("PutSuccessful", &[("Identifier", "x"), ("URI", "CHK@done")]);
    });

    let mut session = Session::connect(&peer.config).unwrap();

    session.read_message().unwrap();
    session.skip_payload().unwrap();
    // Skipping with nothing pending is a no-op
    session.skip_payload().unwrap();

    match session.read_message().unwrap() {
        Message::PutSuccessful { uri, .. } => assert_eq!(uri, "CHK@done"),
        other => panic!("Expected PutSuccessful, got {:?}", other),
    }

    peer.join();
}

#[test]
fn test_read_payload_without_pending_is_error() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
    });

    let mut session = Session::connect(&peer.config).unwrap();
    peer.join();

    assert!(matches!(session.read_payload(), Err(FcpError::Decode(_))));
}

#[test]
fn test_command_sent_after_hello() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.expect("WatchGlobal")
    });

    let mut session = Session::connect(&peer.config).unwrap();
    session
        .send_command(&Command::new("WatchGlobal").field("Enabled", true))
        .unwrap();
    let frame = peer.join();

    assert_eq!(frame.get("Enabled"), Some("true"));
}

#[test]
fn test_payload_sent_after_command() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.expect("ClientPut")
    });

    let mut session = Session::connect(&peer.config).unwrap();
    let cmd = Command::new("ClientPut")
        .field("URI", "CHK@")
        .field("UploadFrom", "direct")
        .field("DataLength", 6);
    session.send_command(&cmd).unwrap();
    session.send_payload(b"abcdef").unwrap();
    let frame = peer.join();

    assert_eq!(frame.terminator, "Data");
    assert_eq!(frame.payload.as_deref(), Some(&b"abcdef"[..]));
}

#[test]
fn test_non_numeric_build_with_check_disabled() {
    let session = handshake_with(&[("Build", "unstable-dev"), ("ExtBuild", "x")], false).unwrap();

    assert_eq!(session.node().build, None);
    assert_eq!(session.node().ext_build, None);
}

#[test]
fn test_non_numeric_build_with_check_enabled() {
    let result = handshake_with(&[("Build", "unstable-dev"), ("ExtBuild", GOOD_EXT_BUILD)], true);
    assert_incompatible(result, "Build");
}
