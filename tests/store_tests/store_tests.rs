//! Store Tests
//!
//! Tests for the read-through store, range readers and scheme handles.

#[path = "../common/mod.rs"]
mod common;

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::thread;

use common::spawn_peer;
use fcpstore::store::register_scheme;
use fcpstore::{Config, FcpError, RemoteStore};

const BASE: &str = "USK@k/repo/1/";

// =============================================================================
// Fetch-Once Tests
// =============================================================================

#[test]
fn test_repeated_reads_fetch_once() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let uri = conn.serve_get(b"0123456789");
        (uri, conn.drain())
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("data/00changelog.i");

    assert_eq!(&reader.read_chunk(Some(4)).unwrap()[..], b"0123");
    assert_eq!(&reader.read_chunk(Some(3)).unwrap()[..], b"456");
    reader.seek_to(1);
    assert_eq!(&reader.read_chunk(None).unwrap()[..], b"123456789");

    // A second handle on the same path is served from the cache
    let mut again = store.open("data/00changelog.i");
    assert_eq!(again.len().unwrap(), 10);
    assert!(store.cache().contains("USK@k/repo/1/data/00changelog.i"));

    drop(reader);
    drop(again);
    drop(store);
    let (uri, extra) = peer.join();

    assert_eq!(uri, "USK@k/repo/1/data/00changelog.i");
    assert!(extra.is_empty(), "unexpected requests: {:?}", extra);
}

#[test]
fn test_open_and_seek_do_no_io() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.drain()
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("store/fncache");
    reader.seek_to(100);

    assert_eq!(reader.position(), 100);
    assert!(!reader.is_fetched());
    assert_eq!(reader.address(), "USK@k/repo/1/store/fncache");
    assert_eq!(store.address_of("requires"), "USK@k/repo/1/requires");
    assert_eq!(store.base(), BASE);

    drop(reader);
    drop(store);
    assert!(peer.join().is_empty());
}

#[test]
fn test_concurrent_handles_share_one_fetch() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"shared blob");
        conn.drain()
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                let mut reader = store.open("requires");
                reader.read_chunk(None).unwrap()
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(&worker.join().unwrap()[..], b"shared blob");
    }
    drop(store);
    assert!(peer.join().is_empty());
}

// =============================================================================
// Read and Seek Semantics
// =============================================================================

#[test]
fn test_read_chunk_at_and_past_end() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"abc");
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("f");

    reader.seek_to(2);
    assert_eq!(&reader.read_chunk(Some(10)).unwrap()[..], b"c");
    assert_eq!(reader.position(), 3);
    assert!(reader.read_chunk(Some(1)).unwrap().is_empty());

    reader.seek_to(50);
    assert!(reader.read_chunk(None).unwrap().is_empty());
    assert!(!reader.is_empty().unwrap());

    drop(reader);
    drop(store);
    peer.join();
}

#[test]
fn test_std_read_and_seek() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"hello, world");
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("greeting");

    assert_eq!(reader.seek(SeekFrom::Start(7)).unwrap(), 7);
    let mut rest = String::new();
    reader.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "world");

    assert_eq!(reader.seek(SeekFrom::End(-5)).unwrap(), 7);
    assert_eq!(reader.seek(SeekFrom::Current(-2)).unwrap(), 5);
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b", ");

    let err = reader.seek(SeekFrom::Current(-100)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(reader.position(), 7);

    drop(reader);
    drop(store);
    peer.join();
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_fetch_failure_propagates_and_is_not_cached() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        conn.send(
            "GetFailed",
            &[
                ("Identifier", get.identifier()),
                ("Code", "13"),
                ("ShortCodeDescription", "Data not found"),
            ],
        );
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("missing");

    let result = reader.read_chunk(None);
    assert!(matches!(
        result,
        Err(FcpError::OperationFailed { code: 13, .. })
    ));
    assert!(!reader.is_fetched());
    assert!(store.cache().is_empty());

    drop(reader);
    drop(store);
    peer.join();
}

#[test]
fn test_fetch_failure_through_std_read() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        let get = conn.expect("ClientGet");
        conn.send("GetFailed", &[("Identifier", get.identifier()), ("Code", "28")]);
    });

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    let mut reader = store.open("missing");

    let mut buf = [0u8; 8];
    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.to_string().contains("28"));

    drop(reader);
    drop(store);
    peer.join();
}

// =============================================================================
// Cache Limit Tests
// =============================================================================

#[test]
fn test_cache_limit_evicts_and_refetches() {
    let mut peer = spawn_peer(|conn| {
        conn.accept_hello();
        vec![
            conn.serve_get(b"aaa"),
            conn.serve_get(b"bbb"),
            conn.serve_get(b"aaa"),
        ]
    });
    peer.config.cache_limit_bytes = Some(4);

    let store = RemoteStore::connect(peer.config.clone(), BASE).unwrap();
    assert_eq!(&store.open("a").read_chunk(None).unwrap()[..], b"aaa");
    assert_eq!(&store.open("b").read_chunk(None).unwrap()[..], b"bbb");

    assert!(!store.cache().contains("USK@k/repo/1/a"));
    assert!(store.cache().contains("USK@k/repo/1/b"));
    assert_eq!(store.cache().total_bytes(), 3);

    assert_eq!(&store.open("a").read_chunk(None).unwrap()[..], b"aaa");

    drop(store);
    assert_eq!(
        peer.join(),
        vec!["USK@k/repo/1/a", "USK@k/repo/1/b", "USK@k/repo/1/a"]
    );
}

// =============================================================================
// Scheme Tests
// =============================================================================

#[test]
fn test_scheme_handle_matching() {
    let handle = register_scheme("freenet", Config::default());

    assert_eq!(handle.scheme(), "freenet");
    assert!(handle.matches("freenet://USK@k/repo/1"));
    assert!(!handle.matches("http://example.com"));
    assert!(!handle.matches("freenet:USK@k"));
    assert_eq!(handle.base_of("freenet://USK@k/repo/1"), Some("USK@k/repo/1"));
}

#[test]
fn test_scheme_handle_rejects_bad_urls() {
    let handle = register_scheme("freenet", Config::default());

    assert!(matches!(handle.open("http://x/"), Err(FcpError::Config(_))));
    assert!(matches!(handle.open("freenet://"), Err(FcpError::Config(_))));
}

#[test]
fn test_scheme_handle_opens_store() {
    let peer = spawn_peer(|conn| {
        conn.accept_hello();
        conn.serve_get(b"[paths]\n")
    });

    let handle = register_scheme("freenet", peer.config.clone());
    let store = handle.open("freenet://USK@k/repo/1").unwrap();
    assert_eq!(store.base(), "USK@k/repo/1/");

    let data = store.open(".hg/requires").read_chunk(None).unwrap();
    drop(store);
    let uri = peer.join();

    assert_eq!(&data[..], b"[paths]\n");
    assert_eq!(uri, "USK@k/repo/1/.hg/requires");
}
