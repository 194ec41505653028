//! Live delivery specs
//!
//! Lines fed on stdin must reach the push endpoint, one request per
//! line, carrying the stream labels and the verbatim line.

use crate::prelude::*;

#[test]
fn lines_reach_the_endpoint_in_order() {
    let ship = Ship::new();
    let server = SinkServer::start(204, 2);

    ship.logshipd()
        .arg("--push-url")
        .arg(&server.url)
        .write_stdin("first line\nsecond line\n")
        .assert()
        .success();

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    for ((head, body), line) in requests.iter().zip(["first line", "second line"]) {
        assert!(head.starts_with("POST /push"));
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
        let payload: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(payload["streams"][0]["values"][0][1], line);
    }
}

#[test]
fn bearer_token_is_attached() {
    let ship = Ship::new();
    let server = SinkServer::start(204, 1);

    ship.logshipd()
        .arg("--push-url")
        .arg(&server.url)
        .arg("--push-token")
        .arg("s3cret")
        .write_stdin("hello\n")
        .assert()
        .success();

    let requests = server.finish();
    assert!(requests[0]
        .0
        .to_ascii_lowercase()
        .contains("authorization: bearer s3cret"));
}

#[test]
fn stream_labels_come_from_flags() {
    let ship = Ship::new();
    let server = SinkServer::start(204, 1);

    ship.logshipd()
        .arg("--push-url")
        .arg(&server.url)
        .arg("--job")
        .arg("ingress")
        .arg("--namespace")
        .arg("prod")
        .arg("--pod")
        .arg("ingress-0")
        .write_stdin("labelled\n")
        .assert()
        .success();

    let (_, body) = &server.finish()[0];
    let payload: serde_json::Value = serde_json::from_slice(body).unwrap();
    let stream = &payload["streams"][0]["stream"];
    assert_eq!(stream["job"], "ingress");
    assert_eq!(stream["namespace"], "prod");
    assert_eq!(stream["pod"], "ingress-0");
}

#[test]
fn pid_prefix_resolves_to_a_process_label() {
    let ship = Ship::new();
    let pid_file = ship.path("pid.map");
    std::fs::write(&pid_file, "running 42 1 router\n").unwrap();
    let server = SinkServer::start(204, 2);

    ship.logshipd()
        .arg("--push-url")
        .arg(&server.url)
        .arg("--pid-file")
        .arg(&pid_file)
        .write_stdin("[42:core] routed\nno pid prefix\n")
        .assert()
        .success();

    let requests = server.finish();
    let first: serde_json::Value = serde_json::from_slice(&requests[0].1).unwrap();
    assert_eq!(first["streams"][0]["stream"]["pid"], "42");
    assert_eq!(first["streams"][0]["stream"]["process"], "router");
    let second: serde_json::Value = serde_json::from_slice(&requests[1].1).unwrap();
    assert_eq!(second["streams"][0]["stream"]["pid"], "0");
    assert_eq!(second["streams"][0]["stream"]["process"], "unknown");
}
