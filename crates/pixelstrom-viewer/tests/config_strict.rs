#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pixelstrom_viewer::config::{self, BootstrapMode, Compression, SinkKind};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
reconnect:
  initial_backof_ms: 200 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.ws_url, "ws://localhost:3000/ws");
    assert_eq!(cfg.server.snapshot_url, "http://localhost:3000/api/current-screen");
    assert_eq!(cfg.channel.compression, Compression::Zstd);
    assert_eq!(cfg.channel.max_message_bytes, 32 * 1024 * 1024);
    assert_eq!(cfg.bootstrap.mode, BootstrapMode::Fetch);
    assert_eq!(cfg.reconnect.initial_backoff_ms, 500);
    assert_eq!(cfg.reconnect.max_backoff_ms, 10_000);
    assert_eq!(cfg.reconnect.max_attempts, 0);
    assert_eq!(cfg.display.sink, SinkKind::Log);
}

#[test]
fn full_config_parses() {
    let ok = r#"
version: 1
server:
  ws_url: "ws://canvas.example/ws"
  snapshot_url: "https://canvas.example/api/current-screen"
channel:
  compression: none
  max_message_bytes: 4096
bootstrap:
  mode: push
reconnect:
  initial_backoff_ms: 250
  max_backoff_ms: 2000
  max_attempts: 5
display:
  sink: ppm
  ppm_path: "/tmp/canvas.ppm"
  min_interval_ms: 0
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.channel.compression, Compression::Identity);
    assert_eq!(cfg.bootstrap.mode, BootstrapMode::Push);
    assert_eq!(cfg.display.sink, SinkKind::Ppm);
    assert_eq!(cfg.display.ppm_path.to_str(), Some("/tmp/canvas.ppm"));
}

#[test]
fn version_is_required() {
    let err = config::load_from_str("server: {}\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");

    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn out_of_range_values_fail_validation() {
    let cases = [
        "version: 1\nchannel: { max_message_bytes: 10 }\n",
        "version: 1\nreconnect: { initial_backoff_ms: 5 }\n",
        "version: 1\nreconnect: { initial_backoff_ms: 5000, max_backoff_ms: 1000 }\n",
        "version: 1\nreconnect: { max_backoff_ms: 999999 }\n",
        "version: 1\nserver: { ws_url: \"http://localhost:3000/ws\" }\n",
        "version: 1\nserver: { ws_url: \"wss://localhost:3000/ws\" }\n",
        "version: 1\nserver: { snapshot_url: \"ftp://x\" }\n",
        "version: 1\nchannel: { compression: gzip }\n",
    ];
    for yaml in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.code().as_str(), "CONFIG", "{yaml}");
    }
}

#[test]
fn missing_file_is_config_error() {
    let err = config::load_from_file("/definitely/not/here.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}
