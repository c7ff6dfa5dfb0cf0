//! Client file loading and end-to-end runs from a file.

#![allow(clippy::unwrap_used)]

use std::io::Write;

use keyward_core::{ClientId, EventKind, WidgetAction};
use keyward_demo::{DemoConfig, DemoError, Outcome, load_clients, run};
use tempfile::NamedTempFile;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_clients_with_extra_fields() {
    let file = write_file(
        r#"[
            { "clientId": "app", "url": "https://sso.test/auth", "realm": "main", "scope": "openid" },
            { "clientId": "admin", "url": "https://sso.test/auth", "realm": "ops" }
        ]"#,
    );

    let clients = load_clients(file.path()).unwrap();

    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].client_id.as_deref(), Some("app"));
    assert_eq!(clients[0].extra["scope"], "openid");
    assert_eq!(clients[1].realm.as_deref(), Some("ops"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_clients(&dir.path().join("absent.json")).unwrap_err();

    assert!(matches!(err, DemoError::Io { .. }));
}

#[test]
fn malformed_file_is_a_json_error() {
    let file = write_file(r#"{ "clientId": "not-an-array" }"#);
    let err = load_clients(file.path()).unwrap_err();

    assert!(matches!(err, DemoError::Json { .. }));
    assert!(err.to_string().starts_with("failed to parse"));
}

#[test]
fn entry_without_realm_is_rejected_at_run() {
    let file = write_file(r#"[{ "clientId": "app", "url": "https://sso.test/auth" }]"#);
    let clients = load_clients(file.path()).unwrap();

    let err = run(DemoConfig { clients, ..Default::default() }).unwrap_err();

    assert_eq!(err.to_string(), "client #0: missing required configuration field `realm`");
}

#[test]
fn authenticated_run_logs_out_from_file() {
    let file = write_file(
        r#"[
            { "clientId": "app", "url": "https://sso.test/auth", "realm": "main" },
            { "clientId": "admin", "url": "https://sso.test/auth", "realm": "main" }
        ]"#,
    );
    let clients = load_clients(file.path()).unwrap();

    let report = run(DemoConfig {
        clients,
        outcome: Outcome::Scripted(true),
        logout: vec!["admin".to_string()],
        ..Default::default()
    })
    .unwrap();

    assert_eq!(report.renders[0].action, WidgetAction::Logout);
    assert_eq!(report.renders[1].action, WidgetAction::Login);
    assert!(report.renders[0].token.is_some());
    assert!(report.renders[1].token.is_none());

    let logouts: Vec<_> = report
        .deliveries
        .iter()
        .filter(|e| e.kind() == EventKind::Logout)
        .map(|e| e.requester().clone())
        .collect();
    assert_eq!(logouts, vec![ClientId::new("admin")]);
}

#[test]
fn seeded_runs_are_reproducible() {
    let file = write_file(
        r#"[
            { "clientId": "a", "url": "https://sso.test/auth", "realm": "main" },
            { "clientId": "b", "url": "https://sso.test/auth", "realm": "main" },
            { "clientId": "c", "url": "https://sso.test/auth", "realm": "main" }
        ]"#,
    );
    let clients = load_clients(file.path()).unwrap();
    let config = DemoConfig { clients, outcome: Outcome::Seeded(42), ..Default::default() };

    let first = run(config.clone()).unwrap();
    let second = run(config).unwrap();

    assert_eq!(first.renders, second.renders);
}
