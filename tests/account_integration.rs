mod common;

use common::{build_state, file_config, mint_token};
use flashgate::api::{Color, Language};
use mockito::Server;

#[tokio::test]
async fn test_file_backed_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let access = mint_token("ann", 3600);
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(format!(r#"{{"access": "{}", "refresh": "r-1"}}"#, access))
        .expect(1)
        .create_async()
        .await;
    let me = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", format!("Bearer {}", access).as_str())
        .with_status(200)
        .with_body(r#"{"username": "ann", "color": "yellow", "language": "fr"}"#)
        .expect(2)
        .create_async()
        .await;

    let yaml = file_config(&server.url(), &path);
    let first = build_state(&yaml);
    first.account.login("ann", "pw").await.unwrap();
    drop(first);

    let second = build_state(&yaml);
    let profile = second.account.restore().await.expect("session restored");

    me.assert_async().await;
    assert_eq!(profile.color, Color::Yellow);
    assert_eq!(profile.language, Language::Fr);

    second.account.logout();
    assert!(!build_state(&yaml).session().has_session());
}

#[tokio::test]
async fn test_restore_with_dead_refresh_token_goes_anonymous() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/auth/refresh")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let yaml = file_config(&server.url(), &path);
    let state = build_state(&yaml);
    state
        .session()
        .begin(&flashgate::store::CredentialPair::new(mint_token("ann", -30), "r-dead"))
        .unwrap();

    assert_eq!(state.account.restore().await, None);
    assert!(!state.session().has_session());
    assert!(!build_state(&yaml).session().has_session());
}
