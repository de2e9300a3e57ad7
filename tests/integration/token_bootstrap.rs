//! Token bootstrap and expression listing.

use eleonor::avatar::{AvatarControlClient, AvatarError, TokenStore};

use crate::helpers::{CLOSE, MockControlServer, ServerBehavior, avatar_config, write_token};

#[tokio::test]
async fn request_token_persists_issued_token() {
    let control = MockControlServer::start(ServerBehavior {
        issued_token: "fresh-token".to_owned(),
        ..ServerBehavior::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("vts_token.json");

    let client = AvatarControlClient::new(avatar_config(&control.url, path.clone()));
    let token = client.request_token().await.unwrap();
    assert_eq!(token.expose(), "fresh-token");

    let loaded = TokenStore::new(&path).load().await.unwrap();
    assert_eq!(loaded.expose(), "fresh-token");

    control.wait_for_closes(1).await;
    let received = control.received();
    assert_eq!(received[0].kind, "AuthenticationTokenRequest");
    assert_eq!(received[0].envelope["data"]["pluginName"], "EleonorAI");
    assert!(received[0].envelope["data"].get("authenticationToken").is_none());
    assert_eq!(control.kinds_on(0).last().map(String::as_str), Some(CLOSE));
}

#[tokio::test]
async fn list_expressions_authenticates_first() {
    let control = MockControlServer::start(ServerBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let token = write_token(dir.path(), "t").await;

    let client = AvatarControlClient::new(avatar_config(&control.url, token));
    let expressions = client.list_expressions().await.unwrap();

    assert_eq!(expressions.len(), 2);
    assert_eq!(expressions[0].name, "Feliz");
    assert_eq!(expressions[0].file, "Feliz.exp3.json");
    assert!(expressions[1].active);

    control.wait_for_closes(1).await;
    assert_eq!(
        control.kinds_on(0),
        vec!["AuthenticationRequest", "ExpressionStateRequest", CLOSE]
    );
}

#[tokio::test]
async fn list_expressions_without_token_never_connects() {
    let control = MockControlServer::start(ServerBehavior::default()).await;
    let dir = tempfile::tempdir().unwrap();

    let client = AvatarControlClient::new(avatar_config(
        &control.url,
        dir.path().join("vts_token.json"),
    ));
    let err = client.list_expressions().await.unwrap_err();
    assert!(matches!(err, AvatarError::MissingToken(_)));
    assert_eq!(control.connections(), 0);
}
