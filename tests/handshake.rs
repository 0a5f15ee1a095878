mod common;

use serde_json::json;

use common::{config, init_tracing, FakeCamera, ScriptedTransport, NONCE, PASSWORD, TOKEN};
use vigi::crypto::credential_digest;
use vigi::handshake::{self, ClientHandshake, HandshakeError};
use vigi::{Session, SessionState, TransportError};

#[tokio::test]
async fn login_seals_digest_and_nonce() {
    init_tracing();
    let mut camera = FakeCamera::new();
    let mut session = Session::new(config());

    let token = handshake::authenticate(&mut session, &mut camera).await.unwrap();

    assert_eq!(token.as_str(), TOKEN);
    assert_eq!(session.token().map(|t| t.as_str()), Some(TOKEN));
    assert!(matches!(session.state(), SessionState::Authenticated { .. }));
    assert!(session.authenticated_since().is_some());
    assert_eq!(
        camera.login_plaintext.as_deref(),
        Some(format!("{}:{}", credential_digest(PASSWORD), NONCE).as_str())
    );
    assert_eq!(camera.paths(), vec!["/", "/"]);
    let login = camera.requests[1].body.as_ref().unwrap();
    assert_eq!(login["method"], "do");
    assert_eq!(login["login"]["username"], "admin");
    assert_eq!(login["login"]["passwdType"], "md5");
    assert_eq!(login["login"]["encrypt_type"], "2");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let mut camera = FakeCamera::new();
    let mut bad = config();
    bad.password = "nope".into();
    let mut session = Session::new(bad);

    let err = handshake::authenticate(&mut session, &mut camera).await.unwrap_err();

    assert!(matches!(err, HandshakeError::Rejected { code: Some(-40210) }));
    assert!(session.token().is_none());
    assert!(session.authenticated_since().is_none());
    assert_eq!(session.state(), &SessionState::Unauthenticated);
}

#[tokio::test]
async fn success_code_without_token_fails() {
    let mut camera = FakeCamera::new();
    camera.omit_token = true;
    let mut session = Session::new(config());

    let err = handshake::authenticate(&mut session, &mut camera).await.unwrap_err();

    assert!(matches!(err, HandshakeError::MissingToken));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn malformed_encrypt_info_stops_before_login() {
    let mut transport = ScriptedTransport::new(vec![Ok(json!({"error_code": 0, "data": {"nonce": "n"}}))]);
    let cfg = config();

    let err = ClientHandshake::new(&cfg).run(&mut transport).await.unwrap_err();

    assert!(matches!(err, HandshakeError::Protocol(_)));
    assert_eq!(transport.sent.len(), 1);
}

#[tokio::test]
async fn undecodable_key_is_a_crypto_error() {
    let mut transport = ScriptedTransport::new(vec![Ok(
        json!({"error_code": 0, "data": {"nonce": "n", "key": "!!not base64!!"}}),
    )]);
    let cfg = config();

    let err = ClientHandshake::new(&cfg).run(&mut transport).await.unwrap_err();

    assert!(matches!(err, HandshakeError::Crypto(_)));
}

#[tokio::test]
async fn transport_failure_leaves_session_untouched() {
    let mut transport = ScriptedTransport::new(vec![Err(TransportError::Connect("refused".into()))]);
    let mut session = Session::new(config());

    let err = handshake::authenticate(&mut session, &mut transport).await.unwrap_err();

    assert!(matches!(err, HandshakeError::Transport(TransportError::Connect(_))));
    assert_eq!(session.state(), &SessionState::Unauthenticated);
}

#[tokio::test]
async fn reauthentication_replaces_token() {
    let mut camera = FakeCamera::new();
    let mut session = Session::new(config());
    handshake::authenticate(&mut session, &mut camera).await.unwrap();
    handshake::authenticate(&mut session, &mut camera).await.unwrap();

    assert_eq!(camera.paths().len(), 4);
    assert!(session.is_authenticated());
}
