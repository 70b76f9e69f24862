//! SAML endpoint integration tests.
//!
//! Login initiation, SP metadata and single logout. Outgoing messages are
//! checked against the SP certificate in `fixtures/`; incoming logout
//! responses are signed with the identity provider key.

use reqwest::header::{CONTENT_TYPE, COOKIE};
use serde_json::json;

use fib_crypto::RsaAlgorithm;
use fib_saml::bindings::{HttpRedirectBinding, RedirectQuery, SamlMessageType};
use fib_saml::signature::{RedirectSigner, XmlSignatureValidator};
use fib_saml::xml::XmlDocument;
use fib_session::SessionStore;

use crate::common::{
    citizen_profile, fixture, location, query, raw_session_cookie, session_cookie, TestEnv,
};

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).unwrap_or_else(|e| panic!("fixture {name}: {e}"))
}

/// Parses and verifies a signed redirect-binding URL issued by the SP.
fn verified_sp_message(url: &url::Url) -> anyhow::Result<(RedirectQuery, XmlDocument)> {
    let redirect = RedirectQuery::parse(url.query().unwrap_or_default())?;
    let validator = XmlSignatureValidator::from_pem(&[read_fixture("sp-cert.pem")])?;
    redirect.verify(&validator)?;
    let doc = XmlDocument::parse(redirect.xml()?)?;
    Ok((redirect, doc))
}

/// Logs a citizen in through the stubbed validator.
async fn citizen_session(env: &TestEnv) -> anyhow::Result<String> {
    env.assertions.returns(citizen_profile("010190-123A"));
    env.mock_citizen_login(200, json!({ "id": "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e40" })).await;
    let response = env.post_callback("citizen", "x", None).await?;
    session_cookie(&response).ok_or_else(|| anyhow::anyhow!("login did not set a cookie"))
}

/// Login initiation redirects to the identity provider with a signed
/// AuthnRequest.
#[tokio::test]
async fn test_login_redirects_with_signed_authn_request() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .client
        .get(env.url("/auth/citizen/login?RelayState=%2Fcitizen%2Fapplications"))
        .send()
        .await?;

    assert_eq!(response.status().as_u16(), 302);
    let target = location(&response);
    assert_eq!(target.host_str(), Some("idp.example.fi"));
    assert_eq!(target.path(), "/idp/profile/SAML2/Redirect/SSO");

    let (redirect, doc) = verified_sp_message(&target)?;
    assert_eq!(redirect.message_type, SamlMessageType::Request);
    assert_eq!(redirect.relay_state.as_deref(), Some("/citizen/applications"));
    assert_eq!(redirect.sig_alg.as_deref(), Some(RsaAlgorithm::RsaSha256.uri()));

    let request = doc.root();
    assert_eq!(request.name, "AuthnRequest");
    assert_eq!(
        request.attr("AssertionConsumerServiceURL"),
        Some("https://app.example.fi/auth/citizen/login/callback")
    );
    assert_eq!(
        request.attr("Destination"),
        Some("https://idp.example.fi/idp/profile/SAML2/Redirect/SSO")
    );
    assert_eq!(
        request.child("Issuer").and_then(|i| i.text_trimmed()),
        Some("https://app.example.fi/citizen")
    );
    assert!(request.child("NameIDPolicy").is_some());

    Ok(())
}

/// A tampered login redirect no longer verifies.
#[tokio::test]
async fn test_login_redirect_signature_covers_relay_state() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(env.url("/auth/employee/login?RelayState=%2Fa")).send().await?;
    let target = location(&response);
    let tampered = target.query().unwrap_or_default().replace("RelayState=%2Fa", "RelayState=%2Fb");

    let redirect = RedirectQuery::parse(&tampered)?;
    let validator = XmlSignatureValidator::from_pem(&[read_fixture("sp-cert.pem")])?;
    assert!(redirect.verify(&validator).is_err());

    Ok(())
}

/// SP metadata describes the endpoints and the signing certificate.
#[tokio::test]
async fn test_metadata_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(env.url("/auth/citizen/metadata")).send().await?;

    assert!(response.status().is_success(), "got {}", response.status());
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(content_type, "application/samlmetadata+xml");

    let body = response.text().await?;
    assert!(body.contains(r#"entityID="https://app.example.fi/citizen""#), "{body}");
    assert!(body.contains("SPSSODescriptor"));
    assert!(body.contains(r#"Location="https://app.example.fi/auth/citizen/login/callback""#));
    assert!(body.contains(r#"Location="https://app.example.fi/auth/citizen/logout/callback""#));
    assert!(body.contains("X509Certificate"));

    let missing = env.client.get(env.url("/auth/nonexistent/metadata")).send().await?;
    assert_eq!(missing.status().as_u16(), 404);

    Ok(())
}

/// Logout ends the session and starts single logout at the identity
/// provider with the stored NameID and SessionIndex.
#[tokio::test]
async fn test_logout_sends_signed_logout_request() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let session_id = citizen_session(&env).await?;

    let response = env
        .client
        .get(env.url("/auth/citizen/logout"))
        .header(COOKIE, format!("fib.session={session_id}"))
        .send()
        .await?;

    assert_eq!(response.status().as_u16(), 302);
    let cleared = raw_session_cookie(&response).expect("cookie is cleared");
    assert!(cleared.starts_with("fib.session=;"), "{cleared}");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
    assert!(env.sessions.get(&session_id).await?.is_none());

    let target = location(&response);
    assert_eq!(target.path(), "/idp/profile/SAML2/Redirect/SLO");
    let (_, doc) = verified_sp_message(&target)?;
    let request = doc.root();
    assert_eq!(request.name, "LogoutRequest");
    assert_eq!(
        request.child("NameID").and_then(|n| n.text_trimmed()),
        Some("AAdzZWNyZXQxL8XaBaPHSw")
    );
    assert_eq!(
        request.child("SessionIndex").and_then(|n| n.text_trimmed()),
        Some("_c1f0a4b2")
    );

    Ok(())
}

/// Without a session, or without a logout URL, logout lands on the
/// default path.
#[tokio::test]
async fn test_logout_without_single_logout() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(env.url("/auth/citizen/logout")).send().await?;
    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen");
    assert!(raw_session_cookie(&response).is_some_and(|c| c.contains("Max-Age=0")));

    let response = env
        .client
        .get(env.url("/auth/employee/logout"))
        .header(COOKIE, "fib.session=unknown")
        .send()
        .await?;
    assert_eq!(location(&response).as_str(), "https://app.example.fi/employee");

    Ok(())
}

fn logout_response_query(signing_key: &str, relay_state: Option<&str>) -> anyhow::Result<String> {
    let xml = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_lr1" Version="2.0" IssueInstant="2026-01-01T12:00:00Z" InResponseTo="_lq1"><saml:Issuer>https://idp.example.fi</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:LogoutResponse>"#;
    let signer = RedirectSigner::from_pem(&read_fixture(signing_key), RsaAlgorithm::RsaSha256)?;
    let url = HttpRedirectBinding::encode(
        xml,
        "https://app.example.fi/auth/citizen/logout/callback",
        relay_state,
        SamlMessageType::Response,
        Some(&signer),
    )?;
    Ok(url
        .split_once('?')
        .map(|(_, q)| q.to_string())
        .unwrap_or_default())
}

/// A LogoutResponse signed by the identity provider is followed to its
/// relay state.
#[tokio::test]
async fn test_logout_callback_follows_relay_state() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let query_string = logout_response_query("idp-key.pem", Some("/citizen/goodbye"))?;

    let response = env
        .client
        .get(env.url(&format!("/auth/citizen/logout/callback?{query_string}")))
        .send()
        .await?;

    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen/goodbye");

    Ok(())
}

/// A LogoutResponse signed with the wrong key, or pointing off-origin, ends
/// on the default path.
#[tokio::test]
async fn test_logout_callback_rejects_bad_signature_and_foreign_relay() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let forged = logout_response_query("sp-key.pem", Some("/citizen/goodbye"))?;
    let response = env
        .client
        .get(env.url(&format!("/auth/citizen/logout/callback?{forged}")))
        .send()
        .await?;
    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen");

    let foreign = logout_response_query("idp-key.pem", Some("https://evil.example.com/"))?;
    let response = env
        .client
        .get(env.url(&format!("/auth/citizen/logout/callback?{foreign}")))
        .send()
        .await?;
    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen");
    assert!(query(&location(&response)).is_empty());

    Ok(())
}
