//! End-to-end logins with real signed SAML responses.
//!
//! The identity provider side is played by the test: it reads the
//! AuthnRequest from the login redirect, answers with an assertion signed
//! by `fixtures/idp-key.pem` over its Exclusive C14N form, and posts it to
//! the assertion consumer service.

use base64::Engine;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;

use fib_crypto::RsaAlgorithm;
use fib_saml::bindings::RedirectQuery;
use fib_saml::xml::XmlDocument;

use crate::common::{fixture, location, query, session_cookie, Options, TestEnv, CITIZEN_IDP};

const ACS: &str = "https://app.example.fi/auth/citizen/login/callback";
const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Starts a login and returns the AuthnRequest ID.
async fn start_login(env: &TestEnv) -> anyhow::Result<String> {
    let response = env.client.get(env.url("/auth/citizen/login")).send().await?;
    let target = location(&response);
    let redirect = RedirectQuery::parse(target.query().unwrap_or_default())?;
    let doc = XmlDocument::parse(redirect.xml()?)?;
    doc.root()
        .attr("ID")
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("AuthnRequest without ID"))
}

struct IdpResponse<'a> {
    in_response_to: &'a str,
    audience: &'a str,
    ssn: &'a str,
    signing_key: &'a str,
}

/// A well-formed answer to `in_response_to`.
fn idp_response(in_response_to: &str) -> IdpResponse<'_> {
    IdpResponse {
        in_response_to,
        audience: "https://app.example.fi/citizen",
        ssn: "010190-123A",
        signing_key: "idp-key.pem",
    }
}

impl IdpResponse<'_> {
    /// The base64 `SAMLResponse` with a signed assertion.
    fn encode(&self) -> anyhow::Result<String> {
        let now = Utc::now();
        let ts = |t: chrono::DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let (issued, not_before, not_after) = (
            ts(now),
            ts(now - Duration::minutes(1)),
            ts(now + Duration::minutes(5)),
        );

        // On the wire the assertion inherits `saml` from the response and
        // lists its attributes unsorted; the digest covers the canonical form.
        let head = format!(
            r#"<saml:Assertion Version="2.0" ID="_a1" IssueInstant="{issued}"><saml:Issuer>{CITIZEN_IDP}</saml:Issuer>"#
        );
        let canonical_head = format!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_a1" IssueInstant="{issued}" Version="2.0"><saml:Issuer>{CITIZEN_IDP}</saml:Issuer>"#
        );
        let tail = format!(
            r#"<saml:Subject><saml:NameID Format="urn:oasis:names:tc:SAML:2.0:nameid-format:transient">AAdzZWNyZXQx</saml:NameID><saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer"><saml:SubjectConfirmationData InResponseTo="{irt}" NotOnOrAfter="{not_after}" Recipient="{ACS}"></saml:SubjectConfirmationData></saml:SubjectConfirmation></saml:Subject><saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_after}"><saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction></saml:Conditions><saml:AuthnStatement AuthnInstant="{issued}" SessionIndex="_s1"></saml:AuthnStatement><saml:AttributeStatement><saml:Attribute Name="urn:oid:1.2.246.21"><saml:AttributeValue>{ssn}</saml:AttributeValue></saml:Attribute><saml:Attribute Name="urn:oid:2.5.4.42"><saml:AttributeValue>Matti</saml:AttributeValue></saml:Attribute><saml:Attribute Name="urn:oid:2.5.4.4"><saml:AttributeValue>Meikäläinen</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion>"#,
            irt = self.in_response_to,
            audience = self.audience,
            ssn = self.ssn,
        );

        let b64 = base64::engine::general_purpose::STANDARD;
        let digest = b64.encode(fib_crypto::sha256(format!("{canonical_head}{tail}").as_bytes()));
        let alg = RsaAlgorithm::RsaSha256.uri();
        let signed_info = format!(
            r##"<ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/><ds:SignatureMethod Algorithm="{alg}"/><ds:Reference URI="#_a1"><ds:Transforms><ds:Transform Algorithm="{ENVELOPED}"/><ds:Transform Algorithm="{EXC_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo>"##
        );
        let canonical_signed_info = format!(
            r##"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"></ds:CanonicalizationMethod><ds:SignatureMethod Algorithm="{alg}"></ds:SignatureMethod><ds:Reference URI="#_a1"><ds:Transforms><ds:Transform Algorithm="{ENVELOPED}"></ds:Transform><ds:Transform Algorithm="{EXC_C14N}"></ds:Transform></ds:Transforms><ds:DigestMethod Algorithm="{SHA256}"></ds:DigestMethod><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo>"##
        );
        let key = fib_crypto::private_key_der(&std::fs::read_to_string(fixture(self.signing_key))?)?;
        let signature = b64.encode(fib_crypto::rsa_sign(
            &key,
            canonical_signed_info.as_bytes(),
            RsaAlgorithm::RsaSha256,
        )?);

        let response = format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0" IssueInstant="{issued}" Destination="{ACS}" InResponseTo="{irt}"><saml:Issuer>{CITIZEN_IDP}</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>{head}<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">{signed_info}<ds:SignatureValue>{signature}</ds:SignatureValue></ds:Signature>{tail}</samlp:Response>"#,
            irt = self.in_response_to,
        );
        Ok(b64.encode(response))
    }
}

async fn env_with_identity_service() -> anyhow::Result<TestEnv> {
    let env = TestEnv::start(Options {
        real_validator: true,
        ..Options::default()
    })
    .await?;
    env.mock_citizen_login(200, json!({ "id": "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e40" })).await;
    Ok(env)
}

fn is_login_error(response: &reqwest::Response) -> bool {
    let target = location(response);
    target.path() == "/citizen/login" && query(&target).contains_key("loginError")
}

/// A correctly signed response for an outstanding request logs in.
#[tokio::test]
async fn test_signed_response_logs_in() -> anyhow::Result<()> {
    let env = env_with_identity_service().await?;
    let request_id = start_login(&env).await?;

    let saml_response = idp_response(&request_id).encode()?;
    let response = env.post_callback("citizen", &saml_response, Some("/citizen/decisions")).await?;

    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen/decisions");
    let session = env.session_of(&response).await?.expect("stored session");
    assert_eq!(session.saml_session.name_id, "AAdzZWNyZXQx");
    assert_eq!(session.saml_session.session_index.as_deref(), Some("_s1"));

    Ok(())
}

/// A request ID can be answered once.
#[tokio::test]
async fn test_replayed_response_is_rejected() -> anyhow::Result<()> {
    let env = env_with_identity_service().await?;
    let request_id = start_login(&env).await?;
    let saml_response = idp_response(&request_id).encode()?;

    let first = env.post_callback("citizen", &saml_response, None).await?;
    assert!(session_cookie(&first).is_some());

    let replay = env.post_callback("citizen", &saml_response, None).await?;
    assert!(is_login_error(&replay));
    assert!(session_cookie(&replay).is_none());
    assert_eq!(env.sessions.len(), 1);

    Ok(())
}

/// Unsolicited responses, foreign signers and other audiences are refused.
#[tokio::test]
async fn test_untrusted_responses_are_rejected() -> anyhow::Result<()> {
    let env = env_with_identity_service().await?;

    let unsolicited = idp_response("_never-issued").encode()?;
    let response = env.post_callback("citizen", &unsolicited, None).await?;
    assert!(is_login_error(&response));

    let request_id = start_login(&env).await?;
    let forged = IdpResponse {
        signing_key: "sp-key.pem",
        ..idp_response(&request_id)
    }
    .encode()?;
    let response = env.post_callback("citizen", &forged, None).await?;
    assert!(is_login_error(&response));

    let request_id = start_login(&env).await?;
    let elsewhere = IdpResponse {
        audience: "https://other.example.fi",
        ..idp_response(&request_id)
    }
    .encode()?;
    let response = env.post_callback("citizen", &elsewhere, None).await?;
    assert!(is_login_error(&response));

    assert!(env.sessions.is_empty());
    assert!(env.identity_calls("/system/citizen-login").await?.is_empty());

    Ok(())
}
