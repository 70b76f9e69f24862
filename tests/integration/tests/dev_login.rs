//! Dev login integration tests.

use serde_json::Value;

use crate::common::{citizen_profile, location, query, session_cookie, Options, TestEnv};

async fn dev_login(env: &TestEnv, provider: &str, form: &[(&str, &str)]) -> anyhow::Result<reqwest::Response> {
    Ok(env
        .client
        .post(env.url(&format!("/dev-api/auth/{provider}/login")))
        .form(form)
        .send()
        .await?)
}

/// Without the startup flag the routes do not exist.
#[tokio::test]
async fn test_dev_login_is_absent_by_default() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.mock_citizen_login(200, serde_json::json!({ "id": "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e40" }))
        .await;

    let response = dev_login(
        &env,
        "citizen",
        &[
            ("socialSecurityNumber", "010190-123A"),
            ("firstName", "Matti"),
            ("lastName", "Meikäläinen"),
        ],
    )
    .await?;

    assert_eq!(response.status().as_u16(), 404);
    assert!(env.sessions.is_empty());
    assert!(env.identity_calls("/system/citizen-login").await?.is_empty());

    Ok(())
}

fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort_unstable();
    keys
}

/// A dev login stores a session of the same shape as a SAML login.
#[tokio::test]
async fn test_dev_login_matches_saml_session_shape() -> anyhow::Result<()> {
    let env = TestEnv::start(Options {
        dev_login: true,
        ..Options::default()
    })
    .await?;
    env.mock_citizen_login(200, serde_json::json!({ "id": "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e40" }))
        .await;

    let dev = dev_login(
        &env,
        "citizen",
        &[
            ("socialSecurityNumber", "010190-123A"),
            ("firstName", "Matti"),
            ("lastName", "Meikäläinen"),
            ("RelayState", "/citizen/applications/42"),
        ],
    )
    .await?;
    assert_eq!(dev.status().as_u16(), 302);
    assert_eq!(
        location(&dev).as_str(),
        "https://app.example.fi/citizen/applications/42"
    );
    let dev_session = env.session_of(&dev).await?.expect("dev session");
    assert_eq!(dev_session.saml_session.issuer, "urn:dev-login:citizen");
    assert_eq!(dev_session.saml_session.name_id, "010190-123A");

    env.assertions.returns(citizen_profile("010190-123A"));
    let saml = env.post_callback("citizen", "x", None).await?;
    let saml_session = env.session_of(&saml).await?.expect("saml session");

    let dev_json = serde_json::to_value(&dev_session)?;
    let saml_json = serde_json::to_value(&saml_session)?;
    assert_eq!(keys(&dev_json), keys(&saml_json));
    assert_eq!(keys(&dev_json["profile"]), keys(&saml_json["profile"]));
    assert_eq!(dev_json["id"], saml_json["id"]);
    assert_eq!(dev_json["userType"], saml_json["userType"]);
    assert_eq!(dev_json["authType"], saml_json["authType"]);
    assert_eq!(dev_json["profile"], saml_json["profile"]);

    Ok(())
}

/// Dev logins go through the same validation and redirects.
#[tokio::test]
async fn test_dev_login_validates_like_saml() -> anyhow::Result<()> {
    let env = TestEnv::start(Options {
        dev_login: true,
        ..Options::default()
    })
    .await?;

    let response = dev_login(
        &env,
        "employee",
        &[("firstName", "Essi"), ("lastName", "Esimies"), ("RelayState", "https://evil.example.com")],
    )
    .await?;

    let target = location(&response);
    assert_eq!(target.path(), "/employee/login");
    assert_eq!(query(&target).get("loginError").map(String::as_str), Some("true"));
    assert!(session_cookie(&response).is_none());
    assert!(env.identity_calls("/system/employee-login").await?.is_empty());

    let missing = dev_login(&env, "nonexistent", &[]).await?;
    assert_eq!(missing.status().as_u16(), 404);

    Ok(())
}
