//! Login flow integration tests.
//!
//! The assertion validator is stubbed; everything after it (profile schema,
//! claims, identity service, session store, redirects) runs for real.

use serde_json::json;
use uuid::Uuid;

use fib_session::{BusinessProfile, SessionStore, UserType};

use crate::common::{
    citizen_profile, employee_profile, location, query, raw_session_cookie, session_cookie,
    TestEnv,
};

const CITIZEN_ID: &str = "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e40";
const EMPLOYEE_ID: &str = "0190a6f2-4c1e-7b3a-9d5e-2f8c1a7b6e41";

/// A relay state on the application origin is followed.
#[tokio::test]
async fn test_citizen_login_follows_same_origin_relay_state() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(citizen_profile("010190-123A"));
    env.mock_citizen_login(200, json!({ "id": CITIZEN_ID })).await;

    let response = env
        .post_callback("citizen", "PHNhbWxwOlJlc3BvbnNlLz4=", Some("/citizen/applications/42"))
        .await?;

    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(
        location(&response).as_str(),
        "https://app.example.fi/citizen/applications/42"
    );

    let cookie = raw_session_cookie(&response).expect("session cookie");
    assert!(cookie.contains("HttpOnly"), "{cookie}");
    assert!(cookie.contains("Secure"), "{cookie}");
    assert!(cookie.contains("SameSite=Lax"), "{cookie}");

    let session = env.session_of(&response).await?.expect("stored session");
    assert_eq!(session.user.id(), Uuid::parse_str(CITIZEN_ID)?);
    assert_eq!(session.user.user_type(), UserType::Citizen);
    assert_eq!(session.saml_session.issuer, "https://idp.example.fi");
    assert_eq!(session.saml_session.session_index.as_deref(), Some("_c1f0a4b2"));
    let BusinessProfile::Citizen(profile) = &session.profile else {
        panic!("expected a citizen profile, got {:?}", session.profile);
    };
    assert_eq!(profile.social_security_number, "010190-123A");
    assert_eq!(profile.last_name, "Meikäläinen");

    let calls = env.identity_calls("/system/citizen-login").await?;
    assert_eq!(
        calls,
        vec![json!({
            "socialSecurityNumber": "010190-123A",
            "firstName": "Matti",
            "lastName": "Meikäläinen",
        })]
    );

    Ok(())
}

/// An off-origin relay state falls back to the default path.
#[tokio::test]
async fn test_off_origin_relay_state_is_ignored() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(citizen_profile("010190-123A"));
    env.mock_citizen_login(200, json!({ "id": CITIZEN_ID })).await;

    for relay_state in [
        "https://evil.example.com/steal",
        "//evil.example.com/steal",
        "http://app.example.fi/citizen",
        "https://app.example.fi:8443/citizen",
        "javascript:alert(1)",
    ] {
        let response = env.post_callback("citizen", "x", Some(relay_state)).await?;
        assert_eq!(response.status().as_u16(), 302);
        assert_eq!(
            location(&response).as_str(),
            "https://app.example.fi/citizen",
            "relay state {relay_state:?}"
        );
        assert!(session_cookie(&response).is_some(), "login itself succeeds");
    }

    Ok(())
}

/// A blank required attribute is rejected before the identity service is
/// called, and nothing is stored.
#[tokio::test]
async fn test_blank_ssn_is_rejected_before_identity_service() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(citizen_profile(""));
    env.mock_citizen_login(200, json!({ "id": CITIZEN_ID })).await;

    let response = env.post_callback("citizen", "x", Some("/citizen/applications/42")).await?;

    assert_eq!(response.status().as_u16(), 302);
    let target = location(&response);
    assert_eq!(target.path(), "/citizen/login");
    let params = query(&target);
    assert_eq!(params.get("loginError").map(String::as_str), Some("true"));
    assert!(!params.contains_key("errorCode"));

    assert!(session_cookie(&response).is_none());
    assert!(env.sessions.is_empty());
    assert!(env.identity_calls("/system/citizen-login").await?.is_empty());

    Ok(())
}

/// An SSN that does not look like a personal identity code is logged but
/// does not block the login.
#[tokio::test]
async fn test_malformed_ssn_still_logs_in() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(citizen_profile("not-an-ssn"));
    env.mock_citizen_login(200, json!({ "id": CITIZEN_ID })).await;

    let response = env.post_callback("citizen", "x", None).await?;

    assert_eq!(location(&response).as_str(), "https://app.example.fi/citizen");
    assert!(env.session_of(&response).await?.is_some());
    let calls = env.identity_calls("/system/citizen-login").await?;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["socialSecurityNumber"], "not-an-ssn");

    Ok(())
}

/// Missing federation claims fail the login without a remote call.
#[tokio::test]
async fn test_missing_name_id_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let mut profile = citizen_profile("010190-123A");
    if let Some(fields) = profile.as_object_mut() {
        fields.remove("nameID");
    }
    env.assertions.returns(profile);

    let response = env.post_callback("citizen", "x", None).await?;

    let target = location(&response);
    assert_eq!(target.path(), "/citizen/login");
    assert_eq!(query(&target).get("loginError").map(String::as_str), Some("true"));
    assert!(env.sessions.is_empty());
    assert!(env.identity_calls("/system/citizen-login").await?.is_empty());

    Ok(())
}

/// A failed assertion check redirects to the error page.
#[tokio::test]
async fn test_invalid_assertion_redirects_to_error_page() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.post_callback("employee", "garbage", None).await?;

    assert_eq!(response.status().as_u16(), 302);
    let target = location(&response);
    assert_eq!(target.origin().ascii_serialization(), "https://app.example.fi");
    assert_eq!(target.path(), "/employee/login");
    assert_eq!(query(&target).len(), 1);

    Ok(())
}

/// Employee logins carry roles and the prefixed external id.
#[tokio::test]
async fn test_employee_login() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions
        .returns(employee_profile("5f1c2d3e-0000-4000-8000-000000000001"));
    env.mock_employee_login(
        200,
        json!({
            "id": EMPLOYEE_ID,
            "globalRoles": ["ADMIN"],
            "allScopedRoles": ["UNIT_SUPERVISOR"],
        }),
    )
    .await;

    let response = env.post_callback("employee", "x", Some("/employee/units")).await?;

    assert_eq!(location(&response).as_str(), "https://app.example.fi/employee/units");
    let session = env.session_of(&response).await?.expect("stored session");
    assert_eq!(session.user.user_type(), UserType::Employee);
    assert_eq!(session.user.global_roles().to_vec(), vec!["ADMIN".to_string()]);
    assert_eq!(
        session.user.all_scoped_roles().to_vec(),
        vec!["UNIT_SUPERVISOR".to_string()]
    );

    let calls = env.identity_calls("/system/employee-login").await?;
    assert_eq!(
        calls,
        vec![json!({
            "externalId": "espoo-ad:5f1c2d3e-0000-4000-8000-000000000001",
            "firstName": "Essi",
            "lastName": "Esimies",
            "email": "essi.esimies@example.com",
        })]
    );

    Ok(())
}

/// An employee without any role cannot get a session.
#[tokio::test]
async fn test_employee_without_roles_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(employee_profile("5f1c2d3e-0000-4000-8000-000000000002"));
    env.mock_employee_login(
        200,
        json!({ "id": EMPLOYEE_ID, "globalRoles": [], "allScopedRoles": [] }),
    )
    .await;

    let response = env.post_callback("employee", "x", None).await?;

    assert_eq!(location(&response).path(), "/employee/login");
    assert!(session_cookie(&response).is_none());
    assert!(env.sessions.is_empty());

    Ok(())
}

/// A recognised 409 error code is passed on to the error page.
#[tokio::test]
async fn test_conflict_error_code_is_forwarded() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(employee_profile("5f1c2d3e-0000-4000-8000-000000000003"));
    env.mock_employee_login(409, json!({ "errorCode": "account-disabled" })).await;

    let response = env.post_callback("employee", "x", None).await?;

    let target = location(&response);
    assert_eq!(target.path(), "/employee/login");
    let params = query(&target);
    assert_eq!(params.get("loginError").map(String::as_str), Some("true"));
    assert_eq!(params.get("errorCode").map(String::as_str), Some("account-disabled"));
    assert!(env.sessions.is_empty());

    Ok(())
}

/// Unknown codes and other failures never reach the browser.
#[tokio::test]
async fn test_unknown_remote_errors_are_not_leaked() -> anyhow::Result<()> {
    for (status, body) in [
        (409, json!({ "errorCode": "internal-db-constraint-users_pkey" })),
        (409, json!({})),
        (500, json!({ "errorCode": "account-disabled" })),
    ] {
        let env = TestEnv::new().await?;
        env.assertions.returns(citizen_profile("010190-123A"));
        env.mock_citizen_login(status, body).await;

        let response = env.post_callback("citizen", "x", None).await?;

        let target = location(&response);
        assert_eq!(target.path(), "/citizen/login", "status {status}");
        let params = query(&target);
        assert_eq!(params.get("loginError").map(String::as_str), Some("true"));
        assert!(!params.contains_key("errorCode"), "status {status}: {target}");
        assert!(env.sessions.is_empty());
    }

    Ok(())
}

/// Two logins create two independent sessions.
#[tokio::test]
async fn test_each_login_creates_its_own_session() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    env.assertions.returns(citizen_profile("010190-123A"));
    env.mock_citizen_login(200, json!({ "id": CITIZEN_ID })).await;

    let first = env.post_callback("citizen", "x", None).await?;
    let second = env.post_callback("citizen", "x", None).await?;

    let (a, b) = (session_cookie(&first), session_cookie(&second));
    assert!(a.is_some() && b.is_some());
    assert_ne!(a, b);
    assert_eq!(env.sessions.len(), 2);
    assert!(env.sessions.get(&a.unwrap_or_default()).await?.is_some());

    Ok(())
}

/// Unknown providers have no endpoints.
#[tokio::test]
async fn test_unknown_provider_is_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.post_callback("nonexistent", "x", None).await?;
    assert_eq!(response.status().as_u16(), 404);

    let response = env.client.get(env.url("/auth/nonexistent/login")).send().await?;
    assert_eq!(response.status().as_u16(), 404);

    Ok(())
}
