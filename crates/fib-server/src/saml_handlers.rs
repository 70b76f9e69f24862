//! SAML endpoint handlers.
//!
//! Every flow error ends in a redirect. Only an unknown provider name or a
//! metadata failure produces an error status.

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use fib_core::{AuthEvent, EventType};
use fib_saml::bindings::{HttpRedirectBinding, RedirectQuery, SamlMessageType};
use fib_saml::metadata::sp_metadata;
use fib_saml::request::{AuthnRequest, LogoutRequest};
use fib_saml::response::LogoutResponse;
use fib_saml::signature::{RedirectSigner, XmlSignatureValidator};
use fib_saml::xml::XmlDocument;
use fib_saml::{resolve_redirect, SamlError, SamlResult};
use fib_session::EstablishedSession;
use serde::Deserialize;

use crate::cookie;
use crate::integrations::Integration;
use crate::login::{
    complete_login, failure_redirect, validate_assertion, LoginFailure, LoginOutcome, LoginRejection,
};
use crate::state::AppState;

/// RelayState query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct RelayParams {
    /// Where to go after the flow.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Form posted by the identity provider to the assertion consumer service.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackForm {
    /// Base64 response.
    #[serde(rename = "SAMLResponse", default)]
    pub saml_response: String,
    /// Round-tripped relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// A 302 to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

pub(crate) fn unknown_provider(provider: &str) -> Response {
    tracing::debug!(provider, "unknown identity provider");
    StatusCode::NOT_FOUND.into_response()
}

/// Turns a login result into the final redirect, setting the cookie on
/// success.
pub(crate) fn login_response(
    state: &AppState,
    integration: &Integration,
    result: Result<LoginOutcome, LoginRejection>,
) -> Response {
    match result {
        Ok(outcome) => {
            let mut response = found(outcome.redirect.as_str());
            cookie::set_cookie(
                response.headers_mut(),
                &cookie::session_cookie(&outcome.session.id, !state.config.insecure_cookies()),
            );
            response
        }
        Err(rejection) => found(failure_redirect(state, integration, &rejection).as_str()),
    }
}

/// `GET /auth/{provider}/login`: redirects to the identity provider with a
/// signed AuthnRequest.
pub async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<RelayParams>,
) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };

    match authn_request_url(&state, &integration, params.relay_state.as_deref()) {
        Ok(url) => found(&url),
        Err(e) => {
            tracing::error!(provider = %integration.name, error = %e, "cannot create AuthnRequest");
            let rejection = LoginRejection::from(LoginFailure::Protocol(e));
            found(failure_redirect(&state, &integration, &rejection).as_str())
        }
    }
}

fn authn_request_url(
    state: &AppState,
    integration: &Integration,
    relay_state: Option<&str>,
) -> SamlResult<String> {
    let request = AuthnRequest::new(
        &integration.trust,
        &integration.entry_point,
        &integration.acs_url(&state.config.base_url),
    );
    let signer = RedirectSigner::for_trust(&integration.trust)?;
    let url = HttpRedirectBinding::encode(
        &request.to_xml(),
        &integration.entry_point,
        relay_state,
        SamlMessageType::Request,
        Some(&signer),
    )?;

    if integration.trust.validate_in_response_to() {
        state.requests.insert(request.id.clone());
    }
    tracing::debug!(provider = %integration.name, request_id = %request.id, "AuthnRequest issued");
    Ok(url)
}

/// `POST /auth/{provider}/login/callback`: the assertion consumer service.
pub async fn login_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Form(form): Form<CallbackForm>,
) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };

    let result = match validate_assertion(&state, &integration, &form.saml_response) {
        Ok(raw) => complete_login(&state, &integration, raw, form.relay_state.as_deref()).await,
        Err(failure) => Err(failure.into()),
    };
    login_response(&state, &integration, result)
}

/// `GET /auth/{provider}/logout`: ends the session and, for a session from
/// this identity provider, starts single logout.
pub async fn logout(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };

    let session = match cookie::session_id(&headers) {
        Some(id) => state.sessions.logout(&id).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "session removal failed");
            None
        }),
        None => None,
    };

    let base = &state.config.base_url;
    let target = match &session {
        Some(session) => {
            AuthEvent::builder(EventType::Logout)
                .provider(&integration.name)
                .user(session.user.id())
                .session(&session.id)
                .emit();
            idp_logout_url(&integration, session).unwrap_or_else(|e| {
                AuthEvent::builder(EventType::LogoutError)
                    .failure(e.to_string())
                    .provider(&integration.name)
                    .emit();
                None
            })
        }
        None => None,
    }
    .unwrap_or_else(|| integration.default_redirect(base).to_string());

    let mut response = found(&target);
    cookie::set_cookie(
        response.headers_mut(),
        &cookie::clear_session_cookie(!state.config.insecure_cookies()),
    );
    response
}

fn idp_logout_url(integration: &Integration, session: &EstablishedSession) -> SamlResult<Option<String>> {
    let Some(logout_url) = &integration.logout_url else {
        return Ok(None);
    };
    if session.saml_session.issuer != integration.trust.idp_issuer() {
        return Ok(None);
    }

    let request = LogoutRequest::new(&integration.trust, logout_url, session.saml_session.clone());
    let signer = RedirectSigner::for_trust(&integration.trust)?;
    HttpRedirectBinding::encode(
        &request.to_xml(),
        logout_url,
        None,
        SamlMessageType::Request,
        Some(&signer),
    )
    .map(Some)
}

/// `GET /auth/{provider}/logout/callback`: the identity provider's
/// LogoutResponse.
pub async fn logout_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };

    let relay_state = match check_logout_response(&integration, query.as_deref().unwrap_or_default()) {
        Ok((response, relay_state)) => {
            tracing::info!(
                provider = %integration.name,
                status = %response.status_code,
                success = response.is_success(),
                "logout response received"
            );
            relay_state
        }
        Err(e) => {
            AuthEvent::builder(EventType::LogoutError)
                .failure(e.to_string())
                .provider(&integration.name)
                .emit();
            None
        }
    };

    let base = &state.config.base_url;
    let target = resolve_redirect(relay_state.as_deref(), base)
        .unwrap_or_else(|| integration.default_redirect(base));
    found(target.as_str())
}

fn check_logout_response(
    integration: &Integration,
    raw_query: &str,
) -> SamlResult<(LogoutResponse, Option<String>)> {
    let query = RedirectQuery::parse(raw_query)?;
    if query.is_signed() {
        let validator = XmlSignatureValidator::from_pem(integration.trust.idp_certificates())?;
        query.verify(&validator)?;
    }

    let doc = XmlDocument::parse(query.xml()?)?;
    let response = LogoutResponse::from_document(&doc)?;
    if let Some(issuer) = &response.issuer {
        if issuer != integration.trust.idp_issuer() {
            return Err(SamlError::InvalidIssuer {
                expected: integration.trust.idp_issuer().to_string(),
                actual: issuer.clone(),
            });
        }
    }
    Ok((response, query.relay_state))
}

/// `GET /auth/{provider}/metadata`: SP metadata.
pub async fn metadata(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };
    let base = &state.config.base_url;

    match sp_metadata(&integration.trust, &integration.acs_url(base), &integration.slo_url(base)) {
        Ok(xml) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/samlmetadata+xml")],
            xml,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(provider = %integration.name, error = %e, "metadata generation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
