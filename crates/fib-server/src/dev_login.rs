//! Form login for local development and tests.
//!
//! The form names business fields directly (`socialSecurityNumber`,
//! `objectId`, ...). They are mapped onto the integration's assertion
//! attributes, given synthetic federation claims, and run through the same
//! pipeline as a SAML callback from profile validation onward.
//!
//! These routes exist only when `FIB_DEV_LOGIN_ENABLED=true` at startup.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Form, Router};
use fib_saml::claims::keys;
use fib_saml::constants::name_id_formats;
use fib_saml::RawProfile;
use serde_json::Value;

use crate::integrations::Integration;
use crate::login::complete_login;
use crate::saml_handlers::{login_response, unknown_provider};
use crate::state::AppState;

const RELAY_STATE: &str = "RelayState";

/// Issuer recorded in sessions created by the dev login.
#[must_use]
pub fn dev_issuer(provider: &str) -> String {
    format!("urn:dev-login:{provider}")
}

/// Routes of the dev login.
pub fn dev_router() -> Router<AppState> {
    Router::new().route("/dev-api/auth/{provider}/login", post(dev_login))
}

/// `POST /dev-api/auth/{provider}/login`.
pub async fn dev_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let Some(integration) = state.integration(&provider) else {
        return unknown_provider(&provider);
    };
    tracing::warn!(provider = %integration.name, "dev login used");

    let raw = raw_profile(&integration, &form);
    let relay_state = form.get(RELAY_STATE).map(String::as_str);
    let result = complete_login(&state, &integration, raw, relay_state).await;
    login_response(&state, &integration, result)
}

/// Builds the raw profile a SAML callback would have produced.
///
/// The NameID is the value of the first schema field, which is the
/// integration's stable identifier.
fn raw_profile(integration: &Integration, form: &HashMap<String, String>) -> RawProfile {
    let mut raw = RawProfile::new();
    for spec in integration.schema.fields() {
        if let Some(value) = form.get(&spec.field) {
            raw.insert(spec.attribute.clone(), Value::String(value.clone()));
        }
    }

    let name_id = integration
        .schema
        .fields()
        .first()
        .and_then(|spec| form.get(&spec.field))
        .cloned()
        .unwrap_or_default();

    raw.insert(keys::ISSUER.into(), Value::String(dev_issuer(&integration.name)));
    raw.insert(keys::NAME_ID.into(), Value::String(name_id));
    raw.insert(
        keys::NAME_ID_FORMAT.into(),
        Value::String(name_id_formats::UNSPECIFIED.into()),
    );
    raw
}
