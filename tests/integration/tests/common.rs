//! Common test utilities and fixtures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::{redirect, Client, Response};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fib_saml::{AssertionValidator, RawProfile, SamlError, SamlResult, TrustDescriptor, ValidationContext};
use fib_server::{AppState, Server, ServerConfig};
use fib_session::{EstablishedSession, InMemorySessionStore, SessionStore};

/// Application origin the server believes it runs on.
pub const APP: &str = "https://app.example.fi";
/// Citizen identity provider issuer.
pub const CITIZEN_IDP: &str = "https://idp.example.fi";
/// Employee identity provider issuer.
pub const EMPLOYEE_IDP: &str = "https://sts.example.com/tenant/";

/// Path of a file under `fixtures/`.
pub fn fixture(name: &str) -> String {
    format!("{}/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Returns a preset raw profile in place of a verified SAML response.
#[derive(Default)]
pub struct StubValidator {
    profile: Mutex<Option<RawProfile>>,
}

impl StubValidator {
    /// Sets the profile returned by the next validations.
    pub fn returns(&self, profile: Value) {
        *self.profile.lock().unwrap() = profile.as_object().cloned();
    }
}

impl AssertionValidator for StubValidator {
    fn validate(
        &self,
        _trust: &TrustDescriptor,
        _saml_response_b64: &str,
        _ctx: &ValidationContext,
    ) -> SamlResult<RawProfile> {
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SamlError::SignatureInvalid("stub has no profile".to_string()))
    }
}

/// Options for [`TestEnv::start`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Register the dev login routes.
    pub dev_login: bool,
    /// Verify real signed responses instead of using [`StubValidator`].
    pub real_validator: bool,
}

/// Test environment with a running server and a mocked identity service.
pub struct TestEnv {
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client that does not follow redirects.
    pub client: Client,
    /// Mocked identity service.
    pub identity: MockServer,
    /// Session store behind the server.
    pub sessions: Arc<InMemorySessionStore>,
    /// Validator behind the server, unless a real one was requested.
    pub assertions: Arc<StubValidator>,
    /// Server shutdown signal.
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestEnv {
    /// Starts a server with a stubbed assertion validator.
    pub async fn new() -> anyhow::Result<Self> {
        Self::start(Options::default()).await
    }

    /// Starts a server with the given options.
    pub async fn start(options: Options) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("fib_server=debug,fib=info")
            .try_init();

        let identity = MockServer::start().await;
        let config = ServerConfig::from_source(&config(&identity.uri(), options))?;

        let sessions = Arc::new(InMemorySessionStore::new());
        let assertions = Arc::new(StubValidator::default());
        let mut state = AppState::from_config(config)?.with_sessions(sessions.clone());
        if !options.real_validator {
            state = state.with_validator(assertions.clone());
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (_shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = Server::from_state(state).serve(listener, shutdown).await {
                tracing::error!("Server error: {}", e);
            }
        });

        let client = Client::builder().redirect(redirect::Policy::none()).build()?;

        Ok(Self {
            base_url,
            client,
            identity,
            sessions,
            assertions,
            _shutdown_tx,
        })
    }

    /// Absolute URL of `path` on the running server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Posts a SAMLResponse to a provider's assertion consumer service.
    pub async fn post_callback(
        &self,
        provider: &str,
        saml_response: &str,
        relay_state: Option<&str>,
    ) -> anyhow::Result<Response> {
        let mut form = vec![("SAMLResponse", saml_response)];
        if let Some(rs) = relay_state {
            form.push(("RelayState", rs));
        }
        Ok(self
            .client
            .post(self.url(&format!("/auth/{provider}/login/callback")))
            .form(&form)
            .send()
            .await?)
    }

    /// Answers `citizen-login` with `body` and `status`.
    pub async fn mock_citizen_login(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/system/citizen-login"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.identity)
            .await;
    }

    /// Answers `employee-login` with `body` and `status`.
    pub async fn mock_employee_login(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/system/employee-login"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.identity)
            .await;
    }

    /// Requests received by the identity service on `endpoint`.
    pub async fn identity_calls(&self, endpoint: &str) -> anyhow::Result<Vec<Value>> {
        let requests = self.identity.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .map(|r| Ok(serde_json::from_slice(&r.body)?))
            .collect()
    }

    /// Looks up the session named by a response's cookie.
    pub async fn session_of(&self, response: &Response) -> anyhow::Result<Option<EstablishedSession>> {
        match session_cookie(response) {
            Some(id) => Ok(self.sessions.get(&id).await?),
            None => Ok(None),
        }
    }
}

/// The `Location` header as a URL.
pub fn location(response: &Response) -> Url {
    let raw = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Url::parse(raw).unwrap_or_else(|e| panic!("bad Location {raw:?}: {e}"))
}

/// Query parameters of a URL.
pub fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Value of the `fib.session` cookie set by a response, if non-empty.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|c| c.strip_prefix("fib.session="))
        .map(|c| c.split(';').next().unwrap_or_default().to_string())
        .find(|v| !v.is_empty())
}

/// The raw `Set-Cookie` header for the session cookie.
pub fn raw_session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("fib.session="))
        .map(String::from)
}

/// Raw profile a citizen assertion would produce.
pub fn citizen_profile(ssn: &str) -> Value {
    json!({
        "issuer": CITIZEN_IDP,
        "nameID": "AAdzZWNyZXQxL8XaBaPHSw",
        "nameIDFormat": "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        "sessionIndex": "_c1f0a4b2",
        "urn:oid:1.2.246.21": ssn,
        "urn:oid:2.5.4.42": "Matti",
        "urn:oid:2.5.4.4": "Meikäläinen",
    })
}

/// Raw profile an employee assertion would produce.
pub fn employee_profile(object_id: &str) -> Value {
    json!({
        "issuer": EMPLOYEE_IDP,
        "nameID": "e.employee@example.com",
        "nameIDFormat": "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
        "sessionIndex": "_5e6f",
        "http://schemas.microsoft.com/identity/claims/objectidentifier": object_id,
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname": "Essi",
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname": "Esimies",
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress": "essi.esimies@example.com",
    })
}

fn config(identity_url: &str, options: Options) -> HashMap<String, String> {
    let idp_cert = fixture("idp-cert.pem");
    let sp_key = fixture("sp-key.pem");
    let sp_cert = fixture("sp-cert.pem");
    let in_response_to = if options.real_validator { "true" } else { "false" };

    [
        ("FIB_BASE_URL", APP),
        ("FIB_IDENTITY_SERVICE_URL", identity_url),
        ("FIB_IDENTITY_SERVICE_TIMEOUT_MS", "2000"),
        ("FIB_DEV_LOGIN_ENABLED", if options.dev_login { "true" } else { "false" }),
        ("FIB_PROVIDERS", "citizen,employee"),
        ("FIB_CITIZEN_KIND", "citizen"),
        ("FIB_CITIZEN_ENTRY_POINT", "https://idp.example.fi/idp/profile/SAML2/Redirect/SSO"),
        ("FIB_CITIZEN_LOGOUT_URL", "https://idp.example.fi/idp/profile/SAML2/Redirect/SLO"),
        ("FIB_CITIZEN_ISSUER", "https://app.example.fi/citizen"),
        ("FIB_CITIZEN_IDP_ISSUER", CITIZEN_IDP),
        ("FIB_CITIZEN_PUBLIC_CERT", idp_cert.as_str()),
        ("FIB_CITIZEN_PRIVATE_CERT", sp_key.as_str()),
        ("FIB_CITIZEN_OWN_CERT", sp_cert.as_str()),
        ("FIB_CITIZEN_ACCEPTED_CLOCK_SKEW_MS", "30000"),
        ("FIB_CITIZEN_VALIDATE_IN_RESPONSE_TO", in_response_to),
        ("FIB_CITIZEN_DEFAULT_REDIRECT", "/citizen"),
        ("FIB_CITIZEN_ERROR_REDIRECT", "/citizen/login"),
        ("FIB_EMPLOYEE_KIND", "employee"),
        ("FIB_EMPLOYEE_ENTRY_POINT", "https://login.example.com/tenant/saml2"),
        ("FIB_EMPLOYEE_ISSUER", "https://app.example.fi/employee"),
        ("FIB_EMPLOYEE_IDP_ISSUER", EMPLOYEE_IDP),
        ("FIB_EMPLOYEE_PUBLIC_CERT", idp_cert.as_str()),
        ("FIB_EMPLOYEE_PRIVATE_CERT", sp_key.as_str()),
        ("FIB_EMPLOYEE_VALIDATE_IN_RESPONSE_TO", in_response_to),
        ("FIB_EMPLOYEE_EXTERNAL_ID_PREFIX", "espoo-ad"),
        ("FIB_EMPLOYEE_DEFAULT_REDIRECT", "/employee"),
        ("FIB_EMPLOYEE_ERROR_REDIRECT", "/employee/login"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
