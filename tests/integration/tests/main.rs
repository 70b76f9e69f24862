//! End-to-End Integration Tests
//!
//! These tests run the gateway on an ephemeral port against a mocked
//! identity service.

mod common;
mod auth_flows;
mod dev_login;
mod saml_endpoints;
mod signed_response;
