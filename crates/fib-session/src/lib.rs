//! # fib-session
//!
//! Application sessions for the federated identity bridge.
//!
//! A session is committed only after the federation claims, the business
//! profile and the resolved user all exist, in a single
//! [`SessionStore::login`] call.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod profile;
pub mod request_cache;
pub mod resolver;
pub mod session;
pub mod store;
pub mod user;

pub use error::{SessionError, SessionResult};
pub use profile::{AuthType, BusinessProfile, CitizenProfile, EmployeeProfile};
pub use request_cache::AuthnRequestCache;
pub use resolver::{IdentityResolver, LoginErrorCode, ResolveError};
pub use session::EstablishedSession;
pub use store::{InMemorySessionStore, SessionStore};
pub use user::{SessionUser, UserType};
