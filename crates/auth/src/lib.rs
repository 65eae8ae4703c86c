//! `amo-auth`: authentication and authorization boundary.
//!
//! Credentials, session tokens, the request gate and the role policy live
//! here. The crate is decoupled from HTTP and storage.

pub mod claims;
pub mod gate;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod session;
pub mod shell;
pub mod user;

pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use gate::{GateDecision, evaluate};
pub use password::{PasswordError, hash_password, validate_new_password, verify_password};
pub use policy::{AuthzError, Capability, authorize};
pub use principal::Principal;
pub use roles::Role;
pub use session::{SessionCodec, SessionError};
pub use shell::{NavLink, Shell, ShellDecision, ShellKind};
pub use user::{User, UserCommand, UserEvent};
