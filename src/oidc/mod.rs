//! OIDC authentication module

pub mod callback;
pub mod discovery;
pub mod manager;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod user;

pub use callback::CallbackParams;
pub use discovery::OidcConfig;
pub use manager::{SigninRequest, SigninState, UserManager};
pub use pkce::PkceParams;
pub use session::Session;
pub use storage::{FileStore, MemoryStore, StateStore};
pub use user::{
    decode_jwt_claims, filter_protocol_claims, merge_claims, now, Claims, TokenResponse, User,
};
