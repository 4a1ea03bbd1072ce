//! Text views
//!
//! Rendering and event dispatch only; no business logic beyond admin
//! detection and initials.

pub mod app;
pub mod controller;
pub mod login;
pub mod pkce;
pub mod profile;

pub use app::{render_app, AppInfo};
pub use controller::{error_message, Endpoint, HelloController, Outcome};
pub use login::LoginButton;
pub use profile::{initials, is_admin, UserProfile};
