//! Redirect navigation
//!
//! Sends the user's browser to the identity provider and brings the result
//! back through the loopback callback route.

use crate::error::{DemoError, Result};
use crate::oidc::{callback, User, UserManager};
use url::Url;

const DEFAULT_CALLBACK_PORT: u16 = 80;

/// Open `url` in the system browser, or print it when that is unwanted or fails
pub fn open_in_browser(url: &Url, no_browser: bool) {
    if no_browser {
        eprintln!("\nOpen this URL in your browser:\n\n{}\n", url);
        return;
    }

    tracing::info!("Opening browser: {}", url);
    if let Err(e) = webbrowser::open(url.as_str()) {
        tracing::warn!("Failed to open browser: {}", e);
        eprintln!("\n⚠️  Could not open browser automatically.");
        eprintln!("Please open this URL in your browser:\n\n{}\n", url);
    }
}

/// Full sign-in: redirect to the provider, then process the callback
pub async fn signin_redirect(manager: &UserManager, no_browser: bool) -> Result<User> {
    let redirect_uri = Url::parse(&manager.settings().redirect_uri)?;
    let port = redirect_uri
        .port_or_known_default()
        .unwrap_or(DEFAULT_CALLBACK_PORT);
    let path = redirect_uri.path().to_string();

    let request = manager.create_signin_request().await?;
    open_in_browser(&request.url, no_browser);

    let params = match callback::run_callback_server(port, &path).await {
        Ok(params) => params,
        Err(e) => {
            return Err(DemoError::Callback(format!(
                "{} (you can finish with the `callback <url>` command)",
                e
            )))
        }
    };

    manager.signin_callback(params).await
}

/// Full sign-out: forget the user and end the provider session
pub async fn signout_redirect(manager: &UserManager, no_browser: bool) -> Result<()> {
    match manager.signout_redirect().await? {
        Some(url) => open_in_browser(&url, no_browser),
        None => tracing::info!("Signed out locally; provider has no end-session endpoint"),
    }
    Ok(())
}
