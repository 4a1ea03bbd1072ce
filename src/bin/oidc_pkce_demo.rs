//! Minimal OIDC + OAuth2 (PKCE) demo
//!
//! Signs in with authorization code + PKCE, keeps the session in
//! session-scoped storage, and probes `<api base>/protected` with the bearer
//! access token.

use keycloak_oidc_demo::api::probe;
use keycloak_oidc_demo::config::{PkceCommand, PkceDemoConfig};
use keycloak_oidc_demo::error::Result;
use keycloak_oidc_demo::navigation;
use keycloak_oidc_demo::oidc::{CallbackParams, UserManager};
use keycloak_oidc_demo::view::pkce::render_home;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn setup_logging(config: &PkceDemoConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let config = PkceDemoConfig::parse_args();

    setup_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: PkceDemoConfig) -> Result<()> {
    let manager = UserManager::from_settings(config.oidc_settings())?;
    manager.load().await;

    match config.command {
        PkceCommand::Status => {}
        PkceCommand::Signin => {
            if let Err(e) = navigation::signin_redirect(&manager, config.no_browser).await {
                println!("{}", render_home(&manager.session(), None));
                return Err(e);
            }
        }
        PkceCommand::Callback { url } => {
            if let Err(e) = manager.signin_callback(CallbackParams::from_url(&url)?).await {
                println!("{}", render_home(&manager.session(), None));
                return Err(e);
            }
        }
        PkceCommand::Signout => navigation::signout_redirect(&manager, config.no_browser).await?,
        PkceCommand::CallApi => {
            let session = manager.session();
            let http = reqwest::Client::new();
            let result = probe::call_protected(
                &http,
                &config.api_base_url,
                session.access_token(),
                PROBE_TIMEOUT,
            )
            .await;
            println!("{}", render_home(&session, Some(&result)));
            return Ok(());
        }
    }

    println!("{}", render_home(&manager.session(), None));
    Ok(())
}
