//! Keycloak OIDC Demo - Main entry point
//!
//! Signs in against a Keycloak realm and calls the ADMIN-protected endpoints
//! of the demo resource server. Views are printed to stdout, logs to stderr.

use keycloak_oidc_demo::api::ApiClient;
use keycloak_oidc_demo::bridge::TokenBridge;
use keycloak_oidc_demo::config::{Command, Config};
use keycloak_oidc_demo::error::Result;
use keycloak_oidc_demo::middleware::SharedToken;
use keycloak_oidc_demo::navigation;
use keycloak_oidc_demo::oidc::{CallbackParams, UserManager};
use keycloak_oidc_demo::shell::{default_action_payload, Shell};
use keycloak_oidc_demo::view::{self, AppInfo, Endpoint, HelloController, LoginButton};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BANNER: &str = r#"
╔══════════════════════════════════════════════════════════════╗
║                  Keycloak OAuth2 Demo (Rust)                 ║
║        Authorization code + PKCE against a Keycloak realm    ║
╚══════════════════════════════════════════════════════════════╝
"#;

fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    // stdout carries the rendered views
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    setup_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if !config.no_banner && !config.silent {
        eprintln!("{}", BANNER);
        info!("Keycloak issuer: {}", config.issuer());
        info!("Client ID: {}", config.client_id);
        info!("Scopes: {}", config.scopes().join(" "));
        info!("Redirect URI: {}", config.redirect_uri());
        info!("Backend API: {}", config.api_url);
        eprintln!();
    }

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let manager = Arc::new(UserManager::from_settings(config.oidc_settings())?);

    let api = ApiClient::new(&config.api_url, config.request_timeout(), SharedToken::new())?;
    let bridge = Arc::new(TokenBridge::new(api));
    let controller = HelloController::new();

    let info = AppInfo {
        backend_url: config.api_url.clone(),
        app_url: config.app_url.clone(),
        keycloak_url: config.keycloak_url.clone(),
    };

    let session = manager.load().await;
    bridge.observe(&session);

    let render = |controller: &HelloController| {
        let session = manager.session();
        bridge.observe(&session);
        view::render_app(&session, &info, controller, bridge.is_token_ready())
    };

    match config.command {
        Command::Shell => {
            let observer = bridge.spawn_observer(manager.subscribe());
            let renew = manager
                .settings()
                .automatic_silent_renew
                .then(|| manager.start_silent_renew());

            let shell = Shell::new(
                Arc::clone(&manager),
                Arc::clone(&bridge),
                info.clone(),
                config.no_browser,
            );

            let result = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    Ok(())
                }
                result = shell.run() => result,
            };

            observer.abort();
            if let Some(renew) = renew {
                renew.abort();
            }
            return result;
        }
        Command::Status => println!("{}", render(&controller)),
        Command::Login => {
            let button = LoginButton::for_session(&manager.session());
            if button.starts_signin() {
                let result = navigation::signin_redirect(&manager, config.no_browser).await;
                println!("{}", render(&controller));
                result?;
            } else {
                println!("{}", render(&controller));
            }
        }
        Command::Callback { url } => {
            let result = manager.signin_callback(CallbackParams::from_url(&url)?).await;
            println!("{}", render(&controller));
            result?;
        }
        Command::Logout => {
            navigation::signout_redirect(&manager, config.no_browser).await?;
            println!("{}", render(&controller));
        }
        Command::Health => {
            let health = bridge.get_health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Info => {
            let service = bridge.get_info().await?;
            println!("{}", serde_json::to_string_pretty(&service)?);
        }
        Command::Hello => call(&controller, &bridge, &manager, Endpoint::Hello, None).await,
        Command::HelloMe => call(&controller, &bridge, &manager, Endpoint::HelloMe, None).await,
        Command::Userinfo => call(&controller, &bridge, &manager, Endpoint::UserInfo, None).await,
        Command::Action { payload } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw)?,
                None => default_action_payload(),
            };
            call(&controller, &bridge, &manager, Endpoint::AdminAction, Some(payload)).await
        }
    }

    Ok(())
}

async fn call(
    controller: &HelloController,
    bridge: &TokenBridge,
    manager: &UserManager,
    endpoint: Endpoint,
    payload: Option<serde_json::Value>,
) {
    let is_authenticated = manager.session().is_authenticated;
    match controller
        .trigger(endpoint, bridge, is_authenticated, payload.as_ref())
        .await
    {
        Some(outcome) => println!("{}", outcome.render()),
        None => println!(
            "{}",
            controller.render(is_authenticated, bridge.is_token_ready())
        ),
    }
}
