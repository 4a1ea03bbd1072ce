//! Interactive shell
//!
//! Keeps one user manager, token bridge and controller alive across commands
//! read from stdin, so silent renew and token bridging run continuously.
//! Rendered views go to stdout; logs go to stderr.

use crate::bridge::TokenBridge;
use crate::error::{ApiError, Result};
use crate::navigation;
use crate::oidc::{CallbackParams, UserManager};
use crate::view::{self, AppInfo, Endpoint, HelloController, LoginButton};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "Commands: status | login | callback <url> | logout | health | info | hello | me | userinfo | action [json] | help | quit";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Status,
    Login,
    Callback(String),
    Logout,
    Health,
    Info,
    Call(Endpoint, Option<Value>),
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "" | "status" => ShellCommand::Status,
            "login" => ShellCommand::Login,
            "callback" if !rest.is_empty() => ShellCommand::Callback(rest.to_string()),
            "callback" => return Err("Usage: callback <redirect url>".to_string()),
            "logout" => ShellCommand::Logout,
            "health" => ShellCommand::Health,
            "info" => ShellCommand::Info,
            "hello" => ShellCommand::Call(Endpoint::Hello, None),
            "me" => ShellCommand::Call(Endpoint::HelloMe, None),
            "userinfo" => ShellCommand::Call(Endpoint::UserInfo, None),
            "action" if rest.is_empty() => {
                ShellCommand::Call(Endpoint::AdminAction, Some(default_action_payload()))
            }
            "action" => {
                let payload = serde_json::from_str(rest)
                    .map_err(|e| format!("Invalid JSON payload: {}", e))?;
                ShellCommand::Call(Endpoint::AdminAction, Some(payload))
            }
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("Unknown command: {}", other)),
        };

        Ok(command)
    }
}

/// `{"action": "test", "timestamp": <now>}`
pub fn default_action_payload() -> Value {
    serde_json::json!({
        "action": "test",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

pub struct Shell {
    manager: Arc<UserManager>,
    bridge: Arc<TokenBridge>,
    controller: HelloController,
    info: AppInfo,
    no_browser: bool,
}

impl Shell {
    pub fn new(
        manager: Arc<UserManager>,
        bridge: Arc<TokenBridge>,
        info: AppInfo,
        no_browser: bool,
    ) -> Self {
        Self {
            manager,
            bridge,
            controller: HelloController::new(),
            info,
            no_browser,
        }
    }

    fn render(&self) -> String {
        view::render_app(
            &self.manager.session(),
            &self.info,
            &self.controller,
            self.bridge.is_token_ready(),
        )
    }

    /// Execute one command; returns the text to print, or `None` to quit
    pub async fn execute(&self, command: ShellCommand) -> Option<String> {
        let output = match command {
            ShellCommand::Quit => return None,
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Status => self.render(),
            ShellCommand::Login => {
                let button = LoginButton::for_session(&self.manager.session());
                if !button.starts_signin() {
                    return Some(button.render());
                }
                match navigation::signin_redirect(&self.manager, self.no_browser).await {
                    Ok(_) => self.render(),
                    Err(e) => format!("Error: {}", e),
                }
            }
            ShellCommand::Callback(url) => match CallbackParams::from_url(&url) {
                Ok(params) => match self.manager.signin_callback(params).await {
                    Ok(_) => self.render(),
                    Err(e) => format!("Error: {}", e),
                },
                Err(e) => format!("Error: {}", e),
            },
            ShellCommand::Logout => {
                match navigation::signout_redirect(&self.manager, self.no_browser).await {
                    Ok(()) => self.render(),
                    Err(e) => format!("Error: {}", e),
                }
            }
            ShellCommand::Health => render_public(self.bridge.get_health().await),
            ShellCommand::Info => render_public(self.bridge.get_info().await),
            ShellCommand::Call(endpoint, payload) => {
                let session = self.manager.session();
                match self
                    .controller
                    .trigger(endpoint, &self.bridge, session.is_authenticated, payload.as_ref())
                    .await
                {
                    Some(outcome) => outcome.render(),
                    None => self
                        .controller
                        .render(session.is_authenticated, self.bridge.is_token_ready()),
                }
            }
        };

        Some(output)
    }

    /// Read commands from stdin until EOF or `quit`
    pub async fn run(&self) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(tokio::io::stdin());

        write_block(&mut stdout, &self.render()).await?;
        write_block(&mut stdout, HELP).await?;

        let mut line = String::new();
        loop {
            line.clear();

            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, leaving shell");
                break;
            }

            let output = match ShellCommand::parse(&line) {
                Ok(command) => match self.execute(command).await {
                    Some(output) => output,
                    None => break,
                },
                Err(message) => message,
            };

            write_block(&mut stdout, &output).await?;
        }

        Ok(())
    }
}

fn render_public<T: serde::Serialize>(result: std::result::Result<T, ApiError>) -> String {
    match result {
        Ok(body) => serde_json::to_string_pretty(&body).unwrap_or_default(),
        Err(e) => format!("Error: {}", view::error_message(&e)),
    }
}

async fn write_block(stdout: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n\n").await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("").unwrap(), ShellCommand::Status);
        assert_eq!(ShellCommand::parse("  hello \n").unwrap(), ShellCommand::Call(Endpoint::Hello, None));
        assert_eq!(ShellCommand::parse("me").unwrap(), ShellCommand::Call(Endpoint::HelloMe, None));
        assert_eq!(ShellCommand::parse("quit").unwrap(), ShellCommand::Quit);
        assert_eq!(
            ShellCommand::parse("callback http://localhost:3000/callback?code=a&state=b").unwrap(),
            ShellCommand::Callback("http://localhost:3000/callback?code=a&state=b".to_string())
        );
        assert!(ShellCommand::parse("callback").is_err());
        assert!(ShellCommand::parse("frobnicate").is_err());
    }

    #[test]
    fn test_parse_action_payload() {
        assert_eq!(
            ShellCommand::parse(r#"action {"action":"test"}"#).unwrap(),
            ShellCommand::Call(
                Endpoint::AdminAction,
                Some(serde_json::json!({"action": "test"}))
            )
        );
        assert!(ShellCommand::parse("action {not json").is_err());

        match ShellCommand::parse("action").unwrap() {
            ShellCommand::Call(Endpoint::AdminAction, Some(payload)) => {
                assert_eq!(payload["action"], "test");
                assert!(payload["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
