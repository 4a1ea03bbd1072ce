//! OIDC user manager
//!
//! Owns the session lifecycle for the authorization code flow with PKCE:
//! sign-in requests, callback processing, token storage, silent renew and
//! sign-out. Every state change is published as a [`Session`] snapshot on a
//! watch channel.
//!
//! The login redirect leaves the running flow, so sign-in is split into two
//! entry points that only share persisted state: [`UserManager::create_signin_request`]
//! before the redirect and [`UserManager::signin_callback`] after it.

use super::{
    callback::CallbackParams, decode_jwt_claims, filter_protocol_claims, merge_claims, now,
    storage::{FileStore, StateStore}, Claims, OidcConfig, PkceParams, Session, TokenResponse, User,
};
use crate::config::OidcSettings;
use crate::error::{DemoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use url::Url;

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const STATE_KEY_PREFIX: &str = "oidc.";
const USER_KEY_PREFIX: &str = "oidc.user:";
/// Renew this many seconds before the access token expires
const EXPIRING_NOTIFICATION_SECS: i64 = 60;
/// Lower bound between two renew attempts
const MIN_RENEW_DELAY_SECS: i64 = 1;

/// Sign-in state persisted across the login redirect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigninState {
    pub id: String,
    pub code_verifier: String,
    pub nonce: String,
    pub redirect_uri: String,
    pub authority: String,
    pub client_id: String,
    pub scope: String,
    /// Unix timestamp when the request was created
    pub created: i64,
}

/// Authorization request ready for navigation
#[derive(Debug, Clone)]
pub struct SigninRequest {
    pub url: Url,
    pub state: String,
}

pub struct UserManager {
    settings: OidcSettings,
    store: Arc<dyn StateStore>,
    http: reqwest::Client,
    metadata: OnceCell<OidcConfig>,
    session: watch::Sender<Session>,
}

impl UserManager {
    /// Create a manager; the session starts out loading until [`Self::load`]
    pub fn new(settings: OidcSettings, store: Arc<dyn StateStore>) -> Self {
        let (session, _) = watch::channel(Session::loading());
        Self {
            settings,
            store,
            http: reqwest::Client::new(),
            metadata: OnceCell::new(),
            session,
        }
    }

    /// Create a manager persisting to the file store selected by `settings.storage`
    pub fn from_settings(settings: OidcSettings) -> Result<Self> {
        let store = FileStore::for_kind(settings.storage)?;
        Ok(Self::new(settings, Arc::new(store)))
    }

    pub fn settings(&self) -> &OidcSettings {
        &self.settings
    }

    /// Subscribe to session changes; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Current session snapshot
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    fn publish(&self, session: Session) {
        self.session.send_replace(session);
    }

    fn user_key(&self) -> String {
        format!(
            "{}{}:{}",
            USER_KEY_PREFIX, self.settings.authority, self.settings.client_id
        )
    }

    fn state_key(state: &str) -> String {
        format!("{}{}", STATE_KEY_PREFIX, state)
    }

    /// Provider metadata, discovered once and cached
    pub async fn metadata(&self) -> Result<&OidcConfig> {
        self.metadata
            .get_or_try_init(|| OidcConfig::discover(&self.http, &self.settings.authority))
            .await
    }

    /// Initial load: restore the persisted user, if any
    pub async fn load(&self) -> Session {
        let user = match self.get_user() {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Failed to read stored user: {}", e);
                self.publish(Session::failed(e.to_string()));
                return self.session();
            }
        };

        match user {
            Some(user) if !user.expired() => {
                tracing::debug!("Restored session for {}", user.profile.sub);
                self.publish(Session::authenticated(user));
            }
            Some(user) if user.can_refresh() && self.settings.automatic_silent_renew => {
                tracing::info!("Stored access token expired, renewing");
                if let Err(e) = self.signin_silent().await {
                    tracing::warn!("Silent renew on load failed: {}", e);
                    self.publish(Session::authenticated(user));
                }
            }
            Some(user) => {
                tracing::debug!("Stored access token expired");
                self.publish(Session::authenticated(user));
            }
            None => self.publish(Session::unauthenticated()),
        }

        self.session()
    }

    /// Read the persisted user without publishing
    pub fn get_user(&self) -> Result<Option<User>> {
        match self.store.get(&self.user_key())? {
            Some(value) => Ok(Some(User::from_storage_string(&value)?)),
            None => Ok(None),
        }
    }

    /// Persist and publish a user
    pub fn store_user(&self, user: User) -> Result<()> {
        self.store.set(&self.user_key(), &user.to_storage_string()?)?;
        self.publish(Session::authenticated(user));
        Ok(())
    }

    /// Remove the persisted user and publish the signed-out session
    pub fn remove_user(&self) -> Result<()> {
        self.store.remove(&self.user_key())?;
        self.publish(Session::unauthenticated());
        Ok(())
    }

    /// Prepare the login redirect; failures become a session error
    pub async fn create_signin_request(&self) -> Result<SigninRequest> {
        match self.build_signin_request().await {
            Ok(request) => Ok(request),
            Err(e) => {
                tracing::error!("Failed to create sign-in request: {}", e);
                self.publish(Session::failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn build_signin_request(&self) -> Result<SigninRequest> {
        self.clear_stale_state()?;

        let metadata = self.metadata().await?;
        let pkce = PkceParams::generate();
        let state = SigninState {
            id: super::pkce::random_string(STATE_LEN),
            code_verifier: pkce.code_verifier.clone(),
            nonce: super::pkce::random_string(NONCE_LEN),
            redirect_uri: self.settings.redirect_uri.clone(),
            authority: self.settings.authority.clone(),
            client_id: self.settings.client_id.clone(),
            scope: self.settings.scope(),
            created: now(),
        };

        let mut url = Url::parse(&metadata.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &state.client_id)
            .append_pair("redirect_uri", &state.redirect_uri)
            .append_pair("scope", &state.scope)
            .append_pair("state", &state.id)
            .append_pair("nonce", &state.nonce)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", "S256");

        self.store
            .set(&Self::state_key(&state.id), &serde_json::to_string(&state)?)?;

        tracing::debug!("Stored sign-in state {}", state.id);
        Ok(SigninRequest {
            url,
            state: state.id,
        })
    }

    /// Remove pending sign-in states older than the configured age
    pub fn clear_stale_state(&self) -> Result<usize> {
        let cutoff = now() - self.settings.stale_state_age_secs;
        let mut removed = 0;

        for key in self.store.keys()? {
            if !key.starts_with(STATE_KEY_PREFIX) || key.starts_with(USER_KEY_PREFIX) {
                continue;
            }
            let Some(value) = self.store.get(&key)? else {
                continue;
            };
            let stale = match serde_json::from_str::<SigninState>(&value) {
                Ok(state) => state.created < cutoff,
                Err(_) => true,
            };
            if stale {
                self.store.remove(&key)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!("Removed {} stale sign-in state(s)", removed);
        }
        Ok(removed)
    }

    /// Callback load: complete the sign-in from the redirect parameters
    pub async fn signin_callback(&self, params: CallbackParams) -> Result<User> {
        self.publish(Session::loading());

        match self.process_signin_response(params).await {
            Ok(user) => {
                tracing::info!("Signed in as {}", user.profile.sub);
                Ok(user)
            }
            Err(e) => {
                tracing::error!("Sign-in callback failed: {}", e);
                self.publish(Session::failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn process_signin_response(&self, params: CallbackParams) -> Result<User> {
        let state_id = params
            .state
            .ok_or_else(|| DemoError::Auth("No state in response".to_string()))?;

        let stored = self
            .store
            .remove(&Self::state_key(&state_id))?
            .ok_or_else(|| DemoError::Auth("No matching state found in storage".to_string()))?;
        let state: SigninState = serde_json::from_str(&stored)?;

        if let Some(error) = params.error {
            return Err(DemoError::Auth(match params.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            }));
        }

        let code = params
            .code
            .ok_or_else(|| DemoError::Auth("No code in response".to_string()))?;

        let metadata = self.metadata().await?;
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code),
            ("redirect_uri", state.redirect_uri.clone()),
            ("client_id", state.client_id.clone()),
            ("code_verifier", state.code_verifier.clone()),
        ];
        if let Some(ref secret) = self.settings.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let mut response = self.request_tokens(&metadata.token_endpoint, &form).await?;
        if response.session_state.is_none() {
            response.session_state = params.session_state;
        }

        let id_token = response
            .id_token
            .as_deref()
            .ok_or_else(|| DemoError::Token("No id_token in token response".to_string()))?;
        let id_claims = decode_jwt_claims(id_token)?;
        self.validate_id_token_claims(&id_claims, metadata, Some(&state.nonce))?;

        let mut profile = self.profile_claims(id_claims);
        if self.settings.load_user_info {
            if let Some(ref endpoint) = metadata.userinfo_endpoint {
                let userinfo = self.fetch_userinfo(endpoint, &response.access_token).await?;
                profile = merge_claims(profile, userinfo)?;
            }
        }

        let user = User::from_token_response(response, Claims::from_map(profile)?, now());
        self.store_user(user.clone())?;
        Ok(user)
    }

    fn profile_claims(&self, claims: Map<String, Value>) -> Map<String, Value> {
        if self.settings.filter_protocol_claims {
            filter_protocol_claims(claims)
        } else {
            claims
        }
    }

    fn validate_id_token_claims(
        &self,
        claims: &Map<String, Value>,
        metadata: &OidcConfig,
        nonce: Option<&str>,
    ) -> Result<()> {
        if claims.get("sub").and_then(Value::as_str).is_none() {
            return Err(DemoError::Auth("ID token has no subject".to_string()));
        }

        let iss = claims
            .get("iss")
            .and_then(Value::as_str)
            .ok_or_else(|| DemoError::Auth("ID token has no issuer".to_string()))?;
        if iss != metadata.issuer {
            return Err(DemoError::Auth(format!("Invalid issuer in token: {}", iss)));
        }

        let client_id = self.settings.client_id.as_str();
        let audience_ok = match claims.get("aud") {
            Some(Value::String(aud)) => aud == client_id,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(client_id)),
            _ => return Err(DemoError::Auth("ID token has no audience".to_string())),
        };
        if !audience_ok {
            return Err(DemoError::Auth("Invalid audience in token".to_string()));
        }

        if let Some(expected) = nonce {
            match claims.get("nonce").and_then(Value::as_str) {
                Some(actual) if actual == expected => {}
                Some(_) => return Err(DemoError::Auth("Nonce mismatch".to_string())),
                None => return Err(DemoError::Auth("ID token has no nonce".to_string())),
            }
        }

        Ok(())
    }

    async fn request_tokens(
        &self,
        token_endpoint: &str,
        form: &[(&str, String)],
    ) -> Result<TokenResponse> {
        let response = self.http.post(token_endpoint).form(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DemoError::Token(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn fetch_userinfo(&self, endpoint: &str, access_token: &str) -> Result<Map<String, Value>> {
        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DemoError::Auth(format!(
                "Userinfo request failed with status: {}",
                response.status()
            )));
        }

        match response.json::<Value>().await? {
            Value::Object(claims) => Ok(claims),
            _ => Err(DemoError::Auth(
                "Userinfo response is not a JSON object".to_string(),
            )),
        }
    }

    /// Renew the access token with the refresh token
    ///
    /// Failures are returned to the caller but never published: the session
    /// keeps the old, soon-expiring user.
    pub async fn signin_silent(&self) -> Result<User> {
        let current = self
            .get_user()?
            .ok_or_else(|| DemoError::Token("No user to renew".to_string()))?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| DemoError::Token("No refresh token available".to_string()))?;

        tracing::debug!("Refreshing access token");

        let metadata = self.metadata().await?;
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", self.settings.client_id.clone()),
        ];
        if let Some(ref secret) = self.settings.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let mut response = self.request_tokens(&metadata.token_endpoint, &form).await?;

        let profile = match response.id_token.as_deref() {
            Some(id_token) => {
                let claims = decode_jwt_claims(id_token)?;
                self.validate_id_token_claims(&claims, metadata, None)?;
                if claims.get("sub").and_then(Value::as_str) != Some(current.profile.sub.as_str()) {
                    return Err(DemoError::Auth(
                        "Subject from renewed ID token does not match current user".to_string(),
                    ));
                }
                let mut renewed = serde_json::to_value(&current.profile)?
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                for (key, value) in self.profile_claims(claims) {
                    renewed.insert(key, value);
                }
                Claims::from_map(renewed)?
            }
            None => current.profile.clone(),
        };

        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh_token);
        }
        if response.id_token.is_none() {
            response.id_token = current.id_token.clone();
        }
        if response.session_state.is_none() {
            response.session_state = current.session_state.clone();
        }

        let user = User::from_token_response(response, profile, now());
        self.store_user(user.clone())?;

        tracing::debug!("Access token refreshed successfully");
        Ok(user)
    }

    /// Renew in the background shortly before each access token expires
    ///
    /// A failed renew is logged and retried only after the session changes.
    pub fn start_silent_renew(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut rx = self.subscribe();

        tokio::spawn(async move {
            loop {
                let delay = {
                    let session = rx.borrow_and_update();
                    session
                        .user
                        .as_ref()
                        .filter(|u| u.can_refresh())
                        .and_then(|u| u.expires_in(now()))
                        .map(renew_delay)
                };

                match delay {
                    Some(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {
                                tracing::debug!("Access token expiring, starting silent renew");
                                if let Err(e) = manager.signin_silent().await {
                                    tracing::warn!("Silent renew failed: {}", e);
                                    if rx.changed().await.is_err() {
                                        break;
                                    }
                                }
                            }
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    None => {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Sign out: revoke tokens, forget the user, and return the end-session URL
    pub async fn signout_redirect(&self) -> Result<Option<Url>> {
        match self.build_signout().await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::error!("Sign-out failed: {}", e);
                self.publish(Session::failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn build_signout(&self) -> Result<Option<Url>> {
        let metadata = self.metadata().await?;
        let user = self.get_user()?;

        if self.settings.revoke_tokens_on_signout {
            if let (Some(endpoint), Some(user)) = (&metadata.revocation_endpoint, &user) {
                self.revoke_token(endpoint, &user.access_token, "access_token").await;
                if let Some(ref refresh_token) = user.refresh_token {
                    self.revoke_token(endpoint, refresh_token, "refresh_token").await;
                }
            }
        }

        self.remove_user()?;

        let Some(ref end_session) = metadata.end_session_endpoint else {
            tracing::debug!("Provider has no end_session_endpoint");
            return Ok(None);
        };

        let mut url = Url::parse(end_session)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.settings.client_id);
            if let Some(ref uri) = self.settings.post_logout_redirect_uri {
                query.append_pair("post_logout_redirect_uri", uri);
            }
            if let Some(id_token) = user.as_ref().and_then(|u| u.id_token.as_deref()) {
                query.append_pair("id_token_hint", id_token);
            }
        }

        Ok(Some(url))
    }

    async fn revoke_token(&self, endpoint: &str, token: &str, hint: &str) {
        let mut form = vec![
            ("token", token.to_string()),
            ("token_type_hint", hint.to_string()),
            ("client_id", self.settings.client_id.clone()),
        ];
        if let Some(ref secret) = self.settings.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        match self.http.post(endpoint).form(&form).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Revoked {}", hint);
            }
            Ok(response) => {
                tracing::warn!("Revoking {} failed with status {}", hint, response.status());
            }
            Err(e) => tracing::warn!("Revoking {} failed: {}", hint, e),
        }
    }
}

/// Wait before renewing a token that expires in `expires_in` seconds
///
/// Long-lived tokens renew a fixed margin before expiry; short-lived ones at
/// half their remaining lifetime, never sooner than one second.
fn renew_delay(expires_in: i64) -> Duration {
    let secs = if expires_in > 2 * EXPIRING_NOTIFICATION_SECS {
        expires_in - EXPIRING_NOTIFICATION_SECS
    } else {
        expires_in / 2
    };
    Duration::from_secs(secs.max(MIN_RENEW_DELAY_SECS).unsigned_abs())
}
