//! Session-aware request coordination
//!
//! Every authenticated call goes through [`SessionCoordinator::send`]. The
//! coordinator attaches the in-memory access token and, when that token is
//! missing or rejected with a 401, exchanges the persisted refresh cookie
//! for a new credential pair. At most one exchange runs at a time: callers
//! that need a token while it is in flight park on a one-shot channel and
//! are woken, in arrival order, by the refresh task once it finishes.
//!
//! The access token is held in memory only. The refresh token lives in a
//! [`RefreshTokenStore`].

use super::config::ClientConfig;
use super::error::{ClientError, RefreshFailure};
use super::request::ApiRequest;
use super::store::{CookieOptions, RefreshCookie, RefreshTokenStore};
use crate::types::RefreshRequest;
use kcc_core::CredentialPair;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

type RefreshOutcome = Result<String, RefreshFailure>;

/// Receives the signal that a session ended and cannot be recovered.
///
/// A dashboard front end would navigate to `redirect_to`; the CLI prints a
/// prompt to log in again.
pub trait SessionListener: Send + Sync {
    fn session_terminated(&self, redirect_to: &str);
}

#[derive(Default)]
enum Phase {
    #[default]
    Idle,
    /// A refresh task is running; the senders are the parked callers
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

#[derive(Default)]
struct SessionState {
    access_token: Option<String>,
    phase: Phase,
    /// Identifies the current session; bumped whenever one is established
    /// or ends, so late responses from an earlier session can be recognised
    generation: u64,
    /// The refresh failure that ended a session, keyed by its generation
    last_failure: Option<(u64, RefreshFailure)>,
}

impl SessionState {
    /// Start a new generation, recording why the previous one ended
    fn advance(&mut self, failure: Option<RefreshFailure>) {
        if let Some(failure) = failure {
            self.last_failure = Some((self.generation, failure));
        }
        self.generation += 1;
    }

    /// Error for a request whose session `generation` has already ended
    fn ended(&self, generation: u64) -> ClientError {
        match &self.last_failure {
            Some((ended, failure)) if *ended == generation => {
                ClientError::RefreshFailed(failure.clone())
            }
            _ => ClientError::AuthenticationFailed("session has already ended".to_string()),
        }
    }
}

/// How a caller gets its access token
enum Ticket {
    Ready(Option<String>),
    Wait(oneshot::Receiver<RefreshOutcome>),
}

/// Attaches credentials to outbound requests and runs the single-flight
/// refresh protocol
pub struct SessionCoordinator {
    http: Client,
    base_url: String,
    refresh_path: String,
    login_route: String,
    cookie: CookieOptions,
    store: Arc<dyn RefreshTokenStore>,
    listener: Option<Arc<dyn SessionListener>>,
    state: Mutex<SessionState>,
}

impl SessionCoordinator {
    /// Create a coordinator with no session
    pub fn new(
        http: Client,
        config: &ClientConfig,
        store: Arc<dyn RefreshTokenStore>,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Self {
        Self {
            http,
            base_url: config.normalized_base_url(),
            refresh_path: config.refresh_path.clone(),
            login_route: config.login_route.clone(),
            cookie: config.cookie_options(),
            store,
            listener,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request`, recovering once from an expired access token.
    ///
    /// Non-401 responses are returned unmodified whatever their status. A
    /// 401 that cannot be recovered ends the session and is returned as
    /// [`ClientError::AuthenticationFailed`]; a failed refresh is returned
    /// as [`ClientError::RefreshFailed`] to every caller that waited on it.
    pub async fn send(
        self: &Arc<Self>,
        mut request: ApiRequest,
    ) -> Result<Response, ClientError> {
        if request.is_public() {
            return Ok(self.dispatch(&request, None).await?);
        }

        let is_refresh_call = self.is_refresh_endpoint(request.path());
        let (mut token, generation) = if is_refresh_call {
            let state = self.state.lock().await;
            (state.access_token.clone(), state.generation)
        } else {
            self.acquire_token().await?
        };

        loop {
            let response = self.dispatch(&request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if is_refresh_call || request.is_retried() {
                debug!(
                    path = request.path(),
                    retried = request.is_retried(),
                    "Unauthorized response is not retryable"
                );
                return Err(self.terminate(generation, response).await);
            }

            match self.recover(token.as_deref(), generation).await? {
                Some(fresh) => {
                    debug!(path = request.path(), "Replaying request with refreshed token");
                    token = Some(fresh);
                    request.mark_retried();
                }
                None => {
                    debug!(path = request.path(), "No refresh credential to recover with");
                    return Err(self.terminate(generation, response).await);
                }
            }
        }
    }

    /// Install a freshly issued credential pair (login, registration)
    pub async fn establish(&self, pair: CredentialPair) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        self.store
            .save(RefreshCookie::issue(&self.cookie, pair.refresh_token))
            .await?;
        state.access_token = Some(pair.access_token);
        state.advance(None);
        info!("Session established");
        Ok(())
    }

    /// Current credential pair, if both halves are present
    pub async fn credentials(&self) -> Result<Option<CredentialPair>, ClientError> {
        let access = self.state.lock().await.access_token.clone();
        let refresh = self.store.load().await?;
        Ok(access
            .zip(refresh)
            .map(|(access, cookie)| CredentialPair::new(access, cookie.value)))
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access_token.clone()
    }

    /// Refresh credential usable against this base URL, if any
    pub async fn refresh_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.usable_cookie().await?.map(|cookie| cookie.value))
    }

    pub async fn is_refreshing(&self) -> bool {
        matches!(self.state.lock().await.phase, Phase::Refreshing(_))
    }

    /// Drop both credentials without notifying the listener (logout)
    pub async fn clear(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.access_token = None;
        state.advance(None);
        self.store.clear().await?;
        info!("Session cleared");
        Ok(())
    }

    fn is_refresh_endpoint(&self, path: &str) -> bool {
        path.split('?').next() == Some(self.refresh_path.as_str())
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        request
            .build(&self.http, &self.base_url, token)
            .send()
            .await
    }

    async fn usable_cookie(&self) -> Result<Option<RefreshCookie>, ClientError> {
        let cookie = self.store.load().await?;
        Ok(cookie.filter(|cookie| {
            let allowed = cookie.allowed_for(&self.base_url);
            if !allowed {
                debug!("Secure refresh cookie withheld from non-HTTPS base URL");
            }
            allowed
        }))
    }

    /// Token to attach before the first attempt, with the generation of the
    /// session it belongs to. Starts a refresh when no access token is held
    /// but a refresh cookie is.
    async fn acquire_token(self: &Arc<Self>) -> Result<(Option<String>, u64), ClientError> {
        let (ticket, generation) = {
            let mut state = self.state.lock().await;
            let ticket = match state.access_token.clone() {
                Some(token) => Ticket::Ready(Some(token)),
                None => self.claim(&mut state).await?,
            };
            (ticket, state.generation)
        };
        Ok((self.redeem(ticket).await?, generation))
    }

    /// Token to retry with after `used`, sent in session `generation`, was
    /// rejected. `None` means there is nothing to recover with.
    async fn recover(
        self: &Arc<Self>,
        used: Option<&str>,
        generation: u64,
    ) -> Result<Option<String>, ClientError> {
        let ticket = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!("Unauthorized response from a session that already ended");
                return Err(state.ended(generation));
            }
            // Another caller may already have refreshed since `used` was sent
            let newer = match (&state.phase, &state.access_token) {
                (Phase::Idle, Some(current)) if used != Some(current.as_str()) => {
                    Some(current.clone())
                }
                _ => None,
            };
            match newer {
                Some(token) => Ticket::Ready(Some(token)),
                None => {
                    state.access_token = None;
                    self.claim(&mut state).await?
                }
            }
        };
        self.redeem(ticket).await
    }

    /// Join the in-flight refresh, or start one if a refresh cookie exists.
    /// Must be called with the state lock held and no access token.
    async fn claim(self: &Arc<Self>, state: &mut SessionState) -> Result<Ticket, ClientError> {
        if let Phase::Refreshing(waiters) = &mut state.phase {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            debug!(waiting = waiters.len(), "Queued behind in-flight refresh");
            return Ok(Ticket::Wait(rx));
        }

        let Some(cookie) = self.usable_cookie().await? else {
            return Ok(Ticket::Ready(None));
        };

        let (tx, rx) = oneshot::channel();
        state.phase = Phase::Refreshing(vec![tx]);
        debug!("Starting credential refresh");

        // Runs detached so that dropping the initiating caller cannot leave
        // the phase stuck in `Refreshing`
        tokio::spawn(Arc::clone(self).run_refresh(cookie.value, state.generation));

        Ok(Ticket::Wait(rx))
    }

    async fn redeem(&self, ticket: Ticket) -> Result<Option<String>, ClientError> {
        match ticket {
            Ticket::Ready(token) => Ok(token),
            Ticket::Wait(rx) => match rx.await {
                Ok(Ok(token)) => Ok(Some(token)),
                Ok(Err(failure)) => Err(ClientError::RefreshFailed(failure)),
                Err(_) => Err(ClientError::RefreshFailed(RefreshFailure::transport(
                    "refresh task ended without a result",
                ))),
            },
        }
    }

    /// The refresh task: the only one to drain the queue. Its result is
    /// applied only if the session it started in is still current.
    async fn run_refresh(self: Arc<Self>, refresh_token: String, generation: u64) {
        let exchanged = self.exchange(&refresh_token).await;

        let (outcome, waiters, current) = {
            let mut state = self.state.lock().await;
            let current = state.generation == generation;
            let outcome = if current {
                self.settle(&mut state, exchanged).await
            } else {
                debug!("Session changed during refresh; discarding the result");
                Err(RefreshFailure::transport("session changed during refresh"))
            };
            let waiters = match std::mem::take(&mut state.phase) {
                Phase::Refreshing(waiters) => waiters,
                Phase::Idle => Vec::new(),
            };
            (outcome, waiters, current)
        };

        match &outcome {
            Ok(_) => info!(waiters = waiters.len(), "Credential refresh succeeded"),
            Err(failure) => {
                warn!(waiters = waiters.len(), "Credential refresh failed: {failure}");
                if current {
                    self.notify_terminated();
                }
            }
        }

        for waiter in waiters {
            // A receiver dropped by a cancelled caller is not an error
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Apply an exchange result to the current session: persist the rotated
    /// refresh cookie on success, end the session on failure
    async fn settle(
        &self,
        state: &mut SessionState,
        exchanged: Result<CredentialPair, RefreshFailure>,
    ) -> RefreshOutcome {
        let outcome = match exchanged {
            Ok(pair) => self
                .store
                .save(RefreshCookie::issue(&self.cookie, pair.refresh_token))
                .await
                .map(|()| pair.access_token)
                .map_err(|e| {
                    RefreshFailure::transport(format!("failed to persist refresh cookie: {e}"))
                }),
            Err(failure) => Err(failure),
        };

        match &outcome {
            Ok(token) => state.access_token = Some(token.clone()),
            Err(failure) => {
                state.access_token = None;
                if let Err(e) = self.store.clear().await {
                    warn!("Failed to clear refresh cookie: {e}");
                }
                state.advance(Some(failure.clone()));
            }
        }
        outcome
    }

    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, RefreshFailure> {
        let url = format!("{}{}", self.base_url, self.refresh_path);
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| RefreshFailure::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshFailure::status(status.as_u16(), message));
        }

        response
            .json::<CredentialPair>()
            .await
            .map_err(|e| RefreshFailure::transport(format!("invalid refresh response: {e}")))
    }

    /// End session `generation` after an unrecoverable 401: drop both
    /// credentials and tell the listener. A session that already ended is
    /// not ended again.
    async fn terminate(&self, generation: u64, response: Response) -> ClientError {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!("Session already ended; not terminating again");
                return state.ended(generation);
            }
            state.access_token = None;
            if let Err(e) = self.store.clear().await {
                warn!("Failed to clear refresh cookie: {e}");
            }
            state.advance(None);
        }
        self.notify_terminated();
        unauthorized(response).await
    }

    fn notify_terminated(&self) {
        warn!(redirect_to = %self.login_route, "Session terminated");
        if let Some(listener) = &self.listener {
            listener.session_terminated(&self.login_route);
        }
    }
}

async fn unauthorized(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    ClientError::AuthenticationFailed(message)
}
