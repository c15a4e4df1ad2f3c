//! Display-name negotiation for the chat.
//!
//! Authenticated participants are named by the server (`username-auto-set`).
//! Anonymous participants claim a name and wait for the verdict:
//!
//! ```text
//!           claim(name)                 username-accepted
//!  Idle ───────────────► Pending ─────────────────────────► Resolved
//!   ▲                     │   │
//!   │    username-taken   │   │ timeout (when configured)
//!   │                     ▼   ▼
//!   └──── claim(name) ── Rejected
//! ```
//!
//! A resolved identity is fixed for the lifetime of the channel; later
//! identity events are ignored until [`IdentityNegotiator::reset`].

use std::time::{Duration, Instant};

use crate::protocol::{ClientEvent, ServerEvent, UsernameClaim};

/// Longest name a participant may claim, in characters.
pub const MAX_NAME_LEN: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub display_name: Option<String>,
    pub is_authenticated: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRejection {
    Taken,
    NoResponse,
}

impl ClaimRejection {
    pub fn message(&self) -> &'static str {
        match self {
            ClaimRejection::Taken => "Username already taken. Please choose another.",
            ClaimRejection::NoResponse => "No response from server. Please try again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    Idle,
    Pending { name: String, since: Instant },
    Rejected { name: String, reason: ClaimRejection },
    Resolved,
}

/// Result of an identity event or timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    Resolved(String),
    Taken(String),
    TimedOut(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Please enter a username")]
    EmptyName,
    #[error("Username must be at most 20 characters")]
    NameTooLong,
    #[error("identity already resolved")]
    AlreadyResolved,
    #[error("authenticated participants are named by the server")]
    AuthenticatedIdentity,
}

pub struct IdentityNegotiator {
    identity: Identity,
    claim: ClaimState,
    claim_timeout: Option<Duration>,
}

impl IdentityNegotiator {
    /// `claim_timeout` of `None` waits for the verdict indefinitely.
    pub fn new(authenticated: bool, claim_timeout: Option<Duration>) -> Self {
        Self {
            identity: Identity {
                display_name: None,
                is_authenticated: authenticated,
                resolved: false,
            },
            claim: ClaimState::Idle,
            claim_timeout,
        }
    }

    /// Claim `name` in `room_id`. Returns the `set-username` event.
    ///
    /// A new claim may be made after a rejection or while a previous claim
    /// is still unanswered; the latest claim is the one tracked.
    pub fn claim(
        &mut self,
        room_id: &str,
        name: &str,
        now: Instant,
    ) -> Result<ClientEvent, IdentityError> {
        if self.identity.resolved {
            return Err(IdentityError::AlreadyResolved);
        }
        if self.identity.is_authenticated {
            return Err(IdentityError::AuthenticatedIdentity);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(IdentityError::NameTooLong);
        }

        log::debug!("Claiming display name {name:?}");
        self.claim = ClaimState::Pending {
            name: name.to_string(),
            since: now,
        };
        Ok(ClientEvent::SetUsername(UsernameClaim {
            room_id: room_id.to_string(),
            username: name.to_string(),
        }))
    }

    /// Apply an identity event.
    pub fn handle_event(&mut self, event: &ServerEvent) -> Option<IdentityOutcome> {
        if self.identity.resolved {
            return None;
        }

        match event {
            ServerEvent::UsernameAutoSet(payload) => {
                self.identity.is_authenticated = true;
                Some(self.resolve(payload.username.clone()))
            }
            ServerEvent::UsernameAccepted(payload) => {
                let claimed = match &self.claim {
                    ClaimState::Pending { name, .. } => name.clone(),
                    // Verdict arrived after the local timeout
                    ClaimState::Rejected {
                        name,
                        reason: ClaimRejection::NoResponse,
                    } => name.clone(),
                    _ => {
                        log::warn!("Ignoring username-accepted with no open claim");
                        return None;
                    }
                };
                if let Some(accepted) = payload {
                    if accepted.username != claimed {
                        log::warn!(
                            "Ignoring username-accepted for {:?}, claimed {claimed:?}",
                            accepted.username
                        );
                        return None;
                    }
                }
                Some(self.resolve(claimed))
            }
            ServerEvent::UsernameTaken(_) => {
                let name = match &self.claim {
                    ClaimState::Pending { name, .. }
                    | ClaimState::Rejected {
                        name,
                        reason: ClaimRejection::NoResponse,
                    } => name.clone(),
                    _ => return None,
                };
                log::info!("Display name {name:?} is taken");
                self.claim = ClaimState::Rejected {
                    name: name.clone(),
                    reason: ClaimRejection::Taken,
                };
                Some(IdentityOutcome::Taken(name))
            }
            _ => None,
        }
    }

    /// Expire an unanswered claim when a timeout is configured.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<IdentityOutcome> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        let ClaimState::Pending { name, .. } = &self.claim else {
            return None;
        };
        let name = name.clone();
        log::warn!("No response to display name claim {name:?}");
        self.claim = ClaimState::Rejected {
            name: name.clone(),
            reason: ClaimRejection::NoResponse,
        };
        Some(IdentityOutcome::TimedOut(name))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (&self.claim, self.claim_timeout) {
            (ClaimState::Pending { since, .. }, Some(timeout)) => Some(*since + timeout),
            _ => None,
        }
    }

    /// Forget the identity; used when the channel is replaced.
    pub fn reset(&mut self, authenticated: bool) {
        self.identity = Identity {
            display_name: None,
            is_authenticated: authenticated,
            resolved: false,
        };
        self.claim = ClaimState::Idle;
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_resolved(&self) -> bool {
        self.identity.resolved
    }

    pub fn display_name(&self) -> Option<&str> {
        self.identity.display_name.as_deref()
    }

    pub fn claim_state(&self) -> &ClaimState {
        &self.claim
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.claim, ClaimState::Pending { .. })
    }

    /// Message for the claim form after a rejection.
    pub fn error(&self) -> Option<&'static str> {
        match &self.claim {
            ClaimState::Rejected { reason, .. } => Some(reason.message()),
            _ => None,
        }
    }

    /// Anonymous participants see the claim form until resolved.
    pub fn is_claim_form_open(&self) -> bool {
        !self.identity.is_authenticated && !self.identity.resolved
    }

    fn resolve(&mut self, name: String) -> IdentityOutcome {
        log::info!("Display name resolved: {name}");
        self.identity.display_name = Some(name.clone());
        self.identity.resolved = true;
        self.claim = ClaimState::Resolved;
        IdentityOutcome::Resolved(name)
    }
}
