//! Per-user session: discovery browsing, matches and chat transcripts.
//!
//! A [`Session`] is a plain value. Every transition takes `&mut Session`, so
//! two users never share state unless a caller deliberately shares one
//! session object. Rejected transitions return a [`TransitionError`] and leave
//! the session exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, Profile};
use crate::gateway::CompletionGateway;

/// Prefix of the assistant turn recorded when the provider call fails.
pub const PROVIDER_ERROR_MARKER: &str = "error contacting provider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Discovery,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{operation} is only available in the {expected:?} view")]
    WrongView {
        operation: &'static str,
        expected: View,
    },
    #[error("no profiles left to browse")]
    CatalogExhausted,
    #[error("{0:?} is not one of your matches")]
    NotMatched(String),
    #[error("message text is empty")]
    EmptyMessage,
}

/// Result of a successful `match_current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(String),
    /// The profile was matched before; matches and histories were left alone.
    AlreadyMatched(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    catalog: Arc<Catalog>,
    current_view: View,
    browse_cursor: usize,
    active_match: Option<String>,
    matches: Vec<Profile>,
    histories: HashMap<String, Vec<ConversationTurn>>,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            current_view: View::Discovery,
            browse_cursor: 0,
            active_match: None,
            matches: Vec::new(),
            histories: HashMap::new(),
        }
    }

    pub fn current_view(&self) -> View {
        self.current_view
    }

    pub fn browse_cursor(&self) -> usize {
        self.browse_cursor
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Profile under the cursor, if any remain.
    pub fn current_profile(&self) -> Option<&Profile> {
        self.catalog.get(self.browse_cursor)
    }

    /// True once every profile has been passed or matched.
    pub fn is_exhausted(&self) -> bool {
        self.browse_cursor >= self.catalog.len()
    }

    pub fn matches(&self) -> &[Profile] {
        &self.matches
    }

    pub fn is_matched(&self, name: &str) -> bool {
        self.matches.iter().any(|p| p.name == name)
    }

    pub fn active_match(&self) -> Option<&Profile> {
        let name = self.active_match.as_deref()?;
        self.matches.iter().find(|p| p.name == name)
    }

    pub fn history(&self, name: &str) -> Option<&[ConversationTurn]> {
        self.histories.get(name).map(Vec::as_slice)
    }

    /// Transcript of the open chat.
    pub fn active_history(&self) -> Option<&[ConversationTurn]> {
        self.history(self.active_match.as_deref()?)
    }

    fn require_view(&self, operation: &'static str, expected: View) -> Result<(), TransitionError> {
        if self.current_view == expected {
            Ok(())
        } else {
            Err(TransitionError::WrongView {
                operation,
                expected,
            })
        }
    }

    /// Pass on the current profile.
    pub fn skip(&mut self) -> Result<(), TransitionError> {
        self.require_view("skip", View::Discovery)?;
        if self.is_exhausted() {
            return Err(TransitionError::CatalogExhausted);
        }
        self.browse_cursor += 1;
        Ok(())
    }

    /// Match the current profile and move on to the next one.
    pub fn match_current(&mut self) -> Result<MatchOutcome, TransitionError> {
        self.require_view("match", View::Discovery)?;
        let profile = self
            .current_profile()
            .cloned()
            .ok_or(TransitionError::CatalogExhausted)?;
        self.browse_cursor += 1;

        if self.is_matched(&profile.name) {
            warn!(name = %profile.name, "Profile already matched; leaving matches unchanged");
            return Ok(MatchOutcome::AlreadyMatched(profile.name));
        }

        let name = profile.name.clone();
        self.histories.entry(name.clone()).or_default();
        self.matches.push(profile);
        info!(%name, matches = self.matches.len(), "New match");
        Ok(MatchOutcome::Matched(name))
    }

    /// Open the chat with an existing match. Works from either view.
    pub fn open_chat(&mut self, name: &str) -> Result<(), TransitionError> {
        if !self.is_matched(name) {
            return Err(TransitionError::NotMatched(name.to_string()));
        }
        self.active_match = Some(name.to_string());
        self.current_view = View::Chat;
        Ok(())
    }

    /// Leave the chat and return to discovery.
    pub fn close_chat(&mut self) -> Result<(), TransitionError> {
        self.require_view("close_chat", View::Chat)?;
        self.active_match = None;
        self.current_view = View::Discovery;
        Ok(())
    }

    /// Send a message to the open chat and record the reply.
    ///
    /// Appends the user turn, asks the gateway for a reply over the whole
    /// updated history, then appends exactly one assistant turn. A gateway
    /// failure becomes an assistant turn starting with
    /// [`PROVIDER_ERROR_MARKER`]. Returns the appended assistant turn.
    pub async fn send_message<G>(
        &mut self,
        text: &str,
        gateway: &G,
    ) -> Result<ConversationTurn, TransitionError>
    where
        G: CompletionGateway + ?Sized,
    {
        self.require_view("send_message", View::Chat)?;
        if text.trim().is_empty() {
            return Err(TransitionError::EmptyMessage);
        }
        let profile = self
            .active_match()
            .cloned()
            .ok_or_else(|| TransitionError::NotMatched(String::new()))?;

        let history = self.histories.entry(profile.name.clone()).or_default();
        history.push(ConversationTurn::user(text));

        let reply = match gateway
            .generate_reply(history.as_slice(), &profile.persona_instructions)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(name = %profile.name, kind = ?e.kind, error = %e, "Completion failed");
                format!("{}: {}", PROVIDER_ERROR_MARKER, e)
            }
        };

        let turn = ConversationTurn::assistant(reply);
        history.push(turn.clone());
        Ok(turn)
    }
}
