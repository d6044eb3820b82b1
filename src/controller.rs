use chrono::{DateTime, Local, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fallback::{fallback_headline, RandomSource};
use crate::models::{next_hour_boundary, Headline, HourKey, PersistedState, Status};
use crate::news_client::{fetch_headline, FetchError, HeadlineSource};
use crate::store::{HeadlinePersistence, KeyValueStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    /// Headline card visible, possibly with a fetch in flight.
    Active,
    /// Dismissed for the current hour.
    Empty { next_at: DateTime<Local> },
}

/// Permission for one fetch to write the headline.
///
/// Only the ticket carrying the controller's current generation is applied on
/// completion; anything older was overtaken by a newer request, a dismiss or
/// a credential change.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    credential: String,
    hour_key: HourKey,
}

impl FetchTicket {
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn hour_key(&self) -> &HourKey {
        &self.hour_key
    }
}

pub struct HeadlineController<S: KeyValueStore> {
    persistence: HeadlinePersistence<S>,
    state: PersistedState,
    display: DisplayState,
    status: Status,
    shown_hour: Option<HourKey>,
    generation: u64,
    rng: Box<dyn RandomSource>,
}

impl<S: KeyValueStore> HeadlineController<S> {
    pub fn new(store: S, rng: Box<dyn RandomSource>) -> Self {
        let persistence = HeadlinePersistence::new(store);
        let state = persistence.load_state();
        Self {
            persistence,
            state,
            display: DisplayState::Active,
            status: Status::Ready("ready ✓".to_string()),
            shown_hour: None,
            generation: 0,
            rng,
        }
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn announce(&mut self, text: impl Into<String>) {
        self.status = Status::Ready(text.into());
    }

    /// Hour the current display was decided for; `None` before the first reconcile.
    pub fn shown_hour(&self) -> Option<&HourKey> {
        self.shown_hour.as_ref()
    }

    pub fn credential(&mut self) -> Option<String> {
        self.persistence.credential()
    }

    /// Decide what to show for `now`.
    ///
    /// Returns a ticket when a network fetch has to run; the caller performs it
    /// and reports back through [`complete_fetch`](Self::complete_fetch).
    pub fn reconcile(&mut self, now: DateTime<Local>, force: bool) -> Option<FetchTicket> {
        let hk = HourKey::from_time(&now);
        self.shown_hour = Some(hk.clone());

        if self.state.dismissed_hour_key.as_ref() == Some(&hk) {
            debug!("Hour {} dismissed, showing empty state", hk);
            self.display = DisplayState::Empty {
                next_at: next_hour_boundary(&now),
            };
            self.status = Status::Dismissed;
            return None;
        }

        self.display = DisplayState::Active;

        if !force && self.state.last_hour_key.as_ref() == Some(&hk) && self.state.has_headline() {
            debug!("Serving cached headline for {}", hk);
            self.status = Status::Cached;
            return None;
        }

        self.state.last_hour_key = Some(hk.clone());
        self.persistence.save_state(&self.state);
        self.generation += 1;

        let Some(credential) = self.persistence.credential() else {
            info!("No credential set, using fallback headline");
            self.apply_fallback(now.with_timezone(&Utc), Status::NoApiKey);
            return None;
        };

        self.status = Status::Fetching;
        Some(FetchTicket {
            generation: self.generation,
            credential,
            hour_key: hk,
        })
    }

    /// Apply a finished fetch. Returns `false` when the ticket was stale and
    /// the outcome was dropped.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Headline, FetchError>,
        now: DateTime<Local>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "Discarding stale fetch for {} (generation {} < {})",
                ticket.hour_key, ticket.generation, self.generation
            );
            return false;
        }

        match outcome {
            Ok(headline) => {
                self.state.apply_headline(headline);
                self.persistence.save_state(&self.state);
                self.status = Status::Updated;
            }
            Err(e) => {
                warn!("Headline fetch failed, using fallback: {}", e);
                self.apply_fallback(now.with_timezone(&Utc), Status::ApiError);
            }
        }
        true
    }

    /// Reconcile and, if needed, fetch on the calling thread.
    #[allow(dead_code)]
    pub fn reconcile_with(&mut self, source: &dyn HeadlineSource, now: DateTime<Local>, force: bool) {
        if let Some(ticket) = self.reconcile(now, force) {
            let outcome = fetch_headline(source, ticket.credential(), now.with_timezone(&Utc));
            self.complete_fetch(ticket, outcome, now);
        }
    }

    pub fn dismiss(&mut self, now: DateTime<Local>) {
        let hk = HourKey::from_time(&now);
        info!("Dismissed headline for {}", hk);
        self.state.dismissed_hour_key = Some(hk.clone());
        self.persistence.save_state(&self.state);
        self.generation += 1;
        self.shown_hour = Some(hk);
        self.display = DisplayState::Empty {
            next_at: next_hour_boundary(&now),
        };
        self.status = Status::Dismissed;
    }

    pub fn undismiss(&mut self, now: DateTime<Local>) -> Option<FetchTicket> {
        self.state.dismissed_hour_key = None;
        self.persistence.save_state(&self.state);
        self.status = Status::Undone;
        self.reconcile(now, false)
    }

    pub fn force_refresh(&mut self, now: DateTime<Local>) -> Option<FetchTicket> {
        self.reconcile(now, true)
    }

    pub fn set_credential(&mut self, value: &str) -> Result<(), CredentialError> {
        let value = value.trim();
        if value.is_empty() {
            self.status = Status::EmptyKey;
            return Err(CredentialError::Empty);
        }

        self.persistence.set_credential(value);
        self.generation += 1;
        self.status = Status::Saved;
        Ok(())
    }

    pub fn clear_credential(&mut self) {
        self.persistence.clear_credential();
        self.generation += 1;
        self.status = Status::Cleared;
    }

    fn apply_fallback(&mut self, now: DateTime<Utc>, status: Status) {
        let headline = fallback_headline(self.rng.as_mut(), now);
        self.state.apply_headline(headline);
        self.persistence.save_state(&self.state);
        self.status = status;
    }

    #[cfg(test)]
    pub(crate) fn persistence(&self) -> &HeadlinePersistence<S> {
        &self.persistence
    }
}
