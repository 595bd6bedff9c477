//! The schedule book, sole owner of the scheduled-message list.
//!
//! All changes go through [`ScheduleBook::update`], which applies the change
//! to a copy, persists the full collection, and only then swaps it in.
//! The book also tracks which records are being sent right now, so a record
//! is never dispatched twice concurrently and cannot be edited mid-send.

use chrono::{DateTime, Utc};
use serde::Serialize;
use smsdash_core::error::{Result, SmsDashError, ValidationError};
use smsdash_core::phone::{CanonicalNumber, PhoneNormalizer};
use smsdash_core::types::{MessageStatus, ScheduledMessage, validate_message};
use std::collections::HashSet;

use crate::store::ScheduleStore;

/// User input for a new scheduled message.
#[derive(Debug, Clone, Default)]
pub struct NewSchedule {
    pub message: String,
    /// Free-form phone numbers; blank entries are ignored.
    pub recipients: Vec<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub ai_generated: bool,
}

/// Changes to a pending message. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ScheduleEdit {
    pub message: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ScheduleBook {
    messages: Vec<ScheduledMessage>,
    store: ScheduleStore,
    normalizer: PhoneNormalizer,
    in_flight: HashSet<String>,
}

impl ScheduleBook {
    /// Open the book, loading whatever the store holds.
    pub fn open(store: ScheduleStore, normalizer: PhoneNormalizer) -> Result<Self> {
        let messages = store.load()?;
        tracing::info!("📅 Loaded {} scheduled messages", messages.len());
        Ok(Self {
            messages,
            store,
            normalizer,
            in_flight: HashSet::new(),
        })
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    /// Apply a change to a copy of the list, persist it, then commit it.
    fn update<T>(
        &mut self,
        change: impl FnOnce(&mut Vec<ScheduledMessage>) -> Result<T>,
    ) -> Result<T> {
        let mut next = self.messages.clone();
        let out = change(&mut next)?;
        self.store.save_all(&next)?;
        self.messages = next;
        Ok(out)
    }

    fn normalize_recipients(&self, raw: &[String]) -> Result<Vec<CanonicalNumber>> {
        let entries: Vec<&str> = raw
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        if entries.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }
        Ok(self.normalizer.normalize_all(&entries)?)
    }

    fn ensure_not_in_flight(&self, id: &str) -> Result<()> {
        if self.in_flight.contains(id) {
            return Err(SmsDashError::InFlight(id.to_string()));
        }
        Ok(())
    }

    /// Validate and persist a new pending message.
    pub fn create(&mut self, input: NewSchedule) -> Result<ScheduledMessage> {
        let message = validate_message(&input.message)?;
        let recipients = self.normalize_recipients(&input.recipients)?;
        let at = input.scheduled_time.ok_or(ValidationError::MissingTime)?;

        let record = ScheduledMessage::new(message, recipients, at, input.ai_generated);
        let created = record.clone();
        self.update(|list| {
            list.push(record);
            Ok(())
        })?;
        tracing::info!(
            "📅 Scheduled message {} for {} ({} recipient(s))",
            created.id,
            created.scheduled_time,
            created.recipients.len()
        );
        Ok(created)
    }

    /// Change a pending message that is not being sent.
    pub fn edit(&mut self, id: &str, edit: ScheduleEdit) -> Result<ScheduledMessage> {
        self.ensure_not_in_flight(id)?;
        let message = edit.message.as_deref().map(validate_message).transpose()?;
        let recipients = match &edit.recipients {
            Some(raw) => Some(self.normalize_recipients(raw)?),
            None => None,
        };

        let updated = self.update(|list| {
            let record = list
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| SmsDashError::NotFound(id.to_string()))?;
            if record.status != MessageStatus::Pending {
                return Err(ValidationError::NotPending(record.status.to_string()).into());
            }
            if let Some(m) = message {
                record.message = m;
            }
            if let Some(r) = recipients {
                record.recipients = r;
            }
            if let Some(at) = edit.scheduled_time {
                record.scheduled_time = at;
            }
            Ok(record.clone())
        })?;
        tracing::info!("✏️ Edited scheduled message {id}");
        Ok(updated)
    }

    /// Cancel a pending message before it is sent.
    pub fn cancel(&mut self, id: &str) -> Result<ScheduledMessage> {
        self.ensure_not_in_flight(id)?;
        let removed = self.update(|list| {
            let pos = list
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| SmsDashError::NotFound(id.to_string()))?;
            if list[pos].status != MessageStatus::Pending {
                return Err(ValidationError::NotPending(list[pos].status.to_string()).into());
            }
            Ok(list.remove(pos))
        })?;
        tracing::info!("🗑️ Cancelled scheduled message {id}");
        Ok(removed)
    }

    /// Delete a record in any status, unless it is being sent.
    pub fn delete(&mut self, id: &str) -> Result<ScheduledMessage> {
        self.ensure_not_in_flight(id)?;
        let removed = self.update(|list| {
            let pos = list
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| SmsDashError::NotFound(id.to_string()))?;
            Ok(list.remove(pos))
        })?;
        tracing::info!("🗑️ Deleted scheduled message {id} ({})", removed.status);
        Ok(removed)
    }

    pub fn list(&self) -> &[ScheduledMessage] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for m in &self.messages {
            match m.status {
                MessageStatus::Pending => counts.pending += 1,
                MessageStatus::Sent => counts.sent += 1,
                MessageStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Pending messages scheduled at or before `now`, in insertion order.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<&ScheduledMessage> {
        self.messages.iter().filter(|m| m.is_due(now)).collect()
    }

    /// Due messages that are not already being sent. The returned records
    /// are marked in flight until [`complete`](Self::complete) is called.
    pub fn claim_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledMessage> {
        let claimed: Vec<ScheduledMessage> = self
            .messages
            .iter()
            .filter(|m| m.is_due(now) && !self.in_flight.contains(&m.id))
            .cloned()
            .collect();
        for m in &claimed {
            self.in_flight.insert(m.id.clone());
        }
        claimed
    }

    /// Drop claims without recording an outcome; the records stay pending.
    pub fn release(&mut self, ids: &[String]) {
        for id in ids {
            self.in_flight.remove(id);
        }
    }

    /// Record the outcome of a delivery attempt and release the claim.
    ///
    /// The in-memory transition stands even if persisting fails, so a
    /// delivered message is never picked up again by a later tick.
    pub fn complete(
        &mut self,
        id: &str,
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    ) -> Result<Option<ScheduledMessage>> {
        self.in_flight.remove(id);
        let Some(record) = self.messages.iter_mut().find(|m| m.id == id) else {
            tracing::warn!("⚠️ Dispatched message {id} no longer exists");
            return Ok(None);
        };
        if record.status != MessageStatus::Pending {
            tracing::warn!("⚠️ Message {id} already {}, ignoring outcome", record.status);
            return Ok(Some(record.clone()));
        }

        match outcome {
            DispatchOutcome::Sent => {
                record.status = MessageStatus::Sent;
                record.last_error = None;
            }
            DispatchOutcome::Failed(reason) => {
                record.status = MessageStatus::Failed;
                record.last_error = Some(reason);
            }
        }
        record.dispatched_at = Some(at);
        let done = record.clone();

        self.store.save_all(&self.messages)?;
        Ok(Some(done))
    }
}
