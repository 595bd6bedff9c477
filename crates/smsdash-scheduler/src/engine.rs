//! Dispatch engine: scans the book for due messages and sends them.
//!
//! `Dispatcher::tick(now)` is one scan-and-send cycle and is what tests
//! drive directly. `run_dispatch_loop` calls it from a tokio interval.
//! Sends run one at a time, in insertion order, without holding the book
//! lock, so the API stays responsive while a tick is in progress.

use chrono::{DateTime, Utc};
use serde::Serialize;
use smsdash_core::traits::DeliveryClient;
use smsdash_core::types::MessageStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::book::{DispatchOutcome, ScheduleBook};
use crate::notify::{NotifyLevel, NotifyRouter};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Another tick was still running, nothing was scanned.
    pub skipped: bool,
    /// Records processed this tick, in processing order.
    pub processed: Vec<ProcessedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRecord {
    pub id: String,
    pub status: MessageStatus,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            processed: Vec::new(),
        }
    }

    pub fn sent(&self) -> usize {
        self.count(MessageStatus::Sent)
    }

    pub fn failed(&self) -> usize {
        self.count(MessageStatus::Failed)
    }

    fn count(&self, status: MessageStatus) -> usize {
        self.processed.iter().filter(|p| p.status == status).count()
    }
}

/// Clears the scanning flag when a tick ends, however it ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Error recorded for a send that was cut off by a cancelled tick.
pub const INTERRUPTED_SEND: &str = "Dispatch was interrupted before the provider answered";

/// Claims of the running tick that have not been completed yet.
///
/// When a tick is dropped mid-way (its task aborted, or a caller gave up
/// on it), the record whose send was underway is marked failed, since the
/// provider may already have delivered it, and the records not yet tried
/// are released so the next tick picks them up.
struct ClaimGuard {
    book: Arc<Mutex<ScheduleBook>>,
    notifier: Arc<Mutex<NotifyRouter>>,
    sending: Option<String>,
    waiting: Vec<String>,
}

impl ClaimGuard {
    fn start(&mut self, id: &str) {
        self.waiting.retain(|w| w != id);
        self.sending = Some(id.to_string());
    }

    fn finish(&mut self) {
        self.sending = None;
    }
}

fn settle_claims(
    book: &mut ScheduleBook,
    notifier: &mut NotifyRouter,
    sending: Option<String>,
    waiting: &[String],
) {
    if let Some(id) = sending {
        tracing::warn!("⚠️ Send of {id} was interrupted, marking it failed");
        let outcome = DispatchOutcome::Failed(INTERRUPTED_SEND.to_string());
        if let Err(e) = book.complete(&id, outcome, Utc::now()) {
            tracing::warn!("⚠️ Failed to persist outcome of {id}: {e}");
        }
        notifier.push(NotifyLevel::Error, "Message failed", INTERRUPTED_SEND, &id);
    }
    if !waiting.is_empty() {
        tracing::info!("↩️ Releasing {} unsent claim(s)", waiting.len());
        book.release(waiting);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let sending = self.sending.take();
        let waiting = std::mem::take(&mut self.waiting);
        if sending.is_none() && waiting.is_empty() {
            return;
        }

        if let (Ok(mut book), Ok(mut notifier)) = (self.book.try_lock(), self.notifier.try_lock()) {
            settle_claims(&mut book, &mut notifier, sending, &waiting);
            return;
        }

        let (book, notifier) = (self.book.clone(), self.notifier.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut book = book.lock().await;
                    let mut notifier = notifier.lock().await;
                    settle_claims(&mut book, &mut notifier, sending, &waiting);
                });
            }
            Err(_) => {
                tracing::warn!("⚠️ Dispatch claims dropped outside a runtime, not released");
            }
        }
    }
}

pub struct Dispatcher {
    book: Arc<Mutex<ScheduleBook>>,
    delivery: Arc<dyn DeliveryClient>,
    notifier: Arc<Mutex<NotifyRouter>>,
    scanning: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        book: Arc<Mutex<ScheduleBook>>,
        delivery: Arc<dyn DeliveryClient>,
        notifier: Arc<Mutex<NotifyRouter>>,
    ) -> Self {
        Self {
            book,
            delivery,
            notifier,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn book(&self) -> &Arc<Mutex<ScheduleBook>> {
        &self.book
    }

    pub fn notifier(&self) -> &Arc<Mutex<NotifyRouter>> {
        &self.notifier
    }

    /// `true` while a tick is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Send every message due at `now`. Failed sends are terminal.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("⏳ Previous dispatch tick still running, skipping");
            return TickReport::skipped();
        }
        let _guard = ScanGuard(&self.scanning);

        let due = self.book.lock().await.claim_due(now);
        let mut report = TickReport::default();
        if due.is_empty() {
            tracing::debug!("No scheduled messages due at {now}");
            return report;
        }
        tracing::info!("📤 {} scheduled message(s) due", due.len());

        let mut claims = ClaimGuard {
            book: self.book.clone(),
            notifier: self.notifier.clone(),
            sending: None,
            waiting: due.iter().map(|r| r.id.clone()).collect(),
        };

        for record in due {
            claims.start(&record.id);
            let recipients = record.recipient_strings();
            let result = self.delivery.send(&recipients, &record.message).await;

            let (outcome, level, title, body) = match &result {
                Ok(_) => (
                    DispatchOutcome::Sent,
                    NotifyLevel::Success,
                    "Message sent",
                    format!("Scheduled message sent to {} recipient(s)", recipients.len()),
                ),
                Err(e) => {
                    tracing::warn!("⚠️ Scheduled message {} failed: {e}", record.id);
                    (
                        DispatchOutcome::Failed(e.to_string()),
                        NotifyLevel::Error,
                        "Message failed",
                        e.user_message().to_string(),
                    )
                }
            };

            let status = match &outcome {
                DispatchOutcome::Sent => MessageStatus::Sent,
                DispatchOutcome::Failed(_) => MessageStatus::Failed,
            };
            let completed = self.book.lock().await.complete(&record.id, outcome, now);
            claims.finish();
            if let Err(e) = completed {
                tracing::warn!("⚠️ Failed to persist outcome of {}: {e}", record.id);
            }
            self.notifier.lock().await.push(level, title, &body, &record.id);

            report.processed.push(ProcessedRecord {
                id: record.id,
                status,
            });
        }

        tracing::info!(
            "✅ Dispatch tick done: {} sent, {} failed",
            report.sent(),
            report.failed()
        );
        report
    }
}

/// Drive `tick` from a fixed interval until `shutdown` is notified.
/// Late ticks are delayed rather than bursted.
pub async fn run_dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    every: Duration,
    shutdown: Arc<Notify>,
) {
    tracing::info!("⏰ Dispatch loop started (check every {}s)", every.as_secs_f32());

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                dispatcher.tick(Utc::now()).await;
            }
            _ = shutdown.notified() => {
                tracing::info!("⏹️ Dispatch loop stopped");
                break;
            }
        }
    }
}

/// Spawn [`run_dispatch_loop`] as a background tokio task.
pub fn spawn_dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    every: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(run_dispatch_loop(dispatcher, every, shutdown))
}
