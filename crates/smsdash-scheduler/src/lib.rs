//! # SmsDash Scheduler
//!
//! Scheduled SMS dispatch: a durable schedule book, a polling dispatch
//! loop, transient notifications and AI drafting of message text.
//!
//! ## Architecture
//! ```text
//! ScheduleBook (in-memory list, persisted on every change)
//!   └── ScheduleStore: <data_dir>/scheduledMessages.json
//!
//! Dispatcher (tokio interval, default 30s)
//!   ├── tick(now): claim due pending records
//!   ├── send each, in insertion order → DeliveryClient
//!   ├── pending → sent | failed (terminal, no retry)
//!   └── NotifyRouter: one transient notification per record
//! ```

pub mod book;
pub mod compose;
pub mod engine;
pub mod notify;
pub mod store;

pub use book::{DispatchOutcome, NewSchedule, ScheduleBook, ScheduleEdit, StatusCounts};
pub use compose::{Draft, draft_message};
pub use engine::{Dispatcher, TickReport, run_dispatch_loop, spawn_dispatch_loop};
pub use notify::{Notification, NotifyLevel, NotifyRouter};
pub use store::ScheduleStore;
