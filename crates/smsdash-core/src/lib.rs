//! # SmsDash Core
//!
//! Shared building blocks for the scheduled SMS dispatch service:
//! the scheduled-message data model, phone number normalization,
//! configuration, the error taxonomy, and the traits behind which the
//! external collaborators (message-send endpoint, auth token provider,
//! generative-text endpoint) are plugged in.

pub mod config;
pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

pub use config::SmsDashConfig;
pub use error::{DeliveryError, GenerationError, Result, SmsDashError, ValidationError};
pub use phone::{CanonicalNumber, PhoneNormalizer};
pub use traits::{DeliveryClient, ProviderResponse, TextGenerator, TokenSource};
pub use types::{MAX_MESSAGE_LEN, MessageStatus, ScheduledMessage, ViewMode, validate_message};
