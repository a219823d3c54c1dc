//! Awareness Delivery — emails the full analysis once a report completes.
//!
//! Delivery never changes report status. A real send sets the report's
//! delivered flag; a failed send is recorded in `delivery_error`.

pub mod error;
pub mod mailer;
pub mod notifier;
pub mod template;

pub use error::{DeliveryError, Result};
pub use mailer::{mailer_from_config, DeliveryStatus, EmailMessage, LogMailer, Mailer, ResendMailer};
pub use notifier::DeliveryNotifier;
