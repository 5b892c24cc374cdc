//! # SecReport Mail
//!
//! Notification composition from the operator's HTML template and delivery
//! over SMTP (async lettre). Transport settings are re-read from the
//! configuration store on every send.

pub mod compose;
pub mod delivery;

pub use compose::{Composed, TemplateFields, compose, compose_from_file};
pub use delivery::{Attachment, DeliveryService, Mailer, OutgoingMail, SmtpMailer};
