pub mod client;
pub mod templates;

pub use client::{MailClient, MailError, OutgoingMail, Recipient, Sender};
