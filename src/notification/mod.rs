//! Email delivery of HIGH alerts.
//!
//! [`EmailOutput`] plugs into the output manager like any other destination.
//! The actual transport sits behind [`MailTransport`] so it can be replaced in
//! tests.
pub mod email;

pub use email::{EmailOutput, MailTransport, SmtpMailer};
