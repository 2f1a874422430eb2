// src/formatting.rs

use crate::core::{Alert, Severity};
use colored::Colorize;

/// Renders a single alert as a line of text.
pub trait TextFormatter: Send + Sync {
    fn format_line(&self, alert: &Alert) -> String;
}

/// Formats the `[!] Alert:` / `[!] Suspicious:` lines shown on the console.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleFormatter {
    colored: bool,
}

impl ConsoleFormatter {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }
}

impl TextFormatter for ConsoleFormatter {
    fn format_line(&self, alert: &Alert) -> String {
        let (label, domain) = match alert.severity {
            Severity::High if self.colored => ("Alert", alert.domain.red().to_string()),
            Severity::High => ("Alert", alert.domain.clone()),
            Severity::Low if self.colored => ("Suspicious", alert.domain.yellow().to_string()),
            Severity::Low => ("Suspicious", alert.domain.clone()),
        };
        format!(
            "[!] {}: {} (score={}, brand={})",
            label,
            domain,
            alert.score,
            alert.brand_or_unknown()
        )
    }
}

/// Builds the subject and body of an alert email.
#[derive(Debug, Clone)]
pub struct EmailFormatter {
    subject_template: String,
}

impl EmailFormatter {
    pub fn new(subject_template: impl Into<String>) -> Self {
        Self {
            subject_template: subject_template.into(),
        }
    }

    /// Fills the `{domain}`, `{brand}` and `{score}` placeholders of the template.
    pub fn subject(&self, alert: &Alert) -> String {
        self.subject_template
            .replace("{domain}", &alert.domain)
            .replace("{brand}", alert.brand_or_unknown())
            .replace("{score}", &alert.score.to_string())
    }

    pub fn body(&self, alert: &Alert) -> String {
        format!(
            "Domain: {}\nTarget Brand: {}\nScore: {}",
            alert.domain,
            alert.brand_or_unknown(),
            alert.score
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_alert(domain: &str, brand: Option<&str>, score: u32, severity: Severity) -> Alert {
        Alert {
            timestamp: Utc::now(),
            domain: domain.to_string(),
            brand: brand.map(str::to_string),
            score,
            severity,
            issuer: None,
        }
    }

    #[test]
    fn test_console_line_high() {
        let alert = create_test_alert("paypa1-secure.com", Some("paypal"), 112, Severity::High);
        let line = ConsoleFormatter::new(false).format_line(&alert);
        assert_eq!(line, "[!] Alert: paypa1-secure.com (score=112, brand=paypal)");
    }

    #[test]
    fn test_console_line_low() {
        let alert = create_test_alert("login-verify.xyz", Some("apple"), 80, Severity::Low);
        let line = ConsoleFormatter::new(false).format_line(&alert);
        assert_eq!(line, "[!] Suspicious: login-verify.xyz (score=80, brand=apple)");
    }

    #[test]
    fn test_console_line_without_brand() {
        let alert = create_test_alert("qzx-7.top", None, 75, Severity::Low);
        let line = ConsoleFormatter::new(false).format_line(&alert);
        assert_eq!(line, "[!] Suspicious: qzx-7.top (score=75, brand=unknown)");
    }

    #[test]
    fn test_colored_line_keeps_domain_text() {
        colored::control::set_override(true);
        let alert = create_test_alert("paypa1-secure.com", Some("paypal"), 112, Severity::High);
        let line = ConsoleFormatter::new(true).format_line(&alert);
        assert!(line.starts_with("[!] Alert: "));
        assert!(line.contains("paypa1-secure.com"));
        assert!(line.contains("\u{1b}["));
        colored::control::unset_override();
    }

    #[test]
    fn test_email_subject_placeholders() {
        let alert = create_test_alert("paypa1-secure.com", Some("paypal"), 112, Severity::High);
        let formatter = EmailFormatter::new("[{brand}] {domain} scored {score}");
        assert_eq!(formatter.subject(&alert), "[paypal] paypa1-secure.com scored 112");
    }

    #[test]
    fn test_email_body() {
        let alert = create_test_alert("paypa1-secure.com", Some("paypal"), 112, Severity::High);
        let formatter = EmailFormatter::new("unused");
        assert_eq!(
            formatter.body(&alert),
            "Domain: paypa1-secure.com\nTarget Brand: paypal\nScore: 112"
        );
    }
}
