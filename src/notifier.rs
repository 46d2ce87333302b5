//! Email report of detected price changes.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{MailConfig, SmtpSettings};
use crate::models::{Change, title_preview};
use crate::price::{format_delta, format_price};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email config incomplete")]
    MissingConfig,
    #[error("invalid address {0:?}: {1}")]
    Address(String, lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP failure: {0}")]
    Transport(String),
}

/// A composed report, ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub html: String,
}

/// Outbound mail capability.
pub trait Mailer {
    fn send(&self, smtp: &SmtpSettings, email: &Email) -> Result<(), NotifyError>;
}

/// STARTTLS + login against the configured relay.
pub struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, smtp: &SmtpSettings, email: &Email) -> Result<(), NotifyError> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| NotifyError::Address(email.from.clone(), e))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| NotifyError::Address(email.to.clone(), e))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))?;

        let transport = SmtpTransport::starttls_relay(&smtp.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
            .build();

        transport
            .send(&message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub struct EmailNotifier<M> {
    config: MailConfig,
    mailer: M,
}

impl<M: Mailer> EmailNotifier<M> {
    pub fn new(config: MailConfig, mailer: M) -> Self {
        Self { config, mailer }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Send one report for the batch. Returns whether delivery succeeded;
    /// an empty batch trivially succeeds.
    pub fn notify(&self, changes: &[Change]) -> bool {
        if changes.is_empty() {
            return true;
        }
        match self.try_notify(changes) {
            Ok(()) => {
                info!(count = changes.len(), "email sent");
                true
            }
            Err(NotifyError::MissingConfig) => {
                warn!("email config incomplete, not sending");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to send email");
                false
            }
        }
    }

    fn try_notify(&self, changes: &[Change]) -> Result<(), NotifyError> {
        let smtp = self
            .config
            .smtp_settings()
            .ok_or(NotifyError::MissingConfig)?;
        let email = compose(changes, &smtp);
        self.mailer.send(&smtp, &email)
    }
}

pub fn compose(changes: &[Change], smtp: &SmtpSettings) -> Email {
    Email {
        subject: subject(changes.len()),
        from: smtp.from.clone(),
        to: smtp.to.clone(),
        text: text_body(changes),
        html: html_body(changes),
    }
}

pub fn subject(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("Price Monitor: {count} listing{plural} changed")
}

fn text_body(changes: &[Change]) -> String {
    let mut lines = vec!["Price changes detected:".to_string(), String::new()];
    for (i, change) in changes.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, change.title));
        lines.push(format!(
            "   {} → {}",
            format_price(change.old_price),
            format_price(change.new_price)
        ));
        lines.push(format!("   {}", change.url));
        lines.push(String::new());
    }
    lines.push(format!(
        "---\nFinn.no Price Monitor v{}",
        env!("CARGO_PKG_VERSION")
    ));
    lines.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Up(i64),
    Down(i64),
    Same,
    Unknown,
}

impl Delta {
    fn of(change: &Change) -> Self {
        match (change.old_price, change.new_price) {
            (Some(old), Some(new)) if new > old => Self::Up(new - old),
            (Some(old), Some(new)) if new < old => Self::Down(new - old),
            (Some(_), Some(_)) => Self::Same,
            _ => Self::Unknown,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Up(_) => "#c62828",
            Self::Down(_) => "#2e7d32",
            Self::Same | Self::Unknown => "#666",
        }
    }

    fn label(self) -> String {
        match self {
            Self::Up(d) | Self::Down(d) => format_delta(d),
            Self::Same => "±0 kr".to_string(),
            Self::Unknown => "—".to_string(),
        }
    }
}

fn html_body(changes: &[Change]) -> String {
    let rows: String = changes
        .iter()
        .map(|change| {
            let delta = Delta::of(change);
            format!(
                "<tr><td>{}</td><td>{}</td><td><b>{}</b></td><td style='color:{}'>{}</td><td><a href='{}'>View</a></td></tr>",
                escape(&title_preview(&change.title)),
                format_price(change.old_price),
                format_price(change.new_price),
                delta.color(),
                delta.label(),
                escape(&change.url),
            )
        })
        .collect();

    format!(
        "<html><body style='font-family:sans-serif;max-width:700px'>\n\
         <h2>🔔 {count} Price Change(s)</h2>\n\
         <table border='0' cellpadding='8' style='border-collapse:collapse;width:100%'>\n\
         <tr style='background:#1976d2;color:white'><th>Listing</th><th>Old</th><th>New</th><th>Change</th><th>Link</th></tr>\n\
         {rows}</table>\n\
         <p style='color:#666;font-size:12px'>v{version}</p></body></html>",
        count = changes.len(),
        version = env!("CARGO_PKG_VERSION"),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct RecordingMailer {
        sent: RefCell<Vec<Email>>,
        fail: bool,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, _smtp: &SmtpSettings, email: &Email) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("connection refused".into()));
            }
            self.sent.borrow_mut().push(email.clone());
            Ok(())
        }
    }

    fn valid_config() -> MailConfig {
        MailConfig {
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: 587,
            smtp_user: Some("user".into()),
            smtp_pass: Some("pass".into()),
            email_from: Some("from@example.com".into()),
            email_to: Some("to@example.com".into()),
        }
    }

    fn change(title: &str, old: Option<i64>, new: Option<i64>) -> Change {
        Change {
            url: format!("https://www.finn.no/recommerce/forsale/item/{}", title.len()),
            old_price: old,
            new_price: new,
            title: title.to_string(),
        }
    }

    fn sent_with(changes: &[Change]) -> Email {
        let notifier = EmailNotifier::new(valid_config(), RecordingMailer::default());
        assert!(notifier.notify(changes));
        let sent = notifier.mailer().sent.borrow();
        assert_eq!(sent.len(), 1);
        sent[0].clone()
    }

    #[test]
    fn empty_batch_skips_transport() {
        let notifier = EmailNotifier::new(MailConfig::default(), RecordingMailer::default());
        assert!(notifier.notify(&[]));
        assert!(notifier.mailer().sent.borrow().is_empty());
    }

    #[test]
    fn invalid_config_fails_without_transport() {
        let notifier = EmailNotifier::new(MailConfig::default(), RecordingMailer::default());
        assert!(!notifier.notify(&[change("Sofa", Some(1), Some(2))]));
        assert!(notifier.mailer().sent.borrow().is_empty());
    }

    #[test]
    fn transport_failure_reports_false() {
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let notifier = EmailNotifier::new(valid_config(), mailer);
        assert!(!notifier.notify(&[change("Sofa", Some(1), Some(2))]));
    }

    #[test]
    fn subject_wording() {
        let one = sent_with(&[change("Sofa", Some(100), Some(90))]);
        assert!(one.subject.contains("1 listing changed"));

        let three = sent_with(&[
            change("Sofa", Some(100), Some(90)),
            change("Table", Some(100), Some(110)),
            change("Lamp", Some(5), Some(6)),
        ]);
        assert!(three.subject.contains("3 listings changed"));
        assert_eq!(three.from, "from@example.com");
        assert_eq!(three.to, "to@example.com");
    }

    #[test]
    fn text_body_lists_each_change() {
        let email = sent_with(&[change("Gaming PC", Some(7500), Some(8000))]);
        assert!(email.text.contains("1. Gaming PC"));
        assert!(email.text.contains("7 500 kr → 8 000 kr"));
        assert!(email.text.contains("https://www.finn.no/recommerce/forsale/item/9"));
    }

    #[test]
    fn html_colors_follow_direction() {
        let up = html_body(&[change("Up", Some(1000), Some(1500))]);
        assert!(up.contains("color:#c62828'>+500 kr"));

        let down = html_body(&[change("Down", Some(1_500_000), Some(1_000_000))]);
        assert!(down.contains("color:#2e7d32'>-500 000 kr"));

        let unknown = html_body(&[change("None", None, Some(1000))]);
        assert!(unknown.contains("color:#666'>—"));
        assert!(unknown.contains("<td>N/A</td>"));
    }

    #[test]
    fn html_equal_prices_show_zero_delta() {
        let same = html_body(&[change("Same", Some(7500), Some(7500))]);
        assert!(same.contains("color:#666'>±0 kr"));
        assert!(!same.contains('—'));
    }

    #[test]
    fn html_links_and_escapes() {
        let mut c = change("Bord & stoler <antikk>", Some(1), Some(2));
        c.url = "https://www.finn.no/item?a=1&b=2".into();
        let html = html_body(&[c]);
        assert!(html.contains("<a href='https://www.finn.no/item?a=1&amp;b=2'>View</a>"));
        assert!(html.contains("Bord &amp; stoler &lt;antikk&gt;"));
        assert!(html.contains("<th>Listing</th>"));
    }

    #[test]
    fn long_titles_are_truncated_in_html() {
        let title = "x".repeat(80);
        let html = html_body(&[change(&title, Some(1), Some(2))]);
        assert!(html.contains(&format!("{}...", "x".repeat(60))));
        assert!(!html.contains(&"x".repeat(61)));
    }
}
