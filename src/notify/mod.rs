//! Outbound notification channel for the operations team.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramNotifier;

use crate::error::NotifyError;

/// The notification channel consumed by the aggregator and the transport.
///
/// `send` returns the channel's explicit acknowledgement: only a `true` ack
/// lets the aggregator clear a flushed buffer, giving at-least-once delivery
/// (duplicates are possible when the ack cannot be verified).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a rich-text message. Returns the delivery acknowledgement.
    async fn send(&self, text: &str) -> Result<bool, NotifyError>;

    /// Deliver an out-of-band alert, annotated with the client's name and a
    /// contact link when known.
    async fn send_urgent(
        &self,
        text: &str,
        client_name: Option<&str>,
        sender: Option<&str>,
    ) -> Result<bool, NotifyError>;
}

/// Log-only notifier used when no Telegram channel is configured. Messages
/// land in the log and count as acknowledged so buffers still drain.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<bool, NotifyError> {
        tracing::info!(notification = %text, "notification (no channel configured)");
        Ok(true)
    }

    async fn send_urgent(
        &self,
        text: &str,
        client_name: Option<&str>,
        sender: Option<&str>,
    ) -> Result<bool, NotifyError> {
        tracing::info!(
            notification = %text,
            client_name = ?client_name,
            sender = ?sender,
            "urgent notification (no channel configured)"
        );
        Ok(true)
    }
}

/// Derive a canonical `wa.me` contact link from a raw sender id.
///
/// Strips the `whatsapp:` transport prefix and every non-digit, then
/// prepends the Brazilian country code when the number doesn't carry one and
/// is short enough to plausibly be domestic. Best-effort, not validated
/// against a numbering plan.
pub fn wa_me_link(sender: &str) -> String {
    let digits: String = sender
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let full = if !digits.starts_with("55") && digits.len() <= 11 {
        format!("55{digits}")
    } else {
        digits
    };

    format!("wa.me/{full}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_formatting() {
        assert_eq!(
            wa_me_link("whatsapp:+55 (11) 91529-0344"),
            "wa.me/5511915290344"
        );
    }

    #[test]
    fn prepends_country_code_for_short_domestic_numbers() {
        assert_eq!(wa_me_link("whatsapp:11915290344"), "wa.me/5511915290344");
        assert_eq!(wa_me_link("915290344"), "wa.me/55915290344");
    }

    #[test]
    fn leaves_numbers_with_country_code_alone() {
        assert_eq!(wa_me_link("whatsapp:+5511915290344"), "wa.me/5511915290344");
    }

    #[test]
    fn long_foreign_numbers_are_not_rewritten() {
        // 12 digits, not starting with 55: assumed to already carry a code
        assert_eq!(wa_me_link("+441632960961"), "wa.me/441632960961");
    }
}
