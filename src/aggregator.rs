//! Delivery aggregator — groups raw message exchanges per sender and flushes
//! them to the notification channel as a single formatted conversation.
//!
//! Buffers are volatile and process-local: entries clear on an acknowledged
//! flush, the profile map survives flushes, and buffers are never evicted
//! (unbounded growth across distinct senders is a documented non-property).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Mutex;

use crate::engine::Classification;
use crate::notify::{Notifier, wa_me_link};

/// Debounce window: without a force, a buffer only flushes once it has been
/// quiet this long.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(60);

/// One buffered exchange.
#[derive(Debug, Clone)]
struct Entry {
    timestamp: DateTime<Utc>,
    input: String,
    reply: String,
    classification: Classification,
}

/// Per-sender accumulation of unflushed turns plus the evolving profile.
#[derive(Debug)]
struct Buffer {
    display_name: String,
    sender_id: String,
    entries: Vec<Entry>,
    last_update: DateTime<Utc>,
    /// Insertion order is display order in the notification header.
    profile: Vec<(String, String)>,
}

/// The delivery aggregator. One instance per process, shared by handle.
pub struct Aggregator {
    notifier: Arc<dyn Notifier>,
    buffers: Mutex<HashMap<String, Buffer>>,
}

impl Aggregator {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Append one exchange to the sender's buffer, creating it lazily.
    pub async fn append(
        &self,
        sender: &str,
        display_name: Option<&str>,
        input: &str,
        reply: &str,
        classification: Classification,
    ) {
        let now = Utc::now();
        let mut buffers = self.buffers.lock().await;

        let buffer = buffers.entry(sender.to_string()).or_insert_with(|| Buffer {
            display_name: display_name.unwrap_or("Cliente sem nome").to_string(),
            sender_id: sender.to_string(),
            entries: Vec::new(),
            last_update: now,
            profile: Vec::new(),
        });

        // Keep the display name current once the client tells us who they are.
        if let Some(name) = display_name {
            buffer.display_name = name.to_string();
        }

        buffer.entries.push(Entry {
            timestamp: now,
            input: input.to_string(),
            reply: reply.to_string(),
            classification,
        });
        buffer.last_update = now;
    }

    /// Upsert a profile fact. Deliberately a no-op when the buffer doesn't
    /// exist yet — profile facts only make sense for a sender we've already
    /// buffered an exchange for.
    pub async fn set_profile(&self, sender: &str, key: &str, value: &str) {
        let mut buffers = self.buffers.lock().await;
        let Some(buffer) = buffers.get_mut(sender) else {
            return;
        };

        match buffer.profile.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => buffer.profile.push((key.to_string(), value.to_string())),
        }
    }

    /// Flush a sender's buffer to the notification channel.
    ///
    /// Returns `true` only when something was delivered and acknowledged.
    /// Without `force` the flush respects the debounce window. Entries are
    /// cleared only on a positive ack: delivery is at-least-once, and a
    /// failed or unacknowledged send leaves them queued for the next flush.
    pub async fn flush(&self, sender: &str, force: bool) -> bool {
        // Render under the lock, send outside it: the Telegram call can take
        // seconds and must not stall other senders' turns.
        let (rendered, rendered_count) = {
            let buffers = self.buffers.lock().await;
            let Some(buffer) = buffers.get(sender) else {
                return false;
            };
            if buffer.entries.is_empty() {
                return false;
            }

            let quiet = Utc::now().signed_duration_since(buffer.last_update);
            if !force && quiet.num_seconds() < DEBOUNCE_WINDOW.as_secs() as i64 {
                return false;
            }

            (render_conversation(buffer), buffer.entries.len())
        };

        let delivered = match self.notifier.send(&rendered).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::warn!(sender, error = %e, "conversation notification failed");
                false
            }
        };

        if delivered {
            let mut buffers = self.buffers.lock().await;
            if let Some(buffer) = buffers.get_mut(sender) {
                // Only drop what was actually rendered; turns appended while
                // the send was in flight stay queued.
                buffer
                    .entries
                    .drain(..rendered_count.min(buffer.entries.len()));
            }
        }

        delivered
    }

    /// Number of live buffers (distinct senders seen this process).
    pub async fn buffer_count(&self) -> usize {
        self.buffers.lock().await.len()
    }

    /// Snapshot of a sender's profile, in insertion order.
    pub async fn profile(&self, sender: &str) -> Vec<(String, String)> {
        let buffers = self.buffers.lock().await;
        buffers
            .get(sender)
            .map(|b| b.profile.clone())
            .unwrap_or_default()
    }

    /// Test hook: pretend the sender has been quiet since `when`.
    #[cfg(test)]
    async fn backdate(&self, sender: &str, when: DateTime<Utc>) {
        let mut buffers = self.buffers.lock().await;
        if let Some(buffer) = buffers.get_mut(sender) {
            buffer.last_update = when;
        }
    }
}

/// Render one buffer as a single rich-text notification: header with the
/// client identity and profile, divider, then each exchange tagged by
/// urgency.
fn render_conversation(buffer: &Buffer) -> String {
    let link = wa_me_link(&buffer.sender_id);

    let mut header = format!(
        "💬 *Conversa com Cliente*\n\
         👤 *Nome*: {}\n\
         📱 *Contato*: [{link}](https://{link})\n\
         🕒 *Data*: {}\n",
        buffer.display_name,
        Local::now().format("%d/%m/%Y"),
    );

    if !buffer.profile.is_empty() {
        header.push_str("\n📋 *Perfil do Cliente*:\n");
        for (key, value) in &buffer.profile {
            header.push_str(&format!("- *{key}*: {value}\n"));
        }
    }
    header.push_str("➖➖➖➖➖➖➖➖➖➖➖➖");

    let body: Vec<String> = buffer
        .entries
        .iter()
        .map(|entry| {
            let tag = match entry.classification {
                Classification::Urgent => "🔴 *URGENTE*\n",
                Classification::IntakeComplete => "⚠️ *ATENDIMENTO SOLICITADO*\n",
                Classification::None => "",
            };
            let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
            format!(
                "{tag}*{time}* Cliente: {}\n*{time}* Bot: {}",
                entry.input, entry.reply
            )
        })
        .collect();

    format!("{header}\n\n{}", body.join("\n\n"))
}
