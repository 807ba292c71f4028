//! Notifications for downloaded and imported items.

pub mod notifier;
pub mod slack;

pub use notifier::{NotifyStats, Notifier, download_message, import_message, messages_for};
pub use slack::{SlackMsg, Transport, Webhook};
