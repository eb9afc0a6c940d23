//! Notification emission for fired alerts.

use crate::model::alert::AlertFireEvent;
use log::info;
use tokio::sync::mpsc;

/// Consumer of alert fire events produced by evaluation passes.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &AlertFireEvent);
}

/// Writes every fire event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, event: &AlertFireEvent) {
        info!(
            "event=alert_fire module=monitor status=ok category={} trigger={} visible_until={}",
            event.definition.category_key,
            event.definition.trigger,
            event.visible_until.format("%H:%M:%S")
        );
    }
}

/// Forwards fire events to an async receiver; emitting after the receiver
/// is gone is silently ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AlertFireEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlertFireEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn emit(&self, event: &AlertFireEvent) {
        let _ = self.tx.send(event.clone());
    }
}
