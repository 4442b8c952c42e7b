use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::progress::ProgressStep;

/// Kind of user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Capability through which a cycle reports to whoever is watching it.
///
/// `report` is called exactly once per cycle. Progress callbacks are optional.
pub trait Notifier: Send + Sync {
    fn report(&self, kind: NoticeKind, message: &str);

    /// Snapshot of the step list after every change. An empty slice means the cycle ended.
    fn progress(&self, _steps: &[ProgressStep]) {}

    /// Upload indicator, 0 to 100.
    fn upload_progress(&self, _percent: u8) {}
}

/// Notifier that only writes to the log. Used by the plain JSON endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => tracing::info!("✓ {}", message),
            NoticeKind::Error => tracing::warn!("❌ {}", message),
        }
    }

    fn progress(&self, steps: &[ProgressStep]) {
        let done = steps.iter().filter(|s| s.completed).count();
        match steps.iter().rev().find(|s| s.completed) {
            Some(step) => tracing::debug!("Progress {}/{}: {}", done, steps.len(), step.label),
            None if steps.is_empty() => tracing::debug!("Progress cleared"),
            None => tracing::debug!("Progress 0/{}", steps.len()),
        }
    }

    fn upload_progress(&self, percent: u8) {
        tracing::debug!("Upload progress {}%", percent);
    }
}

/// Event forwarded by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    Progress { steps: Vec<ProgressStep> },
    Upload { percent: u8 },
    Notice { kind: NoticeKind, message: String },
}

/// Notifier that forwards every callback into a channel, for streaming to the browser.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<CycleEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<CycleEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: CycleEvent) {
        // The receiver goes away when the browser disconnects; the cycle still runs to completion.
        if self.tx.send(event).is_err() {
            tracing::debug!("Progress listener disconnected");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn report(&self, kind: NoticeKind, message: &str) {
        self.send(CycleEvent::Notice {
            kind,
            message: message.to_string(),
        });
    }

    fn progress(&self, steps: &[ProgressStep]) {
        self.send(CycleEvent::Progress {
            steps: steps.to_vec(),
        });
    }

    fn upload_progress(&self, percent: u8) {
        self.send(CycleEvent::Upload { percent });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::create_steps;
    use tokio::sync::mpsc;

    #[test]
    fn channel_notifier_forwards_events_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);

        notifier.progress(&create_steps(["a", "b"]));
        notifier.upload_progress(40);
        notifier.report(NoticeKind::Success, "done");

        assert!(matches!(rx.try_recv(), Ok(CycleEvent::Progress { steps }) if steps.len() == 2));
        assert_eq!(rx.try_recv().unwrap(), CycleEvent::Upload { percent: 40 });
        assert_eq!(
            rx.try_recv().unwrap(),
            CycleEvent::Notice {
                kind: NoticeKind::Success,
                message: "done".into()
            }
        );
    }

    #[test]
    fn closed_channel_is_tolerated() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelNotifier::new(tx).report(NoticeKind::Error, "nobody listening");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(CycleEvent::Upload { percent: 10 }).unwrap();
        assert_eq!(value, serde_json::json!({"type": "upload", "percent": 10}));
    }
}
