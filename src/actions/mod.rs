pub mod email;
pub mod template;

pub use email::EmailNotifier;
pub use template::{render, TemplateContext};

use crate::error::Result;
use crate::models::{ActionKind, ActionSpec};
use std::collections::HashMap;
use std::time::Instant;

/// A rendered alert ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Delivery channel for one action type
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Human-readable name for this channel (e.g., "email")
    fn channel_name(&self) -> &str;
}

/// Outcome of one dispatch; failures are reported here rather than raised
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Routes rendered alerts to the notifier registered for their action type
#[derive(Default)]
pub struct ActionDispatcher {
    notifiers: HashMap<ActionKind, Box<dyn Notifier>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, kind: ActionKind, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.insert(kind, notifier);
        self
    }

    /// Render subject and body for `action`
    pub fn render(action: &ActionSpec, context: &TemplateContext) -> Result<Notification> {
        Ok(Notification {
            subject: render(&action.subject_template, context)?,
            body: render(&action.body_template, context)?,
        })
    }

    pub async fn dispatch(&self, action: &ActionSpec, notification: &Notification) -> DispatchResult {
        let Some(notifier) = self.notifiers.get(&action.kind) else {
            return DispatchResult {
                channel: action.kind.as_str().to_string(),
                success: false,
                error: Some(format!("no notifier configured for '{}' actions", action.kind)),
                duration_ms: 0,
            };
        };

        let started = Instant::now();
        let outcome = notifier.send(notification).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => DispatchResult {
                channel: notifier.channel_name().to_string(),
                success: true,
                error: None,
                duration_ms,
            },
            Err(e) => {
                tracing::warn!(channel = notifier.channel_name(), "Delivery failed: {}", e);
                DispatchResult {
                    channel: notifier.channel_name().to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }
}
