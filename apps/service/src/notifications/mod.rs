/// Transition notifications
///
/// Builds the webhook message for a monitor that went down or recovered and
/// delivers it to every enabled webhook.
pub mod dispatcher;
pub mod message;

pub use dispatcher::{DeliveryError, DispatchReport, Notifier};
pub use message::WebhookPayload;
