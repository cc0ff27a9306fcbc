//! Webhook notification: payload construction and delivery.

mod slack;

pub use slack::{DeliveryError, Notifier, SlackMessage};
