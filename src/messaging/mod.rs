// Messaging - Notifications from the core to the display layer

pub mod channels;
pub mod notification;

pub use channels::{
    NotificationConsumer, NotificationProducer, create_notification_channel, drain_notifications,
    push_notification,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
