// Lock-free notification channel

use crate::messaging::notification::Notification;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Push without blocking. Returns false when the buffer was full and the
/// notification was dropped.
pub fn push_notification(producer: &mut NotificationProducer, notification: Notification) -> bool {
    producer.try_push(notification).is_ok()
}

/// Take everything currently queued
pub fn drain_notifications(consumer: &mut NotificationConsumer) -> Vec<Notification> {
    let mut notifications = Vec::new();
    while let Some(notification) = consumer.try_pop() {
        notifications.push(notification);
    }
    notifications
}
