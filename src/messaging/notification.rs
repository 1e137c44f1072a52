// Notifications - Short messages for the controller display

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// What the notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Midi,
    Session,
    Project,
    Generic,
}

/// Notification with a creation time and metadata
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        Self {
            level,
            category,
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn info(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

    /// Whether the notification is younger than `max_age_ms`; the display
    /// drops older ones
    pub fn is_recent(&self, max_age_ms: i64) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        now.saturating_sub(self.timestamp) < max_age_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_creation() {
        let notif = Notification::error(NotificationCategory::Midi, "Device lost".to_string());

        assert_eq!(notif.level, NotificationLevel::Error);
        assert_eq!(notif.category, NotificationCategory::Midi);
        assert_eq!(notif.message, "Device lost");
        assert!(notif.timestamp > 0);
    }

    #[test]
    fn test_notification_helpers() {
        let info = Notification::info(NotificationCategory::Session, "Info".to_string());
        let warning = Notification::warning(NotificationCategory::Project, "Warning".to_string());
        let error = Notification::error(NotificationCategory::Generic, "Error".to_string());

        assert_eq!(info.level, NotificationLevel::Info);
        assert_eq!(warning.level, NotificationLevel::Warning);
        assert_eq!(error.level, NotificationLevel::Error);
    }

    #[test]
    fn test_notification_is_recent() {
        let notif = Notification::info(NotificationCategory::Generic, "Test".to_string());
        assert!(notif.is_recent(10_000));

        let old = Notification {
            timestamp: notif.timestamp - 60_000,
            ..notif
        };
        assert!(!old.is_recent(1_000));
    }
}
