//! 自动消失的通知

use std::time::{Duration, Instant};

/// 通知固定显示 5 秒
pub const NOTIFICATION_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Danger,
}

impl NotificationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// 通知队列，不阻塞任何操作，过期后自动移除
#[derive(Debug)]
pub struct NotificationCenter {
    lifetime: Duration,
    next_id: u64,
    items: Vec<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NOTIFICATION_LIFETIME)
    }
}

impl NotificationCenter {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            next_id: 1,
            items: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        level: NotificationLevel,
        message: impl Into<String>,
        now: Instant,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notification {
            id,
            level,
            message: message.into(),
            created_at: now,
            expires_at: now + self.lifetime,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// 手动关闭
    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|n| n.id != id);
    }

    /// 移除已过期的通知
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|n| n.is_visible(now));
    }

    pub fn active(&self, now: Instant) -> Vec<Notification> {
        self.items
            .iter()
            .filter(|n| n.is_visible(now))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_expires_after_five_seconds() {
        let mut center = NotificationCenter::default();
        let t0 = Instant::now();
        center.push(NotificationLevel::Danger, "服务返回错误", t0);

        assert_eq!(center.active(t0 + Duration::from_millis(4999)).len(), 1);
        assert!(center.active(t0 + Duration::from_secs(5)).is_empty());

        center.prune(t0 + Duration::from_secs(6));
        assert!(center.active(t0).is_empty());
    }

    #[test]
    fn test_dismiss_removes_only_target() {
        let mut center = NotificationCenter::default();
        let now = Instant::now();
        let first = center.push(NotificationLevel::Success, "a", now);
        center.push(NotificationLevel::Warning, "b", now);

        center.dismiss(first);
        let active = center.active(now);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "b");
        assert_eq!(active[0].level.as_str(), "warning");
    }
}
