use crate::domain::value_objects::MemberId;
use crate::ports::notification_service::{NotificationService as NotificationServiceTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{BoxError, lock};

/// NotificationServiceのモック実装
///
/// 実際には配信せず、送信内容を記録する。
/// ベストエフォート配信のテスト用に、送信を失敗させることができる。
pub struct NotificationService {
    sent: Mutex<Vec<(MemberId, String)>>,
    fail: AtomicBool,
}

impl NotificationService {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// これまでに記録した送信内容
    pub fn sent(&self) -> Vec<(MemberId, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationServiceTrait for NotificationService {
    async fn notify(&self, member_id: MemberId, message: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BoxError::from("notification channel unavailable"));
        }
        tracing::debug!(member_id = %member_id.value(), message, "Notification recorded");
        lock(&self.sent)?.push((member_id, message.to_string()));
        Ok(())
    }
}
