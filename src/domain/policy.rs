use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Money, PolicyError};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// 紛失した冊の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostCopyHandling {
    /// 蔵書数はそのまま（貸出可能数にも戻さない）
    #[default]
    Retain,
    /// 蔵書数から1冊除却する
    WriteOff,
}

/// 貸出ポリシー（管理者が設定する読み取り専用の値）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// 会員1人あたりの同時貸出上限
    pub borrowing_limit: u32,
    /// 貸出期間（日数）
    pub return_period_days: u32,
    /// 延長時の期間（日数、延長日から起算）
    pub reissue_period_days: u32,
    /// 1日あたりの延滞料
    pub daily_fine_rate: Money,
    /// 紛失時の罰金（延滞料の上限も兼ねる）
    pub lost_book_fine: Money,
    #[serde(default)]
    pub lost_copy_handling: LostCopyHandling,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            borrowing_limit: 5,
            return_period_days: 14,
            reissue_period_days: 14,
            daily_fine_rate: Money::new(10),
            lost_book_fine: Money::new(500),
            lost_copy_handling: LostCopyHandling::Retain,
        }
    }
}

impl Policy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.borrowing_limit == 0 {
            return Err(PolicyError::BorrowingLimitZero);
        }
        if self.return_period_days == 0 {
            return Err(PolicyError::ReturnPeriodZero);
        }
        if self.reissue_period_days == 0 {
            return Err(PolicyError::ReissuePeriodZero);
        }
        Ok(())
    }
}

/// 延滞日数（切り上げ）
///
/// 日時の差分を日単位に切り上げる。期限ちょうど、または期限前は0日。
/// 1秒でも超過すれば1日とみなす。
pub fn days_late(due_date: DateTime<Utc>, at: DateTime<Utc>) -> u64 {
    let overdue_seconds = (at - due_date).num_seconds();
    if overdue_seconds <= 0 {
        return 0;
    }
    let days = (overdue_seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    days as u64
}

/// 延滞料 = 日額 × 延滞日数
pub fn late_fine(days_late: u64, daily_rate: Money) -> Money {
    daily_rate.times(days_late)
}

/// 紛失時の罰金
pub fn lost_fine(policy: &Policy) -> Money {
    policy.lost_book_fine
}

/// 返却時に確定する罰金（紛失罰金を上限とする）
pub fn assess_return_fine(
    policy: &Policy,
    due_date: DateTime<Utc>,
    returned_at: DateTime<Utc>,
) -> Money {
    late_fine(days_late(due_date, returned_at), policy.daily_fine_rate).min(lost_fine(policy))
}
