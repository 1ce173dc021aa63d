use serde::{Deserialize, Serialize};

use super::{MemberId, Money};

/// Member - 借り手
///
/// `fine` は未払い貸出の罰金合計のキャッシュ。
/// 罰金・支払状態が変わるたびに貸出から再計算される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enrollment_number: String,
    pub is_disabled: bool,
    pub fine: Money,
}

impl Member {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        enrollment_number: impl Into<String>,
    ) -> Self {
        Self {
            id: MemberId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            enrollment_number: enrollment_number.into(),
            is_disabled: false,
            fine: Money::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_disabled
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_is_active_without_fine() {
        let member = Member::new("Ada", "Lovelace", "ada@example.com", "EN-001");
        assert!(member.is_active());
        assert_eq!(member.fine, Money::ZERO);
        assert_eq!(member.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_disabled_member_is_not_active() {
        let member = Member {
            is_disabled: true,
            ..Member::new("Ada", "Lovelace", "ada@example.com", "EN-001")
        };
        assert!(!member.is_active());
    }
}
