use crate::domain::member::Member;
use crate::domain::value_objects::{MemberId, Money};
use crate::ports::member_registry::{MemberRegistry as MemberRegistryTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;

/// MemberRegistryのインメモリ実装
pub struct MemberRegistry {
    members: Mutex<HashMap<MemberId, Member>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
        }
    }

    fn update(&self, member_id: MemberId, change: impl FnOnce(&mut Member)) -> Result<bool> {
        let mut members = lock(&self.members)?;
        match members.get_mut(&member_id) {
            Some(member) => {
                change(member);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for MemberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberRegistryTrait for MemberRegistry {
    async fn insert(&self, member: Member) -> Result<()> {
        lock(&self.members)?.insert(member.id, member);
        Ok(())
    }

    async fn get_by_id(&self, member_id: MemberId) -> Result<Option<Member>> {
        Ok(lock(&self.members)?.get(&member_id).cloned())
    }

    async fn set_disabled(&self, member_id: MemberId, disabled: bool) -> Result<bool> {
        self.update(member_id, |m| m.is_disabled = disabled)
    }

    async fn set_fine(&self, member_id: MemberId, fine: Money) -> Result<bool> {
        self.update(member_id, |m| m.fine = fine)
    }
}
