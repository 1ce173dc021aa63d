use crate::domain::member::Member;
use crate::domain::value_objects::{MemberId, Money};
use crate::ports::member_registry::{MemberRegistry as MemberRegistryTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{money_from_db, money_to_db};

/// MemberRegistryのPostgreSQL実装
pub struct MemberRegistry {
    pool: PgPool,
}

impl MemberRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRegistryTrait for MemberRegistry {
    async fn insert(&self, member: Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (
                id,
                first_name,
                last_name,
                email,
                enrollment_number,
                is_disabled,
                fine
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(member.id.value())
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.enrollment_number)
        .bind(member.is_disabled)
        .bind(money_to_db(member.fine)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, member_id: MemberId) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, email, enrollment_number, is_disabled, fine
            FROM members
            WHERE id = $1
            "#,
        )
        .bind(member_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Member {
            id: MemberId::from_uuid(row.get("id")),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            enrollment_number: row.get("enrollment_number"),
            is_disabled: row.get("is_disabled"),
            fine: money_from_db("fine", row.get("fine"))?,
        }))
    }

    async fn set_disabled(&self, member_id: MemberId, disabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE members SET is_disabled = $2 WHERE id = $1")
            .bind(member_id.value())
            .bind(disabled)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_fine(&self, member_id: MemberId, fine: Money) -> Result<bool> {
        let result = sqlx::query("UPDATE members SET fine = $2 WHERE id = $1")
            .bind(member_id.value())
            .bind(money_to_db(fine)?)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
