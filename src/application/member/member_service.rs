use crate::domain::{Member, MemberId, Money};

use super::super::{LendingError, Result, ServiceDependencies};

/// 会員を登録する
pub async fn register_member(deps: &ServiceDependencies, member: Member) -> Result<MemberId> {
    let member_id = member.id;
    deps.member_registry
        .insert(member)
        .await
        .map_err(LendingError::MemberRegistryError)?;
    Ok(member_id)
}

/// 会員を取得する
pub async fn get_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<Member> {
    deps.member_registry
        .get_by_id(member_id)
        .await
        .map_err(LendingError::MemberRegistryError)?
        .ok_or(LendingError::MemberNotFound(member_id))
}

/// 会員が貸出可能な状態か（無効化されていないか）
pub async fn is_active(deps: &ServiceDependencies, member_id: MemberId) -> Result<bool> {
    Ok(get_member(deps, member_id).await?.is_active())
}

async fn set_disabled(deps: &ServiceDependencies, member_id: MemberId, disabled: bool) -> Result<()> {
    let found = deps
        .member_registry
        .set_disabled(member_id, disabled)
        .await
        .map_err(LendingError::MemberRegistryError)?;
    if !found {
        return Err(LendingError::MemberNotFound(member_id));
    }
    tracing::info!(member_id = %member_id.value(), disabled, "Member status changed");
    Ok(())
}

/// 会員を無効化する（職員操作）
pub async fn disable_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<()> {
    set_disabled(deps, member_id, true).await
}

/// 会員を再度有効化する
pub async fn enable_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<()> {
    set_disabled(deps, member_id, false).await
}

/// 未払い罰金の合計（is_paid = false の貸出の fine の和）
pub async fn total_fine_due(deps: &ServiceDependencies, member_id: MemberId) -> Result<Money> {
    get_member(deps, member_id).await?;
    unpaid_total(deps, member_id).await
}

async fn unpaid_total(deps: &ServiceDependencies, member_id: MemberId) -> Result<Money> {
    let unpaid = deps
        .loan_read_model
        .find_unpaid_for_member(member_id)
        .await
        .map_err(LendingError::ReadModelError)?;
    Ok(unpaid.iter().map(|loan| loan.outstanding_fine()).sum())
}

/// 会員の罰金キャッシュを貸出から再計算して保存する
pub(crate) async fn refresh_member_fine(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Money> {
    let total = unpaid_total(deps, member_id).await?;
    let found = deps
        .member_registry
        .set_fine(member_id, total)
        .await
        .map_err(LendingError::MemberRegistryError)?;
    if !found {
        return Err(LendingError::MemberNotFound(member_id));
    }
    Ok(total)
}
