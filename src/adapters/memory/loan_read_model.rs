use crate::domain::value_objects::{BookId, LoanId, MemberId};
use crate::ports::loan_read_model::{
    LoanReadModel as LoanReadModelTrait, LoanStatus, LoanView, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;

/// LoanReadModelのインメモリ実装
///
/// 貸出IDごとにビューを持ち、保存のたびに丸ごと置き換える。
/// 保存済みより古いバージョンのビューは捨てる。
pub struct LoanReadModel {
    views: Mutex<HashMap<LoanId, LoanView>>,
}

impl LoanReadModel {
    pub fn new() -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
        }
    }

    fn upsert(views: &mut HashMap<LoanId, LoanView>, view: LoanView) {
        let is_stale = views
            .get(&view.loan_id)
            .is_some_and(|stored| stored.version > view.version);
        if !is_stale {
            views.insert(view.loan_id, view);
        }
    }

    fn select(&self, predicate: impl Fn(&LoanView) -> bool) -> Result<Vec<LoanView>> {
        let views = lock(&self.views)?;
        let mut selected: Vec<LoanView> = views.values().filter(|v| predicate(v)).cloned().collect();
        selected.sort_by_key(|v| v.created_at);
        Ok(selected)
    }
}

impl Default for LoanReadModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoanReadModelTrait for LoanReadModel {
    async fn save(&self, loan_view: LoanView) -> Result<()> {
        Self::upsert(&mut *lock(&self.views)?, loan_view);
        Ok(())
    }

    async fn save_all(&self, loan_views: Vec<LoanView>) -> Result<()> {
        let mut views = lock(&self.views)?;
        for view in loan_views {
            Self::upsert(&mut views, view);
        }
        Ok(())
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        Ok(lock(&self.views)?.get(&loan_id).cloned())
    }

    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        self.select(|v| v.member_id == member_id)
    }

    async fn count_open_loans_for_member(&self, member_id: MemberId) -> Result<usize> {
        Ok(self
            .select(|v| v.member_id == member_id && v.is_open())?
            .len())
    }

    async fn find_unpaid_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        self.select(|v| v.member_id == member_id && !v.outstanding_fine().is_zero())
    }

    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>> {
        let mut candidates = self.select(|v| {
            v.status == LoanStatus::Issued
                && !v.is_lost
                && v.due_date.is_some_and(|due| due < cutoff_date)
        })?;
        candidates.sort_by_key(|v| v.due_date);
        Ok(candidates)
    }

    async fn find_pending_for_book(&self, book_id: BookId) -> Result<Vec<LoanView>> {
        self.select(|v| v.book_id == book_id && v.status == LoanStatus::Pending)
    }
}
