use crate::domain::{self, Book, BookCandidate, BookId};
use crate::ports::CopyUpdate;

use super::super::{LendingError, Result, ServiceDependencies};

/// 追加・合算の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub is_new: bool,
    pub book: Book,
}

/// 書籍を取得する
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.book_catalog
        .get_by_id(book_id)
        .await
        .map_err(LendingError::CatalogError)?
        .ok_or(LendingError::BookNotFound(book_id))
}

/// 書籍を登録する、または既存レコードに冊数を合算する
///
/// ビジネスルール：
/// - (タイトル, 著者, ジャンル, ISBN, 出版年) が完全一致すれば既存レコードに合算
/// - 合算時は total と available の両方に候補の冊数を加える
/// - 一致しなければ available = total で新規登録
pub async fn add_or_merge_book(
    deps: &ServiceDependencies,
    candidate: BookCandidate,
) -> Result<MergeOutcome> {
    if candidate.title.trim().is_empty() {
        return Err(LendingError::InvalidInput("title must not be empty".to_string()));
    }

    let existing = deps
        .book_catalog
        .find_by_match_key(&candidate.match_key())
        .await
        .map_err(LendingError::CatalogError)?;

    if let Some(existing) = existing {
        let book = deps
            .book_catalog
            .add_copies(existing.id, candidate.total_copies)
            .await
            .map_err(LendingError::CatalogError)?
            .ok_or(LendingError::BookNotFound(existing.id))?;

        tracing::info!(
            book_id = %book.id.value(),
            added = candidate.total_copies,
            total = book.total_copies,
            "Merged copies into existing book"
        );
        return Ok(MergeOutcome {
            is_new: false,
            book,
        });
    }

    let book = domain::book::new_book(candidate);
    deps.book_catalog
        .insert(book.clone())
        .await
        .map_err(LendingError::CatalogError)?;

    tracing::info!(book_id = %book.id.value(), title = %book.title, "Added new book");
    Ok(MergeOutcome { is_new: true, book })
}

/// 1冊を貸出用に確保する
///
/// ストレージ側の条件付き更新で行うため、同時に呼ばれても在庫は負にならない。
pub async fn reserve_copy(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    match deps
        .book_catalog
        .try_reserve_copy(book_id)
        .await
        .map_err(LendingError::CatalogError)?
    {
        CopyUpdate::Applied => Ok(()),
        CopyUpdate::Rejected => Err(LendingError::NotAvailable),
        CopyUpdate::NotFound => Err(LendingError::BookNotFound(book_id)),
    }
}

/// 1冊を在庫に戻す
///
/// total を超える返却は丸めずに `InconsistentState` として呼び出し側に返す。
pub async fn release_copy(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    match deps
        .book_catalog
        .release_copy(book_id)
        .await
        .map_err(LendingError::CatalogError)?
    {
        CopyUpdate::Applied => Ok(()),
        CopyUpdate::Rejected => Err(LendingError::InconsistentState(format!(
            "release of book {} would exceed its total copies",
            book_id.value()
        ))),
        CopyUpdate::NotFound => Err(LendingError::BookNotFound(book_id)),
    }
}

/// 紛失した1冊を蔵書数から除却する
pub async fn write_off_copy(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    match deps
        .book_catalog
        .write_off_copy(book_id)
        .await
        .map_err(LendingError::CatalogError)?
    {
        CopyUpdate::Applied => Ok(()),
        CopyUpdate::Rejected => Err(LendingError::InconsistentState(format!(
            "book {} has no copy on loan to write off",
            book_id.value()
        ))),
        CopyUpdate::NotFound => Err(LendingError::BookNotFound(book_id)),
    }
}

/// 除却を取り消して蔵書数を1冊戻す
pub async fn reinstate_copy(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    match deps
        .book_catalog
        .reinstate_copy(book_id)
        .await
        .map_err(LendingError::CatalogError)?
    {
        CopyUpdate::Applied => Ok(()),
        CopyUpdate::Rejected => Err(LendingError::InconsistentState(format!(
            "book {} could not be reinstated",
            book_id.value()
        ))),
        CopyUpdate::NotFound => Err(LendingError::BookNotFound(book_id)),
    }
}

/// 書籍の非正規化された書架ラベルを設定する
///
/// 書架レジストリ側は更新しない。両方を更新する場合は
/// `shelf::assign_book_to_shelf` を使う。
pub async fn assign_shelf(
    deps: &ServiceDependencies,
    book_id: BookId,
    shelf_no: Option<String>,
) -> Result<()> {
    let found = deps
        .book_catalog
        .set_shelf_location(book_id, shelf_no)
        .await
        .map_err(LendingError::CatalogError)?;

    if !found {
        return Err(LendingError::BookNotFound(book_id));
    }
    Ok(())
}
