use crate::domain::shelf::{ShelfMismatch, find_mismatches};
use crate::domain::{BookId, ShelfLocation};

use super::super::catalog::{assign_shelf, get_book};
use super::super::{LendingError, Result, ServiceDependencies};

fn validate_shelf_no(shelf_no: &str) -> Result<&str> {
    let shelf_no = shelf_no.trim();
    if shelf_no.is_empty() {
        return Err(LendingError::InvalidInput("shelf_no must not be empty".to_string()));
    }
    Ok(shelf_no)
}

/// 書架に書籍を登録する（レジストリのみ）
///
/// 書架がなければ作成する。同じ書籍を2回登録しても1件のまま。
pub async fn assign(
    deps: &ServiceDependencies,
    book_id: BookId,
    shelf_no: &str,
) -> Result<ShelfLocation> {
    let shelf_no = validate_shelf_no(shelf_no)?;
    deps.shelf_registry
        .add_book(shelf_no, book_id)
        .await
        .map_err(LendingError::ShelfRegistryError)
}

/// 書架から書籍を外す（レジストリのみ、含まれていなくてもエラーにしない）
pub async fn unassign(deps: &ServiceDependencies, book_id: BookId, shelf_no: &str) -> Result<()> {
    let shelf_no = validate_shelf_no(shelf_no)?;
    deps.shelf_registry
        .remove_book(shelf_no, book_id)
        .await
        .map_err(LendingError::ShelfRegistryError)?;
    Ok(())
}

/// 書籍を含む書架を探す
///
/// 全書架を線形に走査する。
pub async fn shelf_of(deps: &ServiceDependencies, book_id: BookId) -> Result<Option<ShelfLocation>> {
    let shelves = deps
        .shelf_registry
        .list_all()
        .await
        .map_err(LendingError::ShelfRegistryError)?;

    Ok(shelves.into_iter().find(|shelf| shelf.contains(book_id)))
}

/// 書籍を書架に配置する（レジストリと書籍の両方を更新）
///
/// 書き込み順序は固定：
/// 1. 新しい書架のメンバーに追加
/// 2. 書籍の shelf_location を更新
/// 3. 以前の書架から外す
///
/// 途中で失敗した場合は「書架が書籍を含むが書籍側が指していない」状態が残り、
/// `check_shelf_consistency` で検出できる。
pub async fn assign_book_to_shelf(
    deps: &ServiceDependencies,
    book_id: BookId,
    shelf_no: &str,
) -> Result<ShelfLocation> {
    let shelf_no = validate_shelf_no(shelf_no)?;
    let book = get_book(deps, book_id).await?;

    let shelf = assign(deps, book_id, shelf_no).await?;

    if let Err(e) = assign_shelf(deps, book_id, Some(shelf_no.to_string())).await {
        tracing::warn!(
            book_id = %book_id.value(),
            shelf_no,
            error = %e,
            "Shelf membership written but book shelf location update failed"
        );
        return Err(LendingError::PartialShelfAssignment {
            shelf_no: shelf_no.to_string(),
            source: Box::new(e),
        });
    }

    if let Some(previous) = book.shelf_location.as_deref() {
        if previous != shelf_no {
            unassign(deps, book_id, previous).await?;
        }
    }

    tracing::info!(book_id = %book_id.value(), shelf_no, "Book assigned to shelf");
    Ok(shelf)
}

/// 書籍を書架から外す（書籍側を先に消し、次にレジストリから外す）
pub async fn remove_book_from_shelf(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    let book = get_book(deps, book_id).await?;
    let Some(shelf_no) = book.shelf_location else {
        return Ok(());
    };

    assign_shelf(deps, book_id, None).await?;
    unassign(deps, book_id, &shelf_no).await?;

    tracing::info!(book_id = %book_id.value(), shelf_no = %shelf_no, "Book removed from shelf");
    Ok(())
}

/// 全書架と全書籍を突き合わせ、不一致を返す
pub async fn check_shelf_consistency(deps: &ServiceDependencies) -> Result<Vec<ShelfMismatch>> {
    let shelves = deps
        .shelf_registry
        .list_all()
        .await
        .map_err(LendingError::ShelfRegistryError)?;
    let books = deps
        .book_catalog
        .list_all()
        .await
        .map_err(LendingError::CatalogError)?;

    let mismatches = find_mismatches(&shelves, &books);
    if !mismatches.is_empty() {
        tracing::warn!(count = mismatches.len(), "Shelf and book records disagree");
    }
    Ok(mismatches)
}
