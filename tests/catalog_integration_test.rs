use library_lending::application::{LendingError, catalog, shelf};
use library_lending::domain::shelf::ShelfMismatch;
use library_lending::domain::{BookId, Genre};
use library_lending::ports::{BookCatalog, ShelfRegistry};

mod common;

use common::{add_book, candidate};

// ============================================================================
// 書籍の登録と合算
// ============================================================================

#[tokio::test]
async fn test_identical_books_merge_copy_counts() {
    let ctx = common::setup();

    let first = catalog::add_or_merge_book(&ctx.deps, candidate("The Dispossessed", 2))
        .await
        .unwrap();
    let second = catalog::add_or_merge_book(&ctx.deps, candidate("The Dispossessed", 3))
        .await
        .unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(second.book.id, first.book.id);
    assert_eq!(second.book.total_copies, 5);
    assert_eq!(second.book.available_copies, 5);
}

#[tokio::test]
async fn test_different_edition_is_a_new_record() {
    let ctx = common::setup();

    let original = catalog::add_or_merge_book(&ctx.deps, candidate("The Dispossessed", 2))
        .await
        .unwrap();
    let mut reprint = candidate("The Dispossessed", 1);
    reprint.publication_year = 1994;
    let reprint = catalog::add_or_merge_book(&ctx.deps, reprint).await.unwrap();

    assert!(reprint.is_new);
    assert_ne!(reprint.book.id, original.book.id);
    assert_eq!(reprint.book.total_copies, 1);
}

#[tokio::test]
async fn test_csv_import_reports_bad_row_and_keeps_the_rest() {
    let ctx = common::setup();
    let csv = "\
title,author,genre,isbn,year,copies
Kindred,Octavia E. Butler,Fiction,9780807083697,1979,2
The Left Hand of Darkness,Ursula K. Le Guin,Fiction,9780441478125,1969,1
Broken Row,Someone,Fiction,9780000000000,not-a-year,1
Kindred,Octavia E. Butler,Fiction,9780807083697,1979,3
\"Good Omens\",Terry Pratchett; Neil Gaiman,Fantasy,9780060853983,1990,4
";

    let report = catalog::import_books_csv(&ctx.deps, csv).await;

    assert_eq!(report.created, 3);
    assert_eq!(report.updated, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].line, 4);
    assert!(matches!(
        report.failures[0].error,
        LendingError::InvalidCsvRow { line: 4, .. }
    ));

    let books = ctx.deps.book_catalog.list_all().await.unwrap();
    let kindred = books.iter().find(|b| b.title == "Kindred").unwrap();
    assert_eq!(kindred.total_copies, 5);
    let omens = books.iter().find(|b| b.title == "Good Omens").unwrap();
    assert_eq!(omens.authors.len(), 2);
    assert_eq!(omens.genre, Genre::Fantasy);
}

#[tokio::test]
async fn test_csv_import_rejects_unknown_genre_per_row() {
    let ctx = common::setup();
    let csv = "\
Kindred,Octavia E. Butler,Fiction,9780807083697,1979,2
Cookbook,Chef,Cooking,9781111111111,2001,1
";

    let report = catalog::import_books_csv(&ctx.deps, csv).await;

    assert_eq!(report.created, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        LendingError::InvalidGenre(_)
    ));
}

// ============================================================================
// 書架
// ============================================================================

#[tokio::test]
async fn test_assigning_same_shelf_twice_is_idempotent() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;

    shelf::assign_book_to_shelf(&ctx.deps, book_id, "A12")
        .await
        .unwrap();
    let shelf_a12 = shelf::assign_book_to_shelf(&ctx.deps, book_id, "A12")
        .await
        .unwrap();

    assert_eq!(shelf_a12.book_ids, vec![book_id]);
    let book = catalog::get_book(&ctx.deps, book_id).await.unwrap();
    assert_eq!(book.shelf_location.as_deref(), Some("A12"));
    assert!(shelf::check_shelf_consistency(&ctx.deps)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_moving_book_updates_both_shelves() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;

    shelf::assign_book_to_shelf(&ctx.deps, book_id, "A12")
        .await
        .unwrap();
    shelf::assign_book_to_shelf(&ctx.deps, book_id, "B03")
        .await
        .unwrap();

    let old = ctx
        .deps
        .shelf_registry
        .get_by_shelf_no("A12")
        .await
        .unwrap()
        .unwrap();
    assert!(!old.contains(book_id));
    let found = shelf::shelf_of(&ctx.deps, book_id).await.unwrap().unwrap();
    assert_eq!(found.shelf_no, "B03");

    shelf::remove_book_from_shelf(&ctx.deps, book_id)
        .await
        .unwrap();
    assert!(shelf::shelf_of(&ctx.deps, book_id).await.unwrap().is_none());
    let book = catalog::get_book(&ctx.deps, book_id).await.unwrap();
    assert_eq!(book.shelf_location, None);
}

#[tokio::test]
async fn test_unassign_absent_book_is_not_an_error() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;
    shelf::assign(&ctx.deps, book_id, "C01").await.unwrap();

    shelf::unassign(&ctx.deps, BookId::new(), "C01").await.unwrap();
    shelf::unassign(&ctx.deps, book_id, "NOPE").await.unwrap();

    let c01 = ctx
        .deps
        .shelf_registry
        .get_by_shelf_no("C01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(c01.book_ids, vec![book_id]);
}

#[tokio::test]
async fn test_failed_book_update_is_reported_and_detectable() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;
    ctx.book_catalog.fail_shelf_updates(true);

    let err = shelf::assign_book_to_shelf(&ctx.deps, book_id, "A12")
        .await
        .unwrap_err();

    assert!(matches!(err, LendingError::PartialShelfAssignment { .. }));
    assert!(err.is_retryable());

    // 書架側のみ書き込まれた状態が残る
    let mismatches = shelf::check_shelf_consistency(&ctx.deps).await.unwrap();
    assert_eq!(mismatches.len(), 1);
    assert!(matches!(
        &mismatches[0],
        ShelfMismatch::ShelfHoldsUnlinkedBook { shelf_no, .. } if shelf_no == "A12"
    ));

    // 再試行で収束する
    ctx.book_catalog.fail_shelf_updates(false);
    shelf::assign_book_to_shelf(&ctx.deps, book_id, "A12")
        .await
        .unwrap();
    assert!(shelf::check_shelf_consistency(&ctx.deps)
        .await
        .unwrap()
        .is_empty());
}
