mod common;

use chrono::{DateTime, Duration, Utc};
use library_lending::adapters::postgres::{
    PostgresBookCatalog, PostgresLoanReadModel, PostgresMemberRegistry, PostgresShelfRegistry,
};
use library_lending::domain::book::new_book;
use library_lending::domain::{BookId, LoanId, Member, MemberId, Money};
use library_lending::ports::loan_read_model::{LoanStatus, LoanView};
use library_lending::ports::{
    BookCatalog, CopyUpdate, LoanReadModel, MemberRegistry, ShelfRegistry,
};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQLの時刻精度（マイクロ秒）に合わせて丸める
fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let micros = dt.timestamp_micros();
    DateTime::from_timestamp_micros(micros).expect("Invalid timestamp")
}

async fn cleanup_loan(pool: &PgPool, loan_id: LoanId) {
    sqlx::query("DELETE FROM loans_view WHERE loan_id = $1")
        .bind(loan_id.value())
        .execute(pool)
        .await
        .expect("Failed to cleanup test loan");
}

fn issued_view(member_id: MemberId, issued_at: DateTime<Utc>) -> LoanView {
    let issued_at = truncate_to_micros(issued_at);
    LoanView {
        loan_id: LoanId::new(),
        book_id: BookId::new(),
        member_id,
        issue_date: Some(issued_at),
        due_date: Some(issued_at + Duration::days(14)),
        return_date: None,
        fine: Money::ZERO,
        status: LoanStatus::Issued,
        is_lost: false,
        is_paid: false,
        renewal_count: 0,
        created_at: issued_at,
        updated_at: issued_at,
        version: 1,
    }
}

fn unique_isbn() -> String {
    Uuid::new_v4().simple().to_string()[..13].to_string()
}

// ============================================================================
// Loan read model
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_loan_read_model_upsert_keeps_full_state() {
    let pool = common::create_test_pool().await;
    let read_model = PostgresLoanReadModel::new(pool.clone());
    let view = issued_view(MemberId::new(), Utc::now());

    read_model.save(view.clone()).await.unwrap();
    assert_eq!(read_model.get_by_id(view.loan_id).await.unwrap(), Some(view.clone()));

    let returned_at = truncate_to_micros(Utc::now());
    let returned = LoanView {
        status: LoanStatus::Returned,
        return_date: Some(returned_at),
        fine: Money::new(40),
        updated_at: returned_at,
        version: 2,
        ..view.clone()
    };
    read_model.save(returned.clone()).await.unwrap();
    assert_eq!(read_model.get_by_id(view.loan_id).await.unwrap(), Some(returned.clone()));

    // 古いバージョンのビューは保存済みを上書きしない
    read_model.save(view.clone()).await.unwrap();
    assert_eq!(read_model.get_by_id(view.loan_id).await.unwrap(), Some(returned));

    cleanup_loan(&pool, view.loan_id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_loan_read_model_member_queries() {
    let pool = common::create_test_pool().await;
    let read_model = PostgresLoanReadModel::new(pool.clone());
    let member_id = MemberId::new();
    let now = Utc::now();

    let open = issued_view(member_id, now);
    let lost = LoanView {
        is_lost: true,
        fine: Money::new(500),
        ..issued_view(member_id, now)
    };
    let paid = LoanView {
        status: LoanStatus::Returned,
        fine: Money::new(20),
        is_paid: true,
        ..issued_view(member_id, now)
    };
    read_model
        .save_all(vec![open.clone(), lost.clone(), paid.clone()])
        .await
        .unwrap();

    assert_eq!(read_model.find_by_member_id(member_id).await.unwrap().len(), 3);
    assert_eq!(read_model.count_open_loans_for_member(member_id).await.unwrap(), 1);

    let unpaid = read_model.find_unpaid_for_member(member_id).await.unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].loan_id, lost.loan_id);

    let candidates = read_model
        .find_overdue_candidates(now + Duration::days(15))
        .await
        .unwrap();
    assert!(candidates.iter().any(|v| v.loan_id == open.loan_id));
    assert!(!candidates.iter().any(|v| v.loan_id == lost.loan_id));

    for view in [open, lost, paid] {
        cleanup_loan(&pool, view.loan_id).await;
    }
}

// ============================================================================
// Book catalog
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_book_catalog_conditional_copy_updates() {
    let pool = common::create_test_pool().await;
    let catalog = PostgresBookCatalog::new(pool.clone());

    let mut candidate = common::candidate("The Farthest Shore", 1);
    candidate.isbn = unique_isbn();
    let book = new_book(candidate);
    catalog.insert(book.clone()).await.unwrap();

    let found = catalog.find_by_match_key(&book.match_key()).await.unwrap();
    assert_eq!(found.map(|b| b.id), Some(book.id));

    assert_eq!(catalog.try_reserve_copy(book.id).await.unwrap(), CopyUpdate::Applied);
    assert_eq!(catalog.try_reserve_copy(book.id).await.unwrap(), CopyUpdate::Rejected);
    assert_eq!(catalog.release_copy(book.id).await.unwrap(), CopyUpdate::Applied);
    assert_eq!(catalog.release_copy(book.id).await.unwrap(), CopyUpdate::Rejected);
    assert_eq!(
        catalog.try_reserve_copy(BookId::new()).await.unwrap(),
        CopyUpdate::NotFound
    );

    let merged = catalog.add_copies(book.id, 2).await.unwrap().unwrap();
    assert_eq!((merged.available_copies, merged.total_copies), (3, 3));

    assert!(catalog
        .set_shelf_location(book.id, Some("Z9".to_string()))
        .await
        .unwrap());
    let stored = catalog.get_by_id(book.id).await.unwrap().unwrap();
    assert_eq!(stored.shelf_location.as_deref(), Some("Z9"));
    assert_eq!(stored.authors, book.authors);

    sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(book.id.value())
        .execute(&pool)
        .await
        .unwrap();
}

// ============================================================================
// Member and shelf registries
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_member_registry_flags_and_fine() {
    let pool = common::create_test_pool().await;
    let registry = PostgresMemberRegistry::new(pool.clone());

    let member = Member::new("Therru", "Tehanu", "therru@example.com", "EN-0077");
    let member_id = member.id;
    registry.insert(member).await.unwrap();

    assert!(registry.set_disabled(member_id, true).await.unwrap());
    assert!(registry.set_fine(member_id, Money::new(120)).await.unwrap());
    assert!(!registry.set_fine(MemberId::new(), Money::ZERO).await.unwrap());

    let stored = registry.get_by_id(member_id).await.unwrap().unwrap();
    assert!(stored.is_disabled);
    assert_eq!(stored.fine, Money::new(120));

    sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(member_id.value())
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_shelf_registry_membership() {
    let pool = common::create_test_pool().await;
    let registry = PostgresShelfRegistry::new(pool.clone());
    let shelf_no = format!("T-{}", Uuid::new_v4().simple());
    let first = BookId::new();
    let second = BookId::new();

    registry.add_book(&shelf_no, first).await.unwrap();
    registry.add_book(&shelf_no, second).await.unwrap();
    let shelf = registry.add_book(&shelf_no, first).await.unwrap();
    assert_eq!(shelf.book_ids, vec![first, second]);

    let shelf = registry.remove_book(&shelf_no, first).await.unwrap().unwrap();
    assert_eq!(shelf.book_ids, vec![second]);
    assert!(registry.remove_book("no-such-shelf", first).await.unwrap().is_none());

    let listed = registry.list_all().await.unwrap();
    assert!(listed.iter().any(|s| s.shelf_no == shelf_no));

    sqlx::query("DELETE FROM shelves WHERE shelf_no = $1")
        .bind(&shelf_no)
        .execute(&pool)
        .await
        .unwrap();
}
