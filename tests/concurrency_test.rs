use library_lending::application::{LendingError, Result, ServiceDependencies, loan, member};
use library_lending::domain::commands::*;
use library_lending::domain::value_objects::*;
use library_lending::domain::{self, LostCopyHandling, Policy};
use library_lending::ports::{EventStore, LoanView};

mod common;

use common::{TestContext, add_book, add_member, available_copies, day, issue_at};

async fn return_at(deps: &ServiceDependencies, loan_id: LoanId, n: i64) -> Result<LoanView> {
    loan::return_book(
        deps,
        ReturnBook {
            loan_id,
            returned_at: day(n),
        },
    )
    .await
}

/// 同じ操作を2つのタスクで同時に実行する
///
/// `gate` の読み込みの待ち合わせは呼び出し側で有効にする。
async fn run_twice<T, F, Fut>(ctx: &TestContext, operation: F) -> (Result<T>, Result<T>)
where
    T: Send + 'static,
    F: Fn(ServiceDependencies) -> Fut,
    Fut: std::future::Future<Output = Result<T>> + Send + 'static,
{
    let first = tokio::spawn(operation(ctx.deps.clone()));
    let second = tokio::spawn(operation(ctx.deps.clone()));
    (first.await.unwrap(), second.await.unwrap())
}

fn is_concurrent_modification<T>(result: &Result<T>) -> bool {
    matches!(result, Err(LendingError::ConcurrentModification { .. }))
}

/// イベントログが再生でき、Read Modelがその結果と一致する
async fn assert_log_matches_view(ctx: &TestContext, loan_id: LoanId) -> usize {
    let events = ctx.event_store.load(loan_id).await.unwrap();
    let replayed = domain::loan::replay_events(&events).unwrap().unwrap();
    let view = loan::get_loan(&ctx.deps, loan_id).await.unwrap();
    assert_eq!(view, LoanView::from_loan(&replayed, events.len() as u64));
    events.len()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_returns_release_one_copy() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;
    let member_id = add_member(&ctx.deps).await;
    let issued = issue_at(&ctx.deps, book_id, member_id, day(0)).await;
    let loan_id = issued.loan_id;

    ctx.gate.arm();
    let (first, second) = run_twice(&ctx, |deps| async move {
        return_at(&deps, loan_id, 20).await
    })
    .await;

    assert!(first.is_ok() != second.is_ok());
    assert!(is_concurrent_modification(&first) || is_concurrent_modification(&second));
    assert_eq!(available_copies(&ctx.deps, book_id).await, (1, 1));
    assert_eq!(
        member::total_fine_due(&ctx.deps, member_id).await.unwrap(),
        Money::new(60)
    );
    // BookIssued, BookReturned, InventorySettled
    assert_eq!(assert_log_matches_view(&ctx, loan_id).await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_lost_reports_write_off_one_copy() {
    let ctx = common::setup_with_policy(Policy {
        lost_copy_handling: LostCopyHandling::WriteOff,
        ..Policy::default()
    });
    let book_id = add_book(&ctx.deps, 2).await;
    let member_id = add_member(&ctx.deps).await;
    let issued = issue_at(&ctx.deps, book_id, member_id, day(0)).await;
    let loan_id = issued.loan_id;

    ctx.gate.arm();
    let (first, second) = run_twice(&ctx, |deps| async move {
        loan::report_lost(
            &deps,
            ReportLost {
                loan_id,
                reported_at: day(3),
            },
        )
        .await
    })
    .await;

    assert!(first.is_ok() != second.is_ok());
    assert!(is_concurrent_modification(&first) || is_concurrent_modification(&second));
    assert_eq!(available_copies(&ctx.deps, book_id).await, (1, 1));
    assert_eq!(
        member::total_fine_due(&ctx.deps, member_id).await.unwrap(),
        Money::new(500)
    );
    assert_eq!(assert_log_matches_view(&ctx, loan_id).await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_fine_collections_pay_once() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;
    let member_id = add_member(&ctx.deps).await;
    let issued = issue_at(&ctx.deps, book_id, member_id, day(0)).await;
    return_at(&ctx.deps, issued.loan_id, 20).await.unwrap();

    ctx.gate.arm();
    let (first, second) = run_twice(&ctx, |deps| async move {
        loan::collect_all_fines(
            &deps,
            CollectFines {
                member_id,
                collected_at: day(21),
            },
        )
        .await
    })
    .await;

    let paid: Vec<_> = [&first, &second]
        .into_iter()
        .filter_map(|result| result.as_ref().ok())
        .filter(|collection| collection.loans_paid > 0)
        .collect();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].amount, Money::new(60));
    for result in [&first, &second] {
        match result {
            Ok(collection) => assert!(collection.loans_paid <= 1),
            Err(e) => assert!(matches!(e, LendingError::ConcurrentModification { .. })),
        }
    }

    assert_eq!(
        member::total_fine_due(&ctx.deps, member_id).await.unwrap(),
        Money::ZERO
    );
    assert_eq!(
        member::get_member(&ctx.deps, member_id).await.unwrap().fine,
        Money::ZERO
    );
    // BookIssued, BookReturned, InventorySettled, FinePaid
    assert_eq!(assert_log_matches_view(&ctx, issued.loan_id).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overdue_sweep_racing_return_keeps_history_consistent() {
    let ctx = common::setup();
    let book_id = add_book(&ctx.deps, 1).await;
    let member_id = add_member(&ctx.deps).await;
    let issued = issue_at(&ctx.deps, book_id, member_id, day(0)).await;
    let loan_id = issued.loan_id;

    ctx.gate.arm();
    let sweep = {
        let deps = ctx.deps.clone();
        tokio::spawn(async move { loan::detect_overdue_loans(&deps, day(16)).await })
    };
    let returned = {
        let deps = ctx.deps.clone();
        tokio::spawn(async move { return_at(&deps, loan_id, 16).await })
    };
    let detected = sweep.await.unwrap().unwrap();
    let returned = returned.await.unwrap();

    // どちらか一方だけが記録される
    assert!((detected == 1) != returned.is_ok());
    if detected == 1 {
        assert!(is_concurrent_modification(&returned));
        assert_eq!(available_copies(&ctx.deps, book_id).await, (0, 1));
        assert_eq!(assert_log_matches_view(&ctx, loan_id).await, 2);

        // 読み直せば返却できる
        let retried = return_at(&ctx.deps, loan_id, 16).await.unwrap();
        assert_eq!(retried.fine, Money::new(20));
    }

    assert_eq!(available_copies(&ctx.deps, book_id).await, (1, 1));
    let events = assert_log_matches_view(&ctx, loan_id).await;
    assert_eq!(events, if detected == 1 { 4 } else { 3 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_issues_respect_borrowing_limit() {
    let ctx = common::setup_with_policy(Policy {
        borrowing_limit: 2,
        ..Policy::default()
    });
    let book_id = add_book(&ctx.deps, 3).await;
    let member_id = add_member(&ctx.deps).await;
    issue_at(&ctx.deps, book_id, member_id, day(0)).await;

    let (first, second) = run_twice(&ctx, |deps| async move {
        loan::issue_book(
            &deps,
            IssueBook {
                book_id,
                member_id,
                issued_at: day(1),
                staff_id: StaffId::new(),
            },
        )
        .await
    })
    .await;

    assert!(first.is_ok() != second.is_ok());
    assert!(
        matches!(first, Err(LendingError::BorrowLimitExceeded { limit: 2 }))
            || matches!(second, Err(LendingError::BorrowLimitExceeded { limit: 2 }))
    );
    assert_eq!(available_copies(&ctx.deps, book_id).await, (1, 3));
    assert_eq!(
        loan::list_member_loans(&ctx.deps, member_id).await.unwrap().len(),
        2
    );
}
