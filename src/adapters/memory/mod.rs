pub mod book_catalog;
pub mod event_store;
pub mod loan_read_model;
pub mod member_registry;
pub mod notification_service;
pub mod shelf_registry;

use std::sync::{Mutex, MutexGuard};

pub use book_catalog::BookCatalog as InMemoryBookCatalog;
pub use event_store::EventStore as InMemoryEventStore;
pub use loan_read_model::LoanReadModel as InMemoryLoanReadModel;
pub use member_registry::MemberRegistry as InMemoryMemberRegistry;
pub use notification_service::NotificationService as InMemoryNotificationService;
pub use shelf_registry::ShelfRegistry as InMemoryShelfRegistry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// ストアのロックを取得する（ポイズニングはストレージエラーとして返す）
fn lock<T>(mutex: &Mutex<T>) -> std::result::Result<MutexGuard<'_, T>, BoxError> {
    mutex
        .lock()
        .map_err(|_| BoxError::from("in-memory store lock poisoned"))
}
