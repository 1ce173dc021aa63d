pub mod book_catalog;
pub mod event_store;
pub mod loan_read_model;
pub mod member_registry;
pub mod shelf_registry;

// パブリックに型を再エクスポート
pub use book_catalog::BookCatalog as PostgresBookCatalog;
pub use event_store::EventStore as PostgresEventStore;
pub use loan_read_model::LoanReadModel as PostgresLoanReadModel;
pub use member_registry::MemberRegistry as PostgresMemberRegistry;
pub use shelf_registry::ShelfRegistry as PostgresShelfRegistry;

use crate::domain::value_objects::Money;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 列の値がドメインの範囲外であることを示すエラー
fn invalid_data(message: String) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

fn money_to_db(amount: Money) -> Result<i64, BoxError> {
    i64::try_from(amount.value())
        .map_err(|_| invalid_data(format!("amount out of range: {}", amount.value())))
}

fn money_from_db(column: &str, value: i64) -> Result<Money, BoxError> {
    u64::try_from(value)
        .map(Money::new)
        .map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

fn count_from_db(column: &str, value: i32) -> Result<u32, BoxError> {
    u32::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

fn count_to_db(column: &str, value: u32) -> Result<i32, BoxError> {
    i32::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

fn version_from_db(value: i64) -> Result<u64, BoxError> {
    u64::try_from(value).map_err(|_| invalid_data(format!("version out of range: {}", value)))
}

fn version_to_db(value: u64) -> Result<i64, BoxError> {
    i64::try_from(value).map_err(|_| invalid_data(format!("version out of range: {}", value)))
}
