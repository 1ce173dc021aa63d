pub mod book_catalog;
pub mod event_store;
pub mod loan_read_model;
pub mod member_registry;
pub mod notification_service;
pub mod shelf_registry;

pub use book_catalog::{BookCatalog, CopyUpdate};
pub use event_store::{EventStore, StreamAppend, VersionConflict};
pub use loan_read_model::{LoanReadModel, LoanView};
pub use member_registry::MemberRegistry;
pub use notification_service::NotificationService;
pub use shelf_registry::ShelfRegistry;
