mod borrow_locks;
mod member_service;

pub use borrow_locks::BorrowLocks;
pub(crate) use member_service::refresh_member_fine;
pub use member_service::{
    disable_member, enable_member, get_member, is_active, register_member, total_fine_due,
};
