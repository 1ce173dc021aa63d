mod fine_collection;
mod loan_service;
mod overdue_detection;
mod projection;

pub use fine_collection::{FineCollection, collect_all_fines};
pub use loan_service::{
    approve_request, cancel_request, get_loan, issue_book, list_member_loans, renew_loan,
    report_lost, request_loan, return_book,
};
pub use overdue_detection::detect_overdue_loans;
pub use projection::rebuild_loan_views;
