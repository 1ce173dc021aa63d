use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, add_book, approve_request, assign_shelf, cancel_request, collect_fines,
    disable_member, enable_member, get_book, get_fines, get_loan_by_id, get_shelf, import_books,
    issue_book, list_loans, register_member, remove_shelf, renew_loan, report_lost, request_loan,
    return_book, shelf_consistency,
};

/// Creates the API router with all lending endpoints
///
/// Loans:
/// - POST /loans - Issue a book
/// - POST /loans/requests - Request a loan without reserving a copy
/// - POST /loans/:id/{approve,cancel,return,renew,lost}
/// - GET /loans/:id, GET /loans?member_id=&status=
///
/// Catalog and shelves:
/// - POST /books, POST /books/import, GET /books/:id
/// - PUT/DELETE/GET /books/:id/shelf, GET /shelves/consistency
///
/// Members:
/// - POST /members, GET /members/:id/fines, POST /members/:id/fines/collect
/// - POST /members/:id/{disable,enable}
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Loans
        .route("/loans", post(issue_book).get(list_loans))
        .route("/loans/requests", post(request_loan))
        .route("/loans/:id", get(get_loan_by_id))
        .route("/loans/:id/approve", post(approve_request))
        .route("/loans/:id/cancel", post(cancel_request))
        .route("/loans/:id/return", post(return_book))
        .route("/loans/:id/renew", post(renew_loan))
        .route("/loans/:id/lost", post(report_lost))
        // Catalog
        .route("/books", post(add_book))
        .route("/books/import", post(import_books))
        .route("/books/:id", get(get_book))
        .route(
            "/books/:id/shelf",
            get(get_shelf).put(assign_shelf).delete(remove_shelf),
        )
        .route("/shelves/consistency", get(shelf_consistency))
        // Members
        .route("/members", post(register_member))
        .route("/members/:id/fines", get(get_fines))
        .route("/members/:id/fines/collect", post(collect_fines))
        .route("/members/:id/disable", post(disable_member))
        .route("/members/:id/enable", post(enable_member))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
