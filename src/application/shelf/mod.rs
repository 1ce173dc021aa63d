mod shelf_service;

pub use shelf_service::{
    assign, assign_book_to_shelf, check_shelf_consistency, remove_book_from_shelf, shelf_of,
    unassign,
};
