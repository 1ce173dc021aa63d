mod book_import;
mod catalog_service;

pub use book_import::{ImportReport, RowFailure, import_books_csv, parse_csv_row};
pub use catalog_service::{
    MergeOutcome, add_or_merge_book, assign_shelf, get_book, reinstate_copy, release_copy,
    reserve_copy, write_off_copy,
};
