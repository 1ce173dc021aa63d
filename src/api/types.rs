use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::catalog::ImportReport;
use crate::application::loan::FineCollection;
use crate::domain::{Book, Member, ShelfLocation, shelf::ShelfMismatch};
use crate::ports::loan_read_model::{LoanStatus, LoanView};

// ============================================================================
// Requests
// ============================================================================

/// POST /loans
#[derive(Debug, Deserialize)]
pub struct IssueBookRequest {
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub staff_id: Uuid,
    /// 省略時は現在時刻
    pub issued_at: Option<DateTime<Utc>>,
}

/// POST /loans/requests
#[derive(Debug, Deserialize)]
pub struct RequestLoanRequest {
    pub book_id: Uuid,
    pub member_id: Uuid,
}

/// POST /loans/:id/approve
#[derive(Debug, Deserialize)]
pub struct ApproveRequestBody {
    pub staff_id: Uuid,
}

/// 返却・延長・紛失などの操作日時（ボディ省略時は現在時刻）
#[derive(Debug, Default, Deserialize)]
pub struct EffectiveAt {
    pub at: Option<DateTime<Utc>>,
}

impl EffectiveAt {
    pub fn or_now(&self) -> DateTime<Utc> {
        self.at.unwrap_or_else(Utc::now)
    }
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    /// 会員IDでフィルタリング
    pub member_id: Option<Uuid>,
    /// ステータスでフィルタリング
    pub status: Option<String>,
}

/// POST /books
#[derive(Debug, Deserialize)]
pub struct AddBookRequest {
    pub title: String,
    pub authors: Vec<String>,
    pub genre: String,
    pub isbn: String,
    pub publication_year: i32,
    pub copies: u32,
}

/// PUT /books/:id/shelf
#[derive(Debug, Deserialize)]
pub struct AssignShelfRequest {
    pub shelf_no: String,
}

/// POST /members
#[derive(Debug, Deserialize)]
pub struct RegisterMemberRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enrollment_number: String,
}

// ============================================================================
// Responses
// ============================================================================

/// 貸出レスポンス
///
/// `status` は読み取り時点で評価したステータス。
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine: u64,
    pub status: String,
    pub is_lost: bool,
    pub is_paid: bool,
    pub renewal_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanResponse {
    pub fn at(view: LoanView, now: DateTime<Utc>) -> Self {
        Self {
            loan_id: view.loan_id.value(),
            book_id: view.book_id.value(),
            member_id: view.member_id.value(),
            issue_date: view.issue_date,
            due_date: view.due_date,
            return_date: view.return_date,
            fine: view.fine.value(),
            status: view.current_status(now).as_str().to_string(),
            is_lost: view.is_lost,
            is_paid: view.is_paid,
            renewal_count: view.renewal_count,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

impl From<LoanView> for LoanResponse {
    fn from(view: LoanView) -> Self {
        LoanResponse::at(view, Utc::now())
    }
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub authors: Vec<String>,
    pub genre: String,
    pub isbn: String,
    pub publication_year: i32,
    pub total_copies: u32,
    pub available_copies: u32,
    pub shelf_location: Option<String>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.id.value(),
            title: book.title,
            authors: book.authors,
            genre: book.genre.as_str().to_string(),
            isbn: book.isbn,
            publication_year: book.publication_year,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            shelf_location: book.shelf_location,
        }
    }
}

/// POST /books のレスポンス
#[derive(Debug, Serialize)]
pub struct BookAddedResponse {
    pub created: bool,
    pub book: BookResponse,
}

#[derive(Debug, Serialize)]
pub struct RowFailureResponse {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReportResponse {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<RowFailureResponse>,
}

impl From<ImportReport> for ImportReportResponse {
    fn from(report: ImportReport) -> Self {
        Self {
            created: report.created,
            updated: report.updated,
            failures: report
                .failures
                .into_iter()
                .map(|f| RowFailureResponse {
                    line: f.line,
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShelfResponse {
    pub shelf_no: String,
    pub book_ids: Vec<Uuid>,
}

impl From<ShelfLocation> for ShelfResponse {
    fn from(shelf: ShelfLocation) -> Self {
        Self {
            shelf_no: shelf.shelf_no,
            book_ids: shelf.book_ids.into_iter().map(|id| id.value()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConsistencyResponse {
    pub consistent: bool,
    pub mismatches: Vec<ShelfMismatch>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enrollment_number: String,
    pub is_disabled: bool,
    pub fine: u64,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.id.value(),
            first_name: member.first_name,
            last_name: member.last_name,
            email: member.email,
            enrollment_number: member.enrollment_number,
            is_disabled: member.is_disabled,
            fine: member.fine.value(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FinesResponse {
    pub member_id: Uuid,
    pub total_due: u64,
}

#[derive(Debug, Serialize)]
pub struct FineCollectionResponse {
    pub loans_paid: usize,
    pub amount: u64,
}

impl From<FineCollection> for FineCollectionResponse {
    fn from(collection: FineCollection) -> Self {
        Self {
            loans_paid: collection.loans_paid,
            amount: collection.amount.value(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// 同じリクエストを再試行してよいか
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            error: error_type.into(),
            message: message.into(),
            retryable,
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}
