use crate::application::{LendingError, ServiceDependencies, catalog, loan, member, shelf};
use crate::domain::commands::{
    ApproveRequest, CancelRequest, CollectFines, IssueBook, RenewLoan, ReportLost, RequestLoan,
    ReturnBook,
};
use crate::domain::{BookCandidate, BookId, Genre, LoanId, Member, MemberId, StaffId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        AddBookRequest, ApproveRequestBody, AssignShelfRequest, BookAddedResponse, BookResponse,
        ConsistencyResponse, EffectiveAt, FineCollectionResponse, FinesResponse,
        ImportReportResponse, IssueBookRequest, ListLoansQuery, LoanResponse, MemberResponse,
        RegisterMemberRequest, RequestLoanRequest, ShelfResponse, parse_status_filter,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

type ApiResult<T> = Result<T, ApiError>;

fn effective_at(body: Option<Json<EffectiveAt>>) -> chrono::DateTime<Utc> {
    body.map(|Json(b)| b.or_now()).unwrap_or_else(Utc::now)
}

// ============================================================================
// Loan commands (POST)
// ============================================================================

/// POST /loans - 書籍を貸し出す
///
/// 強制されるビジネスルール:
/// - 会員が存在し、無効化されていないこと
/// - 貸出中の冊数がポリシーの上限未満であること
/// - 貸出可能な冊があること
pub async fn issue_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueBookRequest>,
) -> ApiResult<(StatusCode, Json<LoanResponse>)> {
    let cmd = IssueBook {
        book_id: BookId::from_uuid(req.book_id),
        member_id: MemberId::from_uuid(req.member_id),
        issued_at: req.issued_at.unwrap_or_else(Utc::now),
        staff_id: StaffId::from_uuid(req.staff_id),
    };

    let view = loan::issue_book(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::from(view))))
}

/// POST /loans/requests - 貸出を申請する（在庫は確保しない）
pub async fn request_loan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequestLoanRequest>,
) -> ApiResult<(StatusCode, Json<LoanResponse>)> {
    let cmd = RequestLoan {
        book_id: BookId::from_uuid(req.book_id),
        member_id: MemberId::from_uuid(req.member_id),
        requested_at: Utc::now(),
    };

    let view = loan::request_loan(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::from(view))))
}

/// POST /loans/:id/approve - 申請を承認して貸し出す
pub async fn approve_request(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<ApproveRequestBody>,
) -> ApiResult<Json<LoanResponse>> {
    let cmd = ApproveRequest {
        loan_id: LoanId::from_uuid(loan_id),
        approved_at: Utc::now(),
        staff_id: StaffId::from_uuid(req.staff_id),
    };

    let view = loan::approve_request(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// POST /loans/:id/cancel - 申請を取り消す
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> ApiResult<Json<LoanResponse>> {
    let cmd = CancelRequest {
        loan_id: LoanId::from_uuid(loan_id),
        cancelled_at: Utc::now(),
    };

    let view = loan::cancel_request(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// POST /loans/:id/return - 書籍を返却
///
/// 期限超過なら延滞料を確定する。2回目の返却は 409 で何も変更しない。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    body: Option<Json<EffectiveAt>>,
) -> ApiResult<Json<LoanResponse>> {
    let returned_at = effective_at(body);
    let cmd = ReturnBook {
        loan_id: LoanId::from_uuid(loan_id),
        returned_at,
    };

    let view = loan::return_book(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::at(view, returned_at)))
}

/// POST /loans/:id/renew - 貸出を延長
pub async fn renew_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    body: Option<Json<EffectiveAt>>,
) -> ApiResult<Json<LoanResponse>> {
    let renewed_at = effective_at(body);
    let cmd = RenewLoan {
        loan_id: LoanId::from_uuid(loan_id),
        renewed_at,
    };

    let view = loan::renew_loan(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::at(view, renewed_at)))
}

/// POST /loans/:id/lost - 紛失を報告
pub async fn report_lost(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    body: Option<Json<EffectiveAt>>,
) -> ApiResult<Json<LoanResponse>> {
    let reported_at = effective_at(body);
    let cmd = ReportLost {
        loan_id: LoanId::from_uuid(loan_id),
        reported_at,
    };

    let view = loan::report_lost(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::at(view, reported_at)))
}

// ============================================================================
// Loan queries (GET)
// ============================================================================

/// GET /loans/:id - 貸出詳細をIDで取得
pub async fn get_loan_by_id(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> ApiResult<Json<LoanResponse>> {
    let view = loan::get_loan(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// GET /loans - 会員の貸出一覧取得
///
/// クエリパラメータ:
/// - member_id: 会員IDでフィルタリング（必須）
/// - status: ステータスでフィルタリング（オプション、読み取り時点のステータスで比較）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> ApiResult<Json<Vec<LoanResponse>>> {
    let member_id = query.member_id.ok_or_else(|| {
        ApiError::BadRequest("member_id query parameter is required".to_string())
    })?;

    let status = query
        .status
        .as_deref()
        .map(parse_status_filter)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let now = Utc::now();
    let loans =
        loan::list_member_loans(&state.service_deps, MemberId::from_uuid(member_id)).await?;

    let filtered = loans
        .into_iter()
        .filter(|view| status.is_none_or(|s| view.current_status(now) == s))
        .map(|view| LoanResponse::at(view, now))
        .collect();

    Ok(Json(filtered))
}

// ============================================================================
// Catalog
// ============================================================================

/// POST /books - 書籍を登録、または既存レコードに冊数を合算
pub async fn add_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddBookRequest>,
) -> ApiResult<(StatusCode, Json<BookAddedResponse>)> {
    let genre: Genre = req.genre.parse().map_err(LendingError::InvalidGenre)?;
    let candidate = BookCandidate {
        title: req.title,
        authors: req.authors,
        genre,
        isbn: req.isbn,
        publication_year: req.publication_year,
        total_copies: req.copies,
    };

    let outcome = catalog::add_or_merge_book(&state.service_deps, candidate).await?;
    let status = if outcome.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(BookAddedResponse {
            created: outcome.is_new,
            book: BookResponse::from(outcome.book),
        }),
    ))
}

/// POST /books/import - CSV本文から一括登録
///
/// 行ごとの失敗はレスポンスの failures に入り、他の行の処理は続行する。
pub async fn import_books(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Json<ImportReportResponse> {
    let report = catalog::import_books_csv(&state.service_deps, &body).await;
    Json(ImportReportResponse::from(report))
}

/// GET /books/:id
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<BookResponse>> {
    let book = catalog::get_book(&state.service_deps, BookId::from_uuid(book_id)).await?;
    Ok(Json(BookResponse::from(book)))
}

// ============================================================================
// Shelves
// ============================================================================

/// PUT /books/:id/shelf - 書籍を書架に配置
pub async fn assign_shelf(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<AssignShelfRequest>,
) -> ApiResult<Json<ShelfResponse>> {
    let shelf = shelf::assign_book_to_shelf(
        &state.service_deps,
        BookId::from_uuid(book_id),
        &req.shelf_no,
    )
    .await?;
    Ok(Json(ShelfResponse::from(shelf)))
}

/// DELETE /books/:id/shelf - 書籍を書架から外す
pub async fn remove_shelf(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    shelf::remove_book_from_shelf(&state.service_deps, BookId::from_uuid(book_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /books/:id/shelf - 書籍を含む書架
pub async fn get_shelf(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> ApiResult<Json<ShelfResponse>> {
    let book_id = BookId::from_uuid(book_id);
    catalog::get_book(&state.service_deps, book_id).await?;

    let shelf = shelf::shelf_of(&state.service_deps, book_id)
        .await?
        .ok_or_else(|| {
            LendingError::ShelfNotFound(format!("no shelf holds book {}", book_id.value()))
        })?;
    Ok(Json(ShelfResponse::from(shelf)))
}

/// GET /shelves/consistency - 書架と書籍の対応の不一致を報告
pub async fn shelf_consistency(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ConsistencyResponse>> {
    let mismatches = shelf::check_shelf_consistency(&state.service_deps).await?;
    Ok(Json(ConsistencyResponse {
        consistent: mismatches.is_empty(),
        mismatches,
    }))
}

// ============================================================================
// Members
// ============================================================================

/// POST /members - 会員を登録
pub async fn register_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let member = Member::new(req.first_name, req.last_name, req.email, req.enrollment_number);
    let member_id = member::register_member(&state.service_deps, member).await?;
    let member = member::get_member(&state.service_deps, member_id).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::from(member))))
}

/// GET /members/:id/fines - 未払い罰金の合計
pub async fn get_fines(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<FinesResponse>> {
    let total_due =
        member::total_fine_due(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(Json(FinesResponse {
        member_id,
        total_due: total_due.value(),
    }))
}

/// POST /members/:id/fines/collect - 未払い罰金をすべて徴収
///
/// 未払いがなければ 0 件・0 円で成功する。
pub async fn collect_fines(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<FineCollectionResponse>> {
    let cmd = CollectFines {
        member_id: MemberId::from_uuid(member_id),
        collected_at: Utc::now(),
    };
    let collection = loan::collect_all_fines(&state.service_deps, cmd).await?;
    Ok(Json(FineCollectionResponse::from(collection)))
}

/// POST /members/:id/disable
pub async fn disable_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    member::disable_member(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /members/:id/enable
pub async fn enable_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    member::enable_member(&state.service_deps, MemberId::from_uuid(member_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
