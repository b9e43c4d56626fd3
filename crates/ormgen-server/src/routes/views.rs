//! Generated view endpoints.
//!
//! One route per [`UrlEntry`]. Each handler owns a clone of its view and runs
//! it against the shared [`Site`](ormgen_core::Site).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ormgen_core::views::DetailPage;
use ormgen_core::{
    ActionView, CreateView, DeleteOutcome, DeleteView, DetailView, EditOutcome, ListPage,
    ListView, QueryParams, UpdateView, UrlEntry,
};
use serde_json::{Map, Value as JsonValue};

use crate::error::AppError;
use crate::json::{DeleteRequest, SuccessResponse};
use crate::AppState;

type Payload = Map<String, JsonValue>;

/// Routes for the given view entries.
pub fn routes(entries: &[UrlEntry]) -> Router<AppState> {
    entries.iter().fold(Router::new(), |router, entry| {
        tracing::debug!(path = %entry.path, name = %entry.name, "mounting view");
        match entry.view.clone() {
            ActionView::List(view) => router.route(
                &entry.path,
                get(move |state: State<AppState>, query: Query<Vec<(String, String)>>| {
                    handle_list(state, query, view)
                }),
            ),
            ActionView::Detail(view) => router.route(
                &entry.path,
                get(move |state: State<AppState>, pk: Path<String>| handle_detail(state, pk, view)),
            ),
            ActionView::Create(view) => router.route(
                &entry.path,
                post(move |state: State<AppState>, body: Json<Payload>| {
                    handle_create(state, body, view)
                }),
            ),
            ActionView::Update(view) => {
                let initial = view.clone();
                router.route(
                    &entry.path,
                    get(move |state: State<AppState>, pk: Path<String>| {
                        handle_update_initial(state, pk, initial)
                    })
                    .post(
                        move |state: State<AppState>, pk: Path<String>, body: Json<Payload>| {
                            handle_update(state, pk, body, view)
                        },
                    ),
                )
            }
            ActionView::Delete(view) => router.route(
                &entry.path,
                post(move |state: State<AppState>, body: Json<DeleteRequest>| {
                    handle_delete(state, body, view)
                }),
            ),
        }
    })
}

async fn handle_list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    view: ListView,
) -> Result<Json<SuccessResponse<ListPage>>, AppError> {
    let params: QueryParams = pairs.into_iter().collect();
    let page = view.render(&state.site, &params)?;
    Ok(Json(SuccessResponse::new(page)))
}

async fn handle_detail(
    State(state): State<AppState>,
    Path(pk): Path<String>,
    view: DetailView,
) -> Result<Json<SuccessResponse<DetailPage>>, AppError> {
    let page = view.render(&state.site, &pk)?;
    Ok(Json(SuccessResponse::new(page)))
}

async fn handle_create(
    State(state): State<AppState>,
    Json(payload): Json<Payload>,
    view: CreateView,
) -> Result<Response, AppError> {
    let outcome = view.submit(&state.site, &payload)?;
    Ok(edit_response(outcome, StatusCode::CREATED))
}

async fn handle_update_initial(
    State(state): State<AppState>,
    Path(pk): Path<String>,
    view: UpdateView,
) -> Result<Json<SuccessResponse<JsonValue>>, AppError> {
    let record = view.initial(&state.site, &pk)?;
    Ok(Json(SuccessResponse::new(record.to_json())))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(pk): Path<String>,
    Json(payload): Json<Payload>,
    view: UpdateView,
) -> Result<Response, AppError> {
    let outcome = view.submit(&state.site, &pk, &payload)?;
    Ok(edit_response(outcome, StatusCode::OK))
}

async fn handle_delete(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
    view: DeleteView,
) -> Json<DeleteOutcome> {
    Json(view.submit(&state.site, &request.id_strings()))
}

fn edit_response(outcome: EditOutcome, saved: StatusCode) -> Response {
    let status = if outcome.is_saved() {
        saved
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}
