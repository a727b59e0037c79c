use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use duka_core::InventoryRequestId;
use duka_inventory::NewInventoryRequest;

use crate::app::dto::{self, AdjustStockRequest, LocationQuery, RequestsQuery, TransactionsQuery, TransferStockRequest};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/adjust", post(adjust_stock))
        .route("/transfer", post(transfer_stock))
        .route("/transactions", get(list_transactions))
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id/reject", post(reject_request))
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LocationQuery>,
) -> ApiResult {
    require(&principal, authz::INVENTORY_READ)?;
    let location = dto::parse_opt(query.location.as_deref())?;
    let items = services
        .engine
        .list_inventory(location)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<AdjustStockRequest>,
) -> ApiResult {
    let body = CmdAuth::new(body, authz::INVENTORY_ADJUST).authorize(&principal)?;
    let record = services
        .engine
        .adjust_stock(body.into_command(principal.user_id()))
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(record).into_response())
}

pub async fn transfer_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<TransferStockRequest>,
) -> ApiResult {
    let body = CmdAuth::new(body, authz::INVENTORY_TRANSFER).authorize(&principal)?;
    let transfer = services
        .engine
        .transfer_stock(body.into_command(principal.user_id()))
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(transfer).into_response())
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult {
    require(&principal, authz::INVENTORY_READ)?;
    let (filter, page) = query.parse()?;
    let items = services
        .engine
        .list_inventory_transactions(filter, page)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({
        "items": items,
        "limit": page.limit,
        "offset": page.offset,
    }))
    .into_response())
}

pub async fn create_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewInventoryRequest>,
) -> ApiResult {
    let cmd = CmdAuth::new(body, authz::REQUESTS_CREATE).authorize(&principal)?;
    let request = services
        .engine
        .create_inventory_request(cmd, principal.user_id())
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RequestsQuery>,
) -> ApiResult {
    require(&principal, authz::REQUESTS_READ)?;
    let status = query.parse()?;
    let items = services
        .engine
        .list_inventory_requests(status)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, authz::REQUESTS_REJECT)?;
    let id: InventoryRequestId = dto::parse(&id)?;
    let request = services
        .engine
        .reject_inventory_request(id, principal.user_id())
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(request).into_response())
}
