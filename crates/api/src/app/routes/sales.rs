use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use duka_core::SaleId;
use duka_sales::{NewSale, ReturnRequest};

use crate::app::dto::{self, ChangeSaleStatusRequest, SalesQuery};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/status", patch(change_status))
        .route("/:id/returns", post(process_return).get(list_returns))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewSale>,
) -> ApiResult {
    let cmd = CmdAuth::new(body, authz::SALES_CREATE).authorize(&principal)?;
    let sale = services
        .engine
        .create_sale(cmd, principal.user_id())
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok((StatusCode::CREATED, Json(sale)).into_response())
}

/// Sales newest first; fully returned sales only with `include_fully_returned=true`.
pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<SalesQuery>,
) -> ApiResult {
    require(&principal, authz::SALES_READ)?;
    let (filter, page) = query.parse()?;
    let items = services
        .engine
        .list_sales(filter, page)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({
        "items": items,
        "limit": page.limit,
        "offset": page.offset,
    }))
    .into_response())
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, authz::SALES_READ)?;
    let id: SaleId = dto::parse(&id)?;
    let sale = services
        .engine
        .get_sale(id)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(sale).into_response())
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ChangeSaleStatusRequest>,
) -> ApiResult {
    let body = CmdAuth::new(body, authz::SALES_APPROVE).authorize(&principal)?;
    let id: SaleId = dto::parse(&id)?;
    let sale = services
        .engine
        .change_sale_status(id, body.status, principal.user_id())
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(sale).into_response())
}

pub async fn process_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ReturnRequest>,
) -> ApiResult {
    let request = CmdAuth::new(body, authz::RETURNS_CREATE).authorize(&principal)?;
    let id: SaleId = dto::parse(&id)?;
    let receipt = services
        .engine
        .process_return(id, request, principal.user_id())
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

pub async fn list_returns(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, authz::RETURNS_READ)?;
    let id: SaleId = dto::parse(&id)?;
    let items = services
        .engine
        .list_returns(id)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}
