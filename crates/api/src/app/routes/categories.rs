use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use duka_products::NewCategory;

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(create_category).get(list_categories))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewCategory>,
) -> ApiResult {
    let cmd = CmdAuth::new(body, authz::CATEGORIES_WRITE).authorize(&principal)?;
    let category = services
        .engine
        .create_category(cmd)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok((StatusCode::CREATED, Json(category)).into_response())
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&principal, authz::PRODUCTS_READ)?;
    let items = services
        .engine
        .list_categories()
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}
