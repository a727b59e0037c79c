use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use duka_core::{Location, ProductId};
use duka_products::{NewProduct, ProductPatch};

use crate::app::dto::{self, LocationQuery};
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{require, CmdAuth};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).patch(update_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewProduct>,
) -> ApiResult {
    let cmd = CmdAuth::new(body, authz::PRODUCTS_WRITE).authorize(&principal)?;
    let product = services
        .engine
        .create_product(cmd)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

/// Products with their stock at `?location=` (required).
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LocationQuery>,
) -> ApiResult {
    require(&principal, authz::PRODUCTS_READ)?;
    let location: Location = dto::parse_opt(query.location.as_deref())?.ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "location query parameter is required",
        )
    })?;

    let items = services
        .engine
        .list_products_by_location(location)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(serde_json::json!({ "location": location, "items": items })).into_response())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, authz::PRODUCTS_READ)?;
    let id: ProductId = dto::parse(&id)?;
    let product = services
        .engine
        .get_product(id)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(product).into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ProductPatch>,
) -> ApiResult {
    let patch = CmdAuth::new(body, authz::PRODUCTS_WRITE).authorize(&principal)?;
    let id: ProductId = dto::parse(&id)?;
    let product = services
        .engine
        .update_product(id, patch)
        .await
        .map_err(errors::engine_error_to_response)?;
    Ok(Json(product).into_response())
}
