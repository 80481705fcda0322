// src/inventory_handlers.rs
//! Procurement lines (what was bought, per invoice) and the device-type catalogue.

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use strum::IntoEnumIterator;
use validator::Validate;
use log::info;
use crate::AppState;
use crate::error::ApiResult;
use crate::handlers::ApiResponse;
use crate::lab_handlers::canonical_device_type;
use crate::models::{DeviceType, RegisterProcurementRequest, SearchEquipmentQuery};
use crate::validator::CustomValidate;

pub async fn register_procurement(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<RegisterProcurementRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    request.entry.custom_validate().into_result()?;

    let mut entry = request.into_inner().entry;
    entry.device_type = canonical_device_type(&entry.device_type);

    let line = app_state.store.register_procurement(&entry).await?;

    info!("📦 Inventory: {} x {} registered (invoice {})",
        line.quantity, entry.identity(), line.invoice_number.as_deref().unwrap_or("-"));
    Ok(HttpResponse::Created().json(ApiResponse::success(line)))
}

/// Unattached inventory of one type across all labs.
pub async fn search_inventory(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<SearchEquipmentQuery>,
) -> ApiResult<HttpResponse> {
    let device_type = canonical_device_type(&query.device_type);
    let found = app_state.store.search_available(&device_type).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(found)))
}

pub async fn get_device_types() -> ApiResult<HttpResponse> {
    let types: Vec<String> = DeviceType::iter().map(|t| t.to_string()).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(types)))
}
