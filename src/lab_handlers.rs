// src/lab_handlers.rs
//! Lab editing sessions: open/save, grid placement, OS tags, linked groups
//! and the lab's equipment pool.

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::layout::LabLayout;
use crate::models::*;
use crate::validator::{CustomValidate, LayoutValidator};

type LabPath = web::Path<String>;
type CellPath = web::Path<(String, usize, usize)>;

/// Canonical catalogue name when the type is known, the input otherwise.
pub(crate) fn canonical_device_type(raw: &str) -> String {
    raw.trim()
        .parse::<DeviceType>()
        .map(|t| t.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

// ==================== LABS ====================

pub async fn list_labs(
    app_state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let labs = app_state.store.list_labs().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(labs)))
}

pub async fn create_lab(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateLabRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    request.custom_validate().into_result()?;

    let layout_config = &app_state.config.layout;
    let rows = request.rows.unwrap_or(layout_config.default_rows);
    let columns = request.columns.unwrap_or(layout_config.default_columns);
    LayoutValidator::dimensions(rows, columns, layout_config).into_result()?;

    if app_state.sessions.is_open(&request.lab_number)?
        || app_state.store.load_lab(&request.lab_number).await?.is_some()
    {
        return Err(ApiError::lab_already_exists(&request.lab_number));
    }

    let layout = LabLayout::new(
        &request.lab_number,
        &request.lab_name,
        request.assigned_code_prefix.as_deref().unwrap_or_default(),
        rows,
        columns,
    )?;
    let view = layout.view();
    app_state.sessions.open(layout)?;

    info!("🏫 Lab {} created ({}x{})", request.lab_number, rows, columns);
    Ok(HttpResponse::Created().json(ApiResponse::success(view)))
}

pub async fn open_lab(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();

    let snapshot = app_state
        .store
        .load_lab(&lab_number)
        .await?
        .ok_or_else(|| ApiError::lab_not_found(&lab_number))?;

    let layout = LabLayout::reconcile(snapshot)?;
    let view = layout.view();
    if app_state.sessions.open(layout)? {
        log::warn!("Lab {}: unsaved session discarded on reopen", lab_number);
    }

    info!("📂 Lab {} opened: {} stations", lab_number, view.stations);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn get_lab(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
) -> ApiResult<HttpResponse> {
    let view = app_state.sessions.read(&path, LabLayout::view)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn update_details(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<UpdateLabDetailsRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    request.custom_validate().into_result()?;

    let lab_number = path.into_inner();
    let view = app_state.sessions.update(&lab_number, |lab| {
        if let Some(ref name) = request.lab_name {
            lab.rename(name);
        }
        if let Some(ref prefix) = request.assigned_code_prefix {
            lab.set_code_prefix(prefix);
        }
        Ok(lab.view())
    })?;

    info!("✏️ Lab {} details updated", lab_number);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn save_lab(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let snapshot = app_state.sessions.snapshot(&lab_number)?;

    let outcome = app_state.store.save_lab(&snapshot).await?;

    let message = format!(
        "Lab saved: {} stations, {} devices assigned",
        outcome.stations, outcome.devices_assigned
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(outcome, message)))
}

pub async fn close_session(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    if !app_state.sessions.close(&lab_number)? {
        return Err(ApiError::lab_not_open(&lab_number));
    }

    info!("🚪 Lab {} session closed", lab_number);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        lab_number,
        "Session discarded".to_string(),
    )))
}

// ==================== GRID ====================

pub async fn resize_grid(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<ResizeRequest>,
) -> ApiResult<HttpResponse> {
    LayoutValidator::dimensions(request.rows, request.columns, &app_state.config.layout).into_result()?;

    let lab_number = path.into_inner();
    let (cut, view) = app_state.sessions.update(&lab_number, |lab| {
        let cut = lab.resize(request.rows, request.columns)?;
        Ok((cut, lab.view()))
    })?;

    info!("📐 Lab {} resized to {}x{} ({} stations returned to pool)",
        lab_number, request.rows, request.columns, cut);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        view,
        format!("{} station(s) removed by resize", cut),
    )))
}

pub async fn place_cell(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<PlaceRequest>,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let view = app_state.sessions.update(&lab_number, |lab| {
        lab.place(request.row, request.col, &request.selection)?;
        Ok(lab.view())
    })?;

    info!("🖥️ Lab {}: station placed at ({}, {})", lab_number, request.row, request.col);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn fill_rectangle(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<FillRequest>,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let report = app_state.sessions.update(&lab_number, |lab| {
        lab.fill(request.from, request.to, &request.selection)
    })?;

    let message = if report.is_partial() {
        log::warn!("Lab {}: only {} of {} cells filled (stock exhausted)",
            lab_number, report.placed, report.requested);
        format!("Only {} of {} cells filled: not enough equipment", report.placed, report.requested)
    } else {
        info!("🖥️ Lab {}: {} stations placed", lab_number, report.placed);
        format!("{} stations placed", report.placed)
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(report, message)))
}

pub async fn remove_cell(
    app_state: web::Data<Arc<AppState>>,
    path: CellPath,
) -> ApiResult<HttpResponse> {
    let (lab_number, row, col) = path.into_inner();
    let removed = app_state.sessions.update(&lab_number, |lab| lab.remove_cell(row, col))?;

    if removed {
        info!("🗑️ Lab {}: station at ({}, {}) removed", lab_number, row, col);
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(removed)))
}

pub async fn clear_cells(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let cleared = app_state.sessions.update(&lab_number, |lab| Ok(lab.clear_all()))?;

    info!("🧹 Lab {}: {} stations cleared", lab_number, cleared);
    Ok(HttpResponse::Ok().json(ApiResponse::success(cleared)))
}

pub async fn cell_devices(
    app_state: web::Data<Arc<AppState>>,
    path: CellPath,
) -> ApiResult<HttpResponse> {
    let (lab_number, row, col) = path.into_inner();
    let devices = app_state.sessions.read(&lab_number, |lab| lab.cell_devices(row, col))??;
    Ok(HttpResponse::Ok().json(ApiResponse::success(devices)))
}

// ==================== OS TAGS ====================

pub async fn toggle_cell_os(
    app_state: web::Data<Arc<AppState>>,
    path: CellPath,
    request: web::Json<OsTagRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    LayoutValidator::os_tag(&request.tag, &app_state.config.layout).into_result()?;

    let (lab_number, row, col) = path.into_inner();
    let present = app_state
        .sessions
        .update(&lab_number, |lab| lab.toggle_os(row, col, &request.tag))?;

    info!("💿 Lab {}: {} {} at ({}, {})",
        lab_number, if present { "added" } else { "removed" }, request.tag, row, col);
    Ok(HttpResponse::Ok().json(ApiResponse::success(present)))
}

pub async fn bulk_os(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<BulkOsRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    LayoutValidator::os_tag(&request.tag, &app_state.config.layout).into_result()?;

    let lab_number = path.into_inner();
    let changed = app_state
        .sessions
        .update(&lab_number, |lab| Ok(lab.apply_bulk_os(&request.tag, request.add)))?;

    info!("💿 Lab {}: {} {} on {} stations",
        lab_number, if request.add { "applied" } else { "removed" }, request.tag, changed);
    Ok(HttpResponse::Ok().json(ApiResponse::success(changed)))
}

// ==================== LINKED GROUPS ====================

pub async fn create_link(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<CreateLinkRequest>,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let (index, view) = app_state.sessions.update(&lab_number, |lab| {
        let index = lab.create_link(&request.members)?;
        Ok((index, lab.view()))
    })?;

    info!("🔗 Lab {}: linked group #{} created with {} members",
        lab_number, index, request.members.len());
    Ok(HttpResponse::Created().json(ApiResponse::success(view)))
}

pub async fn remove_link(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, usize)>,
) -> ApiResult<HttpResponse> {
    let (lab_number, index) = path.into_inner();
    let view = app_state.sessions.update(&lab_number, |lab| {
        lab.remove_link(index)?;
        Ok(lab.view())
    })?;

    info!("🔗 Lab {}: linked group #{} dissolved", lab_number, index);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

// ==================== EQUIPMENT ====================

/// Search results with whatever this session already holds beyond the lab's
/// saved state taken off.
async fn search_for_session(
    app_state: &AppState,
    lab_number: &str,
    device_type: &str,
) -> ApiResult<Vec<EquipmentEntry>> {
    let held = app_state.sessions.read(lab_number, |lab| lab.pool().owned().to_vec())?;
    let found = app_state.store.search_available(device_type).await?;
    let saved = app_state
        .store
        .load_lab(lab_number)
        .await?
        .map(|snapshot| snapshot.equipment)
        .unwrap_or_default();

    Ok(found
        .into_iter()
        .filter_map(|entry| {
            let identity = entry.identity();
            let total = |list: &[EquipmentEntry]| -> u32 {
                list.iter().filter(|e| e.matches(&identity)).map(|e| e.quantity).sum()
            };
            let unsaved = total(&held).saturating_sub(total(&saved));
            let remaining = entry.quantity.saturating_sub(unsaved);
            (remaining > 0).then(|| entry.with_quantity(remaining))
        })
        .collect())
}

pub async fn search_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    query: web::Query<SearchEquipmentQuery>,
) -> ApiResult<HttpResponse> {
    let device_type = canonical_device_type(&query.device_type);
    let found = search_for_session(&app_state, &path, &device_type).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(found)))
}

pub async fn add_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    request: web::Json<AddEquipmentRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    request.entry.custom_validate().into_result()?;

    let lab_number = path.into_inner();
    let mut entry = request.into_inner().entry;
    entry.device_type = canonical_device_type(&entry.device_type);

    let identity = entry.identity();
    let unattached = search_for_session(&app_state, &lab_number, &entry.device_type)
        .await?
        .iter()
        .filter(|candidate| candidate.matches(&identity))
        .map(|candidate| candidate.quantity)
        .sum();
    LayoutValidator::import_quantity(entry.quantity, unattached).into_result()?;

    let view = app_state.sessions.update(&lab_number, |lab| {
        lab.add_equipment(&entry)?;
        Ok(lab.view())
    })?;

    info!("📥 Lab {}: {} x {} added", lab_number, entry.quantity, identity);
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

pub async fn remove_equipment(
    app_state: web::Data<Arc<AppState>>,
    path: LabPath,
    identity: web::Json<EquipmentIdentity>,
) -> ApiResult<HttpResponse> {
    let lab_number = path.into_inner();
    let result = app_state.sessions.update(&lab_number, |lab| {
        let removed = lab.remove_equipment(&identity)?;
        Ok((removed, lab.view()))
    });

    let (removed, view) = result.map_err(|e| {
        if let ApiError::Conflict(ref msg) = e {
            log::warn!("Lab {}: refused to remove {}: {}", lab_number, *identity, msg);
        }
        e
    })?;

    info!("📤 Lab {}: {} x {} removed", lab_number, removed.quantity, removed.identity());
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}
