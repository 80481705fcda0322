// src/handlers.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use crate::AppState;
use crate::error::ApiResult;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

// ==================== HEALTH ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub open_sessions: Vec<String>,
}

pub async fn health_check(
    app_state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let status = HealthStatus {
        status: "ok",
        open_sessions: app_state.sessions.open_labs()?,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}
