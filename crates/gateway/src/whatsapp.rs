use {
    axum::{Json, extract::State, http::StatusCode, response::IntoResponse},
    hugli_whatsapp::{SessionError, StatusReport},
    serde::Serialize,
    serde_json::json,
    tracing::{error, info, warn},
};

use crate::state::AppState;

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    #[serde(flatten)]
    report: StatusReport,
}

pub async fn qr_code(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session().snapshot_status();
    let body = if let Some(code) = status.pairing_challenge {
        json!({
            "success": true,
            "qrCode": code,
            "message": "QR Code available for scanning",
        })
    } else if status.is_ready() {
        json!({
            "success": true,
            "qrCode": null,
            "message": "WhatsApp client is already authenticated and ready",
        })
    } else {
        json!({
            "success": false,
            "qrCode": null,
            "message": "WhatsApp client is initializing. Please wait and try again.",
        })
    };
    Json(body)
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let report = StatusReport::from(&state.session().snapshot_status());
    Json(StatusResponse {
        success: true,
        report,
    })
}

pub async fn restart(State(state): State<AppState>) -> impl IntoResponse {
    info!("manual WhatsApp service restart requested");
    match state.session().restart().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "WhatsApp service restart initiated" })),
        ),
        // The new connection attempt is running even though cleanup failed.
        Err(SessionError::Teardown(e)) => {
            warn!(error = %e, "previous WhatsApp client was not cleanly destroyed");
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": "WhatsApp service restart initiated" })),
            )
        },
        Err(e) => {
            error!(error = %e, "error restarting WhatsApp service");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Error restarting WhatsApp service",
                    "error": e.to_string(),
                })),
            )
        },
    }
}
