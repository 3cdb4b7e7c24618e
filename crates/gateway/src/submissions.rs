//! Anonymous contact and order submissions.
//!
//! Both handlers persist first and only then attempt WhatsApp delivery, so a
//! submission is never lost to a session that is pairing or reconnecting.

use {
    axum::{
        Json,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
    },
    hugli_whatsapp::{ContactForm, Order},
    serde_json::{Value, json},
    tracing::{error, info, warn},
    uuid::Uuid,
};

use crate::{error::ApiError, state::AppState};

type Created = (StatusCode, Json<Value>);

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Created, ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if form.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }

    let id = state
        .store
        .insert_contact(&form)
        .await
        .map_err(|e| ApiError::store("Error submitting contact form", e))?;
    info!(
        id,
        name = %form.name,
        email = form.email.as_deref().unwrap_or("no email"),
        "contact message received"
    );

    let body = match state.delivery.send_contact(form).await {
        Ok(result) => json!({
            "success": true,
            "message": "Contact message sent successfully to WhatsApp",
            "id": id,
            "whatsappMessageId": result.external_message_id,
        }),
        Err(e) if e.is_unavailable() => {
            warn!(id, "WhatsApp service not ready, message saved to database only");
            json!({
                "success": true,
                "message": "Contact message saved successfully. WhatsApp service is not ready.",
                "id": id,
                "whatsappStatus": "not_ready",
            })
        },
        Err(e) => {
            error!(id, error = %e, "WhatsApp sending failed");
            json!({
                "success": true,
                "message": "Contact message saved successfully. WhatsApp delivery failed.",
                "id": id,
                "whatsappError": e.to_string(),
            })
        },
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn submit_order(
    State(state): State<AppState>,
    payload: Result<Json<Order>, JsonRejection>,
) -> Result<Created, ApiError> {
    let Json(mut order) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if order.items.is_empty() {
        return Err(ApiError::BadRequest("Order items are required".into()));
    }
    let customer = &order.customer_info;
    if is_blank(customer.name.as_deref()) || is_blank(customer.email.as_deref()) {
        return Err(ApiError::BadRequest(
            "Customer name and email are required".into(),
        ));
    }

    let order_id = Uuid::new_v4().to_string();
    order.order_id = Some(order_id.clone());
    info!(%order_id, items = order.items.len(), "order received");

    state
        .store
        .insert_order(&order)
        .await
        .map_err(|e| ApiError::store("Failed to process order. Please try again.", e))?;

    let response = match state.delivery.send_order(order).await {
        Ok(result) => {
            info!(%order_id, message_id = %result.external_message_id, "order sent to WhatsApp");
            (
                StatusCode::CREATED,
                json!({
                    "success": true,
                    "orderId": order_id,
                    "message": "Order sent to WhatsApp successfully! We will contact you soon.",
                    "whatsappMessageId": result.external_message_id,
                }),
            )
        },
        Err(e) if e.is_unavailable() => {
            warn!(%order_id, "WhatsApp service not ready, order cannot be processed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "success": false,
                    "orderId": order_id,
                    "message": "Order service is temporarily unavailable. Please try again later or contact us directly.",
                    "whatsappStatus": "not_ready",
                }),
            )
        },
        Err(e) => {
            error!(%order_id, error = %e, "WhatsApp sending failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "orderId": order_id,
                    "message": "Failed to send order. Please contact us directly.",
                    "error": e.to_string(),
                }),
            )
        },
    };
    Ok((response.0, Json(response.1)))
}
