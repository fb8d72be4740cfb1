use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode as HttpStatus,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    error::ApiError,
    types::{
        BodyParams, BrokerMessageView, PublishResult, QueueGroupResult, ReplyResult,
        RequestReplyResult, SubjectArray, SubscriptionView, SuccessResponse,
    },
    AppState,
};
use crate::{config::BodyPolicy, error::log_error};

type Created<T> = (HttpStatus, Json<SuccessResponse<T>>);

fn created<T>(message: T) -> Created<T> {
    (HttpStatus::CREATED, Json(SuccessResponse { message }))
}

fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| {
        if rejection.status() == HttpStatus::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large()
        } else {
            ApiError::invalid_params()
        }
    })
}

/// Decodes a body that must be valid JSON.
fn decode_strict<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "Malformed request body");
        ApiError::invalid_params()
    })
}

/// Decodes a body under `policy`. `Ok(None)` means lenient mode swallowed a
/// malformed body.
fn decode_with_policy<T: DeserializeOwned>(
    policy: BodyPolicy,
    body: &[u8],
) -> Result<Option<T>, ApiError> {
    match policy {
        BodyPolicy::Strict => decode_strict(body).map(Some),
        BodyPolicy::Lenient => Ok(serde_json::from_slice(body)
            .map_err(|err| debug!(error = %err, "Malformed request body ignored"))
            .ok()),
    }
}

/// `POST /api/core/publish-message`
pub async fn publish_message(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Created<PublishResult>, ApiError> {
    let body = read_body(body)?;
    let params = decode_with_policy::<BodyParams>(state.body_policy, &body)?;

    let params = match params {
        Some(params) => {
            if let Err(err) = state
                .broker
                .publish(&params.subject, Bytes::from(params.message.clone()))
                .await
            {
                log_error("Publish failed", &err);
            }
            params
        }
        None => BodyParams::default(),
    };

    Ok(created(PublishResult {
        message: "Send message success",
        text: params.message,
        subject: params.subject,
    }))
}

/// `POST /api/core/reply`
///
/// Publishes the message once, then leaves an auto-reply subscription on
/// the subject until the TTL elapses.
pub async fn reply(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Created<ReplyResult>, ApiError> {
    let body = read_body(body)?;
    let params = decode_with_policy::<BodyParams>(state.body_policy, &body)?;

    let params = match params {
        Some(params) => {
            if let Err(err) = state
                .broker
                .publish(&params.subject, Bytes::from(params.message.clone()))
                .await
            {
                log_error("Publish failed", &err);
            }
            params
        }
        None => BodyParams::default(),
    };

    let subscription = state
        .manager
        .create_reply(&params.subject, Bytes::from(params.message))
        .await;

    Ok(created(ReplyResult {
        message: "subscribe reply created",
        subject: subscription.subject().to_string(),
    }))
}

/// `POST /api/core/request-reply`
///
/// Only a malformed body is a 400; every failure of the request itself is a
/// 503.
pub async fn request_reply(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Created<RequestReplyResult>, ApiError> {
    let body = read_body(body)?;
    let params: BodyParams = decode_strict(&body)?;

    // the request carries no payload; `message` is accepted but unused
    let reply = state
        .requests
        .request(&params.subject, Bytes::new())
        .await
        .map_err(|err| {
            log_error("Request failed", &err);
            ApiError::from(err)
        })?;

    Ok(created(RequestReplyResult {
        message: BrokerMessageView::from(&reply),
        reply: reply.payload_str().into_owned(),
        subject: params.subject,
    }))
}

/// `POST /api/core/queue-group`
pub async fn queue_group(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Created<QueueGroupResult>, ApiError> {
    let body = read_body(body)?;
    let params: SubjectArray = decode_strict(&body)?;

    let entries = params
        .subjects
        .into_iter()
        .map(|entry| (entry.subject, Bytes::from(entry.message)));
    let batch = state.manager.create_queue_group(entries).await;

    Ok(created(QueueGroupResult {
        message: "Queue Group created",
        elements: batch
            .iter()
            .map(|sub| SubscriptionView::from(sub.as_ref()))
            .collect(),
    }))
}

/// Any method other than POST on a known route.
pub async fn invalid_method() -> ApiError {
    ApiError::invalid_method()
}

/// Unknown path.
pub async fn not_found() -> (HttpStatus, &'static str) {
    (HttpStatus::NOT_FOUND, "404 page not found")
}
