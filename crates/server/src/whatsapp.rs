//! Twilio-style WhatsApp webhook: inbound form posts are answered with TwiML.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use opsdesk_agent::ChatRequest;
use opsdesk_core::domain::conversation::ConversationId;

use crate::state::AppState;

pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again in a moment.";

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(webhook)).route("/status", get(status))
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "ProfileName", default)]
    pub profile_name: Option<String>,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub webhook_endpoint: &'static str,
}

pub fn twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Each sender keeps one conversation; agent failures still answer the sender.
async fn webhook(State(state): State<AppState>, Form(inbound): Form<InboundMessage>) -> Response {
    if !state.config.whatsapp.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    let conversation_id = ConversationId::for_whatsapp(&inbound.from);
    info!(
        event_name = "whatsapp.message_received",
        conversation_id = %conversation_id,
        profile = inbound.profile_name.as_deref().unwrap_or("unknown"),
        message_sid = inbound.message_sid.as_deref().unwrap_or(""),
        "whatsapp message received"
    );

    let request = ChatRequest::consumer(Some(conversation_id.clone()), inbound.body);
    match state.chat.handle(request).await {
        Ok(reply) => xml(twiml(&reply.response)),
        Err(err) => {
            error!(
                event_name = "whatsapp.reply_failed",
                conversation_id = %conversation_id,
                error = %err,
                "could not answer whatsapp message"
            );
            xml(twiml(APOLOGY))
        }
    }
}

async fn status(State(state): State<AppState>) -> Response {
    if !state.config.whatsapp.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(ChannelStatus {
        status: "active",
        service: "WhatsApp bot via Twilio",
        webhook_endpoint: "/whatsapp/webhook",
    })
    .into_response()
}
