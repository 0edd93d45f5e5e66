use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Queue is full")]
    QueueFull,

    #[error("Invalid vote value {0}")]
    InvalidVote(i16),

    #[error("Invalid queue position {0}")]
    InvalidPosition(i64),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::QueueFull => StatusCode::CONFLICT,
            Error::InvalidVote(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPosition(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::Network(msg) => json!({
                "message": msg,
                "type": "network",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound(what) => json!({
                "message": "not found",
                "type": "not-found",
                "what": what,
            }),
            Error::RateLimited => json!({
                "message": "rate limited",
                "type": "rate-limited",
            }),
            Error::QueueFull => json!({
                "message": "queue is full",
                "type": "queue-full",
            }),
            Error::InvalidVote(v) => json!({
                "message": "invalid vote value",
                "type": "invalid-vote",
                "vote": v,
            }),
            Error::InvalidPosition(p) => json!({
                "message": "invalid queue position",
                "type": "invalid-position",
                "position": p,
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = || {
            String::from(
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .unwrap_or(""),
            )
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(message()),
                "network" => Error::Network(message()),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound(String::from(
                    data.get("what")
                        .and_then(|w| w.as_str())
                        .ok_or_else(|| anyhow!("error is a not-found without a target"))?,
                )),
                "rate-limited" => Error::RateLimited,
                "queue-full" => Error::QueueFull,
                "invalid-vote" => Error::InvalidVote(
                    data.get("vote")
                        .and_then(|v| v.as_i64())
                        .and_then(|v| i16::try_from(v).ok())
                        .ok_or_else(|| anyhow!("error is an invalid vote without a vote"))?,
                ),
                "invalid-position" => Error::InvalidPosition(
                    data.get("position")
                        .and_then(|p| p.as_i64())
                        .ok_or_else(|| anyhow!("error is an invalid position without a position"))?,
                ),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }

    /// Build the error for a non-successful HTTP response
    ///
    /// Bodies in our own format are parsed as such. Otherwise the backend's
    /// `{"error": "..."}` and `{"success": false, "error": {"code", "message"}}` shapes are
    /// understood, and the status code decides the variant.
    pub fn from_response(status: http::StatusCode, body: &[u8]) -> Error {
        use http::StatusCode;
        if let Ok(err) = Error::parse(body) {
            return err;
        }
        let data = serde_json::from_slice::<serde_json::Value>(body).ok();
        let error = data.as_ref().and_then(|d| d.get("error"));
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .unwrap_or("");
        let message = error
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .map(String::from)
            .unwrap_or_else(|| format!("server answered {status}"));
        match status {
            _ if code == "QUEUE_FULL" || message.starts_with("queue is full") => Error::QueueFull,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied,
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimited,
            _ => Error::Unknown(message),
        }
    }
}
