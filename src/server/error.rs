use crate::ASCOMError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("Device {ty}/{device_number} not found")]
    UnknownDevice { ty: String, device_number: usize },
    #[error("Unknown action {ty}::{action}")]
    UnknownAction { ty: String, action: String },
    #[error("Missing parameter {name:?}")]
    MissingParameter { name: &'static str },
    #[error("Couldn't parse parameter {name:?}: {err:#}")]
    BadParameter {
        name: &'static str,
        #[source]
        err: serde_plain::Error,
    },
    #[error(transparent)]
    Ascom(#[from] ASCOMError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = match self {
            Self::UnknownDevice { .. } | Self::UnknownAction { .. } => StatusCode::NOT_FOUND,
            Self::MissingParameter { .. } | Self::BadParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Ascom(err) => {
                // Device-level errors travel inside the envelope; only internal ones end up here.
                tracing::error!(%err, "Internal error");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
            }
        };
        (code, format!("{self:#}")).into_response()
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
