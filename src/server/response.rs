use super::{Error, ResponseWithTransaction};
use crate::{ASCOMError, ASCOMErrorCode};
use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<T> {
    #[serde(flatten)]
    error: ASCOMError,
    #[serde(rename = "Value")]
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<T>,
}

impl<T: Serialize> IntoResponse for ResponseWithTransaction<super::Result<T>> {
    fn into_response(self) -> Response {
        let envelope = match self.response {
            Ok(value) => Envelope {
                error: ASCOMError::OK,
                value: Some(value),
            },
            Err(Error::Ascom(error)) if !error.is_internal() => {
                if error.code == ASCOMErrorCode::NOT_IMPLEMENTED {
                    tracing::warn!("Alpaca method is not implemented");
                } else {
                    tracing::error!(%error, "Alpaca method returned an error");
                }
                Envelope { error, value: None }
            }
            Err(err) => return err.into_response(),
        };

        // Unit results serialize to `null` and are left out of the envelope.
        let value = match envelope.value.map(serde_json::to_value).transpose() {
            Ok(value) => value.filter(|value| !value.is_null()),
            Err(err) => {
                return Error::Ascom(ASCOMError::unspecified(format_args!(
                    "Couldn't serialize response value: {err}"
                )))
                .into_response();
            }
        };

        Json(ResponseWithTransaction {
            transaction: self.transaction,
            response: Envelope {
                error: envelope.error,
                value,
            },
        })
        .into_response()
    }
}

/// A plain JSON response for the management API, which always succeeds.
pub(crate) struct ManagementValue<T>(pub(crate) T);

impl<T: Serialize> IntoResponse for ResponseWithTransaction<ManagementValue<T>> {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Repr<T> {
            #[serde(rename = "Value")]
            value: T,
        }

        Json(ResponseWithTransaction {
            transaction: self.transaction,
            response: Repr {
                value: self.response.0,
            },
        })
        .into_response()
    }
}
