use super::case_insensitive_str::CaseInsensitiveStr;
use super::{Error, Result};
use axum::Form;
use axum::extract::{FromRequest, Request};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Deserialize)]
#[serde(transparent)]
#[serde(bound(deserialize = "Box<ParamStr>: DeserializeOwned + Hash + Eq"))]
pub(crate) struct OpaqueParams<ParamStr: ?Sized + Debug>(IndexMap<Box<ParamStr>, String>);

impl<ParamStr: ?Sized + Hash + Eq + Debug> OpaqueParams<ParamStr>
where
    str: AsRef<ParamStr>,
{
    pub(crate) fn maybe_extract<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
    ) -> Result<Option<T>> {
        self.0
            .shift_remove(AsRef::<ParamStr>::as_ref(name))
            .map(|value| {
                serde_plain::from_str(&value).map_err(|err| Error::BadParameter { name, err })
            })
            .transpose()
    }

    pub(crate) fn extract<T: DeserializeOwned>(&mut self, name: &'static str) -> Result<T> {
        self.maybe_extract(name)?
            .ok_or(Error::MissingParameter { name })
    }
}

/// Request parameters of an Alpaca call.
///
/// GET parameters come from the query string and their names are matched case-insensitively;
/// PUT parameters come from the form-encoded body.
#[derive(Debug)]
pub(crate) enum ActionParams {
    Get(OpaqueParams<CaseInsensitiveStr>),
    Put(OpaqueParams<str>),
}

impl ActionParams {
    pub(crate) fn maybe_extract<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
    ) -> Result<Option<T>> {
        match self {
            Self::Get(params) => params.maybe_extract(name),
            Self::Put(params) => params.maybe_extract(name),
        }
    }

    pub(crate) fn extract<T: DeserializeOwned>(&mut self, name: &'static str) -> Result<T> {
        self.maybe_extract(name)?
            .ok_or(Error::MissingParameter { name })
    }

    /// Log any parameters that were sent but not consumed by the handler.
    pub(crate) fn finish_extraction(self) {
        let is_empty = match &self {
            Self::Get(params) => params.0.is_empty(),
            Self::Put(params) => params.0.is_empty(),
        };

        if !is_empty {
            tracing::warn!(params = ?self, "Unused parameters");
        }
    }
}

#[cfg(test)]
impl ActionParams {
    pub(crate) fn get_from_pairs(pairs: &[(&str, &str)]) -> Self {
        use bytemuck::TransparentWrapperAlloc;

        Self::Get(OpaqueParams(
            pairs
                .iter()
                .map(|&(name, value)| {
                    (
                        CaseInsensitiveStr::wrap_box(Box::<str>::from(name)),
                        value.to_owned(),
                    )
                })
                .collect(),
        ))
    }
}

impl<S: Send + Sync> FromRequest<S> for ActionParams {
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match *req.method() {
            Method::GET => Ok(Self::Get(
                Form::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?
                    .0,
            )),
            Method::PUT => Ok(Self::Put(
                Form::from_request(req, state)
                    .await
                    .map_err(IntoResponse::into_response)?
                    .0,
            )),
            _ => Err((StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()),
        }
    }
}
