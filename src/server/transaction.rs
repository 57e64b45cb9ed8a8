use super::{ActionParams, Error};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide source of server transaction IDs.
///
/// Every response gets an ID strictly greater than any handed out before it. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct TransactionCounter(Arc<AtomicU32>);

impl Default for TransactionCounter {
    fn default() -> Self {
        Self(Arc::new(AtomicU32::new(1)))
    }
}

impl TransactionCounter {
    /// Hand out the next server transaction ID.
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Serialize, Clone, Copy)]
pub(crate) struct ResponseTransaction {
    #[serde(rename = "ClientTransactionID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) client_transaction_id: Option<u32>,

    #[serde(rename = "ServerTransactionID")]
    pub(crate) server_transaction_id: u32,
}

impl ResponseTransaction {
    pub(crate) fn new(client_transaction_id: Option<u32>, counter: &TransactionCounter) -> Self {
        Self {
            client_transaction_id,
            server_transaction_id: counter.next(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseWithTransaction<T> {
    #[serde(flatten)]
    pub(crate) transaction: ResponseTransaction,
    #[serde(flatten)]
    pub(crate) response: T,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestTransaction {
    pub(crate) client_id: Option<u32>,
    pub(crate) client_transaction_id: Option<u32>,
}

impl RequestTransaction {
    /// Pull the transaction parameters out of the request.
    ///
    /// Device calls must carry a non-negative `ClientTransactionID`; management calls may omit it.
    pub(crate) fn extract(params: &mut ActionParams, required: bool) -> Result<Self, Error> {
        let client_id = params.maybe_extract("ClientID")?;

        let client_transaction_id = if required {
            Some(params.extract("ClientTransactionID")?)
        } else {
            params.maybe_extract("ClientTransactionID")?
        };

        Ok(Self {
            client_id,
            client_transaction_id,
        })
    }
}
