//! Error shared by the relational repository ports.

use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by repository adapters.
    pub enum PersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "repository query failed: {message}",
        /// A uniqueness constraint rejected the write.
        Conflict { message: String } => "repository conflict: {message}",
    }
}

impl From<PersistenceError> for Error {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Connection { message } => {
                Error::service_unavailable(format!("repository unavailable: {message}"))
            }
            PersistenceError::Query { message } => {
                Error::internal(format!("repository error: {message}"))
            }
            PersistenceError::Conflict { message } => Error::conflict(message),
        }
    }
}
