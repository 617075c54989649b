//! Session-level error type.
//!
//! Only capture failures and an empty corpus may end the process; every other
//! condition is absorbed inside the turn loop so one bad turn never ends a
//! session.

use parley_retrieval::RetrievalError;
use parley_voice::VoiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Chat(#[from] crate::chat::ChatError),
}
