use scanpool_contracts::DecoderFailure;
use scanpool_model::SlotId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No Tokio runtime available to run decode tasks")]
    NoRuntime,

    #[error("No decoder factory supplied")]
    MissingFactory,

    #[error("Decoder factory failed for {slot}")]
    Factory {
        slot: SlotId,
        #[source]
        source: DecoderFailure,
    },
}

pub type Result<T> = std::result::Result<T, PoolError>;
