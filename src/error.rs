use thiserror::Error;

/// Errors raised at the fallible edges of the emulator: frame construction,
/// bus subscription, module registration and configuration loading.
///
/// Module callbacks themselves never fail; stale or malformed input is
/// handled by timeouts and by ignoring the frame.
#[derive(Debug, Error)]
pub enum VcuError {
    #[error("frame payload of {len} bytes exceeds the 8 byte limit")]
    PayloadTooLong { len: usize },

    #[error("identifier 0x{id:X} does not fit in 29 bits")]
    InvalidIdentifier { id: u32 },

    #[error("subscription table full, cannot register 0x{id:03X}")]
    SubscriptionsFull { id: u32 },

    #[error("module registry full ({capacity} modules)")]
    RegistryFull { capacity: usize },

    #[error("host already started")]
    AlreadyStarted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for VcuError {
    fn from(err: serde_json::Error) -> Self {
        VcuError::Config(err.to_string())
    }
}

pub type VcuResult<T> = Result<T, VcuError>;
