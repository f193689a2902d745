use thiserror::Error;

/// Raw failure reported by the native driver layer. Code and message are
/// carried verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{msg} [{code}]")]
pub struct NativeError {
    pub code: i32,
    pub msg: String,
}

impl NativeError {
    pub fn new(code: i32, msg: impl Into<String>) -> Self {
        NativeError {
            code,
            msg: msg.into(),
        }
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported device {vendor_id:#06x}:{device_id:#06x}")]
    UnsupportedDevice { vendor_id: u16, device_id: u16 },

    #[error("{call}: {source}")]
    Native {
        call: &'static str,
        #[source]
        source: NativeError,
    },

    #[error("Invalid CPT {engine} engine group configuration: expected {expected}, got {actual}")]
    ConfigMismatch {
        engine: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("Unsupported {0}")]
    UnsupportedAlgorithm(String),

    #[error("{0} not supported")]
    CapabilityDenied(String),

    #[error("Transport mode SA is not supported in Inline IPsec operation")]
    TransportModeUnsupported,

    #[error("SPI {spi} is not within supported range {min}-{max}")]
    SpiOutOfRange { spi: u32, min: u32, max: u32 },

    #[error("Failed to get inbound SA context for SPI {spi}")]
    ContextUnavailable { spi: u32 },

    #[error("IPsec session {0} not found")]
    NotFound(u32),

    #[error("IPsec session slot {0} is already occupied")]
    StructuralInvariantViolation(u32),

    #[error("Invalid anti-replay window size {0}")]
    InvalidReplayWindow(u32),

    #[error("{0}")]
    NotSupported(String),

    #[error("{0}")]
    Config(String),

    #[error("{msg}")]
    SessionOp {
        msg: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn native(call: &'static str, source: NativeError) -> Self {
        Error::Native { call, source }
    }

    /// Bring-up failures leave the device unmanaged.
    pub fn is_unsupported_device(&self) -> bool {
        matches!(self, Error::UnsupportedDevice { .. } | Error::Native { .. })
    }

    /// Native code attached to the failure, if any.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::Native { source, .. } => Some(source.code),
            Error::SessionOp { source, .. } => source.native_code(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
