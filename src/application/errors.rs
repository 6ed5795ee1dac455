// Error taxonomy for platform access, telemetry retrieval and parsing

/// Failure talking to the telemetry platform.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("platform rejected the token: {0}")]
    Unauthorized(String),
    #[error("platform returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl PlatformError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PlatformError::Unauthorized(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Unauthorized(_) => Some(401),
            PlatformError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Login or refresh failed. Never retried automatically.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("authentication failed: {message}")]
pub struct AuthError {
    pub status: Option<u16>,
    pub message: String,
}

impl From<PlatformError> for AuthError {
    fn from(err: PlatformError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// A platform call made on behalf of a session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Entry in a telemetry payload that cannot become a point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedPayloadError {
    #[error("entry {index} of key {key} has no {field}")]
    MissingField {
        key: String,
        index: usize,
        field: &'static str,
    },
    #[error("entry {index} of key {key} has non-numeric {field}: {raw}")]
    NonNumeric {
        key: String,
        index: usize,
        field: &'static str,
        raw: String,
    },
    #[error("entry {index} of key {key} has out-of-range timestamp {ts}")]
    TimestampOutOfRange { key: String, index: usize, ts: i64 },
}

/// Telemetry for one device could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry for device {device_id}: {source}")]
    Auth {
        device_id: String,
        #[source]
        source: AuthError,
    },
    #[error("telemetry for device {device_id}: {source}")]
    Fetch {
        device_id: String,
        #[source]
        source: PlatformError,
    },
    #[error("telemetry for device {device_id}: {source}")]
    Malformed {
        device_id: String,
        #[source]
        source: MalformedPayloadError,
    },
}

impl TelemetryError {
    pub fn from_request(device_id: &str, err: RequestError) -> Self {
        match err {
            RequestError::Auth(source) => TelemetryError::Auth {
                device_id: device_id.to_string(),
                source,
            },
            RequestError::Platform(source) => TelemetryError::Fetch {
                device_id: device_id.to_string(),
                source,
            },
        }
    }
}
