//! Error types for marker-stream

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// marker-stream error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket, snapshot file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Config could not be written
    #[error("Config serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Value cannot be converted into a byte payload
    #[error("Encode error: {0}")]
    Encode(String),

    /// Image compression failure
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// Pose could not be recovered from the correspondences
    #[error("Pose solve failed: {0}")]
    PoseSolve(String),

    /// Malformed wire packet
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Frame source did not deliver a frame this tick
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Marker detector failure
    #[error("Detection error: {0}")]
    Detection(String),

    /// Datagram transport failure other than a plain I/O error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation not supported by this device
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
