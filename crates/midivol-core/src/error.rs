/// Error kinds surfaced by the volume engine.
///
/// Device resolution errors are fatal before the event loop starts.
/// Mixer and source errors are fatal to the running loop. Argument errors
/// are only ever logged by the front end, which then keeps its default.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No available MIDI devices")]
    NoDevicesAvailable,

    #[error("\"{0}\" input device not found")]
    DeviceNotFound(String),

    #[error("Mixer unavailable: {0}")]
    MixerUnavailable(String),

    #[error("MIDI source failed: {0}")]
    SourceFailed(String),

    #[error("Invalid value {value:?} for {flag}, keeping default")]
    InvalidArgument { flag: String, value: String },
}

impl Error {
    pub fn mixer(reason: impl std::fmt::Display) -> Self {
        Error::MixerUnavailable(reason.to_string())
    }

    pub fn source(reason: impl std::fmt::Display) -> Self {
        Error::SourceFailed(reason.to_string())
    }

    /// True for errors that end a running loop rather than preventing it from starting.
    pub fn is_runtime(&self) -> bool {
        matches!(self, Error::MixerUnavailable(_) | Error::SourceFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Error::NoDevicesAvailable.to_string(), "No available MIDI devices");
        assert_eq!(
            Error::DeviceNotFound("2".into()).to_string(),
            "\"2\" input device not found"
        );
        let err = Error::InvalidArgument {
            flag: "-ch".into(),
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "Invalid value \"abc\" for -ch, keeping default");
    }

    #[test]
    fn test_runtime_classification() {
        assert!(Error::mixer("gone").is_runtime());
        assert!(Error::source("unplugged").is_runtime());
        assert!(!Error::NoDevicesAvailable.is_runtime());
        assert!(!Error::DeviceNotFound("x".into()).is_runtime());
    }
}
