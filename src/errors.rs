use std::{fmt, io, num::ParseFloatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Malformed or unreadable geographic source.
    Parse,
    /// The node source holds no nodes, so snapping is undefined.
    EmptyRegistry,
    /// Network failure, non-success response or missing fields.
    RoutingService,
    /// The routing service reported a zero travel time.
    DegenerateDuration,
    Io,
    Config,
    Output,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::EmptyRegistry => "empty_registry",
            ErrorKind::RoutingService => "routing_service",
            ErrorKind::DegenerateDuration => "degenerate_duration",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Output => "output",
        }
    }

    /// Per-edge errors skip the edge; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::RoutingService | ErrorKind::DegenerateDuration)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Parse, message)
    }

    pub fn routing(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::RoutingService, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Config, message)
    }

    /// Prefixes the message with the source that failed, keeping the kind.
    pub fn context(self, source: impl fmt::Display) -> Self {
        Error {
            kind: self.kind,
            message: format!("{}: {}", source, self.message),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            message: value.to_string()
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            message: value.to_string()
        }
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error {
            kind: ErrorKind::Parse,
            message: value.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            message: value.to_string()
        }
    }
}

impl From<regex::Error> for Error {
    fn from(value: regex::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            message: value.to_string()
        }
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error {
            kind: ErrorKind::Output,
            message: value.to_string()
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(value: ureq::Error) -> Self {
        let message = match value {
            ureq::Error::Status(code, response) => {
                format!("{} returned status {}", response.get_url(), code)
            },
            ureq::Error::Transport(transport) => transport.to_string(),
        };
        Error {
            kind: ErrorKind::RoutingService,
            message
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
