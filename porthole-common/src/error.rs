//! Error types for `porthole`

use porthole_protocol::ProtocolError;
use thiserror::Error;

/// Main error type for `porthole` operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error on an established socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dialing a remote address failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A bounded operation ran past its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Framing or message decoding failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The relay closed the stream while a reply was still expected
    #[error("unexpected EOF from server")]
    UnexpectedEof,

    /// Something other than a challenge arrived during authentication
    #[error("unexpected handshake message: {0}")]
    UnexpectedHandshakeMessage(String),

    /// The relay challenged us but no secret is configured
    #[error("server requires authentication, but no secret was provided")]
    AuthenticationRequired,

    /// The relay answered our Hello with an error
    #[error("server rejected the tunnel: {0}")]
    ServerRejected(String),

    /// The relay answered our Hello with something other than Hello or Error
    #[error("unexpected initial message: {0}")]
    UnexpectedInitialMessage(String),

    /// The relay sent an error on an established control connection
    #[error("server error: {0}")]
    Server(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Category of a [`TunnelError`], used to decide what an error is fatal to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dial, read, write or deadline failures
    Transport,
    /// Malformed traffic; fatal to the connection it arrived on
    Protocol,
    /// Handshake failures; fatal to the handshaking connection
    Authentication,
    /// The relay refused us, with its own text
    Application,
    /// Misuse of the API
    Usage,
}

impl TunnelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TunnelError::Io(_) | TunnelError::Connect { .. } | TunnelError::Timeout(_) => {
                ErrorKind::Transport
            }
            TunnelError::Protocol(ProtocolError::Io(_)) => ErrorKind::Transport,
            TunnelError::Protocol(_)
            | TunnelError::UnexpectedEof
            | TunnelError::UnexpectedInitialMessage(_) => ErrorKind::Protocol,
            TunnelError::UnexpectedHandshakeMessage(_) | TunnelError::AuthenticationRequired => {
                ErrorKind::Authentication
            }
            TunnelError::ServerRejected(_) | TunnelError::Server(_) => ErrorKind::Application,
            TunnelError::Config(_) | TunnelError::InvalidState(_) => ErrorKind::Usage,
        }
    }

    /// Whether the error is a deadline expiry, wherever it surfaced.
    pub fn is_timeout(&self) -> bool {
        match self {
            TunnelError::Timeout(_) => true,
            TunnelError::Io(e) | TunnelError::Connect { source: e, .. } => {
                e.kind() == std::io::ErrorKind::TimedOut
            }
            TunnelError::Protocol(ProtocolError::Io(e)) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TunnelError>;
