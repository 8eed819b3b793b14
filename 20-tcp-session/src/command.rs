//! Control tokens and the server's reaction to each incoming message.
//!
//! Interpretation is a pure function: it decides what should happen, and the
//! session loop in [`crate::server`] performs the matching send or close.

/// Sent by the server as soon as a client is bound.
pub const GREETING: &str = "Welcome";

/// Reply to every ordinary message. The spelling is part of the wire format.
pub const ACKNOWLEDGEMENT: &str = "message recieved";

/// Reserved message values. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    /// `qqq`: end the current session only.
    Quit,
    /// `qqqs`: end the session and stop the server.
    QuitAndShutdown,
}

impl ControlToken {
    pub const QUIT: &'static str = "qqq";
    pub const QUIT_AND_SHUTDOWN: &'static str = "qqqs";

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            Self::QUIT_AND_SHUTDOWN => Some(ControlToken::QuitAndShutdown),
            Self::QUIT => Some(ControlToken::Quit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlToken::Quit => Self::QUIT,
            ControlToken::QuitAndShutdown => Self::QUIT_AND_SHUTDOWN,
        }
    }
}

/// What the session loop should do with a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue { reply: &'static str },
    ClientDisconnect,
    ServerShutdown,
}

pub fn interpret(text: &str) -> Decision {
    match ControlToken::parse(text) {
        Some(ControlToken::QuitAndShutdown) => Decision::ServerShutdown,
        Some(ControlToken::Quit) => Decision::ClientDisconnect,
        None => Decision::Continue {
            reply: ACKNOWLEDGEMENT,
        },
    }
}
