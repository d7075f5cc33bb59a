//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, error, warn};

// NETCONF driver errors.
#[derive(Debug)]
pub enum Error {
    // Transport errors: connection setup, SSH channel I/O, timeouts.
    // These drop the device back to the disconnected state.
    SshError(async_ssh2_tokio::Error),
    IoError(std::io::Error),
    ConnectTimeout,
    // The peer rejected an RPC.
    RpcError(String),
    // A reply couldn't be parsed.
    ParseError(quick_xml::DeError),
    // A configuration entry failed validation.
    ValidationError(String),
    // The applied list disagrees with the requested operation.
    StateConflict(String),
}

// ===== impl Error =====

impl Error {
    // Transport errors mean the session is gone.
    pub(crate) fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::SshError(..) | Error::IoError(..) | Error::ConnectTimeout
        )
    }

    pub(crate) fn log(&self) {
        match self {
            // Disconnections are expected, devices come and go.
            Error::SshError(error) => {
                debug!(%error, "{}", self);
            }
            Error::IoError(error) => {
                debug!(%error, "{}", self);
            }
            Error::ConnectTimeout => {
                debug!("{}", self);
            }
            Error::RpcError(reply) => {
                warn!(%reply, "{}", self);
            }
            Error::ParseError(error) => {
                error!(%error, "{}", self);
            }
            Error::ValidationError(..) | Error::StateConflict(..) => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SshError(..) => {
                write!(f, "SSH transport error")
            }
            Error::IoError(..) => {
                write!(f, "I/O error")
            }
            Error::ConnectTimeout => {
                write!(f, "connection timed out")
            }
            Error::RpcError(..) => {
                write!(f, "RPC rejected by device")
            }
            Error::ParseError(..) => {
                write!(f, "failed to parse reply")
            }
            Error::ValidationError(reason) => {
                write!(f, "validation failure: {reason}")
            }
            Error::StateConflict(reason) => {
                write!(f, "applied state conflict: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SshError(error) => Some(error),
            Error::IoError(error) => Some(error),
            Error::ParseError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<async_ssh2_tokio::Error> for Error {
    fn from(error: async_ssh2_tokio::Error) -> Error {
        Error::SshError(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::IoError(error)
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(error: quick_xml::DeError) -> Error {
        Error::ParseError(error)
    }
}
