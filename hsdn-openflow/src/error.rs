//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, warn};

use crate::packet::DecodeError;

// OpenFlow driver errors.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    DecodeError(DecodeError),
    LabelStore(std::io::Error),
    UnknownDatapath(String),
    UnsupportedConfiguration(String),
    InvalidPort(String),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::IoError(error) => {
                warn!(%error, "{}", self);
            }
            Error::DecodeError(error) => {
                // Peers send message types the controller doesn't track.
                debug!(%error, "{}", self);
            }
            Error::LabelStore(error) => {
                warn!(%error, "{}", self);
            }
            Error::UnknownDatapath(..)
            | Error::UnsupportedConfiguration(..)
            | Error::InvalidPort(..) => {
                debug!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(..) => {
                write!(f, "I/O error")
            }
            Error::DecodeError(..) => {
                write!(f, "failed to decode message")
            }
            Error::LabelStore(..) => {
                write!(f, "failed to persist datapath label")
            }
            Error::UnknownDatapath(label) => {
                write!(f, "unknown datapath: {label}")
            }
            Error::UnsupportedConfiguration(conf) => {
                write!(f, "unsupported SDN configuration: {conf}")
            }
            Error::InvalidPort(port) => {
                write!(f, "invalid OpenFlow port: {port}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) | Error::LabelStore(error) => Some(error),
            Error::DecodeError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::DecodeError(error)
    }
}
