//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

// VXLAN routing errors.
//
// All of these are deferrable: the referenced entity is expected to show up
// in a later notification, at which point the publisher resends the
// dependent rows.
#[derive(Debug)]
pub enum Error {
    VnNotFound(String),
    VrfNotFound(String),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::VnNotFound(name) => {
                warn!(%name, "{}", self);
            }
            Error::VrfNotFound(name) => {
                warn!(%name, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::VnNotFound(..) => {
                write!(f, "virtual network not found")
            }
            Error::VrfNotFound(..) => {
                write!(f, "VRF not found")
            }
        }
    }
}

impl std::error::Error for Error {}
