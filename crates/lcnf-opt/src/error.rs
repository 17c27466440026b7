/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
use std::{panic::Location, sync::Arc};

use backtrace::Backtrace;
use lcnf::{check::CheckError, err::IrError, Name};
use thiserror::Error;

use crate::Pass;

///Optimizer errors. Apart from malformed input, every error is a bug in a pass. Those are _internal_ (see [OptError::is_internal]),
/// and the [Optimizer](crate::Optimizer) can recover from them by keeping the declaration unoptimized.
#[derive(Debug, Error, Clone)]
pub enum OptError {
    #[error("Internal compiler error in {pass}: {message} [{location}]\nPlease file an issue!")]
    Internal {
        pass: Pass,
        message: String,
        location: &'static Location<'static>,
        ///Only captured if `LCNF_BACKTRACE` is set.
        trace: Option<Arc<Backtrace>>,
    },

    #[error("Internal IR error: {0}")]
    Ir(#[from] IrError),

    #[error("{decl} is malformed after {pass}: {error}")]
    VerifyFailed {
        decl: Name,
        pass: Pass,
        error: CheckError,
    },

    #[error("Input declaration {decl} is malformed: {error}")]
    InvalidInput { decl: Name, error: CheckError },

    #[error("Could not build the local context of {decl}: {error}")]
    MalformedDecl { decl: Name, error: IrError },
}

impl OptError {
    ///Creates an [OptError::Internal] at the caller's location.
    #[track_caller]
    pub fn internal(pass: Pass, message: impl Into<String>) -> Self {
        OptError::Internal {
            pass,
            message: message.into(),
            location: Location::caller(),
            trace: if std::env::var("LCNF_BACKTRACE").is_ok() {
                Some(Arc::new(Backtrace::new()))
            } else {
                None
            },
        }
    }

    ///True if the error signals a compiler bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            OptError::Internal { .. } | OptError::Ir(_) | OptError::VerifyFailed { .. }
        )
    }

    ///Prints the error, and the backtrace if one was captured.
    pub fn report(&self) {
        eprintln!("{}", self);
        if let OptError::Internal {
            trace: Some(bt),
            ..
        } = self
        {
            eprintln!("Backtrace:\n{:?}", bt);
        } else if self.is_internal() {
            eprintln!("`LCNF_BACKTRACE=1` to capture the backtrace of internal errors");
        }
    }
}
