/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
use thiserror::Error;

use crate::ids::FVarId;

///Errors that happen when querying or updating the [LocalContext](crate::lctx::LocalContext) of a declaration.
/// For instance, when asking for the type of a binder that was already erased.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("{0} is not bound in this declaration. It might have been erased since its creation.")]
    UnknownFVar(FVarId),
    #[error("{0} is not a local function or join point")]
    NotAFunction(FVarId),
    #[error("{0} is bound more than once")]
    DuplicateBinder(FVarId),
    #[error("Type of {fvar} has fewer than {params} binders")]
    MalformedFunType { fvar: FVarId, params: usize },
}
