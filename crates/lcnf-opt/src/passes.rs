/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Optimizer passes module.
//!
//! The passes are meant to run in order:
//!
//! 1. [find_join_points] turns local functions that are only ever tail-called into join points,
//! 2. [extend_join_point_context] makes join points take everything they use from their surrounding as parameters,
//! 3. [common_join_point_args] removes parameters that receive the same argument at every jump.
//!
//! Each pass works on a single declaration, and keeps the [CompilerCtx](lcnf::CompilerCtx) of that declaration up to date.

mod common_args;
mod extend;
mod find;

pub use common_args::{common_join_point_args, CommonArgsReport};
pub use extend::{extend_join_point_context, ExtendReport};
pub use find::{find_join_points, CandidateInfo, FindReport, JoinPointFinder};
