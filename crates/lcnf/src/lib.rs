/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! # LCNF
//!
//! The _lambda compiler normal form_ IR used by the middle end of the compiler.
//!
//! LCNF is a functional A-normal-form IR. Every intermediate value is bound by a `let`, control flow is
//! expressed through [Cases](code::Cases) and *join points*. A join point is a local function that is never
//! used first-class, and is only ever entered through a [Jmp](code::Code::Jmp) in tail position. You can think of
//! it as a labeled block that takes arguments.
//!
//! The crate contains the data model ([code]), the type language ([ty]), id and name handling ([ids]), and the
//! helpers optimization passes build on. Those live in [CompilerCtx](ctx::CompilerCtx), which
//! tracks the [LocalContext](lctx::LocalContext) of a single declaration together with its [NameSupply](ids::NameSupply).
//!
//! The [check] module implements a well-formedness checker for declarations. It is used by the test suite and optionally
//! by the optimizer after each pass.

pub mod builder;
pub mod check;
pub mod code;
pub mod ctx;
pub mod err;
pub mod fvars;
pub mod ids;
pub mod lctx;
pub mod subst;
pub mod ty;

pub use ahash;
pub use smallvec;

pub use code::{Alt, Arg, Cases, Code, Decl, FunDecl, FunGroup, FunKind, LetDecl, LetValue, LitValue, Param};
pub use ctx::CompilerCtx;
pub use ids::{FVarId, Name, NameSupply};
pub use ty::{mk_forall_params, Ty};

///Small collection used for argument lists and similar, mostly short, sequences.
pub type SmallColl<T> = smallvec::SmallVec<[T; 3]>;
