/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! # LCNF-Opt
//!
//! Join point optimizations on [LCNF](lcnf).
//!
//! Join points are local functions that are only entered through jumps in tail position. A backend can compile them
//! to plain labeled blocks, which makes them a lot cheaper than closures. This crate
//!
//! - discovers join points among the local functions of a declaration ([find_join_points]),
//! - turns join points into closed blocks by passing everything they use as parameters ([extend_join_point_context]),
//! - removes join point parameters that always receive the same argument ([common_join_point_args]).
//!
//! The [Optimizer] runs those passes for many declarations in parallel, according to a [Config].
//!
//! ```rust
//! use lcnf::{builder::IrBuilder, Arg, Code, Decl, FunKind, Ty};
//! use lcnf_opt::{Config, Optimizer};
//!
//! let nat = Ty::constant("Nat");
//! let mut b = IrBuilder::new();
//! let x = b.param("x", nat.clone());
//! let xid = x.fvar;
//! //f x := fun g y := return y; let r := g x; return r
//! let g = b.fvar();
//! let y = b.param("y", nat.clone());
//! let yid = y.fvar;
//! let g_decl = b.fun_decl(g, "g", vec![y], nat.clone(), Code::Return(yid));
//! let call = b.tail_call(g, [Arg::FVar(xid)], nat.clone());
//! let decl = Decl::new("f", vec![x], nat, Code::fun_in(FunKind::Nonrec, vec![g_decl], call));
//!
//! let optimized = Optimizer::new(Config::default()).run_decl(decl).unwrap();
//! assert!(matches!(&optimized.value, Code::Fun(group, _) if group.kind == FunKind::Join));
//! ```

use std::fmt::Display;

mod config;
mod error;
mod optimizer;
pub mod passes;
pub mod scope;

pub use config::{CommonArgsConfig, Config, PassConfig, ReduceMode};
pub use error::OptError;
pub use optimizer::{DeclReport, Optimizer};
pub use passes::{common_join_point_args, extend_join_point_context, find_join_points};

///The passes of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Find,
    Extend,
    CommonArgs,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pass::Find => "find-join-points",
            Pass::Extend => "extend-join-point-context",
            Pass::CommonArgs => "common-join-point-args",
        };
        write!(f, "{name}")
    }
}
