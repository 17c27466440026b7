/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Small helper for building LCNF by hand. Mostly used by tests and tooling, the frontend lowers into LCNF
//! directly.
//!
//! ```rust
//! use lcnf::{builder::IrBuilder, Code, Decl, Ty};
//!
//! let mut b = IrBuilder::new();
//! let x = b.param("x", Ty::constant("Nat"));
//! let g = b.fvar();
//! //f x := let r := g x; return r
//! let call = b.tail_call(g, [lcnf::Arg::FVar(x.fvar)], Ty::constant("Nat"));
//! let decl = Decl::new("f", vec![x], Ty::constant("Nat"), call);
//! assert!(decl.value.as_tail_call().is_some());
//! ```

use crate::{
    code::{Arg, Code, FunDecl, LetDecl, LetValue, Param},
    ids::{FVarId, Name, NameSupply},
    ty::Ty,
};

#[derive(Debug, Default)]
pub struct IrBuilder {
    names: NameSupply,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    ///Hands out a fresh id. Use this to name a function before its body is built.
    pub fn fvar(&mut self) -> FVarId {
        self.names.fresh_fvar()
    }

    pub fn param(&mut self, name: &str, ty: Ty) -> Param {
        Param::new(self.fvar(), name, ty)
    }

    pub fn let_decl(&mut self, name: &str, ty: Ty, value: LetValue) -> LetDecl {
        LetDecl {
            fvar: self.fvar(),
            binder_name: Name::from(name),
            ty,
            value,
        }
    }

    ///`let name := constant args`
    pub fn const_app(
        &mut self,
        name: &str,
        ty: Ty,
        constant: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> LetDecl {
        self.let_decl(
            name,
            ty,
            LetValue::Const {
                name: Name::from(constant),
                args: args.into_iter().collect(),
            },
        )
    }

    ///`let name := callee args`
    pub fn call(
        &mut self,
        name: &str,
        ty: Ty,
        callee: FVarId,
        args: impl IntoIterator<Item = Arg>,
    ) -> LetDecl {
        self.let_decl(
            name,
            ty,
            LetValue::FVar {
                fvar: callee,
                args: args.into_iter().collect(),
            },
        )
    }

    ///`let r := callee args; return r`
    pub fn tail_call(&mut self, callee: FVarId, args: impl IntoIterator<Item = Arg>, ty: Ty) -> Code {
        let decl = self.call("r", ty, callee, args);
        let ret = decl.fvar;
        Code::let_in(decl, Code::Return(ret))
    }

    pub fn fun_decl(
        &mut self,
        fvar: FVarId,
        name: &str,
        params: Vec<Param>,
        result_ty: Ty,
        value: Code,
    ) -> FunDecl {
        FunDecl::new(fvar, name, params, result_ty, value)
    }
}
