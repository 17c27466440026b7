/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Per-declaration compiler state, and the IR helpers passes build on.

use crate::{
    code::{Code, Decl, FunDecl, FunKind, LetDecl, Param},
    err::IrError,
    fvars::binders,
    ids::{FVarId, Name, NameSupply},
    lctx::{FunSig, LocalContext, LocalDecl},
    subst::{normalize, FVarSubst, Normalized},
    ty::Ty,
};

///State one declaration is compiled with. Created per declaration and dropped afterwards, nothing in here
/// is shared between declarations.
#[derive(Debug, Clone, Default)]
pub struct CompilerCtx {
    pub lctx: LocalContext,
    pub names: NameSupply,
}

impl CompilerCtx {
    ///Builds the context for `decl`. The name supply starts after the largest binder id used in `decl`.
    pub fn for_decl(decl: &Decl) -> Result<Self, IrError> {
        let lctx = LocalContext::for_decl(decl)?;
        let mut names = NameSupply::new();
        for param in &decl.params {
            names.observe(param.fvar);
        }
        for id in binders(&decl.value) {
            names.observe(id);
        }
        #[cfg(feature = "log")]
        log::trace!("{}: local context with {} binders", decl.name, lctx.len());
        Ok(CompilerCtx { lctx, names })
    }

    pub fn get_fun_decl(&self, fvar: FVarId) -> Result<&FunSig, IrError> {
        match self.lctx.get(fvar) {
            Some(LocalDecl::Fun(sig)) => Ok(sig),
            Some(_) => Err(IrError::NotAFunction(fvar)),
            None => Err(IrError::UnknownFVar(fvar)),
        }
    }

    pub fn get_type(&self, fvar: FVarId) -> Result<Ty, IrError> {
        self.lctx
            .get(fvar)
            .map(|decl| decl.ty().clone())
            .ok_or(IrError::UnknownFVar(fvar))
    }

    pub fn erase_param(&mut self, param: &Param) {
        self.lctx.erase(param.fvar);
    }

    pub fn erase_let_decl(&mut self, decl: &LetDecl) {
        self.lctx.erase(decl.fvar);
    }

    pub fn mk_fresh_jp_name(&mut self) -> Name {
        self.names.fresh_jp_name()
    }

    ///Creates a new parameter of type `ty` with a fresh id and registers it.
    pub fn mk_aux_param(&mut self, ty: Ty) -> Param {
        let param = Param {
            fvar: self.names.fresh_fvar(),
            binder_name: self.names.fresh_aux_name(),
            ty,
        };
        self.lctx.add_param(&param);
        param
    }

    ///Registers `decl` (again), after its name, parameters or kind changed.
    pub fn update_fun_decl(&mut self, decl: &FunDecl, kind: FunKind) {
        self.lctx.set_fun(decl, kind);
    }

    ///Infers the type `code` evaluates to.
    pub fn infer_type(&self, code: &Code) -> Result<Ty, IrError> {
        match code {
            Code::Let(_, k) | Code::Fun(_, k) => self.infer_type(k),
            Code::Cases(cases) => Ok(cases.result_ty.clone()),
            Code::Jmp(jp, _) => {
                let sig = self.get_fun_decl(*jp)?;
                sig.ty
                    .peel(sig.arity())
                    .cloned()
                    .ok_or(IrError::MalformedFunType {
                        fvar: *jp,
                        params: sig.arity(),
                    })
            }
            Code::Return(fvar) => self.get_type(*fvar),
            Code::Unreach(ty) => Ok(ty.clone()),
        }
    }

    ///Applies `subst` to `code`. See [normalize](crate::subst::normalize).
    pub fn normalize(&self, code: &mut Code, subst: &FVarSubst) -> Normalized {
        normalize(code, subst)
    }
}
