/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! The local context of a declaration. Maps every local binder to what is known about it.

use ahash::AHashMap;

use crate::{
    code::{Code, Decl, FunDecl, FunKind, LetDecl, Param},
    err::IrError,
    ids::{FVarId, Name},
    ty::Ty,
};

///Signature of a local function or join point. The body is not stored, since it changes
/// all the time while passes rewrite the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunSig {
    pub fvar: FVarId,
    pub binder_name: Name,
    pub kind: FunKind,
    pub params: Vec<Param>,
    pub ty: Ty,
}

impl FunSig {
    pub fn of_decl(decl: &FunDecl, kind: FunKind) -> Self {
        FunSig {
            fvar: decl.fvar,
            binder_name: decl.binder_name.clone(),
            kind,
            params: decl.params.clone(),
            ty: decl.ty.clone(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDecl {
    Param(Param),
    Let { binder_name: Name, ty: Ty },
    Fun(FunSig),
}

impl LocalDecl {
    pub fn ty(&self) -> &Ty {
        match self {
            LocalDecl::Param(p) => &p.ty,
            LocalDecl::Let { ty, .. } => ty,
            LocalDecl::Fun(sig) => &sig.ty,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalContext {
    decls: AHashMap<FVarId, LocalDecl>,
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    ///Registers every binder of `decl`. Fails if any binder is declared twice.
    pub fn for_decl(decl: &Decl) -> Result<Self, IrError> {
        let mut lctx = LocalContext::new();
        for param in &decl.params {
            lctx.insert_new(param.fvar, LocalDecl::Param(param.clone()))?;
        }
        lctx.register_code(&decl.value)?;
        Ok(lctx)
    }

    fn insert_new(&mut self, fvar: FVarId, decl: LocalDecl) -> Result<(), IrError> {
        if self.decls.insert(fvar, decl).is_some() {
            return Err(IrError::DuplicateBinder(fvar));
        }
        Ok(())
    }

    fn register_code(&mut self, code: &Code) -> Result<(), IrError> {
        match code {
            Code::Let(decl, k) => {
                self.insert_new(
                    decl.fvar,
                    LocalDecl::Let {
                        binder_name: decl.binder_name.clone(),
                        ty: decl.ty.clone(),
                    },
                )?;
                self.register_code(k)
            }
            Code::Fun(group, k) => {
                for decl in &group.decls {
                    self.insert_new(decl.fvar, LocalDecl::Fun(FunSig::of_decl(decl, group.kind)))?;
                    for param in &decl.params {
                        self.insert_new(param.fvar, LocalDecl::Param(param.clone()))?;
                    }
                    self.register_code(&decl.value)?;
                }
                self.register_code(k)
            }
            Code::Cases(cases) => {
                for alt in &cases.alts {
                    for param in alt.params() {
                        self.insert_new(param.fvar, LocalDecl::Param(param.clone()))?;
                    }
                    self.register_code(alt.code())?;
                }
                Ok(())
            }
            Code::Jmp(..) | Code::Return(_) | Code::Unreach(_) => Ok(()),
        }
    }

    pub fn get(&self, fvar: FVarId) -> Option<&LocalDecl> {
        self.decls.get(&fvar)
    }

    pub fn contains(&self, fvar: FVarId) -> bool {
        self.decls.contains_key(&fvar)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn add_param(&mut self, param: &Param) {
        self.decls.insert(param.fvar, LocalDecl::Param(param.clone()));
    }

    pub fn add_let(&mut self, decl: &LetDecl) {
        self.decls.insert(
            decl.fvar,
            LocalDecl::Let {
                binder_name: decl.binder_name.clone(),
                ty: decl.ty.clone(),
            },
        );
    }

    ///Adds or overwrites the signature of `decl`.
    pub fn set_fun(&mut self, decl: &FunDecl, kind: FunKind) {
        self.decls
            .insert(decl.fvar, LocalDecl::Fun(FunSig::of_decl(decl, kind)));
    }

    pub fn erase(&mut self, fvar: FVarId) -> Option<LocalDecl> {
        self.decls.remove(&fvar)
    }
}
