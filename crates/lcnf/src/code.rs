/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! The LCNF data model.
//!
//! A declaration's body is a [Code] tree. Every value is let-bound, local functions are declared in
//! [FunGroup]s. A group of kind [FunKind::Join] declares join points, which are only ever entered via [Code::Jmp].

use smallvec::SmallVec;

use crate::{
    ids::{FVarId, Name},
    ty::{mk_forall_params, Ty},
    SmallColl,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LitValue {
    Nat(u64),
    Str(String),
}

///Argument of an application or jump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arg {
    Erased,
    FVar(FVarId),
    Type(Ty),
    Lit(LitValue),
}

impl Arg {
    pub fn fvar(&self) -> Option<FVarId> {
        if let Arg::FVar(id) = self {
            Some(*id)
        } else {
            None
        }
    }

    pub fn fvar_mut(&mut self) -> Option<&mut FVarId> {
        if let Arg::FVar(id) = self {
            Some(id)
        } else {
            None
        }
    }
}

///Right hand side of a let binding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LetValue {
    Value(LitValue),
    Erased,
    ///Projects field `idx` out of `fvar`, which is a value of the structure `struct_name`.
    Proj {
        struct_name: Name,
        idx: usize,
        fvar: FVarId,
    },
    ///Application of a global constant.
    Const { name: Name, args: SmallColl<Arg> },
    ///Application of a local variable. With no arguments this is just a copy of `fvar`.
    FVar { fvar: FVarId, args: SmallColl<Arg> },
}

impl LetValue {
    ///Calls `f` for every local variable this value reads.
    pub fn for_each_fvar(&self, mut f: impl FnMut(FVarId)) {
        match self {
            LetValue::Value(_) | LetValue::Erased => {}
            LetValue::Proj { fvar, .. } => f(*fvar),
            LetValue::Const { args, .. } => {
                for id in args.iter().filter_map(Arg::fvar) {
                    f(id)
                }
            }
            LetValue::FVar { fvar, args } => {
                f(*fvar);
                for id in args.iter().filter_map(Arg::fvar) {
                    f(id)
                }
            }
        }
    }

    ///Mutable references to every local variable this value reads.
    pub fn fvars_mut(&mut self) -> SmallVec<[&mut FVarId; 4]> {
        let mut refs = SmallVec::new();
        match self {
            LetValue::Value(_) | LetValue::Erased => {}
            LetValue::Proj { fvar, .. } => refs.push(fvar),
            LetValue::Const { args, .. } => refs.extend(args.iter_mut().filter_map(Arg::fvar_mut)),
            LetValue::FVar { fvar, args } => {
                refs.push(fvar);
                refs.extend(args.iter_mut().filter_map(Arg::fvar_mut));
            }
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub fvar: FVarId,
    pub binder_name: Name,
    pub ty: Ty,
}

impl Param {
    pub fn new(fvar: FVarId, name: &str, ty: Ty) -> Self {
        Param {
            fvar,
            binder_name: Name::from(name),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LetDecl {
    pub fvar: FVarId,
    pub binder_name: Name,
    pub ty: Ty,
    pub value: LetValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunKind {
    ///Plain local functions. Names are not visible inside the group's bodies.
    Nonrec,
    ///(Mutually) recursive local functions.
    Rec,
    ///Join points. Group members may jump to each other (and themselves).
    Join,
}

impl FunKind {
    pub fn is_join(&self) -> bool {
        matches!(self, FunKind::Join)
    }

    ///True if the names of a group of this kind are in scope inside the group's bodies.
    pub fn sees_group(&self) -> bool {
        !matches!(self, FunKind::Nonrec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunDecl {
    pub fvar: FVarId,
    pub binder_name: Name,
    pub params: Vec<Param>,
    ///Full type of the function, including the parameters.
    pub ty: Ty,
    pub value: Code,
}

impl FunDecl {
    ///Creates the declaration, building the function type from `params` and `result_ty`.
    pub fn new(fvar: FVarId, name: &str, params: Vec<Param>, result_ty: Ty, value: Code) -> Self {
        let ty = mk_forall_params(&params, result_ty);
        FunDecl {
            fvar,
            binder_name: Name::from(name),
            params,
            ty,
            value,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn result_ty(&self) -> Option<&Ty> {
        self.ty.peel(self.params.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunGroup {
    pub kind: FunKind,
    pub decls: Vec<FunDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alt {
    Ctor {
        ctor: Name,
        params: Vec<Param>,
        code: Code,
    },
    Default(Code),
}

impl Alt {
    pub fn params(&self) -> &[Param] {
        match self {
            Alt::Ctor { params, .. } => params,
            Alt::Default(_) => &[],
        }
    }

    pub fn code(&self) -> &Code {
        match self {
            Alt::Ctor { code, .. } | Alt::Default(code) => code,
        }
    }

    pub fn code_mut(&mut self) -> &mut Code {
        match self {
            Alt::Ctor { code, .. } | Alt::Default(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cases {
    pub type_name: Name,
    pub result_ty: Ty,
    pub discr: FVarId,
    pub alts: Vec<Alt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Code {
    Let(LetDecl, Box<Code>),
    Fun(FunGroup, Box<Code>),
    Cases(Box<Cases>),
    Jmp(FVarId, SmallColl<Arg>),
    Return(FVarId),
    Unreach(Ty),
}

///A call `let r := f args; return r`, that is a call to a local variable in tail position.
#[derive(Debug, Clone, Copy)]
pub struct TailCall<'a> {
    pub decl: &'a LetDecl,
    pub callee: FVarId,
    pub args: &'a [Arg],
}

impl Code {
    pub fn let_in(decl: LetDecl, k: Code) -> Self {
        Code::Let(decl, Box::new(k))
    }

    pub fn fun_in(kind: FunKind, decls: Vec<FunDecl>, k: Code) -> Self {
        Code::Fun(FunGroup { kind, decls }, Box::new(k))
    }

    pub fn cases(cases: Cases) -> Self {
        Code::Cases(Box::new(cases))
    }

    pub fn jmp(target: FVarId, args: impl IntoIterator<Item = Arg>) -> Self {
        Code::Jmp(target, args.into_iter().collect())
    }

    ///Returns the tail call, if `self` is of the form `let r := f args; return r`.
    pub fn as_tail_call(&self) -> Option<TailCall<'_>> {
        match self {
            Code::Let(decl, k) => match (&decl.value, k.as_ref()) {
                (LetValue::FVar { fvar, args }, Code::Return(ret)) if *ret == decl.fvar => {
                    Some(TailCall {
                        decl,
                        callee: *fvar,
                        args: args.as_slice(),
                    })
                }
                _ => None,
            },
            _ => None,
        }
    }
}

///A top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decl {
    pub name: Name,
    pub params: Vec<Param>,
    pub ty: Ty,
    pub value: Code,
}

impl Decl {
    pub fn new(name: &str, params: Vec<Param>, result_ty: Ty, value: Code) -> Self {
        let ty = mk_forall_params(&params, result_ty);
        Decl {
            name: Name::from(name),
            params,
            ty,
            value,
        }
    }
}
