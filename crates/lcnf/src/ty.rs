/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! The (erased) type language of LCNF.

use crate::{code::Param, ids::Name};

///Types as seen by the code generator. Dependent types are mostly erased at this point, so
/// a [Forall](Ty::Forall) is just a function type that happens to name its binder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ty {
    ///Computationally irrelevant.
    Erased,
    ///Type that could not be made precise (`lcAny`).
    Any,
    ///Type constant applied to arguments, e.g. `Nat` or `List Nat`.
    Const(Name, Vec<Ty>),
    Forall {
        binder: Name,
        domain: Box<Ty>,
        body: Box<Ty>,
    },
}

impl Ty {
    ///Shortcut for an unapplied type constant.
    pub fn constant(name: &str) -> Self {
        Ty::Const(Name::from(name), Vec::with_capacity(0))
    }

    ///Number of leading binders.
    pub fn arity(&self) -> usize {
        let mut count = 0;
        let mut ty = self;
        while let Ty::Forall { body, .. } = ty {
            count += 1;
            ty = body;
        }
        count
    }

    ///Strips `n` binders, returns `None` if there are fewer than `n`.
    pub fn peel(&self, n: usize) -> Option<&Ty> {
        let mut ty = self;
        for _ in 0..n {
            match ty {
                Ty::Forall { body, .. } => ty = body,
                _ => return None,
            }
        }
        Some(ty)
    }
}

///Builds the function type `(p0 : t0) -> ... -> (pn : tn) -> result` for `params`.
pub fn mk_forall_params(params: &[Param], result: Ty) -> Ty {
    params.iter().rev().fold(result, |acc, param| Ty::Forall {
        binder: param.binder_name.clone(),
        domain: Box::new(param.ty.clone()),
        body: Box::new(acc),
    })
}
