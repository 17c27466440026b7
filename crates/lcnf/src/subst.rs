/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Substitution of local variables.
//!
//! A [FVarSubst] maps variables to arguments. Applying it to code is called _normalizing_ the code.
//! Argument positions can take any [Arg], but some positions (returned variable, case discriminant, projected
//! struct, applied local) need a variable. If a variable in such a position is mapped to a non-variable argument, it is
//! left untouched and reported as _stuck_. The caller has to keep a binding for it alive.

use ahash::{AHashMap, AHashSet};

use crate::{
    code::{Arg, Code, LetValue},
    ids::FVarId,
};

#[derive(Debug, Clone, Default)]
pub struct FVarSubst {
    map: AHashMap<FVarId, Arg>,
}

impl FVarSubst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fvar: FVarId, arg: Arg) {
        self.map.insert(fvar, arg);
    }

    pub fn get(&self, fvar: FVarId) -> Option<&Arg> {
        self.map.get(&fvar)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

///Result of [normalize].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    ///Substituted variables that still occur in a variable-only position.
    pub stuck: AHashSet<FVarId>,
    ///Number of replaced occurrences.
    pub replaced: usize,
}

impl Normalized {
    fn var_position(&mut self, subst: &FVarSubst, fvar: &mut FVarId) {
        match subst.get(*fvar) {
            Some(Arg::FVar(new)) => {
                *fvar = *new;
                self.replaced += 1;
            }
            Some(_) => {
                self.stuck.insert(*fvar);
            }
            None => {}
        }
    }

    fn arg_position(&mut self, subst: &FVarSubst, arg: &mut Arg) {
        if let Arg::FVar(fvar) = arg {
            if let Some(new) = subst.get(*fvar) {
                *arg = new.clone();
                self.replaced += 1;
            }
        }
    }

    fn let_value(&mut self, subst: &FVarSubst, value: &mut LetValue) {
        match value {
            LetValue::Value(_) | LetValue::Erased => {}
            LetValue::Proj { fvar, .. } => self.var_position(subst, fvar),
            LetValue::Const { args, .. } => {
                for arg in args.iter_mut() {
                    self.arg_position(subst, arg);
                }
            }
            LetValue::FVar { fvar, args } => {
                self.var_position(subst, fvar);
                for arg in args.iter_mut() {
                    self.arg_position(subst, arg);
                }
            }
        }
    }

    fn code(&mut self, subst: &FVarSubst, code: &mut Code) {
        match code {
            Code::Let(decl, k) => {
                self.let_value(subst, &mut decl.value);
                self.code(subst, k);
            }
            Code::Fun(group, k) => {
                for decl in group.decls.iter_mut() {
                    self.code(subst, &mut decl.value);
                }
                self.code(subst, k);
            }
            Code::Cases(cases) => {
                self.var_position(subst, &mut cases.discr);
                for alt in cases.alts.iter_mut() {
                    self.code(subst, alt.code_mut());
                }
            }
            Code::Jmp(_jp, args) => {
                for arg in args.iter_mut() {
                    self.arg_position(subst, arg);
                }
            }
            Code::Return(fvar) => self.var_position(subst, fvar),
            Code::Unreach(_) => {}
        }
    }
}

///Applies `subst` to every use site in `code`. Binders are not touched.
pub fn normalize(code: &mut Code, subst: &FVarSubst) -> Normalized {
    let mut result = Normalized::default();
    if !subst.is_empty() {
        result.code(subst, code);
    }
    result
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::IrBuilder,
        code::{Arg, Code, LetValue, LitValue},
        ids::Name,
        ty::Ty,
    };

    use super::{normalize, FVarSubst};

    #[test]
    fn renames_and_reports_stuck() {
        let mut b = IrBuilder::new();
        let a = b.fvar();
        let c = b.fvar();
        let z = b.fvar();
        let r = b.let_decl(
            "r",
            Ty::constant("Nat"),
            LetValue::Const {
                name: Name::from("Nat.add"),
                args: [Arg::FVar(a), Arg::FVar(c)].into_iter().collect(),
            },
        );
        let rid = r.fvar;
        //`a` is also returned, so it can't be replaced by a literal there.
        let mut code = Code::let_in(r, Code::Return(a));

        let mut subst = FVarSubst::new();
        subst.insert(a, Arg::Lit(LitValue::Nat(1)));
        subst.insert(c, Arg::FVar(z));
        let result = normalize(&mut code, &subst);

        assert_eq!(result.replaced, 2);
        assert!(result.stuck.contains(&a));
        let Code::Let(decl, k) = &code else { panic!() };
        assert_eq!(decl.fvar, rid);
        assert_eq!(
            decl.value,
            LetValue::Const {
                name: Name::from("Nat.add"),
                args: [Arg::Lit(LitValue::Nat(1)), Arg::FVar(z)].into_iter().collect(),
            }
        );
        assert_eq!(**k, Code::Return(a));
    }
}
