/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Binder and free variable collection.

use ahash::AHashSet;

use crate::{
    code::{Arg, Code},
    ids::FVarId,
};

///Calls `f` for every use of a local variable in `code`, including jump targets.
pub fn for_each_use(code: &Code, f: &mut impl FnMut(FVarId)) {
    match code {
        Code::Let(decl, k) => {
            decl.value.for_each_fvar(&mut *f);
            for_each_use(k, f);
        }
        Code::Fun(group, k) => {
            for decl in &group.decls {
                for_each_use(&decl.value, f);
            }
            for_each_use(k, f);
        }
        Code::Cases(cases) => {
            f(cases.discr);
            for alt in &cases.alts {
                for_each_use(alt.code(), f);
            }
        }
        Code::Jmp(jp, args) => {
            f(*jp);
            for id in args.iter().filter_map(Arg::fvar) {
                f(id)
            }
        }
        Code::Return(fvar) => f(*fvar),
        Code::Unreach(_) => {}
    }
}

///Collects all binders of `code`, that is let, function, join point and parameter ids.
pub fn binders(code: &Code) -> Vec<FVarId> {
    let mut ids = Vec::new();
    collect_binders(code, &mut ids);
    ids
}

fn collect_binders(code: &Code, ids: &mut Vec<FVarId>) {
    match code {
        Code::Let(decl, k) => {
            ids.push(decl.fvar);
            collect_binders(k, ids);
        }
        Code::Fun(group, k) => {
            for decl in &group.decls {
                ids.push(decl.fvar);
                ids.extend(decl.params.iter().map(|p| p.fvar));
                collect_binders(&decl.value, ids);
            }
            collect_binders(k, ids);
        }
        Code::Cases(cases) => {
            for alt in &cases.alts {
                ids.extend(alt.params().iter().map(|p| p.fvar));
                collect_binders(alt.code(), ids);
            }
        }
        Code::Jmp(..) | Code::Return(_) | Code::Unreach(_) => {}
    }
}

///Variables used in `code` that are not bound in `code`.
///
/// Relies on binder ids being unique within a declaration, which is what [CompilerCtx](crate::ctx::CompilerCtx) maintains.
pub fn free_fvars(code: &Code) -> AHashSet<FVarId> {
    let bound: AHashSet<FVarId> = binders(code).into_iter().collect();
    let mut free = AHashSet::default();
    for_each_use(code, &mut |id| {
        if !bound.contains(&id) {
            free.insert(id);
        }
    });
    free
}

///True if `fvar` is used anywhere in `code`.
pub fn uses_fvar(code: &Code, fvar: FVarId) -> bool {
    let mut found = false;
    for_each_use(code, &mut |id| found |= id == fvar);
    found
}
