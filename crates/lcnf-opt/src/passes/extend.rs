/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Extends the context of join points.
//!
//! After this pass every join point body only uses its own parameters, and variables bound within itself. Each
//! variable a join point used from its surrounding function body becomes an extra (trailing) parameter, and every jump
//! to the join point passes the variable along.
//!
//! Join points that are declared inside other join points propagate their requirements outwards. If the outer join
//! point does not bind a captured variable itself, it captures it as well.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use lcnf::{
    err::IrError,
    fvars::{free_fvars, uses_fvar},
    mk_forall_params,
    subst::FVarSubst,
    Alt, Arg, Code, CompilerCtx, Decl, FVarId, FunDecl, FunGroup, FunKind, Param, Ty,
};

use crate::{
    scope::{ScopeTracker, Scoped},
    OptError, Pass,
};

///What [extend_join_point_context] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendReport {
    ///Join points that gained parameters, and how many.
    pub extended: BTreeMap<FVarId, usize>,
}

impl ExtendReport {
    pub fn added_params(&self) -> usize {
        self.extended.values().sum()
    }
}

struct JoinPointContextExtender<'a> {
    ctx: &'a mut CompilerCtx,
    scope: ScopeTracker,
    ///Join point whose body we are in, if any.
    current_jp: Option<FVarId>,
    ///Variables of the current function body that join points might capture.
    candidates: AHashSet<FVarId>,
    ///Per join point, the captured variables and the parameters that replace them.
    fvar_map: AHashMap<FVarId, BTreeMap<FVarId, Param>>,
}

impl<'a> Scoped for JoinPointContextExtender<'a> {
    const PASS: Pass = Pass::Extend;
    fn scope(&mut self) -> &mut ScopeTracker {
        &mut self.scope
    }
}

impl<'a> JoinPointContextExtender<'a> {
    fn with_new_candidate(&mut self, fvar: FVarId) {
        self.scope.add(fvar);
        self.candidates.insert(fvar);
    }

    ///Captures `fvar` in the current join point, if `fvar` comes from outside of it.
    fn extend_by_if_necessary(&mut self, fvar: FVarId) -> Result<(), OptError> {
        let Some(jp) = self.current_jp else {
            return Ok(());
        };
        if self.scope.contains(fvar) || !self.candidates.contains(&fvar) {
            return Ok(());
        }

        let translator = self.fvar_map.get_mut(&jp).ok_or_else(|| {
            OptError::internal(Pass::Extend, format!("join point {jp} has no context map"))
        })?;
        if translator.contains_key(&fvar) {
            return Ok(());
        }
        let ty = self.ctx.get_type(fvar)?;
        let param = self.ctx.mk_aux_param(ty);
        #[cfg(feature = "log")]
        log::trace!("{jp} captures {fvar} as {}", param.fvar);
        translator.insert(fvar, param);
        Ok(())
    }

    ///Returns what `fvar` is called within the current join point.
    fn replace_fvar(&self, fvar: FVarId) -> Result<FVarId, OptError> {
        let Some(jp) = self.current_jp else {
            return Ok(fvar);
        };
        if !self.candidates.contains(&fvar) {
            return Ok(fvar);
        }
        let translator = self.fvar_map.get(&jp).ok_or_else(|| {
            OptError::internal(Pass::Extend, format!("join point {jp} has no context map"))
        })?;
        Ok(translator.get(&fvar).map(|p| p.fvar).unwrap_or(fvar))
    }

    fn go_fvar(&mut self, fvar: FVarId) -> Result<FVarId, OptError> {
        self.extend_by_if_necessary(fvar)?;
        self.replace_fvar(fvar)
    }

    fn go_arg(&mut self, arg: &mut Arg) -> Result<(), OptError> {
        if let Arg::FVar(fvar) = arg {
            *fvar = self.go_fvar(*fvar)?;
        }
        Ok(())
    }

    ///Makes the current join point (if any) capture everything `jp` captured, unless it binds it itself.
    fn merge_jp_context_if_necessary(&mut self, jp: FVarId) -> Result<(), OptError> {
        if self.current_jp.is_none() {
            return Ok(());
        }
        let captured: Vec<FVarId> = self
            .fvar_map
            .get(&jp)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        for fvar in captured {
            self.extend_by_if_necessary(fvar)?;
        }
        Ok(())
    }

    fn with_new_fun_scope<T>(
        &mut self,
        params: &[Param],
        f: impl FnOnce(&mut Self) -> Result<T, OptError>,
    ) -> Result<T, OptError> {
        let outer_jp = self.current_jp.take();
        let outer_candidates = std::mem::take(&mut self.candidates);
        let res = self.with_new_scope(|this| {
            this.scope.add_params(params);
            f(this)
        });
        self.current_jp = outer_jp;
        self.candidates = outer_candidates;
        res
    }

    fn with_new_jp_scope<T>(
        &mut self,
        jp: &FunDecl,
        f: impl FnOnce(&mut Self) -> Result<T, OptError>,
    ) -> Result<T, OptError> {
        let outer_jp = self.current_jp.replace(jp.fvar);
        self.fvar_map.entry(jp.fvar).or_default();
        let res = self.with_new_scope(|this| {
            this.scope.add_params(&jp.params);
            f(this)
        });
        self.current_jp = outer_jp;
        res
    }

    fn with_new_alt_scope<T>(
        &mut self,
        params: &[Param],
        f: impl FnOnce(&mut Self) -> Result<T, OptError>,
    ) -> Result<T, OptError> {
        let res = self.with_backtracking_scope(|this| {
            for param in params {
                this.with_new_candidate(param.fvar);
            }
            f(this)
        });
        for param in params {
            self.candidates.remove(&param.fvar);
        }
        res
    }

    ///Rewrites the bodies of a join group. If the group members jump to each other, a member's captures can grow after
    /// a jump to it was already rewritten. In that case we start over from the original bodies until nothing changes.
    fn extend_join_group(&mut self, decls: Vec<FunDecl>) -> Result<Vec<FunDecl>, OptError> {
        let names: Vec<FVarId> = decls.iter().map(|d| d.fvar).collect();
        let recursive = decls
            .iter()
            .any(|d| names.iter().any(|n| uses_fvar(&d.value, *n)));
        for name in &names {
            self.fvar_map.entry(*name).or_default();
        }

        let captured_count = |this: &Self| -> usize {
            names
                .iter()
                .map(|n| this.fvar_map.get(n).map(|m| m.len()).unwrap_or(0))
                .sum()
        };

        let bodies = loop {
            let before = captured_count(self);
            let mut bodies = Vec::with_capacity(decls.len());
            for decl in &decls {
                bodies.push(self.with_new_jp_scope(decl, |this| this.go(decl.value.clone()))?);
            }
            if !recursive || captured_count(self) == before {
                break bodies;
            }
        };

        let mut extended = Vec::with_capacity(decls.len());
        for (mut decl, body) in decls.into_iter().zip(bodies) {
            let result_ty = decl.result_ty().cloned().ok_or_else(|| {
                OptError::from(IrError::MalformedFunType {
                    fvar: decl.fvar,
                    params: decl.params.len(),
                })
            })?;
            if let Some(captured) = self.fvar_map.get(&decl.fvar) {
                decl.params.extend(captured.values().cloned());
            }
            decl.ty = mk_forall_params(&decl.params, result_ty);
            decl.value = body;
            self.ctx.update_fun_decl(&decl, FunKind::Join);
            extended.push(decl);
        }
        Ok(extended)
    }

    fn go(&mut self, code: Code) -> Result<Code, OptError> {
        match code {
            Code::Let(mut decl, k) => {
                for fvar in decl.value.fvars_mut() {
                    *fvar = self.go_fvar(*fvar)?;
                }
                self.with_new_candidate(decl.fvar);
                let k = self.go(*k)?;
                Ok(Code::Let(decl, Box::new(k)))
            }
            Code::Fun(group, k) if group.kind.is_join() => {
                let decls = self.extend_join_group(group.decls)?;
                for decl in &decls {
                    self.merge_jp_context_if_necessary(decl.fvar)?;
                }
                for decl in &decls {
                    self.with_new_candidate(decl.fvar);
                }
                let k = self.go(*k)?;
                Ok(Code::Fun(
                    FunGroup {
                        kind: FunKind::Join,
                        decls,
                    },
                    Box::new(k),
                ))
            }
            Code::Fun(group, k) => {
                let mut decls = Vec::with_capacity(group.decls.len());
                for decl in group.decls {
                    decls.push(self.go_local_fun(decl)?);
                }
                for decl in &decls {
                    self.with_new_candidate(decl.fvar);
                }
                let k = self.go(*k)?;
                Ok(Code::Fun(
                    FunGroup {
                        kind: group.kind,
                        decls,
                    },
                    Box::new(k),
                ))
            }
            Code::Cases(mut cases) => {
                cases.discr = self.go_fvar(cases.discr)?;
                let alts = std::mem::take(&mut cases.alts);
                for alt in alts {
                    let alt = match alt {
                        Alt::Ctor { ctor, params, code } => {
                            let code = self.with_new_alt_scope(&params, |this| this.go(code))?;
                            Alt::Ctor { ctor, params, code }
                        }
                        Alt::Default(code) => {
                            Alt::Default(self.with_new_alt_scope(&[], |this| this.go(code))?)
                        }
                    };
                    cases.alts.push(alt);
                }
                Ok(Code::Cases(cases))
            }
            Code::Jmp(jp, mut args) => {
                for arg in args.iter_mut() {
                    self.go_arg(arg)?;
                }
                let captured: Vec<FVarId> = self
                    .fvar_map
                    .get(&jp)
                    .ok_or_else(|| {
                        OptError::internal(
                            Pass::Extend,
                            format!("jump to {jp}, which is not a known join point"),
                        )
                    })?
                    .keys()
                    .copied()
                    .collect();
                for fvar in captured {
                    args.push(Arg::FVar(self.go_fvar(fvar)?));
                }
                Ok(Code::Jmp(jp, args))
            }
            Code::Return(fvar) => Ok(Code::Return(self.go_fvar(fvar)?)),
            Code::Unreach(ty) => Ok(Code::Unreach(ty)),
        }
    }

    ///Local functions are separate function bodies. Whatever they use from the join point we are in counts as used by the
    /// join point, and is renamed within the function.
    fn go_local_fun(&mut self, mut decl: FunDecl) -> Result<FunDecl, OptError> {
        let value = std::mem::replace(&mut decl.value, Code::Unreach(Ty::Erased));
        let mut renames = FVarSubst::new();
        if self.current_jp.is_some() {
            let params: AHashSet<FVarId> = decl.params.iter().map(|p| p.fvar).collect();
            let mut free: Vec<FVarId> = free_fvars(&value)
                .into_iter()
                .filter(|fvar| !params.contains(fvar))
                .collect();
            free.sort();
            for fvar in free {
                let renamed = self.go_fvar(fvar)?;
                if renamed != fvar {
                    renames.insert(fvar, Arg::FVar(renamed));
                }
            }
        }

        let mut value = self.with_new_fun_scope(&decl.params, |this| this.go(value))?;
        self.ctx.normalize(&mut value, &renames);
        decl.value = value;
        Ok(decl)
    }
}

///Extends every join point of `decl`, so that its body only uses its own parameters and binders.
pub fn extend_join_point_context(
    ctx: &mut CompilerCtx,
    decl: Decl,
) -> Result<(Decl, ExtendReport), OptError> {
    let mut extender = JoinPointContextExtender {
        ctx,
        scope: ScopeTracker::new(),
        current_jp: None,
        candidates: AHashSet::default(),
        fvar_map: AHashMap::default(),
    };
    extender.scope.add_params(&decl.params);
    let Decl {
        name,
        params,
        ty,
        value,
    } = decl;
    let value = extender.go(value)?;

    let extended: BTreeMap<FVarId, usize> = extender
        .fvar_map
        .iter()
        .filter(|(_, captured)| !captured.is_empty())
        .map(|(jp, captured)| (*jp, captured.len()))
        .collect();

    #[cfg(feature = "log")]
    log::debug!("{name}: extended {} join points", extended.len());

    Ok((
        Decl {
            name,
            params,
            ty,
            value,
        },
        ExtendReport { extended },
    ))
}
