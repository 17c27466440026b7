/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Removes join point parameters that receive the same argument from every jump.
//!
//! The analysis collects the arguments of every jump, and which variables are in scope where each join point is
//! declared. A parameter is removed if
//! - the join point is jumped to at least once,
//! - all jumps pass the same argument at the parameter's position,
//! - every variable of that argument is visible at the join point's declaration.
//!
//! The argument is then substituted for the parameter within the body, and dropped from every jump.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use lcnf::{
    mk_forall_params, subst::FVarSubst, Alt, Arg, Code, CompilerCtx, Decl, FVarId, FunDecl,
    FunKind, LetDecl, LetValue, Param, SmallColl, Ty,
};

use crate::{
    config::ReduceMode,
    scope::{ScopeTracker, Scoped},
    OptError, Pass,
};

///What [common_join_point_args] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonArgsReport {
    ///Join points that lost parameters, and how many.
    pub reduced: BTreeMap<FVarId, usize>,
    ///Number of analyze + reduce sweeps that were run.
    pub sweeps: usize,
}

impl CommonArgsReport {
    pub fn removed_params(&self) -> usize {
        self.reduced.values().sum()
    }
}

#[derive(Default)]
struct JumpAnalysis {
    scope: ScopeTracker,
    ///Variables visible where a join point is declared.
    jp_scopes: AHashMap<FVarId, AHashSet<FVarId>>,
    ///Arguments of every jump, per join point.
    jmp_args: AHashMap<FVarId, Vec<SmallColl<Arg>>>,
}

impl Scoped for JumpAnalysis {
    const PASS: Pass = Pass::CommonArgs;
    fn scope(&mut self) -> &mut ScopeTracker {
        &mut self.scope
    }
}

impl JumpAnalysis {
    fn go(&mut self, ctx: &CompilerCtx, code: &Code) -> Result<(), OptError> {
        match code {
            Code::Let(decl, k) => {
                self.scope.add(decl.fvar);
                self.go(ctx, k)
            }
            Code::Fun(group, k) => {
                if group.kind.is_join() {
                    let visible = self.scope.snapshot();
                    for decl in &group.decls {
                        self.jp_scopes.insert(decl.fvar, visible.clone());
                    }
                    for decl in &group.decls {
                        self.with_backtracking_scope(|this| {
                            this.scope.add_params(&decl.params);
                            this.go(ctx, &decl.value)
                        })?;
                    }
                } else {
                    for decl in &group.decls {
                        self.with_new_scope(|this| {
                            this.scope.add_params(&decl.params);
                            this.go(ctx, &decl.value)
                        })?;
                    }
                }
                for decl in &group.decls {
                    self.scope.add(decl.fvar);
                }
                self.go(ctx, k)
            }
            Code::Cases(cases) => {
                for alt in &cases.alts {
                    self.with_backtracking_scope(|this| {
                        this.scope.add_params(alt.params());
                        this.go(ctx, alt.code())
                    })?;
                }
                Ok(())
            }
            Code::Jmp(jp, args) => {
                let arity = ctx.get_fun_decl(*jp)?.arity();
                if arity != args.len() {
                    return Err(OptError::internal(
                        Pass::CommonArgs,
                        format!(
                            "jump to {jp} passes {} arguments, but it takes {arity}",
                            args.len()
                        ),
                    ));
                }
                self.jmp_args.entry(*jp).or_default().push(args.clone());
                Ok(())
            }
            Code::Return(_) | Code::Unreach(_) => Ok(()),
        }
    }

    ///For each join point with at least one removable parameter, a mask of removable positions and the common arguments.
    fn into_plans(self) -> AHashMap<FVarId, ReducePlan> {
        let mut plans = AHashMap::default();
        for (jp, calls) in self.jmp_args {
            let Some(first) = calls.first() else {
                continue;
            };
            let Some(visible) = self.jp_scopes.get(&jp) else {
                continue;
            };

            let remove: SmallColl<bool> = first
                .iter()
                .enumerate()
                .map(|(idx, arg)| {
                    calls.iter().all(|call| call.get(idx) == Some(arg))
                        && arg.fvar().map(|fvar| visible.contains(&fvar)).unwrap_or(true)
                })
                .collect();

            if remove.iter().any(|r| *r) {
                plans.insert(
                    jp,
                    ReducePlan {
                        remove,
                        args: first.clone(),
                    },
                );
            }
        }
        plans
    }
}

struct ReducePlan {
    remove: SmallColl<bool>,
    args: SmallColl<Arg>,
}

struct JumpReducer<'a> {
    ctx: &'a mut CompilerCtx,
    plans: AHashMap<FVarId, ReducePlan>,
    ///Every parameter removed so far, with the argument it was replaced by. Recorded arguments of nested jumps might
    /// still name an already removed parameter.
    applied: FVarSubst,
    reduced: BTreeMap<FVarId, usize>,
}

impl<'a> JumpReducer<'a> {
    fn resolve(&self, arg: &Arg) -> Arg {
        match arg {
            Arg::FVar(fvar) => self.applied.get(*fvar).cloned().unwrap_or(Arg::FVar(*fvar)),
            other => other.clone(),
        }
    }

    ///Binding for a parameter that was replaced by the non-variable `arg`, but is still used where a variable is needed.
    fn rebind(param: &Param, arg: &Arg) -> Result<LetDecl, OptError> {
        let value = match arg {
            Arg::Lit(lit) => LetValue::Value(lit.clone()),
            Arg::Erased | Arg::Type(_) => LetValue::Erased,
            Arg::FVar(fvar) => {
                return Err(OptError::internal(
                    Pass::CommonArgs,
                    format!("{} was renamed to {fvar}, but is reported as stuck", param.fvar),
                ))
            }
        };
        Ok(LetDecl {
            fvar: param.fvar,
            binder_name: param.binder_name.clone(),
            ty: param.ty.clone(),
            value,
        })
    }

    fn reduce_jp(&mut self, mut decl: FunDecl) -> Result<FunDecl, OptError> {
        if !self.plans.contains_key(&decl.fvar) {
            let value = std::mem::replace(&mut decl.value, Code::Unreach(Ty::Erased));
            decl.value = self.go(value)?;
            return Ok(decl);
        }
        let plan = &self.plans[&decl.fvar];
        if plan.remove.len() != decl.params.len() {
            return Err(OptError::internal(
                Pass::CommonArgs,
                format!(
                    "{} has {} parameters, but was analyzed with {}",
                    decl.fvar,
                    decl.params.len(),
                    plan.remove.len()
                ),
            ));
        }

        let mut subst = FVarSubst::new();
        let mut kept = Vec::with_capacity(decl.params.len());
        let mut dropped = Vec::new();
        for (idx, param) in std::mem::take(&mut decl.params).into_iter().enumerate() {
            if plan.remove[idx] {
                let arg = self.resolve(&plan.args[idx]);
                subst.insert(param.fvar, arg.clone());
                dropped.push((param, arg));
            } else {
                kept.push(param);
            }
        }

        let mut body = std::mem::replace(&mut decl.value, Code::Unreach(Ty::Erased));
        let normalized = self.ctx.normalize(&mut body, &subst);
        for (param, arg) in dropped.iter().rev() {
            self.ctx.erase_param(param);
            if normalized.stuck.contains(&param.fvar) {
                let binding = Self::rebind(param, arg)?;
                self.ctx.lctx.add_let(&binding);
                body = Code::let_in(binding, body);
            }
            self.applied.insert(param.fvar, arg.clone());
        }

        #[cfg(feature = "log")]
        log::trace!("{}: removed {} parameters", decl.fvar, dropped.len());
        self.reduced.insert(decl.fvar, dropped.len());

        decl.params = kept;
        decl.value = self.go(body)?;
        let result_ty = self.ctx.infer_type(&decl.value)?;
        decl.ty = mk_forall_params(&decl.params, result_ty);
        self.ctx.update_fun_decl(&decl, FunKind::Join);
        Ok(decl)
    }

    fn go(&mut self, code: Code) -> Result<Code, OptError> {
        match code {
            Code::Let(decl, k) => Ok(Code::Let(decl, Box::new(self.go(*k)?))),
            Code::Fun(mut group, k) => {
                let decls = std::mem::take(&mut group.decls);
                for decl in decls {
                    let decl = if group.kind.is_join() {
                        self.reduce_jp(decl)?
                    } else {
                        let mut decl = decl;
                        let value = std::mem::replace(&mut decl.value, Code::Unreach(Ty::Erased));
                        decl.value = self.go(value)?;
                        decl
                    };
                    group.decls.push(decl);
                }
                Ok(Code::Fun(group, Box::new(self.go(*k)?)))
            }
            Code::Cases(mut cases) => {
                let alts = std::mem::take(&mut cases.alts);
                for alt in alts {
                    cases.alts.push(match alt {
                        Alt::Ctor { ctor, params, code } => Alt::Ctor {
                            ctor,
                            params,
                            code: self.go(code)?,
                        },
                        Alt::Default(code) => Alt::Default(self.go(code)?),
                    });
                }
                Ok(Code::Cases(cases))
            }
            Code::Jmp(jp, args) => {
                let Some(plan) = self.plans.get(&jp) else {
                    return Ok(Code::Jmp(jp, args));
                };
                let args = args
                    .into_iter()
                    .zip(plan.remove.iter())
                    .filter(|(_, remove)| !**remove)
                    .map(|(arg, _)| arg)
                    .collect();
                Ok(Code::Jmp(jp, args))
            }
            other => Ok(other),
        }
    }
}

///One analyze + reduce sweep.
fn sweep(
    ctx: &mut CompilerCtx,
    params: &[Param],
    value: Code,
) -> Result<(Code, BTreeMap<FVarId, usize>), OptError> {
    let mut analysis = JumpAnalysis::default();
    analysis.scope.add_params(params);
    analysis.go(ctx, &value)?;
    let plans = analysis.into_plans();
    if plans.is_empty() {
        return Ok((value, BTreeMap::new()));
    }

    let mut reducer = JumpReducer {
        ctx,
        plans,
        applied: FVarSubst::new(),
        reduced: BTreeMap::new(),
    };
    let value = reducer.go(value)?;
    Ok((value, reducer.reduced))
}

///Removes join point parameters whose argument is the same at every jump.
pub fn common_join_point_args(
    ctx: &mut CompilerCtx,
    decl: Decl,
    mode: ReduceMode,
) -> Result<(Decl, CommonArgsReport), OptError> {
    let max_sweeps = match mode {
        ReduceMode::SinglePass => 1,
        ReduceMode::Fixpoint { max_iterations } => max_iterations.max(1),
    };

    let Decl {
        name,
        params,
        ty,
        mut value,
    } = decl;
    let mut report = CommonArgsReport::default();
    while report.sweeps < max_sweeps {
        let (new_value, reduced) = sweep(ctx, &params, value)?;
        value = new_value;
        report.sweeps += 1;
        if reduced.is_empty() {
            break;
        }
        for (jp, count) in reduced {
            *report.reduced.entry(jp).or_insert(0) += count;
        }
    }

    #[cfg(feature = "log")]
    log::debug!(
        "{name}: removed {} join point parameters in {} sweeps",
        report.removed_params(),
        report.sweeps
    );

    Ok((
        Decl {
            name,
            params,
            ty,
            value,
        },
        report,
    ))
}
