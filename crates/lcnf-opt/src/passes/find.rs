/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Finds local functions that are only ever called in tail position, and turns them into join points.
//!
//! The pass has two phases. The _analysis_ walks the declaration and keeps a map of candidates. A local function is
//! registered as a candidate when it is declared. Every use that is not a tail call (`let r := f args; return r`) with
//! the right number of arguments erases it.
//!
//! A tail call to a candidate `h` from the body of another candidate `f`, where `h` is not in scope of the call
//! (for instance because `h` is declared outside of `f`), is only fine as long as `f` becomes a join point as well.
//! Otherwise the call would jump out of a function body. We record `h` as _associated_ with `f`, and erasing `f` erases `h`
//! as well.
//!
//! The _replace_ phase moves the surviving candidates into join groups, and turns their tail calls into jumps.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use lcnf::{
    Arg, Code, CompilerCtx, Decl, FVarId, FunDecl, FunGroup, FunKind, LetDecl, LetValue, Name, Ty,
};

use crate::{
    scope::{ScopeTracker, Scoped},
    OptError, Pass,
};

#[derive(Debug, Clone, Default)]
pub struct CandidateInfo {
    ///Number of arguments every tail call has to pass.
    pub arity: usize,
    ///Candidates that must be erased if this one is erased.
    pub associated: AHashSet<FVarId>,
}

///What [find_join_points] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindReport {
    ///Functions that became join points, and their arity.
    pub join_points: BTreeMap<FVarId, usize>,
    ///Number of tail calls that were turned into jumps.
    pub converted_calls: usize,
}

#[derive(Debug, Default)]
pub struct JoinPointFinder {
    scope: ScopeTracker,
    candidates: AHashMap<FVarId, CandidateInfo>,
    ///Everything that was erased once. Those are never registered again.
    erased: AHashSet<FVarId>,
    ///Names of the function group whose bodies are currently analyzed.
    pending: AHashSet<FVarId>,
    ///Candidate whose body we are in.
    current: Option<FVarId>,
}

impl Scoped for JoinPointFinder {
    const PASS: Pass = Pass::Find;
    fn scope(&mut self) -> &mut ScopeTracker {
        &mut self.scope
    }
}

impl JoinPointFinder {
    ///Analyzes `decl` and returns all join point candidates that survived, with their arity.
    pub fn find(decl: &Decl) -> Result<BTreeMap<FVarId, usize>, OptError> {
        let mut finder = JoinPointFinder::default();
        finder.scope.add_params(&decl.params);
        finder.go(&decl.value)?;
        if finder.scope.depth() != 0 {
            return Err(OptError::internal(
                Pass::Find,
                format!("{} scopes left open after analysis", finder.scope.depth()),
            ));
        }

        Ok(finder
            .candidates
            .into_iter()
            .map(|(fvar, info)| (fvar, info.arity))
            .collect())
    }

    fn add_candidate(&mut self, fvar: FVarId, arity: usize) {
        if self.erased.contains(&fvar) {
            return;
        }
        self.candidates.insert(
            fvar,
            CandidateInfo {
                arity,
                associated: AHashSet::default(),
            },
        );
    }

    ///Erases `fvar` and, transitively, everything associated with it.
    fn erase_candidate(&mut self, fvar: FVarId) {
        let mut worklist = vec![fvar];
        while let Some(next) = worklist.pop() {
            if !self.erased.insert(next) {
                continue;
            }
            if let Some(info) = self.candidates.remove(&next) {
                #[cfg(feature = "log")]
                log::trace!("erased join point candidate {next}");
                worklist.extend(info.associated);
            }
        }
    }

    ///Makes `src` depend on `target`. If `target` is no candidate (anymore), `src` is erased right away.
    fn add_dependency(&mut self, src: FVarId, target: FVarId) {
        if let Some(info) = self.candidates.get_mut(&target) {
            info.associated.insert(src);
        } else {
            self.erase_candidate(src);
        }
    }

    fn erase_in_args(&mut self, args: &[Arg]) {
        for fvar in args.iter().filter_map(Arg::fvar) {
            self.erase_candidate(fvar);
        }
    }

    fn erase_in_value(&mut self, value: &LetValue) {
        let mut used = Vec::new();
        value.for_each_fvar(|fvar| used.push(fvar));
        for fvar in used {
            self.erase_candidate(fvar);
        }
    }

    fn depend_on_current(&mut self, callee: FVarId) {
        if self.scope.contains(callee) {
            return;
        }
        if let Some(current) = self.current {
            self.add_dependency(callee, current);
        }
    }

    fn visit_tail_call(&mut self, callee: FVarId, arity: usize) {
        match self.candidates.get(&callee) {
            Some(info) if info.arity != arity => self.erase_candidate(callee),
            Some(_) => self.depend_on_current(callee),
            None if self.pending.contains(&callee) && !self.erased.contains(&callee) => {
                //sibling (or self) of the group we are in, that was not declared yet
                self.add_candidate(callee, arity);
                self.depend_on_current(callee);
            }
            None => self.erase_candidate(callee),
        }
    }

    fn go_fun_group(&mut self, group: &FunGroup) -> Result<(), OptError> {
        if group.kind.is_join() {
            for decl in &group.decls {
                self.with_backtracking_scope(|this| {
                    for sibling in &group.decls {
                        this.scope.add(sibling.fvar);
                    }
                    this.scope.add_params(&decl.params);
                    this.go(&decl.value)
                })?;
            }
            return Ok(());
        }

        for decl in &group.decls {
            self.pending.insert(decl.fvar);
        }

        for decl in &group.decls {
            match self.candidates.get(&decl.fvar) {
                Some(info) if info.arity != decl.arity() => self.erase_candidate(decl.fvar),
                Some(_) => {}
                None => self.add_candidate(decl.fvar, decl.arity()),
            }

            let outer = self.current.replace(decl.fvar);
            let res = self.with_new_scope(|this| {
                this.scope.add_params(&decl.params);
                this.go(&decl.value)
            });
            self.current = outer;
            res?;
        }

        for decl in &group.decls {
            self.pending.remove(&decl.fvar);
        }
        Ok(())
    }

    fn go(&mut self, code: &Code) -> Result<(), OptError> {
        match code {
            Code::Let(decl, k) => {
                if let Some(call) = code.as_tail_call() {
                    self.erase_in_args(call.args);
                    self.visit_tail_call(call.callee, call.args.len());
                    return Ok(());
                }
                self.erase_in_value(&decl.value);
                self.scope.add(decl.fvar);
                self.go(k)
            }
            Code::Fun(group, k) => {
                self.go_fun_group(group)?;
                for decl in &group.decls {
                    self.scope.add(decl.fvar);
                }
                self.go(k)
            }
            Code::Cases(cases) => {
                self.erase_candidate(cases.discr);
                for alt in &cases.alts {
                    self.with_backtracking_scope(|this| {
                        this.scope.add_params(alt.params());
                        this.go(alt.code())
                    })?;
                }
                Ok(())
            }
            Code::Jmp(_, args) => {
                self.erase_in_args(args);
                Ok(())
            }
            Code::Return(fvar) => {
                self.erase_candidate(*fvar);
                Ok(())
            }
            Code::Unreach(_) => Ok(()),
        }
    }
}

///Rewrites the surviving candidates into join points.
struct JoinPointReplacer<'a> {
    ctx: &'a mut CompilerCtx,
    ///Survivors and their new names.
    renamed: AHashMap<FVarId, Name>,
    converted_calls: usize,
}

impl<'a> JoinPointReplacer<'a> {
    fn go(&mut self, code: Code) -> Code {
        match code {
            Code::Let(decl, k) => match decl.value {
                LetValue::FVar { fvar: callee, ref args }
                    if self.renamed.contains_key(&callee)
                        && matches!(k.as_ref(), Code::Return(ret) if *ret == decl.fvar) =>
                {
                    //the result variable is gone with the call
                    self.ctx.erase_let_decl(&decl);
                    self.converted_calls += 1;
                    Code::Jmp(callee, args.clone())
                }
                value => Code::Let(LetDecl { value, ..decl }, Box::new(self.go(*k))),
            },
            Code::Fun(group, k) => {
                let k = self.go(*k);
                if group.kind.is_join() {
                    let decls = group.decls.into_iter().map(|d| self.go_decl(d)).collect();
                    return Code::Fun(FunGroup { kind: group.kind, decls }, Box::new(k));
                }

                let mut funs = Vec::with_capacity(group.decls.len());
                let mut jps = Vec::new();
                for decl in group.decls {
                    let mut decl = self.go_decl(decl);
                    if let Some(name) = self.renamed.get(&decl.fvar) {
                        decl.binder_name = name.clone();
                        self.ctx.update_fun_decl(&decl, FunKind::Join);
                        jps.push(decl);
                    } else {
                        funs.push(decl);
                    }
                }

                let inner = if jps.is_empty() {
                    k
                } else {
                    Code::fun_in(FunKind::Join, jps, k)
                };
                if funs.is_empty() {
                    inner
                } else {
                    Code::fun_in(group.kind, funs, inner)
                }
            }
            Code::Cases(mut cases) => {
                for alt in cases.alts.iter_mut() {
                    let code = std::mem::replace(alt.code_mut(), Code::Unreach(Ty::Erased));
                    *alt.code_mut() = self.go(code);
                }
                Code::Cases(cases)
            }
            other => other,
        }
    }

    fn go_decl(&mut self, mut decl: FunDecl) -> FunDecl {
        let value = std::mem::replace(&mut decl.value, Code::Unreach(Ty::Erased));
        decl.value = self.go(value);
        decl
    }
}

///Turns every local function of `decl` that is only ever tail-called (from places a jump could reach it) into a join point.
pub fn find_join_points(ctx: &mut CompilerCtx, decl: Decl) -> Result<(Decl, FindReport), OptError> {
    let join_points = JoinPointFinder::find(&decl)?;
    if join_points.is_empty() {
        return Ok((decl, FindReport::default()));
    }

    let mut renamed = AHashMap::default();
    //BTreeMap order keeps fresh names deterministic
    for fvar in join_points.keys() {
        renamed.insert(*fvar, ctx.mk_fresh_jp_name());
    }

    let mut replacer = JoinPointReplacer {
        ctx,
        renamed,
        converted_calls: 0,
    };
    let Decl {
        name,
        params,
        ty,
        value,
    } = decl;
    let value = replacer.go(value);
    let converted_calls = replacer.converted_calls;

    #[cfg(feature = "log")]
    log::debug!(
        "{name}: {} join points, {converted_calls} jumps",
        join_points.len()
    );

    Ok((
        Decl {
            name,
            params,
            ty,
            value,
        },
        FindReport {
            join_points,
            converted_calls,
        },
    ))
}
