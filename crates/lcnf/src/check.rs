/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Well-formedness checker for declarations.
//!
//! Checks that
//! - every used variable is in scope, and every binder is unique,
//! - join points are only used as jump targets,
//! - every jump targets a join point that is reachable without leaving the current function body,
//! - jumps pass exactly as many arguments as the join point takes.

use ahash::{AHashMap, AHashSet};
use thiserror::Error;

use crate::{
    code::{Arg, Code, Decl, LetValue},
    ids::FVarId,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("{0} is used, but not in scope")]
    Unbound(FVarId),
    #[error("{0} is bound more than once")]
    DuplicateBinder(FVarId),
    #[error("Join point {0} is used as a value")]
    JoinPointAsValue(FVarId),
    #[error("{0} is not a join point that can be jumped to from here")]
    InvalidJumpTarget(FVarId),
    #[error("Jump to {jp} passes {got} arguments, but the join point takes {expected}")]
    JumpArity {
        jp: FVarId,
        expected: usize,
        got: usize,
    },
}

#[derive(Default)]
struct Scope {
    values: AHashSet<FVarId>,
    ///Reachable join points and their arity.
    jps: AHashMap<FVarId, usize>,
}

#[derive(Default)]
struct Checker {
    seen: AHashSet<FVarId>,
    all_jps: AHashSet<FVarId>,
}

///Checks `decl`. Returns the first problem found.
pub fn check_decl(decl: &Decl) -> Result<(), CheckError> {
    let mut checker = Checker::default();
    let mut scope = Scope::default();
    for param in &decl.params {
        checker.bind(param.fvar)?;
        scope.values.insert(param.fvar);
    }
    checker.code(&mut scope, &decl.value)
}

impl Checker {
    fn bind(&mut self, fvar: FVarId) -> Result<(), CheckError> {
        if !self.seen.insert(fvar) {
            return Err(CheckError::DuplicateBinder(fvar));
        }
        Ok(())
    }

    fn use_value(&self, scope: &Scope, fvar: FVarId) -> Result<(), CheckError> {
        if self.all_jps.contains(&fvar) {
            Err(CheckError::JoinPointAsValue(fvar))
        } else if !scope.values.contains(&fvar) {
            Err(CheckError::Unbound(fvar))
        } else {
            Ok(())
        }
    }

    fn use_args(&self, scope: &Scope, args: &[Arg]) -> Result<(), CheckError> {
        for fvar in args.iter().filter_map(Arg::fvar) {
            self.use_value(scope, fvar)?;
        }
        Ok(())
    }

    fn let_value(&self, scope: &Scope, value: &LetValue) -> Result<(), CheckError> {
        let mut result = Ok(());
        value.for_each_fvar(|fvar| {
            if result.is_ok() {
                result = self.use_value(scope, fvar);
            }
        });
        result
    }

    fn code(&mut self, scope: &mut Scope, code: &Code) -> Result<(), CheckError> {
        match code {
            Code::Let(decl, k) => {
                self.let_value(scope, &decl.value)?;
                self.bind(decl.fvar)?;
                scope.values.insert(decl.fvar);
                let res = self.code(scope, k);
                scope.values.remove(&decl.fvar);
                res
            }
            Code::Fun(group, k) => {
                for decl in &group.decls {
                    self.bind(decl.fvar)?;
                    for param in &decl.params {
                        self.bind(param.fvar)?;
                    }
                }

                if group.kind.is_join() {
                    self.all_jps.extend(group.decls.iter().map(|d| d.fvar));
                    for decl in &group.decls {
                        let added = group
                            .decls
                            .iter()
                            .filter(|d| scope.jps.insert(d.fvar, d.arity()).is_none())
                            .map(|d| d.fvar)
                            .collect::<Vec<_>>();
                        scope.values.extend(decl.params.iter().map(|p| p.fvar));
                        let res = self.code(scope, &decl.value);
                        for param in &decl.params {
                            scope.values.remove(&param.fvar);
                        }
                        for jp in added {
                            scope.jps.remove(&jp);
                        }
                        res?;
                    }
                    for decl in &group.decls {
                        scope.jps.insert(decl.fvar, decl.arity());
                    }
                    let res = self.code(scope, k);
                    for decl in &group.decls {
                        scope.jps.remove(&decl.fvar);
                    }
                    res
                } else {
                    //function bodies can't jump out of the function
                    let outer_jps = std::mem::take(&mut scope.jps);
                    let mut res = Ok(());
                    for decl in &group.decls {
                        let mut added = decl.params.iter().map(|p| p.fvar).collect::<Vec<_>>();
                        if group.kind.sees_group() {
                            added.extend(group.decls.iter().map(|d| d.fvar));
                        }
                        scope.values.extend(added.iter().copied());
                        res = self.code(scope, &decl.value);
                        for id in added {
                            scope.values.remove(&id);
                        }
                        if res.is_err() {
                            break;
                        }
                    }
                    scope.jps = outer_jps;
                    res?;

                    scope.values.extend(group.decls.iter().map(|d| d.fvar));
                    let res = self.code(scope, k);
                    for decl in &group.decls {
                        scope.values.remove(&decl.fvar);
                    }
                    res
                }
            }
            Code::Cases(cases) => {
                self.use_value(scope, cases.discr)?;
                for alt in &cases.alts {
                    for param in alt.params() {
                        self.bind(param.fvar)?;
                        scope.values.insert(param.fvar);
                    }
                    let res = self.code(scope, alt.code());
                    for param in alt.params() {
                        scope.values.remove(&param.fvar);
                    }
                    res?;
                }
                Ok(())
            }
            Code::Jmp(jp, args) => {
                let Some(expected) = scope.jps.get(jp) else {
                    return Err(CheckError::InvalidJumpTarget(*jp));
                };
                if *expected != args.len() {
                    return Err(CheckError::JumpArity {
                        jp: *jp,
                        expected: *expected,
                        got: args.len(),
                    });
                }
                self.use_args(scope, args)
            }
            Code::Return(fvar) => self.use_value(scope, *fvar),
            Code::Unreach(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::IrBuilder,
        code::{Arg, Code, Decl, FunKind, LetValue},
        ty::Ty,
    };

    use super::{check_decl, CheckError};

    fn nat() -> Ty {
        Ty::constant("Nat")
    }

    #[test]
    fn accepts_join_point() {
        let mut b = IrBuilder::new();
        let x = b.param("x", nat());
        let xid = x.fvar;
        let jp = b.fvar();
        let y = b.param("y", nat());
        let yid = y.fvar;
        let jp_decl = b.fun_decl(jp, "jp", vec![y], nat(), Code::Return(yid));
        let body = Code::fun_in(FunKind::Join, vec![jp_decl], Code::jmp(jp, [Arg::FVar(xid)]));
        assert_eq!(check_decl(&Decl::new("f", vec![x], nat(), body)), Ok(()));
    }

    #[test]
    fn rejects_jump_from_local_function() {
        let mut b = IrBuilder::new();
        let x = b.param("x", nat());
        let xid = x.fvar;
        let jp = b.fvar();
        let y = b.param("y", nat());
        let yid = y.fvar;
        let jp_decl = b.fun_decl(jp, "jp", vec![y], nat(), Code::Return(yid));
        let g = b.fvar();
        let g_decl = b.fun_decl(g, "g", vec![], nat(), Code::jmp(jp, [Arg::FVar(xid)]));
        let body = Code::fun_in(
            FunKind::Join,
            vec![jp_decl],
            Code::fun_in(FunKind::Nonrec, vec![g_decl], Code::Return(xid)),
        );
        assert_eq!(
            check_decl(&Decl::new("f", vec![x], nat(), body)),
            Err(CheckError::InvalidJumpTarget(jp))
        );
    }

    #[test]
    fn rejects_join_point_as_value() {
        let mut b = IrBuilder::new();
        let jp = b.fvar();
        let y = b.param("y", nat());
        let yid = y.fvar;
        let jp_decl = b.fun_decl(jp, "jp", vec![y], nat(), Code::Return(yid));
        let copy = b.let_decl(
            "c",
            Ty::Any,
            LetValue::FVar {
                fvar: jp,
                args: Default::default(),
            },
        );
        let cid = copy.fvar;
        let body = Code::fun_in(FunKind::Join, vec![jp_decl], Code::let_in(copy, Code::Return(cid)));
        assert_eq!(
            check_decl(&Decl::new("f", vec![], nat(), body)),
            Err(CheckError::JoinPointAsValue(jp))
        );
    }

    #[test]
    fn rejects_wrong_arity_and_unbound() {
        let mut b = IrBuilder::new();
        let jp = b.fvar();
        let y = b.param("y", nat());
        let yid = y.fvar;
        let jp_decl = b.fun_decl(jp, "jp", vec![y], nat(), Code::Return(yid));
        let body = Code::fun_in(FunKind::Join, vec![jp_decl.clone()], Code::jmp(jp, []));
        assert_eq!(
            check_decl(&Decl::new("f", vec![], nat(), body)),
            Err(CheckError::JumpArity {
                jp,
                expected: 1,
                got: 0
            })
        );

        let stray = b.fvar();
        assert_eq!(
            check_decl(&Decl::new("g", vec![], nat(), Code::Return(stray))),
            Err(CheckError::Unbound(stray))
        );
    }
}
