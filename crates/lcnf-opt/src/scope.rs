/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Lexical scope tracking shared by the passes.
//!
//! A [ScopeTracker] knows which variables are visible at the current point of a traversal. Frames come in two
//! flavours:
//!
//! - _fresh_ frames start with an empty scope (used when entering a function body, or a join point body
//!   for which we want to know what it uses from the outside),
//! - _backtracking_ frames keep what is visible, and forget everything added within the frame once it is popped.

use ahash::AHashSet;
use lcnf::{FVarId, Param};

use crate::{OptError, Pass};

#[derive(Debug)]
enum Frame {
    ///Scope that was visible before the frame was pushed.
    Fresh(AHashSet<FVarId>),
    ///Variables added since the frame was pushed.
    Backtracking(Vec<FVarId>),
}

#[derive(Debug, Default)]
pub struct ScopeTracker {
    visible: AHashSet<FVarId>,
    frames: Vec<Frame>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fvar: FVarId) {
        if self.visible.insert(fvar) {
            if let Some(Frame::Backtracking(added)) = self.frames.last_mut() {
                added.push(fvar);
            }
        }
    }

    pub fn add_params(&mut self, params: &[Param]) {
        for param in params {
            self.add(param.fvar);
        }
    }

    pub fn contains(&self, fvar: FVarId) -> bool {
        self.visible.contains(&fvar)
    }

    ///Copy of everything currently visible.
    pub fn snapshot(&self) -> AHashSet<FVarId> {
        self.visible.clone()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_fresh(&mut self) {
        let outer = std::mem::take(&mut self.visible);
        self.frames.push(Frame::Fresh(outer));
    }

    pub fn push_backtracking(&mut self) {
        self.frames.push(Frame::Backtracking(Vec::new()));
    }

    ///Restores the scope that was visible before the last push.
    #[track_caller]
    pub fn pop(&mut self, pass: Pass) -> Result<(), OptError> {
        match self.frames.pop() {
            Some(Frame::Fresh(outer)) => self.visible = outer,
            Some(Frame::Backtracking(added)) => {
                for fvar in added {
                    self.visible.remove(&fvar);
                }
            }
            None => return Err(OptError::internal(pass, "popped more scopes than were pushed")),
        }
        Ok(())
    }
}

///Implemented by pass states that carry a [ScopeTracker].
pub trait Scoped: Sized {
    const PASS: Pass;

    fn scope(&mut self) -> &mut ScopeTracker;

    ///Runs `f` within a fresh scope.
    fn with_new_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, OptError>,
    ) -> Result<T, OptError> {
        self.scope().push_fresh();
        let res = f(self);
        self.scope().pop(Self::PASS)?;
        res
    }

    ///Runs `f` within a backtracking scope.
    fn with_backtracking_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, OptError>,
    ) -> Result<T, OptError> {
        self.scope().push_backtracking();
        let res = f(self);
        self.scope().pop(Self::PASS)?;
        res
    }
}

#[cfg(test)]
mod tests {
    use lcnf::FVarId;

    use super::ScopeTracker;
    use crate::Pass;

    #[test]
    fn backtracking_forgets_additions() {
        let mut scope = ScopeTracker::new();
        scope.add(FVarId(0));
        scope.push_backtracking();
        scope.add(FVarId(0));
        scope.add(FVarId(1));
        assert!(scope.contains(FVarId(1)));
        scope.pop(Pass::Find).unwrap();
        assert!(scope.contains(FVarId(0)));
        assert!(!scope.contains(FVarId(1)));
    }

    #[test]
    fn fresh_hides_outer() {
        let mut scope = ScopeTracker::new();
        scope.add(FVarId(0));
        scope.push_backtracking();
        scope.push_fresh();
        assert!(!scope.contains(FVarId(0)));
        scope.add(FVarId(2));
        scope.pop(Pass::Find).unwrap();
        assert!(scope.contains(FVarId(0)));
        assert!(!scope.contains(FVarId(2)));
        scope.pop(Pass::Find).unwrap();
        assert_eq!(scope.depth(), 0);
        assert!(scope.pop(Pass::Find).is_err());
    }
}
