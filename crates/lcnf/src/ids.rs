/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! Identifiers of local binders and global names, as well as the [NameSupply] that hands out fresh ones.

use std::fmt::Display;

///Identifies a local binder (parameter, let, local function or join point). Unique within one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FVarId(pub u32);

impl Display for FVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "_x.{}", self.0)
    }
}

///Name of a global constant, constructor, type or the user facing name of a binder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Name(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name(value.to_owned())
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

///Monotonic source of fresh [FVarId]s and generated binder names.
///
/// There is no global counter. Each declaration gets its own supply (see [CompilerCtx](crate::ctx::CompilerCtx)), which
/// is started after the largest id already used by the declaration.
#[derive(Debug, Clone, Default)]
pub struct NameSupply {
    next_fvar: u32,
    next_jp: u32,
    next_aux: u32,
}

impl NameSupply {
    pub fn new() -> Self {
        Self::default()
    }

    ///Makes sure `id` is never handed out by [Self::fresh_fvar].
    pub fn observe(&mut self, id: FVarId) {
        if id.0 >= self.next_fvar {
            self.next_fvar = id.0 + 1;
        }
    }

    pub fn fresh_fvar(&mut self) -> FVarId {
        let id = FVarId(self.next_fvar);
        self.next_fvar += 1;
        id
    }

    ///Returns a fresh join point name of the form `_jp.<n>`.
    pub fn fresh_jp_name(&mut self) -> Name {
        let name = Name(format!("_jp.{}", self.next_jp));
        self.next_jp += 1;
        name
    }

    ///Returns a fresh name for a compiler generated binder, `_y.<n>`.
    pub fn fresh_aux_name(&mut self) -> Name {
        let name = Name(format!("_y.{}", self.next_aux));
        self.next_aux += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::{FVarId, NameSupply};

    #[test]
    fn observe_skips_used_ids() {
        let mut supply = NameSupply::new();
        supply.observe(FVarId(4));
        supply.observe(FVarId(2));
        assert_eq!(supply.fresh_fvar(), FVarId(5));
        assert_eq!(supply.fresh_fvar(), FVarId(6));
    }

    #[test]
    fn jp_names_are_distinct() {
        let mut supply = NameSupply::new();
        let a = supply.fresh_jp_name();
        let b = supply.fresh_jp_name();
        assert!(a != b);
        assert_eq!(a.as_str(), "_jp.0");
    }
}
