/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */

//! Config options for the join point optimizer

use crate::Pass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConfig {
    ///If false, the pass is skipped.
    pub enabled: bool,
    ///Logs what the pass found / changed at `info` level.
    pub trace: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        PassConfig {
            enabled: true,
            trace: false,
        }
    }
}

///How often the common argument elimination is applied.
///
/// Removing a parameter substitutes the argument into the join point's body. That can make the arguments of
/// nested jumps equal that weren't before, so a second sweep might remove more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceMode {
    ///One analyze + reduce sweep.
    #[default]
    SinglePass,
    ///Repeats the sweep until nothing changes, but at most `max_iterations` times.
    Fixpoint { max_iterations: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommonArgsConfig {
    pub pass: PassConfig,
    pub mode: ReduceMode,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub find: PassConfig,
    pub extend: PassConfig,
    pub common_args: CommonArgsConfig,
    ///Runs the well-formedness checker on the input and after every pass.
    pub verify: bool,
    ///If false, a declaration whose optimization fails with an internal error is kept unoptimized.
    ///If true, the error is returned.
    pub abort_on_internal_error: bool,
}

impl Config {
    pub fn pass(&self, pass: Pass) -> &PassConfig {
        match pass {
            Pass::Find => &self.find,
            Pass::Extend => &self.extend,
            Pass::CommonArgs => &self.common_args.pass,
        }
    }

    ///Config with every pass disabled.
    pub fn none() -> Self {
        let off = PassConfig {
            enabled: false,
            trace: false,
        };
        Config {
            find: off,
            extend: off,
            common_args: CommonArgsConfig {
                pass: off,
                mode: ReduceMode::SinglePass,
            },
            verify: false,
            abort_on_internal_error: false,
        }
    }
}
