/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
use lcnf::{check::check_decl, CompilerCtx, Decl};
use rayon::prelude::*;

use crate::{
    passes::{
        common_join_point_args, extend_join_point_context, find_join_points, CommonArgsReport,
        ExtendReport, FindReport,
    },
    Config, OptError, Pass,
};

///What happened to a single declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclReport {
    pub find: Option<FindReport>,
    pub extend: Option<ExtendReport>,
    pub common_args: Option<CommonArgsReport>,
    ///True if an internal error occurred, and the declaration was kept as it was.
    pub downgraded: bool,
}

///Runs the join point passes on declarations.
#[derive(Debug, Clone)]
pub struct Optimizer {
    pub config: Config,
    ///Set by `LCNF_TRACE_ALL`, overrides every pass' trace flag.
    trace_all: bool,
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::new(Config::default())
    }
}

impl Optimizer {
    pub fn new(config: Config) -> Self {
        Optimizer {
            config,
            trace_all: std::env::var("LCNF_TRACE_ALL").is_ok(),
        }
    }

    ///True if `pass` should log what it did.
    pub fn traces(&self, pass: Pass) -> bool {
        self.trace_all || self.config.pass(pass).trace
    }

    ///Optimizes `decl`. See [Optimizer::run_decl_with_report].
    pub fn run_decl(&self, decl: Decl) -> Result<Decl, OptError> {
        self.run_decl_with_report(decl).map(|(decl, _)| decl)
    }

    ///Optimizes `decl`.
    ///
    /// If a pass fails with an internal error, and `abort_on_internal_error` is not set, the
    /// unoptimized declaration is returned instead.
    pub fn run_decl_with_report(&self, decl: Decl) -> Result<(Decl, DeclReport), OptError> {
        if self.config.abort_on_internal_error {
            return self.run_passes(decl);
        }

        let original = decl.clone();
        match self.run_passes(decl) {
            Ok(res) => Ok(res),
            Err(e) if e.is_internal() => {
                #[cfg(feature = "log")]
                log::warn!("keeping {} unoptimized: {e}", original.name);
                Ok((
                    original,
                    DeclReport {
                        downgraded: true,
                        ..Default::default()
                    },
                ))
            }
            Err(e) => Err(e),
        }
    }

    ///Optimizes all `decls` in parallel. The order is preserved. Fails with the first (non-downgraded) error.
    pub fn optimize_decls(&self, decls: Vec<Decl>) -> Result<Vec<Decl>, OptError> {
        decls
            .into_par_iter()
            .map(|decl| self.run_decl(decl))
            .collect()
    }

    fn verify(&self, decl: &Decl, pass: Pass) -> Result<(), OptError> {
        if !self.config.verify {
            return Ok(());
        }
        check_decl(decl).map_err(|error| OptError::VerifyFailed {
            decl: decl.name.clone(),
            pass,
            error,
        })
    }

    fn run_passes(&self, mut decl: Decl) -> Result<(Decl, DeclReport), OptError> {
        if self.config.verify {
            check_decl(&decl).map_err(|error| OptError::InvalidInput {
                decl: decl.name.clone(),
                error,
            })?;
        }
        let mut ctx = CompilerCtx::for_decl(&decl).map_err(|error| OptError::MalformedDecl {
            decl: decl.name.clone(),
            error,
        })?;
        let mut report = DeclReport::default();

        if self.config.find.enabled {
            let (new_decl, find) = find_join_points(&mut ctx, decl)?;
            decl = new_decl;
            self.verify(&decl, Pass::Find)?;
            if self.traces(Pass::Find) {
                #[cfg(feature = "log")]
                log::info!(
                    "[{}] {}: {} join points found, {} calls turned into jumps",
                    Pass::Find,
                    decl.name,
                    find.join_points.len(),
                    find.converted_calls
                );
            }
            report.find = Some(find);
        }

        if self.config.extend.enabled {
            let (new_decl, extend) = extend_join_point_context(&mut ctx, decl)?;
            decl = new_decl;
            self.verify(&decl, Pass::Extend)?;
            if self.traces(Pass::Extend) {
                #[cfg(feature = "log")]
                log::info!(
                    "[{}] {}: {} join points extended by {} parameters",
                    Pass::Extend,
                    decl.name,
                    extend.extended.len(),
                    extend.added_params()
                );
            }
            report.extend = Some(extend);
        }

        if self.config.common_args.pass.enabled {
            let (new_decl, common) =
                common_join_point_args(&mut ctx, decl, self.config.common_args.mode)?;
            decl = new_decl;
            self.verify(&decl, Pass::CommonArgs)?;
            if self.traces(Pass::CommonArgs) {
                #[cfg(feature = "log")]
                log::info!(
                    "[{}] {}: {} parameters removed from {} join points in {} sweeps",
                    Pass::CommonArgs,
                    decl.name,
                    common.removed_params(),
                    common.reduced.len(),
                    common.sweeps
                );
            }
            report.common_args = Some(common);
        }

        Ok((decl, report))
    }
}
