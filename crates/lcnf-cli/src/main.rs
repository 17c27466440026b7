/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * 2024 Tendsin Mende
 */
//! # LCNF-cli
//!
//! CLI interface to `lcnf-opt`. Reads a list of LCNF declarations in s-expression form, runs the join point passes,
//! and writes the result in the same format.

use std::path::PathBuf;

use clap::Parser;
use lcnf::Decl;
use lcnf_opt::{CommonArgsConfig, Config, OptError, Optimizer, PassConfig, ReduceMode};

#[derive(Parser, Debug)]
#[command(name = "lcnf-cli")]
#[command(version, about, long_about = "Runs the LCNF join point passes on a file of declarations")]
struct Args {
    ///Disables discovery of join points
    #[arg(long, default_value_t = false)]
    no_find: bool,

    ///Disables extension of join point contexts
    #[arg(long, default_value_t = false)]
    no_extend: bool,

    ///Disables the common-argument elimination
    #[arg(long, default_value_t = false)]
    no_common_args: bool,

    ///Repeats the common-argument elimination until nothing changes, but at most N times
    #[arg(long, value_name = "N")]
    fixpoint: Option<usize>,

    ///Checks well-formedness of the input and after each pass
    #[arg(long, default_value_t = false)]
    verify: bool,

    ///Logs what each pass did
    #[arg(long, short, default_value_t = false)]
    trace: bool,

    ///Fails on internal errors, instead of keeping the declaration unoptimized
    #[arg(long, default_value_t = false)]
    abort_on_internal_error: bool,

    ///The file of declarations that gets optimized.
    #[arg()]
    src_file: PathBuf,

    ///Where the result is written. Prints to stdout if not set.
    #[arg()]
    output: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        let pass = |disabled: bool| PassConfig {
            enabled: !disabled,
            trace: self.trace,
        };
        Config {
            find: pass(self.no_find),
            extend: pass(self.no_extend),
            common_args: CommonArgsConfig {
                pass: pass(self.no_common_args),
                mode: match self.fixpoint {
                    Some(max_iterations) => ReduceMode::Fixpoint { max_iterations },
                    None => ReduceMode::SinglePass,
                },
            },
            verify: self.verify,
            abort_on_internal_error: self.abort_on_internal_error,
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let src = std::fs::read_to_string(&args.src_file)
        .map_err(|e| format!("Could not read {:?}: {e}", args.src_file))?;
    let decls: Vec<Decl> = serde_lexpr::from_str(&src)
        .map_err(|e| format!("Could not parse {:?}: {e}", args.src_file))?;
    log::info!("optimizing {} declarations", decls.len());

    let optimized = Optimizer::new(args.config())
        .optimize_decls(decls)
        .map_err(|e: OptError| {
            e.report();
            format!("Optimizing {:?} failed", args.src_file)
        })?;

    let out = serde_lexpr::to_string(&optimized).map_err(|e| format!("Could not serialize result: {e}"))?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, out).map_err(|e| format!("Could not write {path:?}: {e}"))
        }
        None => {
            println!("{out}");
            Ok(())
        }
    }
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
