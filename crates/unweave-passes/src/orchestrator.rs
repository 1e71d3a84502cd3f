//! Fixpoint driver.
//!
//! Runs the safe pass list, then the unsafe pass list, committing after each
//! pass, until an iteration makes no progress or the iteration budget runs
//! out. Progress is fingerprint inequality after commit. The decrementing
//! counter is the only cancellation mechanism; it bounds the outer loop, not
//! individual passes.

use tracing::{debug, info};
use unweave_arborist::Arborist;
use unweave_common::ParseError;

use crate::safe::{self, remove_dead_nodes::RemoveDeadNodes};
use crate::semantic;
use crate::{cache, Pass};

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Outer-loop bound. Zero means "no iterations": the result is the
    /// parsed-and-reprinted input.
    pub max_iterations: u32,
    /// Run dead-code cleanup to fixpoint after the main loop.
    pub clean: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_iterations: 100,
            clean: false,
        }
    }
}

/// Deobfuscate a script: parse, iterate the pass lists to fixpoint, reprint.
///
/// The only fatal failure is a parse error on the initial input; everything
/// downstream fails per-candidate or per-pass and keeps going.
pub fn deobfuscate(source: &str, config: &Config) -> Result<String, ParseError> {
    let mut arb = Arborist::new(source)?;
    cache::reset();

    let safe_list = safe::passes();
    let unsafe_list = semantic::passes();

    let mut remaining = config.max_iterations;
    while remaining > 0 {
        remaining -= 1;
        let mut progress = false;

        for pass in &safe_list {
            progress |= pass.run(&mut arb);
        }
        for pass in &unsafe_list {
            progress |= pass.run(&mut arb);
        }

        info!(
            iteration = config.max_iterations - remaining,
            progress, "iteration finished"
        );
        if !progress {
            break;
        }
    }

    if config.clean {
        let cleanup = RemoveDeadNodes;
        loop {
            if !cleanup.run(&mut arb) {
                break;
            }
            debug!("dead-code cleanup made progress; repeating");
        }
    }

    Ok(arb.print())
}
