//! Walkthrough: build a block map and a cyclic map, three vectors over them,
//! apply scaled updates and print the resulting norms.
//!
//! The routine checks its own assumptions about the maps and reports a
//! violated one as [`DistError::Logic`].

use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algs::communicator::Communicator;
use crate::data::map::{GlobalOrdinal, LocalGlobal, Map};
use crate::data::vector::Vector;
use crate::dist_error::DistError;

/// Environment variable naming an optional JSON file with a [`DemoConfig`].
pub const CONFIG_ENV: &str = "DISTVEC_CONFIG";

/// Parameters of [`example_routine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Elements owned by every rank; the global count is `P * elements_per_proc`.
    pub elements_per_proc: usize,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Seed for `z`; `None` uses the vector's default stream.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    #[allow(clippy::approx_constant)]
    fn default() -> Self {
        DemoConfig {
            elements_per_proc: 5,
            alpha: 3.14159,
            beta: 2.71828,
            gamma: -10.0,
            seed: None,
        }
    }
}

impl DemoConfig {
    /// Parse and [`validate`](Self::validate) a JSON config.
    pub fn from_json(text: &str) -> Result<Self, DistError> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| DistError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no process count can run with.
    pub fn validate(&self) -> Result<(), DistError> {
        if GlobalOrdinal::try_from(self.elements_per_proc).is_err() {
            return Err(DistError::Config(format!(
                "elements_per_proc = {} does not fit a global index",
                self.elements_per_proc
            )));
        }
        for (name, v) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)] {
            if !v.is_finite() {
                return Err(DistError::Config(format!("{name} = {v} is not finite")));
            }
        }
        Ok(())
    }

    /// Global element count for `num_procs` ranks.
    ///
    /// # Errors
    /// `Config` if `num_procs * elements_per_proc` overflows a global index.
    pub fn num_global_elements(&self, num_procs: usize) -> Result<u64, DistError> {
        num_procs
            .checked_mul(self.elements_per_proc)
            .and_then(|n| GlobalOrdinal::try_from(n).ok())
            .map(|n| n as u64)
            .ok_or_else(|| {
                DistError::Config(format!(
                    "{num_procs} ranks x {} elements overflows the global index range",
                    self.elements_per_proc
                ))
            })
    }

    /// Read the file named by [`CONFIG_ENV`], or use defaults if it is unset.
    pub fn from_env() -> Result<Self, DistError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    DistError::Config(format!("{}: {e}", path.to_string_lossy()))
                })?;
                Self::from_json(&text)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Injectable diagnostic step run right after the version banner.
pub trait DiagnosticHook {
    fn run(&mut self, out: &mut dyn Write) -> Result<(), DistError>;
}

impl<F> DiagnosticHook for F
where
    F: FnMut(&mut dyn Write) -> Result<(), DistError>,
{
    fn run(&mut self, out: &mut dyn Write) -> Result<(), DistError> {
        self(out)
    }
}

/// Everything [`example_routine`] computed, identical on every rank.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoReport {
    pub num_global_elements: u64,
    pub cyclic_is_contiguous: bool,
    pub maps_are_same: bool,
    pub norm_x: f64,
    pub norm_y: f64,
    pub norm_z: f64,
    pub x: Vector<f64>,
    pub y: Vector<f64>,
    pub z: Vector<f64>,
}

/// Global indices `rank + k * P` for `k in 0..per_proc`.
pub fn cyclic_indices(rank: usize, num_procs: usize, per_proc: usize) -> Vec<GlobalOrdinal> {
    (0..per_proc)
        .map(|k| (rank + k * num_procs) as GlobalOrdinal)
        .collect()
}

fn ensure(cond: bool, msg: &str) -> Result<(), DistError> {
    if cond {
        Ok(())
    } else {
        Err(DistError::Logic(msg.to_string()))
    }
}

/// Run the walkthrough on every rank of `comm`, writing to `out`.
///
/// Collective: every rank must call it with the same `config`.
pub fn example_routine<C>(
    comm: &C,
    out: &mut dyn Write,
    config: &DemoConfig,
    hook: Option<&mut dyn DiagnosticHook>,
) -> Result<DemoReport, DistError>
where
    C: Communicator + ?Sized,
{
    writeln!(out, "{}", crate::version())?;
    writeln!(out)?;
    if let Some(hook) = hook {
        hook.run(out)?;
    }

    let num_procs = comm.size();
    let num_global = config.num_global_elements(num_procs)?;
    let index_base: GlobalOrdinal = 0;

    let contig_map = Arc::new(Map::new(
        num_global,
        index_base,
        comm,
        LocalGlobal::GloballyDistributed,
    )?);
    ensure(
        contig_map.is_contiguous(),
        "The supposedly contiguous Map isn't contiguous.",
    )?;

    let cyclic_map = Arc::new(Map::from_global_indices(
        Some(num_global),
        &cyclic_indices(comm.rank(), num_procs, config.elements_per_proc),
        index_base,
        comm,
    )?);
    ensure(
        !(num_procs > 1 && cyclic_map.is_contiguous()),
        "The cyclic Map claims to be contiguous.",
    )?;
    ensure(
        contig_map.is_compatible(&cyclic_map, comm),
        "contigMap should be compatible with cyclicMap, but it's not.",
    )?;
    let maps_are_same = contig_map.is_same_as(&cyclic_map, comm);
    ensure(
        !(num_procs > 1 && maps_are_same),
        "contigMap and cyclicMap should differ when more than one process participates.",
    )?;
    log::info!("rank {}: maps built ({contig_map}; {cyclic_map})", comm.rank());

    let mut x = Vector::<f64>::new(Arc::clone(&contig_map));
    let mut y = x.clone();
    let mut z = Vector::<f64>::with_zero_out(Arc::clone(&contig_map), false);
    match config.seed {
        Some(seed) => z.randomize_with_seed(seed),
        None => z.randomize(),
    }

    x.put_scalar(1.0);
    // x = beta*x + alpha*z
    x.update(config.alpha, &z, config.beta)?;

    y.put_scalar(42.0);
    // y = gamma*y + alpha*x + beta*z
    y.update2(config.alpha, &x, config.beta, &z, config.gamma)?;

    let norm_y = y.norm2(comm);
    writeln!(out, "Norm of y: {norm_y}")?;
    let norm_x = x.norm2(comm);
    writeln!(out, "Norm of x: {norm_x}")?;
    let norm_z = z.norm2(comm);
    writeln!(out, "Norm of z: {norm_z}")?;
    log::info!("rank {}: example routine finished", comm.rank());

    Ok(DemoReport {
        num_global_elements: num_global,
        cyclic_is_contiguous: cyclic_map.is_contiguous(),
        maps_are_same,
        norm_x,
        norm_y,
        norm_z,
        x,
        y,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::ThreadComm;

    #[test]
    fn cyclic_indices_round_robin() {
        assert_eq!(cyclic_indices(1, 3, 4), vec![1, 4, 7, 10]);
        assert_eq!(cyclic_indices(0, 1, 3), vec![0, 1, 2]);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg = DemoConfig::from_json(r#"{ "elements_per_proc": 8, "seed": 3 }"#).unwrap();
        assert_eq!(cfg.elements_per_proc, 8);
        assert_eq!(cfg.seed, Some(3));
        assert_eq!(cfg.gamma, -10.0);
    }

    #[test]
    fn oversized_per_proc_is_rejected_when_parsed() {
        let err = DemoConfig::from_json(r#"{ "elements_per_proc": 9223372036854775809 }"#)
            .unwrap_err();
        assert!(matches!(err, DistError::Config(_)));
    }

    #[test]
    fn global_count_overflow_is_a_config_error() {
        let cfg = DemoConfig {
            elements_per_proc: usize::MAX / 2 + 1,
            ..DemoConfig::default()
        };
        assert!(matches!(cfg.num_global_elements(2), Err(DistError::Config(_))));
        let cfg = DemoConfig {
            elements_per_proc: 1 << 62,
            ..DemoConfig::default()
        };
        assert!(matches!(cfg.num_global_elements(2), Err(DistError::Config(_))));
        assert_eq!(DemoConfig::default().num_global_elements(4), Ok(20));
    }

    #[test]
    fn overflowing_run_fails_on_every_rank_without_panicking() {
        let cfg = DemoConfig {
            elements_per_proc: usize::MAX / 2 + 1,
            ..DemoConfig::default()
        };
        let out = ThreadComm::run(2, |comm| {
            example_routine(&comm, &mut std::io::sink(), &cfg, None).unwrap_err()
        });
        assert!(out.iter().all(|e| matches!(e, DistError::Config(_))));
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let err = DemoConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, DistError::Config(_)));
    }
}
