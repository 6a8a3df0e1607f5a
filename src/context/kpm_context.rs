//! KPM engine: Green's functions and local density of states of a model's Hamiltonian.
//!
//! This module provides the [`Kpm`] struct, the entry point of the crate. An engine owns a
//! model, a configuration and a moment backend (host or accelerator, fixed at construction).
//! Per-operator state (bounds, rescaling, prepared adapters) lives in a shared session that is
//! rebuilt whenever the model hands out a different operator.
//!
//! # Usage
//!
//! 1. Build a model (e.g. [`TightBindingModel`](crate::model::TightBindingModel)) and a
//!    [`KpmConfig`].
//! 2. Create the engine with [`Kpm::new`] or [`Kpm::new_cuda`].
//! 3. Call [`Kpm::green_element`], [`Kpm::ldos`], or build deferred units with
//!    [`Kpm::deferred_ldos`] and run them on a [`ParallelDispatcher`].
//!
//! Index, site and configuration errors are raised before any recursion work starts. Numeric
//! divergence (underestimated energy bounds) is not an error: it shows up as non-finite values,
//! is flagged in the report and logged as a warning.
//!
//! # References
//! - Weiße, Wellein, Alvermann, Fehske (2006). The kernel polynomial method. Rev. Mod. Phys. 78, 275.

use crate::backend::{self, CpuBackend, MomentBackend};
use crate::config::{KpmConfig, OptimizationLevel};
use crate::context::report::{Computation, KpmReport};
use crate::context::session::Session;
use crate::core::traits::{HamiltonianModel, Scalar};
use crate::error::{KpmError, Result};
use crate::kernel::{KernelReconstructor, moments_diverged, required_moments};
use crate::parallel::{Deferred, ParallelDispatcher};
use crate::results::Ldos;
use crate::system::SiteLocator;
use num_complex::Complex64;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Site selector for LDOS requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteQuery {
    pub position: [f64; 3],
    pub sublattice: Option<u16>,
}

impl SiteQuery {
    pub fn new(position: [f64; 3], sublattice: Option<u16>) -> Self {
        Self { position, sublattice }
    }
}

/// Everything one request needs, detached from the engine so it can run on another thread.
struct Worker<S: Scalar> {
    session: Arc<Session<S>>,
    backend: Arc<dyn MomentBackend<S>>,
    config: KpmConfig,
}

/// Outcome of one matrix element.
struct Element {
    values: Vec<Complex64>,
    num_moments: usize,
    applies: usize,
}

impl<S: Scalar> Worker<S> {
    fn check_index(&self, index: usize) -> Result<()> {
        let dim = self.session.dim();
        if index >= dim {
            return Err(KpmError::InvalidIndex { index, dim });
        }
        Ok(())
    }

    /// Validate a request without doing any recursion work.
    fn check_request(&self, row: usize, col: usize, broadening: f64) -> Result<usize> {
        self.check_index(row)?;
        self.check_index(col)?;
        required_moments(self.config.lambda, self.session.scaling().a, broadening)
    }

    fn reconstructor(&self) -> KernelReconstructor {
        KernelReconstructor::new(self.session.scaling(), self.config.kernel)
    }

    fn moments(&self, row: usize, col: usize, num_moments: usize) -> Result<(Vec<Complex64>, usize)> {
        let series = self.backend.moments(&self.session, row, col, num_moments)?;
        Ok((series.values, series.applies))
    }

    fn green(&self, row: usize, col: usize, energies: &[f64], num_moments: usize) -> Result<Element> {
        let (moments, applies) = self.moments(row, col, num_moments)?;
        Ok(Element {
            values: self.reconstructor().green(&moments, energies),
            num_moments,
            applies,
        })
    }

    fn ldos(&self, site: usize, energies: &[f64], num_moments: usize) -> Result<(Ldos, usize)> {
        let (moments, applies) = self.moments(site, site, num_moments)?;
        let values = self.reconstructor().ldos(&moments, energies);
        Ok((Ldos::new(energies.to_vec(), values)?, applies))
    }

    fn report(&self, computation: Computation, num_moments: usize, requests: usize, applies: usize, elapsed: Duration, diverged: bool) -> KpmReport {
        if diverged {
            log::warn!(
                "{} produced non-finite values; energy bounds [{}, {}] are likely too small",
                computation,
                self.session.bounds().min,
                self.session.bounds().max
            );
        }
        KpmReport {
            computation,
            num_moments,
            requests,
            applies,
            elapsed,
            optimization_level: self.backend.optimization_level(),
            backend: self.backend.name(),
            bounds: self.session.bounds(),
            scaling: self.session.scaling(),
            lanczos_iterations: self.session.lanczos().map(|s| s.iterations),
            diverged,
        }
    }
}

/// Kernel polynomial method engine over a Hamiltonian model.
pub struct Kpm<M: HamiltonianModel> {
    model: M,
    config: KpmConfig,
    backend: Arc<dyn MomentBackend<M::Scalar>>,
    session: Mutex<Arc<Session<M::Scalar>>>,
    last_report: Mutex<Option<KpmReport>>,
    dispatcher: OnceLock<ParallelDispatcher>,
}

impl<M: HamiltonianModel> Kpm<M> {
    /// Host engine. Fails on an invalid configuration or operator; estimates the energy bounds
    /// unless `config.energy_bounds` is set.
    pub fn new(model: M, config: KpmConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn MomentBackend<M::Scalar>> = Arc::new(CpuBackend::new(config.optimization_level));
        Self::with_backend(model, config, backend)
    }

    /// Accelerator engine; `UnsupportedBackend` when the crate was built without `cuda` or no
    /// device is usable. Levels above the device's best fall back to it.
    pub fn new_cuda(model: M, config: KpmConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn MomentBackend<M::Scalar>> = Arc::from(backend::device_backend(config.optimization_level)?);
        Self::with_backend(model, config, backend)
    }

    fn with_backend(model: M, config: KpmConfig, backend: Arc<dyn MomentBackend<M::Scalar>>) -> Result<Self> {
        let session = Arc::new(Session::new(model.hamiltonian(), &config)?);
        log::info!(
            "kpm engine: {} backend, optimization level {}, kernel {}",
            backend.name(),
            backend.optimization_level(),
            config.kernel.name()
        );
        Ok(Self {
            model,
            config,
            backend,
            session: Mutex::new(session),
            last_report: Mutex::new(None),
            dispatcher: OnceLock::new(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Replace the model. Bounds are re-estimated for the new operator (unless fixed in the
    /// config); on error the engine keeps its previous model.
    pub fn set_model(&mut self, model: M) -> Result<()> {
        let session = Arc::new(Session::new(model.hamiltonian(), &self.config)?);
        self.model = model;
        *self.session.lock() = session;
        *self.last_report.lock() = None;
        Ok(())
    }

    pub fn config(&self) -> &KpmConfig {
        &self.config
    }

    /// Level the backend actually runs at.
    pub fn optimization_level(&self) -> OptimizationLevel {
        self.backend.optimization_level()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Session for the model's current operator, rebuilt if the operator changed.
    pub fn session(&self) -> Result<Arc<Session<M::Scalar>>> {
        let operator = self.model.hamiltonian();
        let mut guard = self.session.lock();
        if !guard.is_current(&operator) {
            log::info!("model operator changed, rebuilding kpm session");
            *guard = Arc::new(Session::new(operator, &self.config)?);
        }
        Ok(Arc::clone(&guard))
    }

    fn worker(&self) -> Result<Worker<M::Scalar>> {
        Ok(Worker {
            session: self.session()?,
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        })
    }

    fn record(&self, report: KpmReport) {
        *self.last_report.lock() = Some(report);
    }

    /// Raw Chebyshev moments `μ_n = <i| T_n(H') |j>` for the given broadening.
    pub fn moments(&self, i: usize, j: usize, broadening: f64) -> Result<Vec<Complex64>> {
        let worker = self.worker()?;
        let num_moments = worker.check_request(i, j, broadening)?;
        let start = Instant::now();
        let (moments, applies) = worker.moments(i, j, num_moments)?;
        let diverged = moments_diverged(&moments);
        self.record(worker.report(Computation::Moments, num_moments, 1, applies, start.elapsed(), diverged));
        Ok(moments)
    }

    /// Green's function element `G_ij(E)` at each energy.
    pub fn green_element(&self, i: usize, j: usize, energies: &[f64], broadening: f64) -> Result<Vec<Complex64>> {
        let (values, report) = self.green_element_with_report(i, j, energies, broadening)?;
        self.record(report);
        Ok(values)
    }

    /// Like [`Kpm::green_element`], also returning this request's report.
    pub fn green_element_with_report(
        &self,
        i: usize,
        j: usize,
        energies: &[f64],
        broadening: f64,
    ) -> Result<(Vec<Complex64>, KpmReport)> {
        let worker = self.worker()?;
        let num_moments = worker.check_request(i, j, broadening)?;
        let start = Instant::now();
        let element = worker.green(i, j, energies, num_moments)?;
        let diverged = element.values.iter().any(|v| !v.is_finite());
        let report = worker.report(
            Computation::GreenElement,
            element.num_moments,
            1,
            element.applies,
            start.elapsed(),
            diverged,
        );
        Ok((element.values, report))
    }

    /// Matrix index of the site nearest to `position`.
    pub fn locate(&self, position: [f64; 3], sublattice: Option<u16>) -> Result<usize> {
        SiteLocator::new(self.model.system()).find_nearest(position, sublattice)
    }

    /// Local density of states at the site nearest to `position`.
    pub fn ldos(&self, energies: &[f64], broadening: f64, position: [f64; 3], sublattice: Option<u16>) -> Result<Ldos> {
        let (ldos, report) = self.ldos_with_report(energies, broadening, position, sublattice)?;
        self.record(report);
        Ok(ldos)
    }

    /// Like [`Kpm::ldos`], also returning this request's report.
    pub fn ldos_with_report(
        &self,
        energies: &[f64],
        broadening: f64,
        position: [f64; 3],
        sublattice: Option<u16>,
    ) -> Result<(Ldos, KpmReport)> {
        let site = self.locate(position, sublattice)?;
        let worker = self.worker()?;
        let num_moments = worker.check_request(site, site, broadening)?;
        let start = Instant::now();
        let (ldos, applies) = worker.ldos(site, energies, num_moments)?;
        let diverged = ldos.values().iter().any(|v| !v.is_finite());
        let report = worker.report(Computation::Ldos, num_moments, 1, applies, start.elapsed(), diverged);
        Ok((ldos, report))
    }

    /// LDOS packaged as a deferred unit. The site, bounds and moment count are resolved now;
    /// the recursion runs when the unit is computed.
    pub fn deferred_ldos(
        &self,
        energies: &[f64],
        broadening: f64,
        position: [f64; 3],
        sublattice: Option<u16>,
    ) -> Result<Deferred<Ldos>> {
        Ok(self.ldos_unit(energies, broadening, position, sublattice)?.map(|(ldos, _)| ldos))
    }

    /// Green's function element packaged as a deferred unit.
    pub fn deferred_green(&self, i: usize, j: usize, energies: &[f64], broadening: f64) -> Result<Deferred<Vec<Complex64>>> {
        Ok(self.green_unit(i, j, energies, broadening)?.map(|(values, _)| values))
    }

    /// Deferred LDOS that also yields its sparse-apply count.
    fn ldos_unit(
        &self,
        energies: &[f64],
        broadening: f64,
        position: [f64; 3],
        sublattice: Option<u16>,
    ) -> Result<Deferred<(Ldos, usize)>> {
        let site = self.locate(position, sublattice)?;
        let worker = self.worker()?;
        let num_moments = worker.check_request(site, site, broadening)?;
        let energies = energies.to_vec();
        Ok(Deferred::new(format!("ldos site {}", site), move || {
            let (ldos, applies) = worker.ldos(site, &energies, num_moments)?;
            if ldos.values().iter().any(|v| !v.is_finite()) {
                log::warn!("deferred ldos at site {} produced non-finite values", site);
            }
            Ok((ldos, applies))
        }))
    }

    fn green_unit(&self, i: usize, j: usize, energies: &[f64], broadening: f64) -> Result<Deferred<(Vec<Complex64>, usize)>> {
        let worker = self.worker()?;
        let num_moments = worker.check_request(i, j, broadening)?;
        let energies = energies.to_vec();
        Ok(Deferred::new(format!("green ({}, {})", i, j), move || {
            let element = worker.green(i, j, &energies, num_moments)?;
            Ok((element.values, element.applies))
        }))
    }

    /// Dispatcher used by the batched entry points, started on first use.
    ///
    /// Cancelling it stops the batch in flight; the next batch call resets it and runs normally.
    pub fn dispatcher(&self) -> Result<&ParallelDispatcher> {
        if let Some(d) = self.dispatcher.get() {
            return Ok(d);
        }
        let d = ParallelDispatcher::new(None)?;
        Ok(self.dispatcher.get_or_init(|| d))
    }

    /// LDOS for several sites in parallel; results follow the order of `sites`.
    pub fn ldos_batch(&self, energies: &[f64], broadening: f64, sites: &[SiteQuery]) -> Result<Vec<Ldos>> {
        let units = sites
            .iter()
            .map(|q| self.ldos_unit(energies, broadening, q.position, q.sublattice))
            .collect::<Result<Vec<_>>>()?;
        self.run_batch(units, broadening, |l: &Ldos| l.values().iter().all(|v| v.is_finite()))
    }

    /// Green's function elements for several `(i, j)` pairs in parallel, in request order.
    pub fn green_batch(&self, pairs: &[(usize, usize)], energies: &[f64], broadening: f64) -> Result<Vec<Vec<Complex64>>> {
        let units = pairs
            .iter()
            .map(|&(i, j)| self.green_unit(i, j, energies, broadening))
            .collect::<Result<Vec<_>>>()?;
        self.run_batch(units, broadening, |g: &Vec<Complex64>| g.iter().all(|v| v.is_finite()))
    }

    fn run_batch<T: Send + 'static>(
        &self,
        units: Vec<Deferred<(T, usize)>>,
        broadening: f64,
        finite: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>> {
        let worker = self.worker()?;
        let num_moments = required_moments(self.config.lambda, worker.session.scaling().a, broadening)?;
        let requests = units.len();
        let dispatcher = self.dispatcher()?;
        if dispatcher.is_cancelled() {
            log::debug!("resetting cancelled dispatcher for a new batch");
            dispatcher.reset();
        }
        let start = Instant::now();
        let counted = dispatcher
            .run_all(units)
            .into_iter()
            .collect::<Result<Vec<(T, usize)>>>()?;
        let applies = counted.iter().map(|(_, a)| a).sum();
        let results: Vec<T> = counted.into_iter().map(|(r, _)| r).collect();
        let diverged = !results.iter().all(&finite);
        self.record(worker.report(Computation::Batch, num_moments, requests, applies, start.elapsed(), diverged));
        Ok(results)
    }

    /// Statistics of the last completed computation.
    pub fn report(&self, short: bool) -> String {
        match self.last_report.lock().as_ref() {
            Some(r) => r.render(short),
            None => "no computation has run yet".to_string(),
        }
    }

    pub fn last_report(&self) -> Option<KpmReport> {
        self.last_report.lock().clone()
    }
}
