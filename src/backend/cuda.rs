//! CUDA moment backend.
//!
//! The rescaled CSR matrix and the two recursion vectors live on the device as interleaved
//! `(re, im)` pairs; one thread updates one row per step. Moments are gathered on the device and
//! copied back once at the end. Supports levels 0 and 1.

use super::{Capabilities, MomentBackend, resolve_level};
use crate::config::OptimizationLevel;
use crate::context::session::Session;
use crate::core::traits::Scalar;
use crate::error::{KpmError, Result};
use crate::solver::MomentSeries;
use cudarc::driver::{CudaContext, CudaFunction, CudaSlice, CudaStream, LaunchConfig, PushKernelArg};
use num_complex::Complex64;
use parking_lot::Mutex;
use std::sync::Arc;

const BLOCK_SIZE: u32 = 256;

const KERNELS: &str = r#"
extern "C" __global__ void kpm_apply(
    const int rows, const int* row_ptr, const int* col_idx, const double* vals,
    const double* x, double* y)
{
    int k = blockIdx.x * blockDim.x + threadIdx.x;
    if (k >= rows) return;
    double re = 0.0, im = 0.0;
    for (int p = row_ptr[k]; p < row_ptr[k + 1]; ++p) {
        int c = col_idx[p];
        double vr = vals[2 * p], vi = vals[2 * p + 1];
        double xr = x[2 * c], xi = x[2 * c + 1];
        re += vr * xr - vi * xi;
        im += vr * xi + vi * xr;
    }
    y[2 * k] = re;
    y[2 * k + 1] = im;
}

extern "C" __global__ void kpm_step(
    const int rows, const int* row_ptr, const int* col_idx, const double* vals,
    const double* cur, double* prev)
{
    int k = blockIdx.x * blockDim.x + threadIdx.x;
    if (k >= rows) return;
    double re = 0.0, im = 0.0;
    for (int p = row_ptr[k]; p < row_ptr[k + 1]; ++p) {
        int c = col_idx[p];
        double vr = vals[2 * p], vi = vals[2 * p + 1];
        double xr = cur[2 * c], xi = cur[2 * c + 1];
        re += vr * xr - vi * xi;
        im += vr * xi + vi * xr;
    }
    prev[2 * k] = 2.0 * re - prev[2 * k];
    prev[2 * k + 1] = 2.0 * im - prev[2 * k + 1];
}

extern "C" __global__ void kpm_gather(const double* r, const int target, double* mu, const int n)
{
    if (blockIdx.x == 0 && threadIdx.x == 0) {
        mu[2 * n] = r[2 * target];
        mu[2 * n + 1] = r[2 * target + 1];
    }
}
"#;

fn device<E: std::fmt::Debug>(e: E) -> KpmError {
    KpmError::Device(format!("{:?}", e))
}

fn index_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| KpmError::Device(format!("{} {} exceeds the device index range", what, value)))
}

fn rows_config(rows: usize) -> LaunchConfig {
    let rows = rows.max(1) as u32;
    LaunchConfig {
        grid_dim: (rows.div_ceil(BLOCK_SIZE), 1, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}

fn single_config() -> LaunchConfig {
    LaunchConfig {
        grid_dim: (1, 1, 1),
        block_dim: (1, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// Moment recursion on the first CUDA device.
pub struct CudaBackend {
    _context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    apply: CudaFunction,
    step: CudaFunction,
    gather: CudaFunction,
    level: OptimizationLevel,
    /// Requests share one stream; their launches are not interleaved.
    launch: Mutex<()>,
}

impl CudaBackend {
    pub const CAPABILITIES: Capabilities = Capabilities::LEVEL_0
        .union(Capabilities::LEVEL_1)
        .union(Capabilities::COMPLEX)
        .union(Capabilities::DEVICE);

    /// Open device 0 and compile the kernels. Any failure means the backend is unsupported here.
    pub fn new(level: OptimizationLevel) -> Result<Self> {
        let level = resolve_level("cuda", Self::CAPABILITIES, level);
        let context = CudaContext::new(0)
            .map_err(|e| KpmError::UnsupportedBackend(format!("no usable CUDA device: {:?}", e)))?;
        let stream = context.default_stream();
        let ptx = cudarc::nvrtc::compile_ptx(KERNELS)
            .map_err(|e| KpmError::UnsupportedBackend(format!("kernel compilation failed: {:?}", e)))?;
        let module = context
            .load_module(ptx)
            .map_err(|e| KpmError::UnsupportedBackend(format!("module load failed: {:?}", e)))?;
        let apply = module.load_function("kpm_apply").map_err(device)?;
        let step = module.load_function("kpm_step").map_err(device)?;
        let gather = module.load_function("kpm_gather").map_err(device)?;
        log::info!("cuda backend ready at optimization level {}", level);
        Ok(Self {
            _context: context,
            stream,
            apply,
            step,
            gather,
            level,
            launch: Mutex::new(()),
        })
    }

    fn upload<T: cudarc::driver::DeviceRepr + cudarc::driver::ValidAsZeroBits>(&self, host: &[T]) -> Result<CudaSlice<T>> {
        let mut dev = self.stream.alloc_zeros::<T>(host.len().max(1)).map_err(device)?;
        if !host.is_empty() {
            self.stream.memcpy_htod(host, &mut dev).map_err(device)?;
        }
        Ok(dev)
    }

    fn gather_into(&self, r: &CudaSlice<f64>, target: i32, mu: &mut CudaSlice<f64>, n: usize) -> Result<()> {
        let n = index_i32(n, "moment")?;
        unsafe {
            let mut builder = self.stream.launch_builder(&self.gather);
            builder.arg(r);
            builder.arg(&target);
            builder.arg(mu);
            builder.arg(&n);
            builder.launch(single_config()).map_err(device)?;
        }
        Ok(())
    }
}

impl<S: Scalar> MomentBackend<S> for CudaBackend {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn optimization_level(&self) -> OptimizationLevel {
        self.level
    }

    fn moments(&self, session: &Session<S>, row: usize, col: usize, num_moments: usize) -> Result<MomentSeries> {
        let n = session.dim();
        for index in [row, col] {
            if index >= n {
                return Err(KpmError::InvalidIndex { index, dim: n });
            }
        }
        if num_moments < 2 {
            return Err(KpmError::InvalidConfig(format!(
                "at least 2 moments are needed, got {}",
                num_moments
            )));
        }
        let adapter = session.adapter(self.level, col)?;
        let csr = adapter
            .csr()
            .ok_or_else(|| KpmError::Device("device recursion needs a CSR layout".to_string()))?;
        index_i32(2 * n, "dimension")?;
        index_i32(2 * csr.nnz(), "nnz")?;

        let row_ptr: Vec<i32> = csr.row_ptr().iter().map(|&p| p as i32).collect();
        let col_idx: Vec<i32> = csr.col_idx().iter().map(|&c| c as i32).collect();
        let values: Vec<f64> = csr
            .values()
            .iter()
            .flat_map(|v| {
                let c = v.to_complex();
                [c.re, c.im]
            })
            .collect();
        let permutation = adapter.permutation();
        let start = permutation.to_internal(col);
        let target = permutation.to_internal(row) as i32;
        let mut r0 = vec![0.0f64; 2 * n];
        r0[2 * start] = 1.0;

        let _guard = self.launch.lock();
        let d_row_ptr = self.upload(&row_ptr)?;
        let d_col_idx = self.upload(&col_idx)?;
        let d_values = self.upload(&values)?;
        let mut d_prev = self.upload(&r0)?;
        let mut d_cur = self.stream.alloc_zeros::<f64>(2 * n).map_err(device)?;
        let mut d_mu = self.stream.alloc_zeros::<f64>(2 * num_moments).map_err(device)?;

        let rows = adapter.reach_from(col, 1);
        let rows_i32 = rows as i32;
        unsafe {
            let mut builder = self.stream.launch_builder(&self.apply);
            builder.arg(&rows_i32);
            builder.arg(&d_row_ptr);
            builder.arg(&d_col_idx);
            builder.arg(&d_values);
            builder.arg(&d_prev);
            builder.arg(&mut d_cur);
            builder.launch(rows_config(rows)).map_err(device)?;
        }
        self.gather_into(&d_prev, target, &mut d_mu, 0)?;
        self.gather_into(&d_cur, target, &mut d_mu, 1)?;

        for step in 1..num_moments - 1 {
            let rows = adapter.reach_from(col, step + 1);
            let rows_i32 = rows as i32;
            unsafe {
                let mut builder = self.stream.launch_builder(&self.step);
                builder.arg(&rows_i32);
                builder.arg(&d_row_ptr);
                builder.arg(&d_col_idx);
                builder.arg(&d_values);
                builder.arg(&d_cur);
                builder.arg(&mut d_prev);
                builder.launch(rows_config(rows)).map_err(device)?;
            }
            std::mem::swap(&mut d_cur, &mut d_prev);
            self.gather_into(&d_cur, target, &mut d_mu, step + 1)?;
        }

        let mut mu = vec![0.0f64; 2 * num_moments];
        self.stream.memcpy_dtoh(&d_mu, &mut mu).map_err(device)?;
        self.stream.synchronize().map_err(device)?;
        Ok(MomentSeries {
            values: mu.chunks_exact(2).map(|p| Complex64::new(p[0], p[1])).collect(),
            applies: num_moments - 1,
        })
    }
}
