//! LDOS in the middle of a long tight-binding chain, compared with the infinite chain.
//!
//! Run with `RUST_LOG=info cargo run --release --example chain_ldos`.

use kpmkit::{CsrMatrix, Kpm, KpmConfig, Result, SiteQuery, Sites, TightBindingModel};
use std::f64::consts::PI;

fn main() -> Result<()> {
    env_logger::init();

    let n = 20_001;
    let mut triplets = Vec::with_capacity(2 * n);
    for i in 0..n - 1 {
        triplets.push((i, i + 1, -1.0));
        triplets.push((i + 1, i, -1.0));
    }
    let model = TightBindingModel::new(CsrMatrix::from_triplets(n, n, &triplets)?, Sites::chain(n, 1.0))?;
    let kpm = Kpm::new(model, KpmConfig::default())?;

    let energies: Vec<f64> = (0..=40).map(|k| -2.0 + 0.1 * k as f64).collect();
    let centre = [(n / 2) as f64, 0.0, 0.0];
    let ldos = kpm.ldos(&energies, 0.02, centre, None)?;
    println!("{}", kpm.report(false));
    println!();
    println!("{:>8} {:>12} {:>12}", "E", "kpm", "exact");
    for (e, rho) in ldos.energy().iter().zip(ldos.values()) {
        let exact = if e.abs() < 2.0 { 1.0 / (PI * (4.0 - e * e).sqrt()) } else { 0.0 };
        println!("{:>8.3} {:>12.6} {:>12.6}", e, rho, exact);
    }

    // near the open end the LDOS develops oscillations; fan a few sites out in parallel
    let queries: Vec<SiteQuery> = [0.0, 1.0, 2.0, 10.0]
        .iter()
        .map(|&x| SiteQuery::new([x, 0.0, 0.0], None))
        .collect();
    let edge = kpm.ldos_batch(&energies, 0.02, &queries)?;
    println!();
    for (q, l) in queries.iter().zip(&edge) {
        println!("site at x = {:>4}: integrated weight {:.4}", q.position[0], l.integrate());
    }
    println!("{}", kpm.report(true));
    Ok(())
}
