//! Two-year FX smile: pillar strikes, SABR calibration, wings and a strike grid.
//!
//! Walks the full pipeline for one quote set:
//!   1. Invert the five delta quotes to strikes
//!   2. Calibrate SABR (beta = 0.85) and fit the wing tails
//!   3. Tabulate vol, premium and density across strikes
//!   4. Price one option and report its Greeks
//!
//! Run with: `cargo run --example smile_report`

use fxsmile::market::DeltaPillar;
use fxsmile::surface::SmileModel;
use fxsmile::{OptionType, build_surface};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let term = 720.0 / 365.0;
    let (spot, domestic_rate, foreign_rate) = (76.1340, 0.002978, 0.007450);
    let quotes = [0.117885, 0.1191, 0.1300, 0.1501, 0.174995];

    let surface = build_surface(spot, domestic_rate, foreign_rate, term, &quotes, 0.85)?;
    println!(
        "Spot={spot}, r_d={domestic_rate}, r_f={foreign_rate}, T={term:.4}y, F={:.4}",
        surface.market().forward()
    );

    // ---------------------------------------------------------------
    // 1. Pillar strikes
    // ---------------------------------------------------------------

    println!("\n{:>8} {:>10} {:>10}", "Pillar", "Strike", "Quote");
    println!("{}", "-".repeat(30));
    for pillar in DeltaPillar::ALL {
        println!(
            "{:>8} {:>10.4} {:>9.4}%",
            format!("{pillar:?}"),
            surface.pillars().strike(pillar),
            surface.quotes().vol(pillar) * 100.0
        );
    }

    // ---------------------------------------------------------------
    // 2. Calibration and wings
    // ---------------------------------------------------------------

    if let Some(cal) = surface.calibration() {
        let g = cal.initial_guess;
        let p = cal.smile.params();
        println!("\nFirst guess: alpha={:.6}, rho={:.6}, nu={:.6}", g.alpha(), g.rho(), g.nu());
        println!("Calibrated:  alpha={:.6}, rho={:.6}, nu={:.6}", p.alpha(), p.rho(), p.nu());
        println!(
            "Weighted RMS {:.2e} after {} iterations, {} vol-of-vol retries",
            cal.weighted_rms, cal.iterations, cal.vovol_retries
        );
    }
    if let Some((put, call)) = surface.tails() {
        println!("Put tail:  m={:.4}, a={:.4}, b={:.4}, c={:.4}", put.exponent, put.a, put.b, put.c);
        println!("Call tail: n={:.4}, a={:.4}, b={:.4}, c={:.4}", call.exponent, call.a, call.b, call.c);
    }

    // ---------------------------------------------------------------
    // 3. Strike grid
    // ---------------------------------------------------------------

    println!("\n{:>8} {:>6} {:>10} {:>10} {:>10}", "Strike", "Region", "Vol", "Call", "Density");
    println!("{}", "-".repeat(48));
    let (lo, hi) = (0.85 * surface.pillars().k10p(), 1.15 * surface.pillars().k10c());
    for i in 0..=20 {
        let k = lo + (hi - lo) * i as f64 / 20.0;
        let region = match surface.wing() {
            Some(w) if w.in_wing(k) => "wing",
            _ => "sabr",
        };
        // far tails can leave the implied-vol bracket
        match (surface.volatility(k), surface.price(k, OptionType::Call), surface.smile().density(k)) {
            (Ok(vol), Ok(call), Ok(density)) => {
                println!("{k:>8.3} {region:>6} {:>9.4}% {call:>10.4} {density:>10.6}", vol.0 * 100.0)
            }
            (Err(e), ..) | (_, Err(e), _) | (.., Err(e)) => println!("{k:>8.3} {region:>6} {e}"),
        }
    }

    let report = surface.is_arbitrage_free()?;
    println!(
        "\nButterfly violations: {}, arb-free: {}",
        report.butterfly_violations.len(),
        report.is_free
    );

    // ---------------------------------------------------------------
    // 4. One option
    // ---------------------------------------------------------------

    let strike = 75.96442;
    let vol = surface.volatility(strike)?;
    let put = surface.price(strike, OptionType::Put)?;
    let g = surface.greeks(strike, OptionType::Put)?;
    println!("\nPut K={strike}: vol={:.4}%, premium={put:.6}", vol.0 * 100.0);
    println!(
        "delta={:.6} gamma={:.6} vega={:.6} theta={:.6}",
        g.delta, g.gamma, g.vega, g.theta
    );
    println!(
        "vanna={:.6} volga={:.6} dual delta={:.6} dual gamma={:.6} dual vega={:.6}",
        g.vanna, g.volga, g.dual_delta, g.dual_gamma, g.dual_vega
    );
    let back = surface.implied_volatility(strike, put, OptionType::Put)?;
    println!("Implied back from premium: {:.4}%", back.0 * 100.0);

    // Same quotes with plain SABR in the wings, for comparison
    let plain = fxsmile::FxVolSurface::new(
        *surface.market(),
        *surface.quotes(),
        fxsmile::surface::SurfaceConfig {
            model: SmileModel::Sabr,
            ..*surface.config()
        },
    )?;
    let k10p = surface.pillars().k10p();
    println!(
        "\nAt the 10-put strike: wing {:.4}% vs SABR {:.4}% (quote {:.4}%)",
        surface.volatility(k10p)?.0 * 100.0,
        plain.volatility(k10p)?.0 * 100.0,
        quotes[0] * 100.0
    );

    Ok(())
}
