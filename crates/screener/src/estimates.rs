//! Growth rates and forward-estimate projection.

use crate::metrics::{round_to, Metrics};

/// Years always projected, as two-digit fiscal years.
const PROJECTED_YEARS: [u32; 3] = [26, 27, 28];

/// Metrics projected forward from their latest actual.
const PROJECTED_METRICS: [&str; 4] = ["revenue", "ebitda", "pat", "eps"];

/// Compound annual growth in percent, two decimals.
///
/// `None` unless both endpoints and the period are positive.
pub fn cagr(start: f64, end: f64, years: f64) -> Option<f64> {
    if start <= 0.0 || end <= 0.0 || years <= 0.0 {
        return None;
    }
    let rate = ((end / start).powf(1.0 / years) - 1.0) * 100.0;
    rate.is_finite().then(|| round_to(rate, 2))
}

/// Annual growth used for projection, as a fraction.
///
/// Without history the rate is 10%. History above 30% is capped at 30%;
/// history below -10% is floored to -5%.
pub(crate) fn growth_rate(hist_cagr: Option<f64>) -> f64 {
    match hist_cagr {
        None => 0.10,
        Some(h) if h == 0.0 => 0.10,
        Some(h) if h > 30.0 => 0.30,
        Some(h) if h < -10.0 => -0.05,
        Some(h) => h / 100.0,
    }
}

/// Fill `{revenue,ebitda,pat,eps}_fy{26,27,28}` by compounding the latest
/// actual at its historical growth rate, then `pe_fy{26,27,28}` from the
/// current price.
///
/// Existing metric values are never replaced; P/E estimates always are.
pub fn project_estimates(m: &mut Metrics) {
    let latest = if m.nonzero("revenue_fy25").is_some() { 25 } else { 24 };

    for metric in PROJECTED_METRICS {
        let base = m
            .nonzero(&format!("{metric}_fy{latest}"))
            .or_else(|| m.nonzero(&format!("{metric}_ttm")));
        let Some(base) = base.filter(|b| *b > 0.0) else {
            continue;
        };
        let rate = growth_rate(m.get(&format!("{metric}_cagr_hist_2yr")));

        let mut value = base;
        for year in (latest + 1)..=28 {
            value *= 1.0 + rate;
            let key = format!("{metric}_fy{year}");
            if PROJECTED_YEARS.contains(&year) && !m.contains(&key) {
                m.set_rounded(key, value, 2);
            }
        }
    }

    if let Some(price) = m.nonzero("current_price") {
        for year in PROJECTED_YEARS {
            if let Some(eps) = m.get(&format!("eps_fy{year}")).filter(|e| *e > 0.0) {
                m.set_rounded(format!("pe_fy{year}"), price / eps, 2);
            }
        }
    }
}
