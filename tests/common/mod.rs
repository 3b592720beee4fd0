//! Common test utilities
#![allow(dead_code)]

use normpipe::prelude::*;

/// Anderson-Darling critical values for the normal case with estimated mean
/// and variance, at the significance levels in `SIGNIFICANCE`.
const AD_CRITICAL: [f64; 5] = [0.576, 0.656, 0.787, 0.918, 1.092];

/// Significance levels (percent) matching `AD_CRITICAL`
pub const SIGNIFICANCE: [f64; 5] = [15.0, 10.0, 5.0, 2.5, 1.0];

/// Result of an Anderson-Darling normality test
#[derive(Debug, Clone)]
pub struct AndersonDarling {
    /// The A² statistic
    pub statistic: f64,
    /// Critical values at 15, 10, 5, 2.5 and 1 percent, corrected for `n`
    pub critical_values: [f64; 5],
}

impl AndersonDarling {
    /// Whether normality is not rejected at the 15% level
    pub fn passes_at_15_percent(&self) -> bool {
        self.statistic < self.critical_values[0]
    }
}

/// Anderson-Darling test of `values` against a normal distribution with
/// mean and standard deviation estimated from the data.
pub fn anderson_darling(values: &[f64]) -> AndersonDarling {
    let n = values.len();
    assert!(n >= 8, "anderson_darling needs at least 8 values, got {}", n);
    let (mean, var) = mean_var(values);
    let std = (var * n as f64 / (n - 1) as f64).sqrt();
    assert!(std > 0.0, "anderson_darling: constant input");

    let mut w: Vec<f64> = values.iter().map(|&x| (x - mean) / std).collect();
    w.sort_by(|a, b| a.total_cmp(b));
    let cdf: Vec<f64> = w.iter().map(|&x| normal_cdf(x)).collect();

    let nf = n as f64;
    let s: f64 = (0..n)
        .map(|i| {
            let k = (2 * i + 1) as f64 / nf;
            k * (cdf[i].ln() + (1.0 - cdf[n - 1 - i]).ln())
        })
        .sum();

    let correction = 1.0 + 4.0 / nf - 25.0 / (nf * nf);
    AndersonDarling {
        statistic: -nf - s,
        critical_values: AD_CRITICAL.map(|c| c / correction),
    }
}

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Complementary error function (Chebyshev fit, relative error below 1.2e-7)
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 { r } else { 2.0 - r }
}

/// Population mean and variance
pub fn mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

/// Assert that `values` pass the Anderson-Darling check at 15%
pub fn assert_normal(values: &[f64], case: &str) {
    let ad = anderson_darling(values);
    assert!(
        ad.passes_at_15_percent(),
        "{}: A² = {} exceeds 15% critical value {} (n = {})",
        case,
        ad.statistic,
        ad.critical_values[0],
        values.len()
    );
}

/// Build a pipeline from `config`, failing the test on error
pub fn built_pipeline(config: PipelineConfig) -> Pipeline {
    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline.build().unwrap();
    pipeline
}

/// Run once and copy the batch to the host
pub fn run_to_host(pipeline: &mut Pipeline) -> Batch {
    pipeline.run().unwrap().to_host().unwrap()
}

/// Host tensors of ones with the given shapes, as an external source feeds them
pub fn ones_batch(shapes: &[&[usize]]) -> Vec<HostTensor> {
    shapes
        .iter()
        .map(|dims| HostTensor::ones(dims, DType::F64).unwrap())
        .collect()
}

/// Whether an accelerator runtime can be created in this environment
pub fn accelerator_available() -> bool {
    if !normpipe::runtime::accelerator_compiled() {
        return false;
    }
    let options = normpipe::runtime::RuntimeOptions::default();
    match normpipe::runtime::create_runtime(Location::Accelerator, &options) {
        Ok(_) => true,
        Err(e) => {
            println!("No accelerator available, skipping: {}", e);
            false
        }
    }
}
