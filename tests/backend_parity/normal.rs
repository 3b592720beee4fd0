//! Accelerator output follows the host contract: shapes, dtypes, saturation
//! and normality. Both runtimes consume the same Philox blocks, so values
//! also agree element by element up to f32 precision.

use crate::helpers::{assert_mostly_close, run_both, with_accelerator};
use crate::common::{assert_normal, built_pipeline, ones_batch};
use normpipe::prelude::*;

const SEED: u64 = 2024;

fn static_config(dtype: DType, dims: &[i64]) -> PipelineConfig {
    PipelineConfig::new()
        .with_dtype(dtype)
        .with_shape_source(ShapeSource::static_shape(dims).unwrap())
        .with_seed(SEED)
}

#[test]
fn test_f32_parity_with_host() {
    with_accelerator(|| {
        let (host, device) = run_both(static_config(DType::F32, &[8192]).with_batch_size(3));
        assert_eq!(device.len(), 3);
        assert_eq!(device.location(), Location::Host);

        for i in 0..3 {
            let h = host.sample(i).unwrap().to_f64_vec().unwrap();
            let d = device.sample(i).unwrap().to_f64_vec().unwrap();
            assert_normal(&d, &format!("accelerator f32 sample {i}"));
            assert_mostly_close(&h, &d, 1e-2, 0.999, &format!("f32_sample_{i}"));
        }
    });
}

#[test]
fn test_f16_parity_with_host() {
    with_accelerator(|| {
        let (host, device) = run_both(static_config(DType::F16, &[8192]).with_batch_size(3));
        assert_eq!(device.dtype(), DType::F16);

        for i in 0..3 {
            let h = host.sample(i).unwrap().to_f64_vec().unwrap();
            let d = device.sample(i).unwrap().to_f64_vec().unwrap();
            assert_normal(&d, &format!("accelerator f16 sample {i}"));
            // One f16 ulp at |x| < 4 is below 4e-3.
            assert_mostly_close(&h, &d, 1e-2, 0.999, &format!("f16_sample_{i}"));
        }
    });
}

#[test]
fn test_integer_parity_with_host() {
    with_accelerator(|| {
        for (dtype, stddev) in [(DType::I8, 20.0), (DType::I16, 100.0), (DType::I32, 100.0)] {
            let config = static_config(dtype, &[4099]).with_distribution(0.0, stddev);
            let (host, device) = run_both(config);
            let h = host.sample(0).unwrap().to_f64_vec().unwrap();
            let d = device.sample(0).unwrap().to_f64_vec().unwrap();
            // Only values sitting on a rounding boundary may differ, and then by one.
            assert_mostly_close(&h, &d, 0.0, 0.98, &format!("{dtype}_exact"));
            assert_mostly_close(&h, &d, 1.0, 0.999, &format!("{dtype}_within_one"));
        }
    });
}

#[test]
fn test_integer_saturation_on_accelerator() {
    with_accelerator(|| {
        let config = static_config(DType::I8, &[20_000])
            .with_location(Location::Accelerator)
            .with_distribution(0.0, 100.0);
        let mut pipeline = built_pipeline(config);
        let batch = pipeline.run().unwrap().to_host().unwrap();
        let v = batch.sample(0).unwrap().as_slice::<i8>().unwrap().to_vec();

        let high = v.iter().filter(|&&x| x == i8::MAX).count();
        let low = v.iter().filter(|&&x| x == i8::MIN).count();
        assert!(high > 1000 && low > 1000, "high={high} low={low}");

        let config = static_config(DType::I16, &[20_000])
            .with_location(Location::Accelerator)
            .with_distribution(30_000.0, 10_000.0);
        let mut pipeline = built_pipeline(config);
        let batch = pipeline.run().unwrap().to_host().unwrap();
        let v = batch.sample(0).unwrap().as_slice::<i16>().unwrap().to_vec();
        // Saturated values never wrap; only the lower tail beyond -3 sigma is negative.
        assert!(v.iter().filter(|&&x| x == i16::MAX).count() > 5000);
        assert!(v.iter().filter(|&&x| x < 0).count() < 100);
    });
}

#[test]
fn test_int32_saturates_at_type_bounds() {
    with_accelerator(|| {
        let config = static_config(DType::I32, &[4096]).with_distribution(0.0, 1e12);
        let (host, device) = run_both(config);
        for (label, batch) in [("host", &host), ("accelerator", &device)] {
            let v = batch.sample(0).unwrap().as_slice::<i32>().unwrap();
            let high = v.iter().filter(|&&x| x == i32::MAX).count();
            let low = v.iter().filter(|&&x| x == i32::MIN).count();
            assert!(high > 1500 && low > 1500, "{label}: high={high} low={low}");
        }
        let h = host.sample(0).unwrap().to_f64_vec().unwrap();
        let d = device.sample(0).unwrap().to_f64_vec().unwrap();
        assert_mostly_close(&h, &d, 0.0, 0.99, "int32_saturated");
    });
}

#[test]
fn test_f16_overflow_is_infinite_on_both_backends() {
    with_accelerator(|| {
        let config = static_config(DType::F16, &[4096]).with_distribution(0.0, 1e5);
        let (host, device) = run_both(config);
        let h = host.sample(0).unwrap().to_f64_vec().unwrap();
        let d = device.sample(0).unwrap().to_f64_vec().unwrap();

        assert!(d.iter().all(|x| !x.is_nan()));
        let pos = d.iter().filter(|&&x| x == f64::INFINITY).count();
        let neg = d.iter().filter(|&&x| x == f64::NEG_INFINITY).count();
        assert!(pos > 500 && neg > 500, "pos={pos} neg={neg}");
        // One f16 ulp near the top of the range is 32.
        assert_mostly_close(&h, &d, 64.0, 0.99, "f16_overflow");
    });
}

#[test]
fn test_default_shape_source_on_accelerator() {
    with_accelerator(|| {
        for dtype in [DType::F32, DType::F16] {
            let config = PipelineConfig::new()
                .with_dtype(dtype)
                .with_batch_size(100)
                .with_seed(SEED);
            let (host, device) = run_both(config);
            assert_eq!(device.len(), 100);

            let mut h = Vec::with_capacity(100);
            let mut d = Vec::with_capacity(100);
            for i in 0..100 {
                let sample = device.sample(i).unwrap();
                assert_eq!(sample.shape().as_slice(), &[1]);
                assert_eq!(sample.dtype(), dtype);
                d.extend(sample.to_f64_vec().unwrap());
                h.extend(host.sample(i).unwrap().to_f64_vec().unwrap());
            }
            assert_normal(&d, &format!("accelerator default {dtype}"));
            assert_mostly_close(&h, &d, 1e-2, 0.99, &format!("default_{dtype}"));
        }
    });
}

#[test]
fn test_multi_dim_static_shape_on_accelerator() {
    with_accelerator(|| {
        let dims = [1usize, 2, 3, 4, 5, 6];
        for dtype in [DType::F32, DType::F16, DType::I16] {
            let config = static_config(dtype, &[1, 2, 3, 4, 5, 6])
                .with_batch_size(2)
                .with_distribution(0.0, 10.0);
            let (host, device) = run_both(config);

            let mut pooled = Vec::new();
            for i in 0..2 {
                let ds = device.sample(i).unwrap();
                assert_eq!(ds.shape().as_slice(), &dims);
                assert_eq!(ds.numel(), 720);
                let h = host.sample(i).unwrap().to_f64_vec().unwrap();
                let d = ds.to_f64_vec().unwrap();
                assert_mostly_close(&h, &d, 1.0, 0.99, &format!("{dtype}_static_sample_{i}"));
                pooled.extend(d);
            }
            if dtype.is_float() {
                assert_normal(&pooled, &format!("accelerator {dtype} [1, 2, 3, 4, 5, 6]"));
            }
        }
    });
}

#[test]
fn test_odd_sizes_keep_shape_and_stream() {
    with_accelerator(|| {
        // Sizes that do not fill the last block or word of a packed type.
        let shapes: [&[usize]; 4] = [&[1], &[3, 3], &[5, 1, 7], &[2, 513]];
        for dtype in [DType::I8, DType::F16, DType::F32] {
            let config = PipelineConfig::new()
                .with_dtype(dtype)
                .with_shape_source(ShapeSource::ExternalInput)
                .with_batch_size(4)
                .with_distribution(0.0, 5.0)
                .with_seed(SEED);

            let mut host = built_pipeline(config.clone().with_location(Location::Host));
            let mut device = built_pipeline(config.with_location(Location::Accelerator));
            host.feed(&ones_batch(&shapes)).unwrap();
            device.feed(&ones_batch(&shapes)).unwrap();

            let h = host.run().unwrap().to_host().unwrap();
            let view = device.run().unwrap();
            assert_eq!(view.location(), Location::Accelerator);
            let d = view.to_host().unwrap();

            for (i, dims) in shapes.iter().enumerate() {
                let hs = h.sample(i).unwrap();
                let ds = d.sample(i).unwrap();
                assert_eq!(ds.shape().as_slice(), *dims);
                assert_eq!(ds.dtype(), dtype);
                assert_mostly_close(
                    &hs.to_f64_vec().unwrap(),
                    &ds.to_f64_vec().unwrap(),
                    5e-2,
                    0.99,
                    &format!("{dtype}_sample_{i}"),
                );
            }
        }
    });
}

#[test]
fn test_iterations_advance_like_host() {
    with_accelerator(|| {
        let config = static_config(DType::F32, &[64, 64]).with_batch_size(2);
        let mut host = built_pipeline(config.clone().with_location(Location::Host));
        let mut device = built_pipeline(config.with_location(Location::Accelerator));

        let mut previous: Option<Vec<f64>> = None;
        for iteration in 0..3 {
            let h = host.run().unwrap().to_host().unwrap();
            let d = device.run().unwrap().to_host().unwrap();
            let hv = h.sample(1).unwrap().to_f64_vec().unwrap();
            let dv = d.sample(1).unwrap().to_f64_vec().unwrap();
            assert_mostly_close(&hv, &dv, 1e-2, 0.99, &format!("iteration_{iteration}"));
            if let Some(prev) = &previous {
                assert_ne!(prev, &dv, "iteration {iteration} repeated the previous batch");
            }
            previous = Some(dv);
        }
        assert_eq!(device.iteration(), 3);
    });
}

#[test]
fn test_float64_rejected_on_accelerator() {
    // Rejected before any adapter is opened, so no lock or device is needed.
    let config = static_config(DType::F64, &[16]).with_location(Location::Accelerator);
    let mut pipeline = Pipeline::new(config).unwrap();
    let err = pipeline.build().unwrap_err();
    assert!(matches!(err, Error::UnsupportedConfiguration { .. }), "{err:?}");
    assert!(pipeline.run().is_err());
}

#[test]
fn test_bad_device_id_is_allocation_error() {
    with_accelerator(|| {
        let config = static_config(DType::F32, &[16])
            .with_location(Location::Accelerator)
            .with_device_id(4096);
        let mut pipeline = Pipeline::new(config).unwrap();
        let err = pipeline.build().unwrap_err();
        assert!(matches!(err, Error::Allocation { .. }), "{err:?}");
    });
}
