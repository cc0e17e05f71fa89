#![allow(non_snake_case)]

#![doc = include_str!("../Readme.md")]

extern crate feanor_math;

#[macro_use]
pub mod profiling;

///
/// Contains [`error::Error`], the error type of all fallible operations.
///
pub mod error;

///
/// Scheme kinds, security levels, multiplication modes and the [`scheme::SchemeContext`]
/// describing a configured instance.
///
pub mod scheme;

///
/// Sizing and validation of modulus chains against the security bounds of the
/// HomomorphicEncryption.org standard.
///
pub mod params;

///
/// Search for NTT-friendly primes and roots of unity.
///
pub mod primes;

///
/// Plain polynomials over `f64`, including the odd polynomials approximating the
/// sign function, which can be evaluated on CKKS ciphertexts with
/// [`fhe::Fhe::evaluate_polynomial()`].
///
pub mod poly;

///
/// Defines the trait [`backend::Backend`] of primitive homomorphic operations, and
/// the reference implementation [`backend::clear::ClearBackend`].
///
pub mod backend;

///
/// Contains [`fhe::Fhe`], which performs arithmetic on ciphertexts at possibly
/// different levels and scales.
///
pub mod fhe;

///
/// Contains [`builder::FheBuilder`] to configure and create [`fhe::Fhe`] instances.
///
pub mod builder;

pub use error::{Error, KeyKind, Result};
pub use fhe::{ApproximateFhe, Ciphertext, Fhe, IntegerFhe, Plaintext, SlotValue};
pub use builder::FheBuilder;

#[test]
#[ignore]
fn profile_reconciled_arithmetic() {
    use tracing_subscriber::prelude::*;
    let (chrome_layer, _guard) = tracing_chrome::ChromeLayerBuilder::new().build();
    tracing_subscriber::registry().with(chrome_layer).init();

    let fhe = FheBuilder::new().build_approximate_scheme(scheme::RealComplexScheme::Ckks, 16384, (1u64 << 40) as f64).unwrap();
    let mut rng = oorandom::Rand64::new(1);
    let values = (0..fhe.slot_count()).map(|_| rng.rand_float()).collect::<Vec<f64>>();
    let fresh = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();
    let mut current = fresh.clone();
    for _ in 0..6 {
        current = fhe.multiply(&current, &fresh).unwrap();
    }
    let result = fhe.decode::<f64>(&fhe.decrypt(&current).unwrap()).unwrap();
    for (x, y) in values.iter().zip(result.iter()) {
        assert!((x.powi(7) - y).abs() < 1e-3);
    }
    profiling::print_all_timings();
}
