use std::sync::OnceLock;

use proptest::prelude::*;

use he_arith::scheme::*;
use he_arith::{Ciphertext, Error, Fhe, FheBuilder};
use he_arith::backend::clear::ClearBackend;
use he_arith::poly;

fn integer_fhe() -> &'static Fhe {
    static FHE: OnceLock<Fhe> = OnceLock::new();
    FHE.get_or_init(|| FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 8192, 20).unwrap())
}

fn approximate_fhe() -> &'static Fhe {
    static FHE: OnceLock<Fhe> = OnceLock::new();
    FHE.get_or_init(|| FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap())
}

///
/// Encrypts the values and moves the ciphertext down to the given level by multiplying
/// with ones.
///
fn encrypt_integers_at(fhe: &Fhe, values: &[u64], level: usize) -> Ciphertext<ClearBackend> {
    let ones = fhe.encode(&vec![1u64; fhe.slot_count()]).unwrap();
    let mut result = fhe.encrypt(&fhe.encode(values).unwrap()).unwrap();
    while result.level() > level {
        result = fhe.multiply_plain(&result, &ones).unwrap();
    }
    return result;
}

fn encrypt_reals_at(fhe: &Fhe, values: &[f64], level: usize) -> Ciphertext<ClearBackend> {
    let ones = fhe.encode(&vec![1f64; fhe.slot_count()]).unwrap();
    let mut result = fhe.encrypt(&fhe.encode(values).unwrap()).unwrap();
    while result.level() > level {
        result = fhe.multiply_plain(&result, &ones).unwrap();
    }
    return result;
}

fn decrypt_integers(fhe: &Fhe, ciphertext: &Ciphertext<ClearBackend>) -> Vec<u64> {
    fhe.decode(&fhe.decrypt(ciphertext).unwrap()).unwrap()
}

fn decrypt_reals(fhe: &Fhe, ciphertext: &Ciphertext<ClearBackend>) -> Vec<f64> {
    fhe.decode(&fhe.decrypt(ciphertext).unwrap()).unwrap()
}

fn distinct_levels(max_level: usize) -> impl Strategy<Value = (usize, usize)> {
    (1..=max_level, 1..=max_level).prop_filter("levels must differ", |(l1, l2)| l1 != l2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_match_levels_converges(
        a in prop::collection::vec(0u64..1000, 1..32),
        b in prop::collection::vec(0u64..1000, 1..32),
        (l1, l2) in distinct_levels(3)
    ) {
        let fhe = integer_fhe();
        let c1 = encrypt_integers_at(fhe, &a, l1);
        let c2 = encrypt_integers_at(fhe, &b, l2);
        let (d1, d2) = fhe.match_levels(&c1, &c2).unwrap();
        prop_assert_eq!(l1.min(l2), d1.level());
        prop_assert_eq!(l1.min(l2), d2.level());
        prop_assert_eq!(decrypt_integers(fhe, &c1), decrypt_integers(fhe, &d1));
        prop_assert_eq!(decrypt_integers(fhe, &c2), decrypt_integers(fhe, &d2));
        let (lower, matched_lower) = if l1 < l2 { (&c1, &d1) } else { (&c2, &d2) };
        prop_assert_eq!(lower.level(), matched_lower.level());
        prop_assert_eq!(lower.size(), matched_lower.size());
    }

    #[test]
    fn prop_match_levels_and_scales_converges(
        a in prop::collection::vec(-10f64..10., 1..16),
        b in prop::collection::vec(-10f64..10., 1..16),
        multiplications in 1usize..=2
    ) {
        let fhe = approximate_fhe();
        let c1 = fhe.encrypt(&fhe.encode(&a).unwrap()).unwrap();
        let mut c2 = fhe.encrypt(&fhe.encode(&b).unwrap()).unwrap();
        let scalar = fhe.encrypt(&fhe.encode(&vec![0.5; fhe.slot_count()]).unwrap()).unwrap();
        for _ in 0..multiplications {
            c2 = fhe.multiply(&c2, &scalar).unwrap();
        }
        let (d1, d2) = fhe.match_levels_and_scales(&c1, &c2).unwrap();
        prop_assert_eq!(d1.level(), d2.level());
        prop_assert!((d1.scale() - d2.scale()).abs() / d2.scale() < 1. / 1024.);
        prop_assert!((d1.scale() / fhe.scale().unwrap()).log2().abs() < 0.01);
        for (x, y) in a.iter().zip(decrypt_reals(fhe, &d1).iter()) {
            prop_assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn prop_multiply_consumes_one_level(
        a in prop::collection::vec(0u64..1000, 1..32),
        level in 2usize..=3
    ) {
        let fhe = integer_fhe();
        let t = fhe.plain_modulus().unwrap();
        let c = encrypt_integers_at(fhe, &a, level);
        let product = fhe.multiply(&c, &c).unwrap();
        prop_assert_eq!(level - 1, product.level());
        prop_assert_eq!(2, product.size());
        prop_assert!(!product.is_exhausted());
        let decrypted = decrypt_integers(fhe, &product);
        for (x, y) in a.iter().zip(decrypted.iter()) {
            prop_assert_eq!(x * x % t, *y);
        }
    }

    #[test]
    fn prop_column_rotation_is_involution(a in prop::collection::vec(0u64..1000, 1..4096)) {
        let fhe = integer_fhe();
        let c = fhe.encrypt(&fhe.encode(&a).unwrap()).unwrap();
        let twice = fhe.rotate_columns(&fhe.rotate_columns(&c).unwrap()).unwrap();
        prop_assert_eq!(decrypt_integers(fhe, &c), decrypt_integers(fhe, &twice));
    }

    #[test]
    fn prop_row_sum_is_cyclic_window_sum(
        a in prop::collection::vec(0u64..1000, 1..64),
        log_range in 1u32..=6
    ) {
        let fhe = integer_fhe();
        let row_size = fhe.slot_count() / 2;
        let range_size = 1 << log_range;
        let c = fhe.encrypt(&fhe.encode(&a).unwrap()).unwrap();
        let input = decrypt_integers(fhe, &c);
        let result = decrypt_integers(fhe, &fhe.row_sum(&c, range_size).unwrap());
        for row in 0..2 {
            for i in (0..8).chain((row_size - 8)..row_size) {
                let expected: u64 = (0..range_size).map(|k| input[row * row_size + (i + k) % row_size]).sum();
                prop_assert_eq!(expected, result[row * row_size + i]);
            }
        }
    }

    #[test]
    fn prop_row_sum_rejects_invalid_ranges(range_size in 0usize..10000) {
        let fhe = integer_fhe();
        let half_slot_count = fhe.slot_count() / 2;
        let c = fhe.encrypt(&fhe.encode(&[1u64]).unwrap()).unwrap();
        let valid = range_size >= 2 && range_size <= half_slot_count && range_size.is_power_of_two();
        match fhe.row_sum(&c, range_size) {
            Ok(_) => prop_assert!(valid),
            Err(e) => {
                prop_assert!(!valid);
                prop_assert_eq!(Error::InvalidRange { range_size, half_slot_count }, e);
            }
        }
    }

    #[test]
    fn prop_integer_round_trip(a in prop::collection::vec(-100000i64..100000, 0..256)) {
        let fhe = integer_fhe();
        let decrypted: Vec<i64> = fhe.decode(&fhe.decrypt(&fhe.encrypt(&fhe.encode(&a).unwrap()).unwrap()).unwrap()).unwrap();
        prop_assert_eq!(&a[..], &decrypted[..a.len()]);
    }

    #[test]
    fn prop_integer_addition_across_levels(
        a in prop::collection::vec(0u64..1000, 1..32),
        b in prop::collection::vec(0u64..1000, 1..32),
        l1 in 1usize..=3,
        l2 in 1usize..=3
    ) {
        let fhe = integer_fhe();
        let sum = fhe.add(&encrypt_integers_at(fhe, &a, l1), &encrypt_integers_at(fhe, &b, l2)).unwrap();
        prop_assert_eq!(l1.min(l2), sum.level());
        let decrypted = decrypt_integers(fhe, &sum);
        for i in 0..a.len().max(b.len()) {
            prop_assert_eq!(a.get(i).unwrap_or(&0) + b.get(i).unwrap_or(&0), decrypted[i]);
        }
    }

    #[test]
    fn prop_approximate_addition_across_levels(
        a in prop::collection::vec(-10f64..10., 1..16),
        b in prop::collection::vec(-10f64..10., 1..16),
        l1 in 1usize..=3,
        l2 in 1usize..=3
    ) {
        let fhe = approximate_fhe();
        let c1 = encrypt_reals_at(fhe, &a, l1);
        let c2 = encrypt_reals_at(fhe, &b, l2);
        let sum = fhe.add(&c1, &c2).unwrap();
        prop_assert_eq!(l1.min(l2), sum.level());
        let decrypted = decrypt_reals(fhe, &sum);
        for i in 0..a.len().max(b.len()) {
            prop_assert!((a.get(i).unwrap_or(&0.) + b.get(i).unwrap_or(&0.) - decrypted[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn prop_polynomial_evaluation_matches_plain(
        a in prop::collection::vec(-1f64..1., 1..16),
        coefficients in prop::collection::vec(-2f64..2., 0..=4)
    ) {
        let fhe = approximate_fhe();
        let c = fhe.encrypt(&fhe.encode(&a).unwrap()).unwrap();
        let result = decrypt_reals(fhe, &fhe.evaluate_polynomial(&c, &coefficients).unwrap());
        for (x, y) in a.iter().zip(result.iter()) {
            prop_assert!((poly::evaluate(&coefficients, *x) - y).abs() < 1e-4);
        }
    }

    #[test]
    fn prop_builder_enforces_security_bound(chain in prop::collection::vec(30u32..=60, 1..6)) {
        let total_bits: u32 = chain.iter().sum();
        let result = FheBuilder::new().build_integer_scheme_with_chain(IntScheme::Bfv, 8192, 20, &chain);
        if total_bits > 218 {
            prop_assert_eq!(Some(Error::ParameterOverflow { total_bits, max_bits: 218 }), result.err());
        } else {
            prop_assert_eq!(chain.len(), result.unwrap().context().chain_length());
        }
    }
}
