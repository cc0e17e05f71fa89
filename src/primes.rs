use feanor_math::algorithms::miller_rabin::is_prime;
use feanor_math::algorithms::unity_root::get_prim_root_of_unity;
use feanor_math::homomorphism::*;
use feanor_math::primitive_int::StaticRing;
use feanor_math::ring::*;
use feanor_math::rings::zn::zn_64::Zn;
use feanor_math::rings::zn::ZnRingStore;

const ZZ: StaticRing<i64> = StaticRing::<i64>::RING;

///
/// Returns the largest prime `p < bound` with `p = 1 mod n`, if any.
///
pub fn max_prime_congruent_one_lt_bound(n: i64, bound: i64) -> Option<i64> {
    if bound <= 2 {
        return None;
    }
    let mut candidate = (bound - 2) - ((bound - 2) % n) + 1;
    while candidate > 1 {
        if is_prime(ZZ, &candidate, 10) {
            return Some(candidate);
        }
        candidate -= n;
    }
    return None;
}

///
/// Finds distinct primes `p = 1 mod 2N` of exactly the given bit lengths, in the given order.
/// Primes of equal bit length are chosen in decreasing order.
///
pub fn ntt_friendly_primes(poly_modulus_degree: usize, bit_sizes: &[u32]) -> Option<Vec<u64>> {
    let n = 2 * poly_modulus_degree as i64;
    let mut next_bound = std::collections::HashMap::new();
    let mut result = Vec::with_capacity(bit_sizes.len());
    for bits in bit_sizes {
        let bound = *next_bound.get(bits).unwrap_or(&(1i64 << bits));
        let p = max_prime_congruent_one_lt_bound(n, bound)?;
        if p < (1i64 << (bits - 1)) {
            return None;
        }
        next_bound.insert(*bits, p);
        result.push(p as u64);
    }
    return Some(result);
}

///
/// Computes a primitive `n`-th root of unity modulo the prime `p`, if one exists.
///
pub fn primitive_root_of_unity(p: u64, n: usize) -> Option<u64> {
    let Fp = Zn::new(p);
    let as_field = Fp.as_field().ok()?;
    let root = get_prim_root_of_unity(as_field, n)?;
    let hom = Fp.into_can_hom(as_field).ok()?;
    return Some(Fp.smallest_positive_lift(hom.map(root)) as u64);
}

#[test]
fn test_max_prime_congruent_one_lt_bound() {
    assert_eq!(Some(97), max_prime_congruent_one_lt_bound(16, 100));
    assert_eq!(Some(17), max_prime_congruent_one_lt_bound(16, 97));
    assert_eq!(None, max_prime_congruent_one_lt_bound(16, 17));
}

#[test]
fn test_ntt_friendly_primes() {
    let primes = ntt_friendly_primes(4096, &[40, 40, 30]).unwrap();
    assert_eq!(3, primes.len());
    assert!(primes[0] > primes[1]);
    for (p, bits) in primes.iter().zip([40, 40, 30]) {
        assert_eq!(bits, 64 - p.leading_zeros());
        assert_eq!(1, p % 8192);
        assert!(is_prime(ZZ, &(*p as i64), 10));
    }
    // there is no prime of 3 bits that is 1 mod 2048
    assert_eq!(None, ntt_friendly_primes(1024, &[3]));
}

#[test]
fn test_primitive_root_of_unity() {
    let p = 40961;
    let Fp = Zn::new(p);
    for n in [2, 16, 8192] {
        let root = Fp.coerce(&ZZ, primitive_root_of_unity(p, n).unwrap() as i64);
        assert!(Fp.is_one(&Fp.pow(Fp.clone_el(&root), n)));
        assert!(Fp.is_neg_one(&Fp.pow(root, n / 2)));
    }
    // 40960 = 2^13 * 5, so there is no root of order 2^14
    assert_eq!(None, primitive_root_of_unity(p, 1 << 14));
}
