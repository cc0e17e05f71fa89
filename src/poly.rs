use crate::error::*;

///
/// Computes `a (a - 1) ... (b + 1) = a! / b!`, which is `1` if `b >= a`.
///
pub fn factorial(a: u32, b: u32) -> f64 {
    (b..a).map(|i| (i + 1) as f64).product()
}

fn central_binomial(n: u32) -> f64 {
    factorial(2 * n, n) / factorial(n, 0)
}

pub fn differentiate(poly: &[f64]) -> Vec<f64> {
    poly.iter().enumerate().skip(1).map(|(i, c)| c * i as f64).collect()
}

pub fn add(lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
    let mut result = vec![0.; lhs.len().max(rhs.len())];
    for (i, c) in lhs.iter().enumerate() {
        result[i] += c;
    }
    for (i, c) in rhs.iter().enumerate() {
        result[i] += c;
    }
    return result;
}

pub fn scale(poly: &[f64], scalar: f64) -> Vec<f64> {
    poly.iter().map(|c| c * scalar).collect()
}

///
/// Multiplies two polynomials, given by their coefficients (constant coefficient first).
/// The product with the empty polynomial is the empty polynomial.
///
pub fn mul(lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
    if lhs.is_empty() || rhs.is_empty() {
        return Vec::new();
    }
    let mut result = vec![0.; lhs.len() + rhs.len() - 1];
    for (i, a) in lhs.iter().enumerate() {
        for (j, b) in rhs.iter().enumerate() {
            result[i + j] += a * b;
        }
    }
    return result;
}

pub fn pow(poly: &[f64], exponent: usize) -> Vec<f64> {
    (0..exponent).fold(vec![1.], |current, _| mul(&current, poly))
}

///
/// Evaluates the polynomial at `x` using Horner's rule.
///
pub fn evaluate(poly: &[f64], x: f64) -> f64 {
    poly.iter().rev().fold(0., |current, c| current * x + c)
}

///
/// Computes `f(f(...f(x)...))` with `iterations` applications of `f`.
///
pub fn iterate(poly: &[f64], x: f64, iterations: usize) -> f64 {
    (0..iterations).fold(x, |current, _| evaluate(poly, current))
}

///
/// Returns the polynomial of degree less than `xs.len()` that maps `xs[i]` to `ys[i]`.
///
/// Fails with [`Error::InvalidArgument`] if the lengths differ or the interpolation
/// points are not distinct.
///
pub fn lagrange(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>> {
    if xs.len() != ys.len() {
        return Err(Error::InvalidArgument(format!("got {} interpolation points but {} values", xs.len(), ys.len())));
    }
    let mut result = vec![0.; xs.len()];
    for (i, (xi, yi)) in xs.iter().zip(ys.iter()).enumerate() {
        let mut basis = vec![1.];
        let mut denominator = 1.;
        for (j, xj) in xs.iter().enumerate() {
            if i == j {
                continue;
            }
            if xi == xj {
                return Err(Error::InvalidArgument(format!("interpolation point {} occurs more than once", xi)));
            }
            basis = mul(&basis, &[-xj, 1.]);
            denominator *= xi - xj;
        }
        result = add(&result, &scale(&basis, yi / denominator));
    }
    return Ok(result);
}

///
/// The odd polynomial
/// ```text
/// f_n(x) = sum_(i = 0)^n 4^(-i) binom(2i, i) x (1 - x^2)^i
/// ```
/// of degree `2n + 1`, which approximates the sign function on `[-1, 1]`. It satisfies
/// `f_n(1) = 1`, and iterating it pushes every nonzero input towards its sign.
///
pub fn sign_polynomial(n: u32) -> Vec<f64> {
    let mut result = vec![0.; 2 * n as usize + 2];
    for i in 0..=n {
        let term = mul(&[0., 1.], &pow(&[1., 0., -1.], i as usize));
        result = add(&result, &scale(&term, central_binomial(i) / 4f64.powi(i as i32)));
    }
    return result;
}

///
/// The derivative of [`sign_polynomial()`] at zero, `c_n = (2n + 1) 4^(-n) binom(2n, n)`,
/// i.e. the factor by which one application of `f_n` amplifies small inputs.
///
pub fn sign_polynomial_slope(n: u32) -> f64 {
    (2 * n + 1) as f64 / 4f64.powi(n as i32) * central_binomial(n)
}

///
/// The polynomial
/// ```text
/// h_n(x) = sum_(i = 0)^n binom(2i, i) (2x - 1) (x - x^2)^i = f_n(2x - 1)
/// ```
/// which approximates the step at `1/2` on `[0, 1]` with values in `[-1, 1]`.
///
pub fn shifted_sign_polynomial(n: u32) -> Vec<f64> {
    let mut result = vec![0.; 2 * n as usize + 2];
    for i in 0..=n {
        let term = mul(&[-1., 2.], &pow(&[0., 1., -1.], i as usize));
        result = add(&result, &scale(&term, central_binomial(i)));
    }
    return result;
}

#[cfg(test)]
fn assert_poly_eq(expected: &[f64], actual: &[f64]) {
    assert_eq!(expected.len(), actual.len(), "expected {:?}, got {:?}", expected, actual);
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert!((e - a).abs() < 1e-9, "expected {:?}, got {:?}", expected, actual);
    }
}

#[test]
fn test_factorial() {
    assert_eq!(120., factorial(5, 0));
    assert_eq!(20., factorial(5, 3));
    assert_eq!(1., factorial(3, 3));
    assert_eq!(1., factorial(0, 0));
    assert_eq!(184756., central_binomial(10));
}

#[test]
fn test_arithmetic() {
    assert_poly_eq(&[3., 7., 3., 2.], &mul(&[1., 2.], &[3., 1., 1.]));
    assert_poly_eq(&[1., 3., 3., 1.], &pow(&[1., 1.], 3));
    assert_poly_eq(&[1.], &pow(&[1., 1.], 0));
    assert!(mul(&[], &[1., 2.]).is_empty());
    assert_poly_eq(&[4., 3., 1.], &add(&[1., 2.], &[3., 1., 1.]));
    assert_poly_eq(&[1., 4., 9.], &differentiate(&[5., 1., 2., 3.]));
    assert!(differentiate(&[5.]).is_empty());
}

#[test]
fn test_evaluate() {
    let poly = [1., -2., 0., 1.];
    assert_eq!(1., evaluate(&poly, 0.));
    assert_eq!(5., evaluate(&poly, 2.));
    assert_eq!(0., evaluate(&[], 3.));
    // x -> x^2 applied three times
    assert_eq!(256., iterate(&[0., 0., 1.], 2., 3));
    assert_eq!(2., iterate(&[0., 0., 1.], 2., 0));
}

#[test]
fn test_lagrange() {
    let xs = [-1., 0., 1., 2.];
    let ys = xs.iter().map(|x| evaluate(&[1., -2., 0., 1.], *x)).collect::<Vec<_>>();
    assert_poly_eq(&[1., -2., 0., 1.], &lagrange(&xs, &ys).unwrap());
    assert!(lagrange(&[], &[]).unwrap().is_empty());
    assert!(matches!(lagrange(&[1., 2.], &[1.]), Err(Error::InvalidArgument(_))));
    assert!(matches!(lagrange(&[1., 1.], &[1., 2.]), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_sign_polynomial() {
    assert_poly_eq(&[0., 1.], &sign_polynomial(0));
    assert_poly_eq(&[0., 1.5, 0., -0.5], &sign_polynomial(1));
    assert_poly_eq(&[0., 15. / 8., 0., -10. / 8., 0., 3. / 8.], &sign_polynomial(2));
    for n in 1..6 {
        let f = sign_polynomial(n);
        assert!((evaluate(&f, 1.) - 1.).abs() < 1e-9);
        assert!((evaluate(&f, -1.) + 1.).abs() < 1e-9);
        assert!((evaluate(&differentiate(&f), 0.) - sign_polynomial_slope(n)).abs() < 1e-9);
    }
    assert_eq!(1.5, sign_polynomial_slope(1));
    assert!(iterate(&sign_polynomial(3), 0.05, 8) > 0.999);
    assert!(iterate(&sign_polynomial(3), -0.05, 8) < -0.999);
}

#[test]
fn test_shifted_sign_polynomial() {
    for n in 0..5 {
        let f = sign_polynomial(n);
        let h = shifted_sign_polynomial(n);
        assert_eq!(2 * n as usize + 2, h.len());
        for x in [0., 0.1, 0.5, 0.7, 1.] {
            assert!((evaluate(&f, 2. * x - 1.) - evaluate(&h, x)).abs() < 1e-9);
        }
    }
}
