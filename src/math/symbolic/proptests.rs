//! Polynomial 與 SegmentFunction 的性質測試。
//!
//! 係數與 exp coef 取小整數（或半整數），使所有運算在 f64 中精確，
//! 可以直接用 `==` 比較。

use nalgebra::DVector;
use proptest::prelude::*;

use crate::math::symbolic::polynomial::Polynomial;
use crate::math::symbolic::segmentfunction::SegmentFunction;

fn small_coeff() -> impl Strategy<Value = f64> {
    (-8i32..=8).prop_map(f64::from)
}

fn small_poly() -> impl Strategy<Value = Polynomial> {
    proptest::collection::vec(small_coeff(), 1..=4)
        .prop_map(|coefficients| Polynomial::new(coefficients).unwrap())
}

fn small_exp_coef() -> impl Strategy<Value = f64> {
    (-4i32..=4).prop_map(|k| f64::from(k) / 2.0)
}

fn small_segment_function() -> impl Strategy<Value = SegmentFunction> {
    proptest::collection::vec((small_exp_coef(), small_poly()), 1..=4).prop_map(|terms| {
        let (exp_coefs, polynomials): (Vec<f64>, Vec<Polynomial>) = terms.into_iter().unzip();
        SegmentFunction::new(DVector::from_vec(exp_coefs), polynomials).unwrap()
    })
}

fn is_canonical(f: &SegmentFunction) -> bool {
    f.exp_coefs().len() == f.polynomials().len()
        && f.exp_coefs().as_slice().windows(2).all(|pair| pair[0] < pair[1])
}

proptest! {
    // Polynomial

    #[test]
    fn poly_leading_coefficient_is_nonzero(p in small_poly()) {
        let leading = p.coefficient(p.degree()).unwrap();
        prop_assert!(leading != 0.0 || p.degree() == 0);
    }

    #[test]
    fn poly_add_commutative(a in small_poly(), b in small_poly()) {
        prop_assert_eq!(&a + &b, &b + &a);
    }

    #[test]
    fn poly_mul_commutative(a in small_poly(), b in small_poly()) {
        prop_assert_eq!(&a * &b, &b * &a);
    }

    #[test]
    fn poly_distributive(a in small_poly(), b in small_poly(), c in small_poly()) {
        prop_assert_eq!(&a * &(&b + &c), &(&a * &b) + &(&a * &c));
    }

    #[test]
    fn poly_mul_degree_adds(a in small_poly(), b in small_poly()) {
        prop_assume!(!a.is_zero() && !b.is_zero());
        prop_assert_eq!((&a * &b).degree(), a.degree() + b.degree());
    }

    #[test]
    fn poly_sub_self_is_zero(a in small_poly()) {
        prop_assert!((&a - &a).is_zero());
    }

    #[test]
    fn poly_derivative_is_linear(a in small_poly(), b in small_poly()) {
        prop_assert_eq!((&a + &b).derivative(), &a.derivative() + &b.derivative());
    }

    // SegmentFunction

    #[test]
    fn segf_is_canonical_after_every_operation(f in small_segment_function(), g in small_segment_function()) {
        prop_assert!(is_canonical(&f));
        prop_assert!(is_canonical(&(&f + &g)));
        prop_assert!(is_canonical(&(&f - &g)));
        prop_assert!(is_canonical(&(&f * &g)));
        prop_assert!(is_canonical(&f.derivative()));
    }

    #[test]
    fn segf_term_count_is_distinct_exponent_count(
        terms in proptest::collection::vec((small_exp_coef(), small_poly()), 1..=6)
    ) {
        let mut distinct: Vec<f64> = terms.iter().map(|(c, _)| *c).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        let (exp_coefs, polynomials): (Vec<f64>, Vec<Polynomial>) = terms.into_iter().unzip();
        let f = SegmentFunction::new(DVector::from_vec(exp_coefs), polynomials).unwrap();
        prop_assert_eq!(f.len(), distinct.len());
    }

    #[test]
    fn segf_add_then_subtract_restores(f in small_segment_function()) {
        prop_assert_eq!(&(&f + &f) - &f, f);
    }

    #[test]
    fn segf_add_commutative(f in small_segment_function(), g in small_segment_function()) {
        prop_assert_eq!(&f + &g, &g + &f);
    }

    #[test]
    fn segf_power_law(f in small_segment_function(), m in 0i64..3, n in 0i64..3) {
        prop_assert_eq!(&f.pow(m).unwrap() * &f.pow(n).unwrap(), f.pow(m + n).unwrap());
    }

    #[test]
    fn segf_pow_zero_is_identity(f in small_segment_function()) {
        prop_assert_eq!(f.pow(0).unwrap(), SegmentFunction::one());
    }

    #[test]
    fn segf_derivative_is_linear(f in small_segment_function(), g in small_segment_function()) {
        prop_assert_eq!((&f + &g).derivative(), &f.derivative() + &g.derivative());
    }
}
