use std::fmt;
use std::ops::{
    Add,
    Mul,
    Neg,
    Sub
};

use nalgebra::DVector;
use serde::{
    Deserialize,
    Serialize
};

use crate::math::curve::curve::Curve;
use crate::math::symbolic::symbolicerror::{
    SymbolicError,
    SymbolicResult
};

// ─────────────────────────────────────────────
// Polynomial
// ─────────────────────────────────────────────
//
// 係數以遞增次方存放：coefficients[k] 為 x^k 的係數，
//   p(x) = a_0 + a_1·x + ... + a_n·x^n
//
// 建構時一律去除尾端的 0，使 degree 最小；零多項式固定為 [0]，degree 為 0。
// 所有運算都回傳新的值，不修改輸入。
//
// tracks_gradient 只是一個附帶的旗標：二元運算取 OR，其餘運算原樣保留，
// 本模組內沒有任何計算依賴它。

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "PolynomialJsonProp", into = "PolynomialJsonProp")]
pub struct Polynomial {
    coefficients: DVector<f64>,
    tracks_gradient: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct PolynomialJsonProp {
    pub(crate) coefficients: Vec<f64>,
    #[serde(default = "default_tracks_gradient")]
    pub(crate) tracks_gradient: bool,
}

pub(crate) fn default_tracks_gradient() -> bool {
    true
}

/// 去除尾端精確為 0 的係數，至少保留一個係數。
fn trim_trailing_zeros(coefficients: DVector<f64>) -> DVector<f64> {
    let n_kept = coefficients
        .as_slice()
        .iter()
        .rposition(|&a| a != 0.0)
        .map_or(1, |k| k + 1);
    if n_kept == coefficients.len() {
        coefficients
    } else {
        DVector::from_iterator(n_kept, coefficients.iter().take(n_kept).copied())
    }
}

impl Polynomial {
    /// 由係數建構，預設追蹤梯度。
    pub fn new(coefficients: Vec<f64>) -> SymbolicResult<Polynomial> {
        Self::new_with_gradient(coefficients, default_tracks_gradient())
    }

    pub fn new_with_gradient(coefficients: Vec<f64>, tracks_gradient: bool) -> SymbolicResult<Polynomial> {
        Self::from_dvector(DVector::from_vec(coefficients), tracks_gradient)
    }

    pub fn from_dvector(coefficients: DVector<f64>, tracks_gradient: bool) -> SymbolicResult<Polynomial> {
        if coefficients.is_empty() {
            return Err(SymbolicError::invalid_input("empty coefficient sequence"));
        }
        if coefficients.iter().any(|a| a.is_nan()) {
            return Err(SymbolicError::invalid_input("NaN coefficient"));
        }
        Ok(Self::from_trimmed(coefficients, tracks_gradient))
    }

    /// 單一係數（degree 0）的多項式。
    pub fn constant(value: f64) -> SymbolicResult<Polynomial> {
        Self::new(vec![value])
    }

    /// 純量運算用的常數：不追蹤梯度，與其他多項式 OR 後不改變對方的旗標。
    pub(crate) fn scalar(value: f64) -> Polynomial {
        Self::from_trimmed(DVector::from_element(1, value), false)
    }

    pub fn zero() -> Polynomial {
        Self::from_trimmed(DVector::from_element(1, 0.0), default_tracks_gradient())
    }

    pub fn one() -> Polynomial {
        Self::from_trimmed(DVector::from_element(1, 1.0), default_tracks_gradient())
    }

    fn from_trimmed(coefficients: DVector<f64>, tracks_gradient: bool) -> Polynomial {
        Polynomial {
            coefficients: trim_trailing_zeros(coefficients),
            tracks_gradient,
        }
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn tracks_gradient(&self) -> bool {
        self.tracks_gradient
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.len() == 1 && self.coefficients[0] == 0.0
    }

    /// x^k 的係數；k 超過 degree 時回傳 `IndexOutOfRange`。
    pub fn coefficient(&self, k: usize) -> SymbolicResult<f64> {
        self.coefficients
            .as_slice()
            .get(k)
            .copied()
            .ok_or(SymbolicError::IndexOutOfRange { index: k, degree: self.degree() })
    }

    /// p'(x)：第 k 個係數變為 k·a_k 放在位置 k-1；degree 0 的導數為 [0]。
    pub fn derivative(&self) -> Polynomial {
        let degree = self.degree();
        if degree == 0 {
            return Self::from_trimmed(DVector::zeros(1), self.tracks_gradient);
        }
        let coefficients = DVector::from_fn(degree, |k, _| (k + 1) as f64 * self.coefficients[k + 1]);
        Self::from_trimmed(coefficients, self.tracks_gradient)
    }

    /// ∫p(x)dx：a_k 變為 a_k / (k+1) 放在位置 k+1，常數項固定為 0。
    pub fn antiderivative(&self) -> Polynomial {
        let n = self.coefficients.len();
        let coefficients = DVector::from_fn(n + 1, |k, _| {
            if k == 0 {
                0.0
            } else {
                self.coefficients[k - 1] / k as f64
            }
        });
        Self::from_trimmed(coefficients, self.tracks_gradient)
    }

    /// 以 Horner 法求 p(x)。
    pub fn value_at(&self, x: f64) -> f64 {
        self.coefficients
            .as_slice()
            .iter()
            .rev()
            .fold(0.0, |acc, &a| f64::mul_add(acc, x, a))
    }

    /// 以 Horner 法求 p'(x)，不建立導數多項式。
    pub fn derivative_at(&self, x: f64) -> f64 {
        self.coefficients
            .as_slice()
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, &a)| f64::mul_add(acc, x, k as f64 * a))
    }

    pub fn value_vector(&self, xs: &DVector<f64>) -> DVector<f64> {
        xs.map(|x| self.value_at(x))
    }

    fn scale(&self, factor: f64) -> Polynomial {
        Self::from_trimmed(&self.coefficients * factor, self.tracks_gradient)
    }

    fn padded(&self, len: usize) -> DVector<f64> {
        let n = self.coefficients.len();
        DVector::from_fn(len, |k, _| if k < n { self.coefficients[k] } else { 0.0 })
    }
}

impl PartialEq for Polynomial {
    /// 精確比較：degree 相同且每個係數以 `==` 相等，不使用容忍值。
    fn eq(&self, other: &Polynomial) -> bool {
        self.degree() == other.degree()
            && self
                .coefficients
                .iter()
                .zip(other.coefficients.iter())
                .all(|(a, b)| a == b)
    }
}

impl Curve for Polynomial {
    fn value(&self, x: f64) -> f64 {
        self.value_at(x)
    }

    fn derivative(&self, x: f64) -> f64 {
        self.derivative_at(x)
    }
}

// ─────────────────────────────────────────────
// 算術運算子
// ─────────────────────────────────────────────

impl Add<&Polynomial> for &Polynomial {
    type Output = Polynomial;

    fn add(self, other: &Polynomial) -> Polynomial {
        let len = self.coefficients.len().max(other.coefficients.len());
        Polynomial::from_trimmed(
            self.padded(len) + other.padded(len),
            self.tracks_gradient || other.tracks_gradient,
        )
    }
}

impl Mul<&Polynomial> for &Polynomial {
    type Output = Polynomial;

    /// 直接以卷積累加：c_{i+j} += a_i·b_j
    fn mul(self, other: &Polynomial) -> Polynomial {
        let mut product = DVector::<f64>::zeros(self.degree() + other.degree() + 1);
        for (i, &a) in self.coefficients.iter().enumerate() {
            for (j, &b) in other.coefficients.iter().enumerate() {
                product[i + j] += a * b;
            }
        }
        Polynomial::from_trimmed(product, self.tracks_gradient || other.tracks_gradient)
    }
}

impl Sub<&Polynomial> for &Polynomial {
    type Output = Polynomial;

    fn sub(self, other: &Polynomial) -> Polynomial {
        self + &(-other)
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        self.scale(-1.0)
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        -&self
    }
}

/// 純量視為 degree 0 的多項式；純量不帶梯度旗標，結果沿用左運算元的旗標。
impl Add<f64> for &Polynomial {
    type Output = Polynomial;

    fn add(self, other: f64) -> Polynomial {
        let mut coefficients = self.coefficients.clone();
        coefficients[0] += other;
        Polynomial::from_trimmed(coefficients, self.tracks_gradient)
    }
}

impl Sub<f64> for &Polynomial {
    type Output = Polynomial;

    fn sub(self, other: f64) -> Polynomial {
        self + (-other)
    }
}

impl Mul<f64> for &Polynomial {
    type Output = Polynomial;

    fn mul(self, other: f64) -> Polynomial {
        self.scale(other)
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp<Polynomial> for Polynomial {
            type Output = Polynomial;

            fn $method(self, other: Polynomial) -> Polynomial {
                (&self).$method(&other)
            }
        }

        impl $imp<&Polynomial> for Polynomial {
            type Output = Polynomial;

            fn $method(self, other: &Polynomial) -> Polynomial {
                (&self).$method(other)
            }
        }

        impl $imp<f64> for Polynomial {
            type Output = Polynomial;

            fn $method(self, other: f64) -> Polynomial {
                (&self).$method(other)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, a) in self.coefficients.iter().enumerate() {
            if k > 0 {
                write!(f, " + ")?;
            }
            match k {
                0 => write!(f, "{}", a)?,
                1 => write!(f, "{}·x", a)?,
                _ => write!(f, "{}·x^{}", a, k)?,
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// serde
// ─────────────────────────────────────────────

impl TryFrom<PolynomialJsonProp> for Polynomial {
    type Error = SymbolicError;

    fn try_from(prop: PolynomialJsonProp) -> SymbolicResult<Polynomial> {
        Polynomial::new_with_gradient(prop.coefficients, prop.tracks_gradient)
    }
}

impl From<Polynomial> for PolynomialJsonProp {
    fn from(polynomial: Polynomial) -> PolynomialJsonProp {
        PolynomialJsonProp {
            coefficients: polynomial.coefficients.iter().copied().collect(),
            tracks_gradient: polynomial.tracks_gradient,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn poly(coefficients: &[f64]) -> Polynomial {
        Polynomial::new(coefficients.to_vec()).unwrap()
    }

    #[test]
    fn degree_counts_from_last_nonzero_coefficient() {
        assert_eq!(poly(&[1.0, 1.0, 1.0]).degree(), 2);
        assert_eq!(poly(&[1.0, 1.0, 0.0, 0.0]).degree(), 1);
        assert_eq!(poly(&[1.0, 1.0, 0.0, 0.0]).coefficients().len(), 2);
    }

    #[test]
    fn all_zero_input_becomes_single_zero() {
        let p = poly(&[0.0, 0.0, 0.0]);
        assert_eq!(p.degree(), 0);
        assert_eq!(p.coefficients(), &DVector::from_vec(vec![0.0]));
        assert!(p.is_zero());
        assert_eq!(p, Polynomial::zero());
    }

    #[test]
    fn empty_or_nan_input_is_rejected() {
        assert!(matches!(Polynomial::new(vec![]), Err(SymbolicError::InvalidInput(_))));
        assert!(matches!(
            Polynomial::new(vec![1.0, f64::NAN]),
            Err(SymbolicError::InvalidInput(_))
        ));
        assert!(matches!(Polynomial::constant(f64::NAN), Err(SymbolicError::InvalidInput(_))));
        assert_eq!(Polynomial::constant(2.5).unwrap(), poly(&[2.5]));
    }

    #[test]
    fn addition_pads_shorter_operand() {
        let sum = poly(&[1.0, 1.0, 1.0]) + poly(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(sum, poly(&[2.0, 2.0, 2.0, 1.0]));
    }

    #[test]
    fn addition_retrims_cancelled_leading_terms() {
        let sum = poly(&[1.0, 2.0, 3.0]) + poly(&[0.0, 0.0, -3.0]);
        assert_eq!(sum.degree(), 1);
        assert_eq!(sum, poly(&[1.0, 2.0]));
    }

    #[test]
    fn multiplication_is_convolution() {
        assert_eq!(poly(&[1.0, 1.0]) * poly(&[1.0, 1.0]), poly(&[1.0, 2.0, 1.0]));
        assert_eq!(poly(&[1.0, -1.0]) * poly(&[1.0, 1.0]), poly(&[1.0, 0.0, -1.0]));
        assert_eq!(poly(&[2.0, 3.0]) * Polynomial::zero(), Polynomial::zero());
    }

    #[test]
    fn subtraction_of_self_is_zero() {
        let p = poly(&[3.0, -2.0, 5.0]);
        assert!((&p - &p).is_zero());
        assert_eq!(poly(&[1.0, 2.0]) - poly(&[0.0, 0.0, 1.0]), poly(&[1.0, 2.0, -1.0]));
    }

    #[test]
    fn scalar_operators_act_on_constant_term_or_scale() {
        let p = poly(&[1.0, 2.0]);
        assert_eq!(&p + 2.0, poly(&[3.0, 2.0]));
        assert_eq!(&p - 1.0, poly(&[0.0, 2.0]));
        assert_eq!(&p * 0.5, poly(&[0.5, 1.0]));
        assert_eq!(&p * 0.0, Polynomial::zero());
        assert_eq!(-p, poly(&[-1.0, -2.0]));
    }

    #[test]
    fn derivative_of_constant_is_zero() {
        assert_eq!(Polynomial::constant(7.0).unwrap().derivative(), poly(&[0.0]));
        assert_eq!(poly(&[1.0, 1.0, 1.0]).derivative(), poly(&[1.0, 2.0]));
    }

    #[test]
    fn antiderivative_divides_by_next_power() {
        let p = poly(&[1.0, 2.0, 3.0]);
        assert_eq!(p.antiderivative(), poly(&[0.0, 1.0, 1.0, 1.0]));
        assert_eq!(p.antiderivative().derivative(), p);
        assert_eq!(Polynomial::zero().antiderivative(), Polynomial::zero());
    }

    #[test]
    fn indexing_past_degree_fails() {
        let p = poly(&[4.0, 5.0]);
        assert_eq!(p.coefficient(1), Ok(5.0));
        assert_eq!(
            p.coefficient(2),
            Err(SymbolicError::IndexOutOfRange { index: 2, degree: 1 })
        );
    }

    #[test]
    fn evaluation_matches_power_sum() {
        let p = poly(&[1.0, -3.0, 0.5]);
        assert_abs_diff_eq!(p.value(2.0), 1.0 - 6.0 + 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.derivative_at(2.0), -3.0 + 2.0, epsilon = 1e-12);
        let values = p.value_vector(&DVector::from_vec(vec![0.0, 1.0]));
        assert_abs_diff_eq!(values[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], -1.5, epsilon = 1e-12);
    }

    #[test]
    fn scalar_operators_keep_left_flag() {
        let untracked = Polynomial::new_with_gradient(vec![1.0, 2.0], false).unwrap();
        assert!(!(&untracked + 1.0).tracks_gradient());
        assert!(!(&untracked - 1.0).tracks_gradient());
        assert!(!(&untracked * 3.0).tracks_gradient());
        assert!((&poly(&[1.0]) * 3.0).tracks_gradient());
    }

    #[test]
    fn gradient_flag_is_ored_and_ignored_by_equality() {
        let a = Polynomial::new_with_gradient(vec![1.0], false).unwrap();
        let b = Polynomial::new_with_gradient(vec![1.0], true).unwrap();
        assert!(!(&a + &a).tracks_gradient());
        assert!((&a + &b).tracks_gradient());
        assert!((&a * &b).tracks_gradient());
        assert!(!a.derivative().tracks_gradient());
        assert!(!a.clone().tracks_gradient());
        assert_eq!(a, b);
    }

    #[test]
    fn clone_is_independent() {
        let p = poly(&[1.0, 2.0]);
        let q = p.clone();
        let r = &p + &q;
        assert_eq!(p, poly(&[1.0, 2.0]));
        assert_eq!(r, poly(&[2.0, 4.0]));
    }

    #[test]
    fn json_round_trip_trims_coefficients() {
        let p: Polynomial = serde_json::from_str(r#"{"coefficients": [1.0, 2.0, 0.0]}"#).unwrap();
        assert_eq!(p, poly(&[1.0, 2.0]));
        assert!(p.tracks_gradient());

        let text = serde_json::to_string(&p).unwrap();
        let back: Polynomial = serde_json::from_str(&text).unwrap();
        assert_eq!(back, p);

        assert!(serde_json::from_str::<Polynomial>(r#"{"coefficients": []}"#).is_err());
    }

    #[test]
    fn display_lists_powers() {
        assert_eq!(poly(&[1.0, 2.0, 3.0]).to_string(), "1 + 2·x + 3·x^2");
    }
}
