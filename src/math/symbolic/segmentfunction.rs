use std::collections::HashMap;
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

use crate::math::curve::curve::{
    Curve,
    CurveIntegration
};
use crate::math::symbolic::polynomial::{
    default_tracks_gradient,
    Polynomial
};
use crate::math::symbolic::symbolicerror::{
    SymbolicError,
    SymbolicResult
};
use crate::math::symbolic::uniquevalues;
use crate::settings::EngineSettings;

// ─────────────────────────────────────────────
// SegmentFunction
// ─────────────────────────────────────────────
//
//   f(x) = Σ_i exp(c_i·x)·p_i(x)
//
// exp_coefs[i] 與 polynomials[i] 組成第 i 項。對外可見的值一律是
// canonical form：c_i 兩兩相異並遞增排列。每個建構子與運算結果都經過
// `align` 才回傳。
//
// 注意：c_i 的比較與合併使用精確的 `==`，浮點誤差造成的近似值不會被合併。

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "SegmentFunctionJsonProp", into = "SegmentFunctionJsonProp")]
pub struct SegmentFunction {
    exp_coefs: DVector<f64>,
    polynomials: Vec<Polynomial>,
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct TermJsonProp {
    exp_coef: f64,
    coefficients: Vec<f64>,
    #[serde(default = "default_tracks_gradient")]
    tracks_gradient: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct SegmentFunctionJsonProp {
    terms: Vec<TermJsonProp>,
}

impl SegmentFunction {
    pub fn new(exp_coefs: DVector<f64>, polynomials: Vec<Polynomial>) -> SymbolicResult<SegmentFunction> {
        if exp_coefs.len() != polynomials.len() {
            return Err(SymbolicError::invalid_input(format!(
                "{} exponent coefficients given for {} polynomials",
                exp_coefs.len(),
                polynomials.len()
            )));
        }
        if polynomials.is_empty() {
            return Err(SymbolicError::invalid_input("segment function needs at least one term"));
        }
        if exp_coefs.iter().any(|c| !c.is_finite()) {
            return Err(SymbolicError::invalid_input("exponent coefficients must be finite"));
        }
        Ok(Self::align(exp_coefs, polynomials))
    }

    /// 每一項的 exp coef 皆為 0，等同多項式的和。
    pub fn from_polynomials(polynomials: Vec<Polynomial>) -> SymbolicResult<SegmentFunction> {
        Self::new(DVector::zeros(polynomials.len()), polynomials)
    }

    pub fn from_polynomial(polynomial: Polynomial) -> SegmentFunction {
        SegmentFunction {
            exp_coefs: DVector::zeros(1),
            polynomials: vec![polynomial],
        }
    }

    pub fn constant(value: f64) -> SymbolicResult<SegmentFunction> {
        Ok(Self::from_polynomial(Polynomial::constant(value)?))
    }

    /// 純量運算用：exp coef 為 0 的不追蹤梯度常數項。
    fn scalar(value: f64) -> SegmentFunction {
        Self::from_polynomial(Polynomial::scalar(value))
    }

    /// 乘法單位元素：exp(0·x)·1
    pub fn one() -> SegmentFunction {
        Self::from_polynomial(Polynomial::one())
    }

    pub fn exp_coefs(&self) -> &DVector<f64> {
        &self.exp_coefs
    }

    pub fn polynomials(&self) -> &[Polynomial] {
        &self.polynomials
    }

    /// 依 exp coef 遞增的 (c_i, p_i)。
    pub fn terms(&self) -> impl Iterator<Item = (f64, &Polynomial)> {
        self.exp_coefs.iter().copied().zip(self.polynomials.iter())
    }

    pub fn len(&self) -> usize {
        self.polynomials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polynomials.is_empty()
    }

    /// 所有項中最高的多項式 degree。
    pub fn degree(&self) -> usize {
        self.polynomials
            .iter()
            .map(Polynomial::degree)
            .max()
            .unwrap_or(0)
    }

    // ─────────────────────────────────────────
    // canonical form
    // ─────────────────────────────────────────

    /// 將任意順序、可能重複的項整理成 canonical form。
    ///
    /// 1. 取出 exp coef 的相異值（遞增）、每個原始索引對應的相異值位置、出現次數
    /// 2. 若沒有重複，只需依相異值的順序重新排列
    /// 3. 若有重複，同一相異值以第一次出現的項為代表，其餘項的多項式依序加到代表上
    fn align(exp_coefs: DVector<f64>, polynomials: Vec<Polynomial>) -> SegmentFunction {
        let unique_values = uniquevalues::unique(&exp_coefs);
        let mut slots: Vec<Option<Polynomial>> = vec![None; unique_values.len()];

        if !unique_values.has_duplicates() {
            for (i, polynomial) in polynomials.into_iter().enumerate() {
                slots[unique_values.inverse[i]] = Some(polynomial);
            }
        } else {
            log::debug!(
                "align: merging {} terms into {} distinct exponent coefficients ({} duplicated)",
                exp_coefs.len(),
                unique_values.len(),
                unique_values.counts.iter().filter(|&&count| count > 1).count()
            );
            for (i, polynomial) in polynomials.into_iter().enumerate() {
                let k = unique_values.inverse[i];
                slots[k] = Some(match slots[k].take() {
                    Some(representative) => &representative + &polynomial,
                    None => polynomial,
                });
            }
        }

        SegmentFunction {
            exp_coefs: unique_values.values,
            polynomials: slots.into_iter().flatten().collect(),
        }
    }

    fn concat(&self, other_exp_coefs: &DVector<f64>, other_polynomials: Vec<Polynomial>) -> SegmentFunction {
        let exp_coefs = DVector::from_iterator(
            self.exp_coefs.len() + other_exp_coefs.len(),
            self.exp_coefs.iter().chain(other_exp_coefs.iter()).copied(),
        );
        let mut polynomials = self.polynomials.clone();
        polynomials.extend(other_polynomials);
        Self::align(exp_coefs, polynomials)
    }

    // ─────────────────────────────────────────
    // 代數運算
    // ─────────────────────────────────────────

    /// 以平方法求 n 次方；n < 0 時回傳 `InvalidInput`。
    pub fn pow(&self, n: i64) -> SymbolicResult<SegmentFunction> {
        let n = u64::try_from(n)
            .map_err(|_| SymbolicError::invalid_input(format!("negative power {}", n)))?;
        Ok(self.pow_unsigned(n, &mut HashMap::new()))
    }

    /// f^n = f^(n/2) · f^(n - n/2)。
    ///
    /// 每一層最多出現兩個相鄰的次方，`powers` 記錄已算過的結果，
    /// 因此乘法次數為 O(log n)。
    fn pow_unsigned(&self, n: u64, powers: &mut HashMap<u64, SegmentFunction>) -> SegmentFunction {
        match n {
            0 => SegmentFunction::one(),
            1 => self.clone(),
            _ => {
                if let Some(power) = powers.get(&n) {
                    return power.clone();
                }
                let lhs = self.pow_unsigned(n / 2, powers);
                let rhs = self.pow_unsigned(n - n / 2, powers);
                let power = &lhs * &rhs;
                powers.insert(n, power.clone());
                power
            }
        }
    }

    /// 乘積法則：d/dx[exp(c·x)·p(x)] = exp(c·x)·(p'(x) + c·p(x))
    ///
    /// 兩組項共用同一個 exp coef 向量，交由 `align` 合併。
    pub fn derivative(&self) -> SegmentFunction {
        let derived = self.polynomials.iter().map(Polynomial::derivative);
        let scaled = self.terms().map(|(c, p)| p * c);
        let polynomials: Vec<Polynomial> = derived.chain(scaled).collect();
        let exp_coefs = DVector::from_iterator(
            2 * self.exp_coefs.len(),
            self.exp_coefs.iter().chain(self.exp_coefs.iter()).copied(),
        );
        Self::align(exp_coefs, polynomials)
    }

    /// 逐項反導數，不加積分常數；分部積分步數上限為預設值。
    pub fn antiderivative(&self) -> SymbolicResult<SegmentFunction> {
        self.antiderivative_with_settings(&EngineSettings::default())
    }

    pub fn antiderivative_with_settings(&self, settings: &EngineSettings) -> SymbolicResult<SegmentFunction> {
        let polynomials = self
            .terms()
            .map(|(c, p)| single_antiderivative(p, c, 0, settings.max_antiderivative_depth))
            .collect::<SymbolicResult<Vec<Polynomial>>>()?;
        Ok(Self::align(self.exp_coefs.clone(), polynomials))
    }

    /// 將 exp(a + b·x) 的加法表示轉為 exp(a)·exp(b·x) 的項。
    ///
    /// 僅適用於 degree ≤ 1 且所有 exp coef 為 0 的函數，否則回傳
    /// `PreconditionViolation`。
    pub fn get_exponential(&self) -> SymbolicResult<SegmentFunction> {
        if self.degree() > 1 {
            return Err(SymbolicError::precondition(format!(
                "get_exponential needs degree <= 1, found degree {}",
                self.degree()
            )));
        }
        if self.exp_coefs.iter().any(|&c| c != 0.0) {
            return Err(SymbolicError::precondition(
                "get_exponential needs every exponent coefficient to be zero",
            ));
        }

        let mut exp_coefs = DVector::<f64>::zeros(self.len());
        let mut constants = Vec::with_capacity(self.len());
        for (i, polynomial) in self.polynomials.iter().enumerate() {
            let coefficients = polynomial.coefficients();
            constants.push(Polynomial::new_with_gradient(
                vec![coefficients[0].exp()],
                polynomial.tracks_gradient(),
            )?);
            if polynomial.degree() == 1 {
                if !coefficients[1].is_finite() {
                    return Err(SymbolicError::invalid_input("exponent coefficients must be finite"));
                }
                exp_coefs[i] = coefficients[1];
            }
        }
        Ok(Self::align(exp_coefs, constants))
    }

    pub fn value_vector(&self, xs: &DVector<f64>) -> DVector<f64> {
        xs.map(|x| self.value(x))
    }
}

/// 單一項 exp(c·x)·p(x) 的反導數（回傳的多項式與原本共用 exp(c·x)）。
///
/// c ≠ 0 時分部積分：
///   ∫exp(cx)p = exp(cx)·p/c - ∫exp(cx)·p'/c
/// 每一步多項式 degree 減一，degree 0 時直接為 p/c。
fn single_antiderivative(
    polynomial: &Polynomial,
    exp_coef: f64,
    depth: usize,
    max_depth: usize,
) -> SymbolicResult<Polynomial> {
    if exp_coef == 0.0 {
        return Ok(polynomial.antiderivative());
    }

    let inverse = 1.0 / exp_coef;
    if !inverse.is_finite() {
        log::warn!("antiderivative: exponent coefficient {} cannot be inverted", exp_coef);
        return Err(SymbolicError::NumericDegeneracy { exp_coef });
    }

    let scaled = polynomial * inverse;
    if polynomial.degree() == 0 {
        return Ok(scaled);
    }

    let next_depth = depth + 1;
    if next_depth > max_depth {
        log::warn!(
            "antiderivative: degree {} term with exponent coefficient {} exceeds depth limit {}",
            polynomial.degree(),
            exp_coef,
            max_depth
        );
        return Err(SymbolicError::RecursionDepthExceeded { depth: next_depth, max_depth });
    }

    log::trace!(
        "antiderivative: step {} reduces degree {} with exponent coefficient {}",
        next_depth,
        polynomial.degree(),
        exp_coef
    );
    let reduced = &polynomial.derivative() * inverse;
    let remainder = single_antiderivative(&reduced, exp_coef, next_depth, max_depth)?;
    Ok(&scaled - &remainder)
}

impl PartialEq for SegmentFunction {
    /// 兩邊皆為 canonical form，逐位置比較 exp coef 與多項式。
    fn eq(&self, other: &SegmentFunction) -> bool {
        self.exp_coefs.len() == other.exp_coefs.len()
            && self
                .terms()
                .zip(other.terms())
                .all(|((c, p), (d, q))| c == d && p == q)
    }
}

impl Curve for SegmentFunction {
    fn value(&self, x: f64) -> f64 {
        self.terms()
            .map(|(c, p)| (c * x).exp() * p.value_at(x))
            .sum()
    }

    fn derivative(&self, x: f64) -> f64 {
        self.terms()
            .map(|(c, p)| (c * x).exp() * f64::mul_add(c, p.value_at(x), p.derivative_at(x)))
            .sum()
    }
}

impl CurveIntegration for SegmentFunction {
    fn integral(&self, a: f64, b: f64) -> SymbolicResult<f64> {
        if a == b {
            return Ok(0.0);
        }
        let antiderivative = self.antiderivative()?;
        Ok(antiderivative.value(b) - antiderivative.value(a))
    }
}

// ─────────────────────────────────────────────
// 算術運算子
// ─────────────────────────────────────────────

impl Add<&SegmentFunction> for &SegmentFunction {
    type Output = SegmentFunction;

    fn add(self, other: &SegmentFunction) -> SegmentFunction {
        self.concat(&other.exp_coefs, other.polynomials.clone())
    }
}

impl Sub<&SegmentFunction> for &SegmentFunction {
    type Output = SegmentFunction;

    /// 將 other 的每個多項式乘上 -1，exp coef 不變，再相加。
    fn sub(self, other: &SegmentFunction) -> SegmentFunction {
        let minus_one = Polynomial::scalar(-1.0);
        let negated = other.polynomials.iter().map(|p| &minus_one * p).collect();
        self.concat(&other.exp_coefs, negated)
    }
}

impl Mul<&SegmentFunction> for &SegmentFunction {
    type Output = SegmentFunction;

    /// exp(c_i·x)·exp(c_j·x) = exp((c_i + c_j)·x)，對所有項配對相乘。
    fn mul(self, other: &SegmentFunction) -> SegmentFunction {
        let n_terms = self.len() * other.len();
        let mut exp_coefs = Vec::with_capacity(n_terms);
        let mut polynomials = Vec::with_capacity(n_terms);
        for (c, p) in self.terms() {
            for (d, q) in other.terms() {
                exp_coefs.push(c + d);
                polynomials.push(p * q);
            }
        }
        SegmentFunction::align(DVector::from_vec(exp_coefs), polynomials)
    }
}

impl Neg for &SegmentFunction {
    type Output = SegmentFunction;

    fn neg(self) -> SegmentFunction {
        SegmentFunction {
            exp_coefs: self.exp_coefs.clone(),
            polynomials: self.polynomials.iter().map(|p| -p).collect(),
        }
    }
}

impl Neg for SegmentFunction {
    type Output = SegmentFunction;

    fn neg(self) -> SegmentFunction {
        -&self
    }
}

/// 純量視為 exp coef 為 0、不追蹤梯度的常數項，各項沿用原本的旗標。
impl Add<f64> for &SegmentFunction {
    type Output = SegmentFunction;

    fn add(self, other: f64) -> SegmentFunction {
        self + &SegmentFunction::scalar(other)
    }
}

impl Sub<f64> for &SegmentFunction {
    type Output = SegmentFunction;

    fn sub(self, other: f64) -> SegmentFunction {
        self - &SegmentFunction::scalar(other)
    }
}

impl Mul<f64> for &SegmentFunction {
    type Output = SegmentFunction;

    fn mul(self, other: f64) -> SegmentFunction {
        self * &SegmentFunction::scalar(other)
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp<SegmentFunction> for SegmentFunction {
            type Output = SegmentFunction;

            fn $method(self, other: SegmentFunction) -> SegmentFunction {
                (&self).$method(&other)
            }
        }

        impl $imp<&SegmentFunction> for SegmentFunction {
            type Output = SegmentFunction;

            fn $method(self, other: &SegmentFunction) -> SegmentFunction {
                (&self).$method(other)
            }
        }

        impl $imp<f64> for SegmentFunction {
            type Output = SegmentFunction;

            fn $method(self, other: f64) -> SegmentFunction {
                (&self).$method(other)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);

impl fmt::Display for SegmentFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (c, p)) in self.terms().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "exp({}·x) * ({})", c, p)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// serde
// ─────────────────────────────────────────────

impl TryFrom<SegmentFunctionJsonProp> for SegmentFunction {
    type Error = SymbolicError;

    fn try_from(prop: SegmentFunctionJsonProp) -> SymbolicResult<SegmentFunction> {
        let exp_coefs = DVector::from_iterator(prop.terms.len(), prop.terms.iter().map(|t| t.exp_coef));
        let polynomials = prop
            .terms
            .into_iter()
            .map(|t| Polynomial::new_with_gradient(t.coefficients, t.tracks_gradient))
            .collect::<SymbolicResult<Vec<Polynomial>>>()?;
        SegmentFunction::new(exp_coefs, polynomials)
    }
}

impl From<SegmentFunction> for SegmentFunctionJsonProp {
    fn from(function: SegmentFunction) -> SegmentFunctionJsonProp {
        let terms = function
            .terms()
            .map(|(c, p)| TermJsonProp {
                exp_coef: c,
                coefficients: p.coefficients().iter().copied().collect(),
                tracks_gradient: p.tracks_gradient(),
            })
            .collect();
        SegmentFunctionJsonProp { terms }
    }
}
