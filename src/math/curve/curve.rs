use crate::math::symbolic::symbolicerror::SymbolicResult;

/// 可在實數點上求值與求導的曲線。
pub trait Curve {
    fn value(&self, x: f64) -> f64;

    fn derivative(&self, x: f64) -> f64;
}

/// 可解析求定積分的曲線。
///
/// 符號慣例：∫_a^b = -∫_b^a，a == b 時為 0。
pub trait CurveIntegration {
    fn integral(&self, a: f64, b: f64) -> SymbolicResult<f64>;
}
