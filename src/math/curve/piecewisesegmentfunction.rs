use crate::math::curve::curve::{
    Curve,
    CurveIntegration
};
use crate::math::symbolic::segmentfunction::SegmentFunction;
use crate::math::symbolic::symbolicerror::{
    SymbolicError,
    SymbolicResult
};
use crate::settings::EngineSettings;

// ─────────────────────────────────────────────
// PiecewiseSegmentFunction
// ─────────────────────────────────────────────
//
// 節點 x_0 < x_1 < ... < x_n 切出 n 個區間，第 i 段在區間 [x_i, x_{i+1})
// 上以區域座標求值：
//   F(x) = f_i(x - x_i)
// 超出範圍時以第一段 / 最後一段外插。

pub struct PiecewiseSegmentFunction {
    breakpoints: Vec<f64>,
    segments: Vec<SegmentFunction>,
    derivative_list: Vec<SegmentFunction>,
    antiderivative_list: Option<Vec<SegmentFunction>>,
}

impl PiecewiseSegmentFunction {
    /// 支援 value() 與 derivative()
    pub fn new(
        breakpoints: Vec<f64>,
        segments: Vec<SegmentFunction>,
    ) -> SymbolicResult<PiecewiseSegmentFunction> {
        Self::new_inner(breakpoints, segments, None)
    }

    /// 另外預計算每段的反導數，支援 CurveIntegration::integral()
    pub fn new_with_integrals(
        breakpoints: Vec<f64>,
        segments: Vec<SegmentFunction>,
        settings: &EngineSettings,
    ) -> SymbolicResult<PiecewiseSegmentFunction> {
        Self::new_inner(breakpoints, segments, Some(settings))
    }

    fn new_inner(
        breakpoints: Vec<f64>,
        segments: Vec<SegmentFunction>,
        settings: Option<&EngineSettings>,
    ) -> SymbolicResult<PiecewiseSegmentFunction> {
        if segments.is_empty() {
            return Err(SymbolicError::invalid_input("piecewise function needs at least one segment"));
        }
        if breakpoints.len() != segments.len() + 1 {
            return Err(SymbolicError::invalid_input(format!(
                "{} breakpoints given for {} segments",
                breakpoints.len(),
                segments.len()
            )));
        }
        if breakpoints.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(SymbolicError::invalid_input("breakpoints must be strictly increasing"));
        }

        let derivative_list = segments.iter().map(SegmentFunction::derivative).collect();
        let antiderivative_list = match settings {
            Some(settings) => Some(
                segments
                    .iter()
                    .map(|segment| segment.antiderivative_with_settings(settings))
                    .collect::<SymbolicResult<Vec<SegmentFunction>>>()?,
            ),
            None => None,
        };

        Ok(PiecewiseSegmentFunction {
            breakpoints,
            segments,
            derivative_list,
            antiderivative_list,
        })
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn segments(&self) -> &[SegmentFunction] {
        &self.segments
    }

    pub fn has_integrals(&self) -> bool {
        self.antiderivative_list.is_some()
    }

    pub fn min_x(&self) -> f64 {
        self.breakpoints[0]
    }

    pub fn max_x(&self) -> f64 {
        self.breakpoints[self.breakpoints.len() - 1]
    }

    fn find_segment(&self, x: f64) -> usize {
        let last = self.segments.len() - 1;
        if x <= self.min_x() {
            0
        } else if x >= self.max_x() {
            last
        } else {
            // x 為 NaN 時 partition_point 為 0，落在第一段
            self.breakpoints.partition_point(|&b| b <= x).saturating_sub(1).min(last)
        }
    }

    /// 第 i 段在 [lhs, rhs] 上的定積分（區域座標），lhs、rhs 皆為全域座標。
    fn segment_integral(antiderivatives: &[SegmentFunction], breakpoints: &[f64], i: usize, lhs: f64, rhs: f64) -> f64 {
        let origin = breakpoints[i];
        antiderivatives[i].value(rhs - origin) - antiderivatives[i].value(lhs - origin)
    }
}

impl Curve for PiecewiseSegmentFunction {
    fn value(&self, x: f64) -> f64 {
        let i = self.find_segment(x);
        self.segments[i].value(x - self.breakpoints[i])
    }

    fn derivative(&self, x: f64) -> f64 {
        let i = self.find_segment(x);
        self.derivative_list[i].value(x - self.breakpoints[i])
    }
}

impl CurveIntegration for PiecewiseSegmentFunction {
    fn integral(&self, a: f64, b: f64) -> SymbolicResult<f64> {
        let antiderivatives = self.antiderivative_list.as_ref().ok_or_else(|| {
            SymbolicError::precondition("integrals not enabled: use new_with_integrals()")
        })?;

        if a == b {
            return Ok(0.0);
        }
        if a > b {
            return self.integral(b, a).map(|value| -value);
        }

        let first = self.find_segment(a);
        let last = self.find_segment(b);
        if first == last {
            return Ok(Self::segment_integral(antiderivatives, &self.breakpoints, first, a, b));
        }

        let mut result = Self::segment_integral(antiderivatives, &self.breakpoints, first, a, self.breakpoints[first + 1]);
        for i in (first + 1)..last {
            result += Self::segment_integral(
                antiderivatives,
                &self.breakpoints,
                i,
                self.breakpoints[i],
                self.breakpoints[i + 1],
            );
        }
        result += Self::segment_integral(antiderivatives, &self.breakpoints, last, self.breakpoints[last], b);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use approx::{
        assert_abs_diff_eq,
        assert_relative_eq
    };
    use nalgebra::DVector;

    use super::*;
    use crate::math::symbolic::polynomial::Polynomial;

    fn poly(coefficients: &[f64]) -> Polynomial {
        Polynomial::new(coefficients.to_vec()).unwrap()
    }

    /// [0, 1)：1 + x；[1, 3]：2·exp(-0.5·(x - 1))
    fn sample() -> PiecewiseSegmentFunction {
        let first = SegmentFunction::from_polynomial(poly(&[1.0, 1.0]));
        let second = SegmentFunction::new(DVector::from_vec(vec![-0.5]), vec![poly(&[2.0])]).unwrap();
        PiecewiseSegmentFunction::new_with_integrals(vec![0.0, 1.0, 3.0], vec![first, second], &EngineSettings::default())
            .unwrap()
    }

    #[test]
    fn evaluates_segments_in_local_coordinates() {
        let f = sample();
        assert_relative_eq!(f.value(0.5), 1.5, max_relative = 1e-12);
        assert_relative_eq!(f.value(1.0), 2.0, max_relative = 1e-12);
        assert_relative_eq!(f.value(2.0), 2.0 * (-0.5_f64).exp(), max_relative = 1e-12);
        assert_relative_eq!(f.derivative(0.2), 1.0, max_relative = 1e-12);
        assert_relative_eq!(f.derivative(2.0), -(-0.5_f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn extrapolates_with_boundary_segments() {
        let f = sample();
        assert_abs_diff_eq!(f.value(-1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(f.value(4.0), 2.0 * (-1.5_f64).exp(), max_relative = 1e-12);
        assert_eq!(f.min_x(), 0.0);
        assert_eq!(f.max_x(), 3.0);
    }

    #[test]
    fn integral_spans_several_segments() {
        let f = sample();
        // ∫_0.5^1 (1 + x) = 0.5 + (1 - 0.25)/2 = 0.875
        // ∫_1^2 2e^{-0.5(x-1)} = 4(1 - e^{-0.5})
        let expected = 0.875 + 4.0 * (1.0 - (-0.5_f64).exp());
        assert_relative_eq!(f.integral(0.5, 2.0).unwrap(), expected, max_relative = 1e-12);
        assert_relative_eq!(f.integral(2.0, 0.5).unwrap(), -expected, max_relative = 1e-12);
        assert_relative_eq!(f.integral(0.0, 0.5).unwrap(), 0.625, max_relative = 1e-12);
    }

    #[test]
    fn integral_requires_precomputed_antiderivatives() {
        let f = PiecewiseSegmentFunction::new(vec![0.0, 1.0], vec![SegmentFunction::one()]).unwrap();
        assert!(!f.has_integrals());
        assert!(matches!(f.integral(0.0, 1.0), Err(SymbolicError::PreconditionViolation(_))));
    }

    #[test]
    fn nan_argument_evaluates_to_nan() {
        let one = SegmentFunction::one;
        let f = PiecewiseSegmentFunction::new_with_integrals(
            vec![0.0, 1.0, 2.0],
            vec![one(), one()],
            &EngineSettings::default(),
        )
        .unwrap();
        assert!(f.value(f64::NAN).is_nan());
        assert!(f.derivative(f64::NAN).is_nan());
        assert!(f.integral(f64::NAN, 1.5).unwrap().is_nan());
        assert!(f.integral(0.5, f64::NAN).unwrap().is_nan());
    }

    #[test]
    fn rejects_malformed_breakpoints() {
        let one = SegmentFunction::one;
        assert!(PiecewiseSegmentFunction::new(vec![0.0], vec![]).is_err());
        assert!(PiecewiseSegmentFunction::new(vec![0.0, 1.0, 2.0], vec![one()]).is_err());
        assert!(PiecewiseSegmentFunction::new(vec![0.0, 0.0], vec![one()]).is_err());
        assert!(PiecewiseSegmentFunction::new(vec![0.0, f64::NAN], vec![one()]).is_err());
    }
}
