use thiserror::Error;

pub type SymbolicResult<T> = Result<T, SymbolicError>;

/// 多項式與 segment function 運算的錯誤型別。
///
/// 這是純數學函式庫，所有錯誤都代表輸入或呼叫方式有誤，
/// 直接回傳給呼叫方，不做重試。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("coefficient index {index} out of range for polynomial of degree {degree}")]
    IndexOutOfRange { index: usize, degree: usize },

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// 1 / exp_coef 不是有限值（exp_coef 為 0 或次正規數）
    #[error("exponent coefficient {exp_coef} cannot be inverted")]
    NumericDegeneracy { exp_coef: f64 },

    #[error("antiderivative reduction depth {depth} exceeds limit {max_depth}")]
    RecursionDepthExceeded { depth: usize, max_depth: usize },
}

impl SymbolicError {
    pub fn invalid_input(message: impl Into<String>) -> SymbolicError {
        SymbolicError::InvalidInput(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> SymbolicError {
        SymbolicError::PreconditionViolation(message.into())
    }
}
