use serde::Deserialize;

pub const DEFAULT_MAX_ANTIDERIVATIVE_DEPTH: usize = 64;

/// 引擎層級的設定，可由 configuration JSON 的 `settings` 欄位讀入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 指數項反導數中分部積分的最大步數；degree 超過此值的項會回傳
    /// `RecursionDepthExceeded`。
    pub max_antiderivative_depth: usize,
}

impl EngineSettings {
    pub fn new(max_antiderivative_depth: usize) -> EngineSettings {
        EngineSettings { max_antiderivative_depth }
    }
}

impl Default for EngineSettings {
    fn default() -> EngineSettings {
        EngineSettings::new(DEFAULT_MAX_ANTIDERIVATIVE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: EngineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.max_antiderivative_depth, DEFAULT_MAX_ANTIDERIVATIVE_DEPTH);

        let settings: EngineSettings =
            serde_json::from_str(r#"{"max_antiderivative_depth": 3}"#).unwrap();
        assert_eq!(settings.max_antiderivative_depth, 3);
    }
}
