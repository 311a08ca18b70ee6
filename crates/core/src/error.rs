//! 에러 타입 — 도메인별 에러 정의

/// evetap 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum EvetapError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 실행 중이 아닌 컴포넌트에 대한 요청
    #[error("component is not running")]
    NotRunning,

    /// 핸들러 처리 실패
    #[error("handler error: {0}")]
    Handler(String),

    /// 이벤트 보강(enrichment) 실패
    #[error("enrichment failed: {0}")]
    Enrichment(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// JSON 파싱 실패
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// 최상위가 JSON 객체가 아님
    #[error("expected JSON object at top level")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = EvetapError::from(ConfigError::InvalidValue {
            field: "socket".to_owned(),
            reason: "must not be empty".to_owned(),
        });
        let msg = err.to_string();
        assert!(msg.contains("socket"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn pipeline_error_converts_to_top_level() {
        let err: EvetapError = PipelineError::NotRunning.into();
        assert!(matches!(err, EvetapError::Pipeline(_)));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::InvalidJson("unexpected EOF".to_owned());
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: EvetapError = io.into();
        assert!(matches!(err, EvetapError::Io(_)));
    }
}
