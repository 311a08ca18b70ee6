//! 이벤트 처리 에러 타입
//!
//! [`ProcessingError`]는 처리 크레이트 내부에서 발생하는 에러를
//! 표현합니다. `From<ProcessingError> for EvetapError` 변환이 구현되어
//! 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use evetap_core::error::{EvetapError, PipelineError};
use evetap_filter::FilterError;

/// 이벤트 처리 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 파일 없이 생성된 핸들러에 대한 리로드 요청
    #[error("bloom handler was not created from a file, no reloading possible")]
    NoFilterFile,

    /// 인디케이터 필터 에러
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// JSON 이스케이프 실패
    #[error("cannot escape value: {0}")]
    Escape(String),

    /// JSON 구조 편집 실패
    #[error("json edit error: {0}")]
    JsonEdit(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessingError> for EvetapError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Channel(msg) => {
                EvetapError::Pipeline(PipelineError::ChannelSend(msg))
            }
            other => EvetapError::Pipeline(PipelineError::Handler(other.to_string())),
        }
    }
}
