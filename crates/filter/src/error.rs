//! 필터 에러 타입

/// 인디케이터 필터 도메인 에러
///
/// 로드 실패는 종류별로 구분됩니다. 호출자는
/// [`UnexpectedEof`](FilterError::UnexpectedEof)와
/// [`TooManyHashFunctions`](FilterError::TooManyHashFunctions)를
/// "기본 빈 필터로 대체" 대상으로 취급합니다.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 필터 파일이 비어 있거나 잘림
    #[error("filter file is empty or truncated")]
    UnexpectedEof,

    /// 저장된 해시 함수 수가 지원 한도를 초과
    #[error("value of k (number of hash functions) is too high: {k}")]
    TooManyHashFunctions { k: usize },

    /// 필터 디코딩 실패
    #[error("failed to decode filter: {0}")]
    Decode(String),

    /// 필터 인코딩 실패
    #[error("failed to encode filter: {0}")]
    Encode(String),
}
