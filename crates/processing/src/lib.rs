#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`alert`]: 필터 히트에서 alert 이벤트 합성
//! - [`bloom`]: Bloom 스크리닝 핸들러 (타입별 검사, 블록리스트, 리로드)
//! - [`forward`]: 전달 엔진 (바운드 큐, writer/재연결/카운터 태스크)
//! - [`dispatch`]: 이벤트 타입 기반 핸들러 라우팅
//! - [`connector`]: 외부 협력자 인터페이스 (RDNS, stenosis, 컨텍스트)
//! - [`json`]: JSON 이스케이프 및 구조 편집 헬퍼
//! - [`error`]: 도메인 에러 타입
//!
//! # 데이터 흐름
//!
//! ```text
//! upstream -> EventDispatcher -+-> BloomHandler --(alert)--> db channel
//!                              |        |
//!                              |        +--(alert)--> ForwardHandler
//!                              +-> ForwardHandler -> queue -> unix socket
//! ```

pub mod alert;
pub mod bloom;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod json;

// --- 주요 타입 re-export ---

// 핸들러
pub use bloom::BloomHandler;
pub use forward::{FORWARD_QUEUE_CAPACITY, ForwardHandler};

// 디스패처
pub use dispatch::EventDispatcher;

// 알림 합성
pub use alert::{HitKind, make_alert_for_hit};

// 외부 인터페이스
pub use connector::{ContextCollector, RdnsEnricher, StenosisConnector};

// 에러
pub use error::ProcessingError;
