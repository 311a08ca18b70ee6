//! 메트릭 상수 — 모든 Prometheus 메트릭의 이름을 중앙에서 정의합니다.
//!
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `evetap_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 히트 종류 레이블 키 (http-url, http-host, dns-req, dns-resp, tls-sni)
pub const LABEL_HIT_KIND: &str = "kind";

// ─── Forward Engine 메트릭 ─────────────────────────────────────────

/// Forward: 초당 전달 이벤트 수 (gauge)
pub const FORWARD_EVENTS_PER_SECOND: &str = "evetap_forward_events_per_second";

/// Forward: 재연결 시도 수 (counter)
pub const FORWARD_RECONNECTS_TOTAL: &str = "evetap_forward_reconnects_total";

// ─── Bloom Handler 메트릭 ──────────────────────────────────────────

/// Bloom: 필터 히트로 합성된 알림 수 (counter, label: kind)
pub const BLOOM_ALERTS_TOTAL: &str = "evetap_bloom_alerts_total";

/// Bloom: 필터 리로드 수 (counter)
pub const BLOOM_RELOADS_TOTAL: &str = "evetap_bloom_reloads_total";
