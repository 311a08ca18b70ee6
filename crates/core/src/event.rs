//! EVE 이벤트 레코드 — 파이프라인을 흐르는 기본 단위
//!
//! 업스트림 센서가 내보내는 EVE 이벤트 한 건을 표현합니다.
//! [`EveEvent`]는 이중 표현을 유지합니다: 핸들러가 싸게 접근하는
//! 파싱된 편의 필드와, 다운스트림으로 내보내는 권위 있는 원본
//! JSON 라인(`json_line`)입니다.
//!
//! 레코드를 변경하는 쪽(알림 합성, added-fields 스플라이스)은
//! `json_line`을 기준으로 작업하며, 파싱된 필드가 뒤처질 수 있습니다.
//! 그런 이벤트는 종단(싱크 직행)이므로 허용됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// --- 이벤트 타입 상수 ---

/// HTTP 관찰 이벤트 타입
pub const EVENT_TYPE_HTTP: &str = "http";
/// DNS 관찰 이벤트 타입
pub const EVENT_TYPE_DNS: &str = "dns";
/// TLS 관찰 이벤트 타입
pub const EVENT_TYPE_TLS: &str = "tls";
/// 알림 이벤트 타입
pub const EVENT_TYPE_ALERT: &str = "alert";
/// 플로우 레코드 이벤트 타입
pub const EVENT_TYPE_FLOW: &str = "flow";
/// "모든 타입" 와일드카드 — 핸들러가 전체 이벤트 수신을 선언할 때 사용
pub const EVENT_TYPE_WILDCARD: &str = "*";

// --- DNS 서브타입 상수 ---

/// DNS 질의
pub const DNS_TYPE_QUERY: &str = "query";
/// DNS 응답
pub const DNS_TYPE_ANSWER: &str = "answer";

/// EVE 이벤트 레코드
///
/// 파싱된 프로토콜 필드는 타입에 따라 조건부로 채워집니다
/// (`http` 이벤트만 `http_*` 필드를 갖는 식). 타입과 무관한 필드는
/// 항상 존재하되 비어 있을 수 있습니다.
///
/// 불변식: `json_line`은 `}`로 끝나는 단일 JSON 객체로 파싱 가능해야
/// 하며, 레코드를 변경하는 쪽이 파싱 필드와의 동기화를 책임집니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveEvent {
    /// 이벤트 타입 태그 (http, dns, tls, alert, flow, ...)
    pub event_type: String,
    /// 같은 플로우의 이벤트를 연결하는 불투명 식별자
    pub flow_id: String,
    /// 캡처 인터페이스 이름
    pub iface: String,
    /// 센서가 기록한 타임스탬프 (원문 그대로)
    pub timestamp: String,
    /// 출발지 IP (원문 그대로)
    pub src_ip: String,
    /// 목적지 IP (원문 그대로)
    pub dst_ip: String,
    /// HTTP 메서드 (http 이벤트)
    pub http_method: String,
    /// HTTP 호스트 (http 이벤트)
    pub http_host: String,
    /// HTTP URL (http 이벤트)
    pub http_url: String,
    /// DNS 리소스 레코드 이름 (dns 이벤트)
    pub dns_rrname: String,
    /// DNS 레코드 방향: query, answer, 그 외 (dns 이벤트)
    pub dns_type: String,
    /// TLS SNI (tls 이벤트)
    pub tls_sni: String,
    /// 권위 있는 직렬화 형식 — 다운스트림으로 내보내는 원본 바이트
    pub json_line: String,
}

impl EveEvent {
    /// EVE JSON 한 줄에서 이벤트 레코드를 생성합니다.
    ///
    /// 원본 라인은 `json_line`에 그대로 보존되고, 편의 필드는
    /// 알려진 경로(`http.hostname`, `dns.rrname`, `tls.sni` 등)에서
    /// 추출됩니다. 없는 필드는 빈 문자열로 남습니다.
    ///
    /// # Errors
    /// 입력이 JSON 객체로 파싱되지 않으면 [`ParseError`]를 반환합니다.
    pub fn from_json_line(line: &str) -> Result<Self, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        if !value.is_object() {
            return Err(ParseError::NotAnObject);
        }

        Ok(Self {
            event_type: string_at(&value, &["event_type"]),
            flow_id: scalar_at(&value, &["flow_id"]),
            iface: string_at(&value, &["in_iface"]),
            timestamp: string_at(&value, &["timestamp"]),
            src_ip: string_at(&value, &["src_ip"]),
            dst_ip: string_at(&value, &["dest_ip"]),
            http_method: string_at(&value, &["http", "http_method"]),
            http_host: string_at(&value, &["http", "hostname"]),
            http_url: string_at(&value, &["http", "url"]),
            dns_rrname: string_at(&value, &["dns", "rrname"]),
            dns_type: string_at(&value, &["dns", "type"]),
            tls_sni: string_at(&value, &["tls", "sni"]),
            json_line: line.to_owned(),
        })
    }

    /// 알림 이벤트인지 확인합니다.
    pub fn is_alert(&self) -> bool {
        self.event_type == EVENT_TYPE_ALERT
    }
}

impl fmt::Display for EveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EveEvent[{}] flow={} iface={}",
            self.event_type, self.flow_id, self.iface,
        )
    }
}

/// 중첩 경로의 문자열 필드를 추출합니다. 없으면 빈 문자열.
fn string_at(value: &serde_json::Value, path: &[&str]) -> String {
    let mut current = value;
    for part in path {
        match current.get(part) {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    current.as_str().map(str::to_owned).unwrap_or_default()
}

/// 문자열 또는 숫자 스칼라를 문자열로 추출합니다. flow_id처럼
/// 센서에 따라 숫자로 내보내는 필드에 사용합니다.
fn scalar_at(value: &serde_json::Value, path: &[&str]) -> String {
    let mut current = value;
    for part in path {
        match current.get(part) {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    match current {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
