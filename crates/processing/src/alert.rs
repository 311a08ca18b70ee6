//! 알림 합성 — 필터 히트에서 alert 이벤트를 만듭니다.
//!
//! 합성된 알림은 트리거한 이벤트의 메타데이터(프로토콜 객체,
//! 타임스탬프, 플로우 ID)를 그대로 유지한 채, `json_line`에 alert
//! 관련 필드만 구조적으로 덧붙입니다.

use evetap_core::event::{EVENT_TYPE_ALERT, EveEvent};

use crate::json::set_string_path;

/// 필터 히트 종류
///
/// 어떤 추출 필드가 인디케이터에 매칭되었는지를 나타내며, 알림
/// 시그니처 템플릿 선택에 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitKind {
    /// HTTP URL 매칭 (full URL, host+path 또는 path)
    HttpUrl,
    /// HTTP 호스트 매칭
    HttpHost,
    /// DNS 질의 이름 매칭
    DnsRequest,
    /// DNS 응답 이름 매칭
    DnsResponse,
    /// TLS SNI 매칭
    TlsSni,
}

impl HitKind {
    /// 메트릭 레이블 등에 쓰이는 안정적인 식별자
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpUrl => "http-url",
            Self::HttpHost => "http-host",
            Self::DnsRequest => "dns-req",
            Self::DnsResponse => "dns-resp",
            Self::TlsSni => "tls-sni",
        }
    }

    /// 히트 종류별 알림 시그니처를 포맷합니다.
    fn signature(&self, prefix: &str, value: &str) -> String {
        match self {
            Self::HttpUrl => format!("{prefix} Possibly bad HTTP URL: {value}"),
            Self::HttpHost => format!("{prefix} Possibly bad HTTP host: {value}"),
            Self::TlsSni => format!("{prefix} Possibly bad TLS SNI: {value}"),
            Self::DnsRequest => format!("{prefix} Possibly bad DNS lookup to {value}"),
            Self::DnsResponse => format!("{prefix} Possibly bad DNS response for {value}"),
        }
    }
}

impl std::fmt::Display for HitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 필터 히트에서 알림 이벤트를 합성합니다.
///
/// 원본 이벤트를 복제한 뒤 `event_type`을 alert로 바꾸고, `json_line`에
/// 다음 필드를 설정합니다:
///
/// - `event_type` = `"alert"`
/// - `alert.action` = `"allowed"`
/// - `alert.category` = `"Potentially Bad Traffic"`
/// - `alert.signature` = 히트 종류별 템플릿으로 포맷한 메시지
/// - `_extra.bloom-ioc` = 매칭된 인디케이터
///
/// 개별 편집 실패는 비치명적입니다: 경고를 남기고 그 필드만 빠진 채
/// 이전까지의 편집은 유지됩니다. 이 함수는 항상 레코드를 반환합니다.
pub fn make_alert_for_hit(event: &EveEvent, kind: HitKind, prefix: &str, ioc: &str) -> EveEvent {
    let value = match kind {
        HitKind::HttpUrl => format!(
            "{} | {} | {}",
            event.http_method, event.http_host, event.http_url
        ),
        HitKind::HttpHost => event.http_host.clone(),
        HitKind::DnsRequest | HitKind::DnsResponse => event.dns_rrname.clone(),
        HitKind::TlsSni => event.tls_sni.clone(),
    };

    let signature = kind.signature(prefix, &value);

    let mut alert = event.clone();
    alert.event_type = EVENT_TYPE_ALERT.to_owned();

    apply_edit(&mut alert.json_line, &["event_type"], EVENT_TYPE_ALERT);
    apply_edit(&mut alert.json_line, &["alert", "action"], "allowed");
    apply_edit(
        &mut alert.json_line,
        &["alert", "category"],
        "Potentially Bad Traffic",
    );
    apply_edit(&mut alert.json_line, &["_extra", "bloom-ioc"], ioc);
    apply_edit(&mut alert.json_line, &["alert", "signature"], &signature);

    alert
}

/// 편집 한 건을 적용합니다. 실패는 경고만 남기고 무시합니다.
fn apply_edit(json_line: &mut String, path: &[&str], value: &str) {
    match set_string_path(json_line, path, value) {
        Ok(edited) => *json_line = edited,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "failed to edit alert json");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_event() -> EveEvent {
        EveEvent::from_json_line(
            r#"{"timestamp":"2024-03-01T10:00:00.000001+0000","flow_id":42,"event_type":"http","http":{"hostname":"evil.example","url":"/x","http_method":"GET"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn alert_sets_event_type() {
        let alert = make_alert_for_hit(&http_event(), HitKind::HttpHost, "BLF", "evil.example");
        assert_eq!(alert.event_type, "alert");

        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(v["event_type"], "alert");
    }

    #[test]
    fn alert_carries_fixed_fields() {
        let alert = make_alert_for_hit(&http_event(), HitKind::HttpHost, "BLF", "evil.example");
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(v["alert"]["action"], "allowed");
        assert_eq!(v["alert"]["category"], "Potentially Bad Traffic");
        assert_eq!(v["_extra"]["bloom-ioc"], "evil.example");
    }

    #[test]
    fn alert_preserves_original_fields() {
        let alert = make_alert_for_hit(&http_event(), HitKind::HttpHost, "BLF", "evil.example");
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        // 타임스탬프, 플로우 ID, 프로토콜 객체는 그대로 유지
        assert_eq!(v["timestamp"], "2024-03-01T10:00:00.000001+0000");
        assert_eq!(v["flow_id"], 42);
        assert_eq!(v["http"]["hostname"], "evil.example");
    }

    #[test]
    fn http_host_signature() {
        let alert = make_alert_for_hit(&http_event(), HitKind::HttpHost, "BLF", "evil.example");
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(
            v["alert"]["signature"],
            "BLF Possibly bad HTTP host: evil.example"
        );
    }

    #[test]
    fn http_url_signature_joins_method_host_url() {
        let alert = make_alert_for_hit(
            &http_event(),
            HitKind::HttpUrl,
            "BLF",
            "http://evil.example/x",
        );
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(
            v["alert"]["signature"],
            "BLF Possibly bad HTTP URL: GET | evil.example | /x"
        );
    }

    #[test]
    fn dns_signatures() {
        let event = EveEvent::from_json_line(
            r#"{"event_type":"dns","dns":{"type":"query","rrname":"bad.example"}}"#,
        )
        .unwrap();

        let req = make_alert_for_hit(&event, HitKind::DnsRequest, "BLF", "bad.example");
        let v: serde_json::Value = serde_json::from_str(&req.json_line).unwrap();
        assert_eq!(
            v["alert"]["signature"],
            "BLF Possibly bad DNS lookup to bad.example"
        );

        let resp = make_alert_for_hit(&event, HitKind::DnsResponse, "BLF", "bad.example");
        let v: serde_json::Value = serde_json::from_str(&resp.json_line).unwrap();
        assert_eq!(
            v["alert"]["signature"],
            "BLF Possibly bad DNS response for bad.example"
        );
    }

    #[test]
    fn tls_signature() {
        let event =
            EveEvent::from_json_line(r#"{"event_type":"tls","tls":{"sni":"sni.example"}}"#)
                .unwrap();
        let alert = make_alert_for_hit(&event, HitKind::TlsSni, "BLF", "sni.example");
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(
            v["alert"]["signature"],
            "BLF Possibly bad TLS SNI: sni.example"
        );
    }

    #[test]
    fn broken_json_line_still_returns_record() {
        let mut event = http_event();
        event.json_line = "not json at all".to_owned();

        // 편집은 모두 실패하지만 함수는 레코드를 반환해야 함
        let alert = make_alert_for_hit(&event, HitKind::HttpHost, "BLF", "evil.example");
        assert_eq!(alert.event_type, "alert");
        assert_eq!(alert.json_line, "not json at all");
    }

    #[test]
    fn ioc_with_special_characters_is_escaped() {
        let alert = make_alert_for_hit(&http_event(), HitKind::HttpHost, "BLF", r#"e"vil\x"#);
        let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
        assert_eq!(v["_extra"]["bloom-ioc"], r#"e"vil\x"#);
    }

    #[test]
    fn hit_kind_as_str_round_trip() {
        for (kind, s) in [
            (HitKind::HttpUrl, "http-url"),
            (HitKind::HttpHost, "http-host"),
            (HitKind::DnsRequest, "dns-req"),
            (HitKind::DnsResponse, "dns-resp"),
            (HitKind::TlsSni, "tls-sni"),
        ] {
            assert_eq!(kind.as_str(), s);
            assert_eq!(kind.to_string(), s);
        }
    }

    // Property-based tests
    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// JSON 객체로 파싱되는 모든 이벤트에서 합성된 알림도
            /// JSON 객체로 파싱되고 event_type이 "alert"여야 함
            #[test]
            fn alert_json_round_trips(
                host in "[a-z0-9.-]{1,30}",
                ioc in "[ -~]{1,30}"
            ) {
                let line = format!(
                    r#"{{"event_type":"http","http":{{"hostname":"{host}","url":"/","http_method":"GET"}}}}"#
                );
                let event = EveEvent::from_json_line(&line).unwrap();
                let alert = make_alert_for_hit(&event, HitKind::HttpHost, "BLF", &ioc);

                let v: serde_json::Value = serde_json::from_str(&alert.json_line).unwrap();
                prop_assert_eq!(v["event_type"].as_str(), Some("alert"));
                prop_assert_eq!(v["_extra"]["bloom-ioc"].as_str(), Some(ioc.as_str()));
            }
        }
    }
}
