//! 전달/스크리닝 설정
//!
//! 프로세스 전역 상태(모두-전달 플래그, 허용 타입 집합) 대신, 설정
//! 객체를 생성자에 주입하는 방식을 사용합니다. 설정은 초기화 이후
//! 읽기 전용입니다.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::EVENT_TYPE_WILDCARD;

/// 트래픽 캡처 커넥터(stenosis) 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StenosisConfig {
    /// 커넥터 엔드포인트
    pub endpoint: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 캡처 시간 브래킷 (초)
    pub time_bracket_secs: u64,
    /// 캐시 만료 (초)
    pub cache_expiry_secs: u64,
    /// 수락 대상 인터페이스 필터. `"*"`는 모든 인터페이스.
    pub iface: String,
}

impl Default for StenosisConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 5,
            time_bracket_secs: 60,
            cache_expiry_secs: 600,
            iface: EVENT_TYPE_WILDCARD.to_owned(),
        }
    }
}

/// 전달 엔진 설정
///
/// 출력 소켓, 재연결 정책, 이벤트 타입 허용 목록과 선택 기능
/// (added fields, RDNS, stenosis)을 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// 출력 unix 스트림 소켓 경로
    pub socket: String,
    /// 재연결 재시도 횟수. 0이면 무한 재시도.
    pub reconnect_times: u32,
    /// 모든 이벤트 타입을 전달할지 여부
    pub forward_all: bool,
    /// 전달 허용 이벤트 타입 목록 (`forward_all`이 false일 때 사용)
    pub allowed_types: Vec<String>,
    /// 전달되는 모든 이벤트에 주입할 최상위 필드
    pub added_fields: HashMap<String, String>,
    /// RDNS 보강 캐시 만료 (초)
    pub rdns_expiry_secs: u64,
    /// 트래픽 캡처 커넥터 설정 (없으면 비활성)
    pub stenosis: Option<StenosisConfig>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            socket: "/tmp/evetap.sock".to_owned(),
            reconnect_times: 0,
            forward_all: false,
            allowed_types: vec!["alert".to_owned()],
            added_fields: HashMap::new(),
            rdns_expiry_secs: 300,
            stenosis: None,
        }
    }
}

impl ForwardConfig {
    /// 주어진 이벤트 타입이 전달 대상인지 확인합니다.
    pub fn allows(&self, event_type: &str) -> bool {
        self.forward_all || self.allowed_types.iter().any(|t| t == event_type)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "socket".to_owned(),
                reason: "output socket path must not be empty".to_owned(),
            });
        }

        if !self.forward_all && self.allowed_types.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "allowed_types".to_owned(),
                reason: "at least one type must be allowed unless forward_all is set".to_owned(),
            });
        }

        if let Some(stenosis) = &self.stenosis {
            if stenosis.endpoint.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "stenosis.endpoint".to_owned(),
                    reason: "endpoint must not be empty".to_owned(),
                });
            }
            if stenosis.iface.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "stenosis.iface".to_owned(),
                    reason: "iface filter must not be empty ('*' matches all)".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 전달 설정 빌더
#[derive(Default)]
pub struct ForwardConfigBuilder {
    config: ForwardConfig,
}

impl ForwardConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 출력 소켓 경로를 설정합니다.
    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.config.socket = socket.into();
        self
    }

    /// 재연결 재시도 횟수를 설정합니다 (0 = 무한).
    pub fn reconnect_times(mut self, times: u32) -> Self {
        self.config.reconnect_times = times;
        self
    }

    /// 모든 이벤트 타입 전달 여부를 설정합니다.
    pub fn forward_all(mut self, forward_all: bool) -> Self {
        self.config.forward_all = forward_all;
        self
    }

    /// 전달 허용 타입 목록을 설정합니다.
    pub fn allowed_types(mut self, types: Vec<String>) -> Self {
        self.config.allowed_types = types;
        self
    }

    /// 주입할 최상위 필드를 설정합니다.
    pub fn added_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.config.added_fields = fields;
        self
    }

    /// RDNS 캐시 만료(초)를 설정합니다.
    pub fn rdns_expiry_secs(mut self, secs: u64) -> Self {
        self.config.rdns_expiry_secs = secs;
        self
    }

    /// stenosis 커넥터 설정을 지정합니다.
    pub fn stenosis(mut self, stenosis: StenosisConfig) -> Self {
        self.config.stenosis = Some(stenosis);
        self
    }

    /// 설정을 검증하고 `ForwardConfig`를 생성합니다.
    pub fn build(self) -> Result<ForwardConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Bloom 스크리닝 핸들러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomConfig {
    /// 인디케이터 필터 파일 경로
    pub filter_path: String,
    /// 필터 파일 gzip 압축 여부
    pub compressed: bool,
    /// 알림 시그니처 접두사
    pub alert_prefix: String,
    /// 알림 발생을 억제할 인디케이터 목록
    pub blocklist: Vec<String>,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            filter_path: String::new(),
            compressed: false,
            alert_prefix: "BLF".to_owned(),
            blocklist: Vec::new(),
        }
    }
}

impl BloomConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "filter_path".to_owned(),
                reason: "filter file path must not be empty".to_owned(),
            });
        }
        if self.alert_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "alert_prefix".to_owned(),
                reason: "alert prefix must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_forward_config_is_valid() {
        ForwardConfig::default().validate().unwrap();
    }

    #[test]
    fn allows_respects_forward_all() {
        let config = ForwardConfig {
            forward_all: true,
            allowed_types: vec![],
            ..Default::default()
        };
        assert!(config.allows("http"));
        assert!(config.allows("anything"));
    }

    #[test]
    fn allows_checks_allow_list() {
        let config = ForwardConfig {
            forward_all: false,
            allowed_types: vec!["alert".to_owned(), "dns".to_owned()],
            ..Default::default()
        };
        assert!(config.allows("alert"));
        assert!(config.allows("dns"));
        assert!(!config.allows("http"));
    }

    #[test]
    fn validate_rejects_empty_socket() {
        let config = ForwardConfig {
            socket: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_allow_list_without_forward_all() {
        let config = ForwardConfig {
            forward_all: false,
            allowed_types: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_stenosis_endpoint() {
        let config = ForwardConfig {
            stenosis: Some(StenosisConfig::default()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = ForwardConfigBuilder::new()
            .socket("/run/evetap/out.sock")
            .reconnect_times(5)
            .forward_all(true)
            .build()
            .unwrap();
        assert_eq!(config.socket, "/run/evetap/out.sock");
        assert_eq!(config.reconnect_times, 5);
        assert!(config.forward_all);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ForwardConfigBuilder::new().socket("").build();
        assert!(result.is_err());
    }

    #[test]
    fn bloom_config_default_prefix() {
        assert_eq!(BloomConfig::default().alert_prefix, "BLF");
    }

    #[test]
    fn bloom_config_validate_requires_path() {
        assert!(BloomConfig::default().validate().is_err());

        let config = BloomConfig {
            filter_path: "/var/lib/evetap/iocs.bloom".to_owned(),
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
