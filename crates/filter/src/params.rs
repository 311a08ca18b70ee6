//! 최적 Bloom 필터 파라미터 계산
//!
//! 공식:
//! - m = -n*ln(fpr) / (ln(2)^2)  -- 최적 비트 수
//! - k = (m/n) * ln(2)           -- 최적 해시 함수 수
//! - FPR = (1 - e^(-kn/m))^k

use std::f64::consts::LN_2;

/// 유도된 Bloom 필터 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    /// 필터 비트 수 (m)
    pub size_bits: usize,
    /// 해시 함수 수 (k)
    pub hash_count: usize,
    /// 이 파라미터에서 기대되는 거짓 양성률
    pub expected_fpr: f64,
}

/// 목표 용량과 거짓 양성률에서 최적 파라미터를 계산합니다.
pub fn optimal_parameters(capacity: usize, target_fpr: f64) -> FilterParams {
    if capacity == 0 {
        return FilterParams {
            size_bits: 1,
            hash_count: 1,
            expected_fpr: 1.0,
        };
    }

    let n = capacity as f64;
    let ln2_squared = LN_2 * LN_2;

    let m = (-n * target_fpr.ln() / ln2_squared).ceil() as usize;
    let k = ((m as f64 / n) * LN_2).round() as usize;
    let k = k.clamp(1, 32);

    FilterParams {
        size_bits: m.max(1),
        hash_count: k,
        expected_fpr: false_positive_rate(m, capacity, k),
    }
}

/// 주어진 (m, n, k)에서의 거짓 양성률을 계산합니다.
pub fn false_positive_rate(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}
