#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - 크레이트 루트: [`BloomFilter`] 자료구조
//! - [`params`]: 목표 거짓 양성률에서 최적 (m, k) 파라미터 유도
//! - [`io`]: 바이너리 파일 형식 로드/저장 (gzip 선택)
//! - [`error`]: 필터 에러 타입
//!
//! # 사용 예시
//! ```ignore
//! use evetap_filter::BloomFilter;
//!
//! let mut filter = BloomFilter::with_fpr(10_000, 0.0001);
//! filter.insert(b"evil.example");
//! assert!(filter.check(b"evil.example"));   // 거짓 음성 없음
//! ```

pub mod error;
mod hash;
pub mod io;
pub mod params;

pub use error::FilterError;
pub use io::{load_filter, save_filter};
pub use params::FilterParams;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::hash::hash_positions;

/// 바이트 문자열 집합에 대한 Bloom 필터
///
/// 불변식: 삽입된 원소에 대해 [`check`](Self::check)는 반드시 `true`를
/// 반환합니다 (거짓 음성 없음). 삽입되지 않은 원소는 한정된 확률로
/// `true`가 나올 수 있습니다 (거짓 양성).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    /// 필터 상태를 담는 비트 배열
    #[serde(with = "bits_serde")]
    bits: BitVec<u8, Lsb0>,
    /// 해시 함수 수 (k)
    k: usize,
    /// 비트 크기 (m)
    m: usize,
    /// 삽입된 원소 수 (n) — 로깅용 공칭값
    n: u64,
}

/// BitVec serde 지원
mod bits_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bits: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes: Vec<u8> = bits.as_raw_slice().to_vec();
        (bytes, bits.len()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bytes, len): (Vec<u8>, usize) = Deserialize::deserialize(deserializer)?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(len);
        Ok(bits)
    }
}

impl BloomFilter {
    /// 지정한 파라미터로 빈 필터를 생성합니다.
    ///
    /// `m`은 비트 크기, `k`는 해시 함수 수입니다. 둘 다 최소 1로
    /// 보정됩니다.
    pub fn new(m: usize, k: usize) -> Self {
        let m = m.max(1);
        let k = k.max(1);
        Self {
            bits: bitvec![u8, Lsb0; 0; m],
            k,
            m,
            n: 0,
        }
    }

    /// 목표 용량과 거짓 양성률로부터 최적 파라미터를 유도하여 빈
    /// 필터를 생성합니다.
    pub fn with_fpr(capacity: usize, target_fpr: f64) -> Self {
        let params = params::optimal_parameters(capacity, target_fpr);
        Self::new(params.size_bits, params.hash_count)
    }

    /// 원소를 필터에 삽입합니다.
    ///
    /// 삽입 이후 같은 원소에 대한 [`check`](Self::check)는 항상 `true`
    /// 입니다.
    pub fn insert(&mut self, element: &[u8]) {
        for pos in hash_positions(element, self.k, self.m) {
            self.bits.set(pos, true);
        }
        self.n += 1;
    }

    /// 원소가 집합에 있을 가능성을 검사합니다.
    ///
    /// `true`는 "아마도 포함" (거짓 양성 가능), `false`는 "확실히
    /// 미포함"입니다.
    pub fn check(&self, element: &[u8]) -> bool {
        hash_positions(element, self.k, self.m)
            .into_iter()
            .all(|pos| self.bits[pos])
    }

    /// 지금까지 삽입된 원소 수(공칭 N)를 반환합니다.
    pub fn len(&self) -> u64 {
        self.n
    }

    /// 원소가 하나도 삽입되지 않았는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 비트 배열 크기(m)를 반환합니다.
    pub fn bit_size(&self) -> usize {
        self.m
    }

    /// 해시 함수 수(k)를 반환합니다.
    pub fn hash_count(&self) -> usize {
        self.k
    }
}
