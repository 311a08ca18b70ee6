//! 필터 파일 로드/저장
//!
//! 형식: 버전 바이트 1개 + bincode 인코딩된 필터 상태.
//! `compressed`가 참이면 전체 스트림이 gzip으로 감쌉니다.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::BloomFilter;
use crate::error::FilterError;

/// 파일 형식 버전
const FORMAT_VERSION: u8 = 1;

/// 로드를 허용하는 최대 해시 함수 수
///
/// 이보다 큰 k가 저장된 파일은 변조되었거나 손상된 것으로 간주합니다.
pub const MAX_HASH_FUNCTIONS: usize = 64;

/// 필터를 파일에서 로드합니다.
///
/// # Errors
/// - 빈 파일 또는 잘린 파일: [`FilterError::UnexpectedEof`]
/// - 저장된 k가 [`MAX_HASH_FUNCTIONS`] 초과:
///   [`FilterError::TooManyHashFunctions`]
/// - 그 외 손상: [`FilterError::Decode`] / [`FilterError::Io`]
pub fn load_filter(path: impl AsRef<Path>, compressed: bool) -> Result<BloomFilter, FilterError> {
    let file = File::open(path.as_ref())?;
    let mut reader: Box<dyn Read> = if compressed {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    if buf.is_empty() {
        return Err(FilterError::UnexpectedEof);
    }
    if buf[0] != FORMAT_VERSION {
        return Err(FilterError::Decode(format!(
            "unsupported format version {}",
            buf[0]
        )));
    }

    let filter: BloomFilter = bincode::deserialize(&buf[1..]).map_err(map_decode_error)?;

    if filter.hash_count() > MAX_HASH_FUNCTIONS {
        return Err(FilterError::TooManyHashFunctions {
            k: filter.hash_count(),
        });
    }

    tracing::debug!(
        n = filter.len(),
        bits = filter.bit_size(),
        k = filter.hash_count(),
        "filter loaded"
    );
    Ok(filter)
}

/// 필터를 파일에 저장합니다.
pub fn save_filter(
    filter: &BloomFilter,
    path: impl AsRef<Path>,
    compressed: bool,
) -> Result<(), FilterError> {
    let encoded = bincode::serialize(filter).map_err(|e| FilterError::Encode(e.to_string()))?;

    let file = File::create(path.as_ref())?;
    if compressed {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(&[FORMAT_VERSION])?;
        encoder.write_all(&encoded)?;
        // gzip 트레일러까지 기록
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        writer.write_all(&[FORMAT_VERSION])?;
        writer.write_all(&encoded)?;
        writer.flush()?;
    }
    Ok(())
}

/// bincode 디코딩 에러를 도메인 에러로 변환합니다.
/// 잘린 입력은 내부적으로 UnexpectedEof I/O 에러로 나타납니다.
fn map_decode_error(e: bincode::Error) -> FilterError {
    match *e {
        bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            FilterError::UnexpectedEof
        }
        _ => FilterError::Decode(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// 테스트별 고유 임시 파일 경로
    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("evetap_filter_{}_{}", std::process::id(), name))
    }

    fn sample_filter() -> BloomFilter {
        let mut filter = BloomFilter::with_fpr(100, 0.001);
        filter.insert(b"evil.example");
        filter.insert(b"http://x.test/a");
        filter
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path("roundtrip");
        save_filter(&sample_filter(), &path, false).unwrap();

        let loaded = load_filter(&path, false).unwrap();
        assert!(loaded.check(b"evil.example"));
        assert!(loaded.check(b"http://x.test/a"));
        assert!(!loaded.check(b"benign.example"));
        assert_eq!(loaded.len(), 2);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn save_and_load_compressed() {
        let path = temp_path("gzip");
        save_filter(&sample_filter(), &path, true).unwrap();

        let loaded = load_filter(&path, true).unwrap();
        assert!(loaded.check(b"evil.example"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_file_is_unexpected_eof() {
        let path = temp_path("empty");
        std::fs::write(&path, b"").unwrap();

        let err = load_filter(&path, false).unwrap_err();
        assert!(matches!(err, FilterError::UnexpectedEof));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn truncated_file_is_unexpected_eof() {
        let path = temp_path("truncated");
        save_filter(&sample_filter(), &path, false).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = load_filter(&path, false).unwrap_err();
        assert!(matches!(
            err,
            FilterError::UnexpectedEof | FilterError::Decode(_)
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn oversized_hash_count_is_rejected() {
        let path = temp_path("too_many_k");
        let filter = BloomFilter::new(1024, MAX_HASH_FUNCTIONS + 1);
        save_filter(&filter, &path, false).unwrap();

        let err = load_filter(&path, false).unwrap_err();
        assert!(matches!(err, FilterError::TooManyHashFunctions { .. }));
        assert!(
            err.to_string()
                .contains("value of k (number of hash functions) is too high")
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unknown_version_is_decode_error() {
        let path = temp_path("bad_version");
        std::fs::write(&path, [99u8, 0, 0, 0]).unwrap();

        let err = load_filter(&path, false).unwrap_err();
        assert!(matches!(err, FilterError::Decode(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_filter("/nonexistent/evetap.bloom", false).unwrap_err();
        assert!(matches!(err, FilterError::Io(_)));
    }

    #[test]
    fn compressed_flag_mismatch_fails() {
        let path = temp_path("flag_mismatch");
        save_filter(&sample_filter(), &path, false).unwrap();

        // gzip이 아닌 파일을 gzip으로 읽으면 실패해야 함
        assert!(load_filter(&path, true).is_err());

        std::fs::remove_file(&path).ok();
    }
}
