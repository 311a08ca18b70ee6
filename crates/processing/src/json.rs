//! JSON 편집 헬퍼
//!
//! 이벤트의 `json_line`에 대한 구조적 편집을 제공합니다. 편집은
//! JSON-aware로 수행됩니다: 기존 필드는 교체되고, 중첩 경로는 필요에
//! 따라 생성됩니다. 재직렬화 후 필드 순서는 입력과 다를 수 있습니다.

use crate::error::ProcessingError;

/// 문자열을 JSON 문자열 리터럴로 이스케이프합니다 (따옴표 포함).
pub fn escape_string(s: &str) -> Result<String, ProcessingError> {
    serde_json::to_string(s).map_err(|e| ProcessingError::Escape(e.to_string()))
}

/// JSON 객체 문자열의 지정 경로에 문자열 값을 설정합니다.
///
/// 경로의 중간 객체가 없으면 생성합니다. 중간 경로에 객체가 아닌
/// 값이 있으면 객체로 교체합니다 (원본의 setter와 동일한 동작).
///
/// # Errors
/// 입력이 JSON 객체로 파싱되지 않거나 경로가 비어 있으면
/// [`ProcessingError::JsonEdit`]를 반환합니다.
pub fn set_string_path(
    json_line: &str,
    path: &[&str],
    value: &str,
) -> Result<String, ProcessingError> {
    let (last, parents) = path
        .split_last()
        .ok_or_else(|| ProcessingError::JsonEdit("empty path".to_owned()))?;

    let mut root: serde_json::Value = serde_json::from_str(json_line)
        .map_err(|e| ProcessingError::JsonEdit(format!("invalid json: {e}")))?;
    if !root.is_object() {
        return Err(ProcessingError::JsonEdit(
            "expected JSON object at top level".to_owned(),
        ));
    }

    let mut current = &mut root;
    for part in parents {
        let obj = current
            .as_object_mut()
            .ok_or_else(|| ProcessingError::JsonEdit("not an object".to_owned()))?;
        let entry = obj
            .entry((*part).to_owned())
            .or_insert_with(|| serde_json::json!({}));
        if !entry.is_object() {
            *entry = serde_json::json!({});
        }
        current = entry;
    }

    let obj = current
        .as_object_mut()
        .ok_or_else(|| ProcessingError::JsonEdit("not an object".to_owned()))?;
    obj.insert(
        (*last).to_owned(),
        serde_json::Value::String(value.to_owned()),
    );

    serde_json::to_string(&root).map_err(|e| ProcessingError::JsonEdit(e.to_string()))
}
