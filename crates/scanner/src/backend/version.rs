//! 버전 범위 매칭
//!
//! `semver` 크레이트로 컴포넌트 버전이 취약점 영향 범위에 포함되는지 확인합니다.
//! Go 모듈의 `v` 접두사와 Maven의 두 자리 버전(`2.15`)은 SemVer로 정규화한 뒤
//! 비교하고, 그래도 파싱되지 않는 버전은 문자열 비교로 fallback합니다.

use super::db::VersionRange;

/// 버전 문자열을 SemVer로 정규화합니다.
///
/// - 앞의 `v`/`V`를 제거합니다 (`v0.3.7` → `0.3.7`)
/// - 숫자 구성요소가 3개 미만이면 0으로 채웁니다 (`2.15` → `2.15.0`)
/// - Go 빌드 메타데이터 `+incompatible`은 유지합니다
pub fn normalize(version: &str) -> Option<semver::Version> {
    let trimmed = version
        .trim()
        .strip_prefix(['v', 'V'])
        .unwrap_or(version.trim());

    if let Ok(parsed) = semver::Version::parse(trimmed) {
        return Some(parsed);
    }

    // 숫자 코어와 나머지(-pre, +build) 분리
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    semver::Version::parse(&padded).ok()
}

/// 주어진 버전이 취약점 영향 범위 중 하나에 포함되는지 확인합니다.
///
/// # 매칭 규칙
///
/// - `introduced`가 None이면 시작 제한 없음
/// - `fixed`가 None이면 아직 수정되지 않음
/// - `introduced <= version < fixed`이면 영향받음
///
/// 범위 목록이 비어 있으면 버전과 무관하게 영향받는 것으로 봅니다.
/// DB 엔트리에 범위가 없다는 것은 패키지 전체가 대상이라는 뜻입니다.
pub fn is_affected(version: &str, ranges: &[VersionRange]) -> bool {
    if ranges.is_empty() {
        return true;
    }
    ranges.iter().any(|range| is_in_range(version, range))
}

fn is_in_range(version: &str, range: &VersionRange) -> bool {
    match normalize(version) {
        Some(parsed) => is_in_range_semver(&parsed, range),
        None => is_in_range_string(version, range),
    }
}

fn is_in_range_semver(version: &semver::Version, range: &VersionRange) -> bool {
    if let Some(introduced) = &range.introduced
        && let Some(intro_ver) = normalize(introduced)
        && version < &intro_ver
    {
        return false;
    }

    if let Some(fixed) = &range.fixed
        && let Some(fix_ver) = normalize(fixed)
        && version >= &fix_ver
    {
        return false;
    }

    true
}

fn is_in_range_string(version: &str, range: &VersionRange) -> bool {
    if let Some(introduced) = &range.introduced
        && version < introduced.as_str()
    {
        return false;
    }

    if let Some(fixed) = &range.fixed
        && version >= fixed.as_str()
    {
        return false;
    }

    true
}
