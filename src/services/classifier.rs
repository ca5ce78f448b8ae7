//! 提交结果分类
//!
//! 有序规则表，按顺序匹配，第一条命中的规则决定结果。
//! 乐观成功规则放在最后：没有任何否定标记且状态码正常即视为成功（`confirmed = false`），
//! 可能把实际未成功的提交记为成功，`SuccessPolicy::Strict` 可关闭它。

use serde_json::Value;

use crate::config::SuccessPolicy;
use crate::models::{ItemMeta, Outcome, RawResult};
use crate::utils::logging::truncate_text;

/// 触发投递次数限制
pub const LIMIT_MARKER: &str = "negotiations-limit-exceeded";
/// 需要先完成测试
pub const CHALLENGE_MARKER: &str = "test-required";
/// 已经投递过
pub const ALREADY_MARKER: &str = "alreadyApplied";

/// 严格模式下认可的成功标记
pub const SUCCESS_MARKERS: &[&str] = &[
    "shortVacancy",
    "\"success\":true",
    "\"status\":\"ok\"",
    "\"responded\":true",
];

/// 诊断信息的最大长度
const DIAGNOSTIC_LEN: usize = 200;

type Rule = (fn(&RawResult, SuccessPolicy) -> bool, fn(&RawResult) -> Outcome);

/// 规则表，顺序即优先级
const RULES: &[Rule] = &[
    (has_limit_marker, limit_exceeded),
    (has_challenge_marker, challenge_required),
    (has_already_marker, already_done),
    (has_success_marker, confirmed_sent),
    (assumed_successful, assumed_sent),
];

fn has_limit_marker(raw: &RawResult, _: SuccessPolicy) -> bool {
    is_limited(raw)
}

fn has_challenge_marker(raw: &RawResult, _: SuccessPolicy) -> bool {
    raw.body.contains(CHALLENGE_MARKER)
}

fn has_already_marker(raw: &RawResult, _: SuccessPolicy) -> bool {
    raw.body.contains(ALREADY_MARKER)
}

fn limit_exceeded(_: &RawResult) -> Outcome {
    Outcome::LimitExceeded
}

fn challenge_required(raw: &RawResult) -> Outcome {
    Outcome::ChallengeRequired(extract_meta(&raw.body))
}

fn already_done(_: &RawResult) -> Outcome {
    Outcome::AlreadyDone
}

fn confirmed_sent(raw: &RawResult) -> Outcome {
    Outcome::Sent {
        meta: extract_meta(&raw.body),
        confirmed: true,
    }
}

fn assumed_sent(raw: &RawResult) -> Outcome {
    Outcome::Sent {
        meta: extract_meta(&raw.body),
        confirmed: false,
    }
}

fn has_success_marker(raw: &RawResult, _: SuccessPolicy) -> bool {
    if !raw.is_status_ok() {
        return false;
    }
    let compact: String = raw.body.chars().filter(|c| !c.is_whitespace()).collect();
    SUCCESS_MARKERS.iter().any(|m| compact.contains(m))
}

fn assumed_successful(raw: &RawResult, policy: SuccessPolicy) -> bool {
    policy == SuccessPolicy::Optimistic && raw.is_status_ok()
}

/// 对一次提交的原始结果分类
pub fn classify(raw: &RawResult, policy: SuccessPolicy) -> Outcome {
    RULES
        .iter()
        .find(|(matches, _)| matches(raw, policy))
        .map(|(_, outcome)| outcome(raw))
        .unwrap_or_else(|| Outcome::Error(diagnostic(raw)))
}

/// 探测结果是否仍然带有限制标记
pub fn is_limited(raw: &RawResult) -> bool {
    raw.body.contains(LIMIT_MARKER)
}

/// 无法识别的结果的诊断信息
fn diagnostic(raw: &RawResult) -> String {
    let body = raw.body.trim();
    if body.is_empty() {
        format!("HTTP {}", raw.status)
    } else {
        format!("HTTP {}: {}", raw.status, truncate_text(body, DIAGNOSTIC_LEN))
    }
}

/// 从响应 JSON 中提取职位名称、公司和薪资
pub fn extract_meta(body: &str) -> Option<ItemMeta> {
    let value: Value = serde_json::from_str(body).ok()?;
    let vacancy = value.pointer("/responseStatus/shortVacancy")?;

    let text = |ptr: &str| {
        vacancy
            .pointer(ptr)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let number = |ptr: &str| vacancy.pointer(ptr).and_then(Value::as_i64);

    Some(ItemMeta {
        title: text("/name"),
        company: text("/company/name"),
        salary_from: number("/compensation/from"),
        salary_to: number("/compensation/to"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeKind;

    fn kind(status: u16, body: &str, policy: SuccessPolicy) -> OutcomeKind {
        classify(&RawResult::new(status, body), policy).kind()
    }

    #[test]
    fn markers_take_priority_over_status() {
        let p = SuccessPolicy::Optimistic;
        assert_eq!(kind(200, r#"{"error":"negotiations-limit-exceeded"}"#, p), OutcomeKind::LimitExceeded);
        assert_eq!(kind(400, r#"{"error":"negotiations-limit-exceeded"}"#, p), OutcomeKind::LimitExceeded);
        assert_eq!(kind(403, r#"{"error":"test-required"}"#, p), OutcomeKind::ChallengeRequired);
        assert_eq!(kind(409, r#"{"error":"alreadyApplied"}"#, p), OutcomeKind::AlreadyDone);
    }

    #[test]
    fn challenge_wins_over_already_done() {
        let body = r#"{"errors":["alreadyApplied","test-required"]}"#;
        assert_eq!(kind(200, body, SuccessPolicy::Optimistic), OutcomeKind::ChallengeRequired);
        let body = r#"{"errors":["test-required","alreadyApplied"]}"#;
        assert_eq!(kind(200, body, SuccessPolicy::Optimistic), OutcomeKind::ChallengeRequired);
    }

    #[test]
    fn optimistic_accepts_any_2xx() {
        assert_eq!(kind(200, "", SuccessPolicy::Optimistic), OutcomeKind::Sent);
        assert_eq!(kind(204, "whatever", SuccessPolicy::Optimistic), OutcomeKind::Sent);
    }

    #[test]
    fn strict_requires_success_marker() {
        assert_eq!(kind(200, "", SuccessPolicy::Strict), OutcomeKind::Error);
        assert_eq!(kind(200, r#"{"success": true}"#, SuccessPolicy::Strict), OutcomeKind::Sent);
        assert_eq!(
            kind(200, r#"{"responseStatus":{"shortVacancy":{}}}"#, SuccessPolicy::Strict),
            OutcomeKind::Sent
        );
    }

    #[test]
    fn marker_success_is_confirmed_and_bare_2xx_is_assumed() {
        let confirmed = |status: u16, body: &str, policy| match classify(&RawResult::new(status, body), policy) {
            Outcome::Sent { confirmed, .. } => Some(confirmed),
            _ => None,
        };
        assert_eq!(confirmed(200, r#"{"success": true}"#, SuccessPolicy::Optimistic), Some(true));
        assert_eq!(confirmed(200, r#"{"success": true}"#, SuccessPolicy::Strict), Some(true));
        assert_eq!(confirmed(200, "<html>ok</html>", SuccessPolicy::Optimistic), Some(false));
        assert_eq!(confirmed(200, "<html>ok</html>", SuccessPolicy::Strict), None);
        // 成功标记配上错误状态码不算成功
        assert_eq!(confirmed(500, r#"{"success":true}"#, SuccessPolicy::Optimistic), None);
    }

    #[test]
    fn unknown_failure_is_error_with_truncated_diagnostic() {
        let body = "x".repeat(1000);
        match classify(&RawResult::new(502, body), SuccessPolicy::Optimistic) {
            Outcome::Error(diag) => {
                assert!(diag.starts_with("HTTP 502: "));
                assert!(diag.chars().count() <= "HTTP 502: ".len() + DIAGNOSTIC_LEN + 3);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            classify(&RawResult::new(500, ""), SuccessPolicy::Optimistic),
            Outcome::Error("HTTP 500".to_string())
        );
    }

    #[test]
    fn sent_carries_metadata() {
        let body = r#"{
            "success": true,
            "responseStatus": {
                "shortVacancy": {
                    "name": "QA Engineer",
                    "company": { "name": "ACME" },
                    "compensation": { "from": 120000, "to": null }
                }
            }
        }"#;
        let outcome = classify(&RawResult::new(200, body), SuccessPolicy::Optimistic);
        let meta = outcome.meta().cloned().unwrap();
        assert_eq!(meta.title, "QA Engineer");
        assert_eq!(meta.company, "ACME");
        assert_eq!(meta.salary_from, Some(120000));
        assert_eq!(meta.salary_to, None);
    }

    #[test]
    fn probe_limit_detection() {
        assert!(is_limited(&RawResult::new(400, "negotiations-limit-exceeded")));
        assert!(!is_limited(&RawResult::new(400, r#"{"error":"vacancy-not-found"}"#)));
    }
}
