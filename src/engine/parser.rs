//! 结果解析：CLI stdout 的结构化解码与纯文本回退
//!
//! `--output-format json` 下 stdout 是 `{result, session_id, ...}`；
//! 旧版 CLI 会直接吐纯文本，解码失败不是错误，回退为去空白的原文、无 session id。
//! 解析器不做截断，截断由编排器统一处理。

use serde::Deserialize;

/// result 为空字符串时的占位回复
pub const EMPTY_RESPONSE: &str = "(empty response)";

/// CLI 的结构化输出（其余字段忽略）
#[derive(Debug, Deserialize)]
struct CliOutput {
    result: String,
    session_id: Option<String>,
}

/// 解析结果：未截断的回复文本与可选的新 session id
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub text: String,
    pub session_id: Option<String>,
}

/// 解码 stdout；失败回退为原始文本（受支持的降级模式）
pub fn parse(stdout: &str) -> ParsedReply {
    match serde_json::from_str::<CliOutput>(stdout) {
        Ok(output) => {
            let text = if output.result.is_empty() {
                EMPTY_RESPONSE.to_string()
            } else {
                output.result
            };
            ParsedReply {
                text,
                session_id: output.session_id,
            }
        }
        Err(_) => ParsedReply {
            text: stdout.trim().to_string(),
            session_id: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_output() {
        let parsed = parse(r#"{"result":"hello","session_id":"deadbeef01"}"#);
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.session_id, Some("deadbeef01".to_string()));
    }

    #[test]
    fn test_structured_without_session_id() {
        let parsed = parse(r#"{"result":"hello"}"#);
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.session_id, None);
    }

    #[test]
    fn test_empty_result_placeholder() {
        let parsed = parse(r#"{"result":"","session_id":"abc"}"#);
        assert_eq!(parsed.text, EMPTY_RESPONSE);
        assert_eq!(parsed.session_id, Some("abc".to_string()));
    }

    #[test]
    fn test_plain_text_fallback() {
        let parsed = parse("  plain answer\n");
        assert_eq!(parsed.text, "plain answer");
        assert_eq!(parsed.session_id, None);
    }

    #[test]
    fn test_json_missing_result_falls_back() {
        // 有 JSON 但没有 result 字段，同样按纯文本处理
        let raw = r#"{"session_id":"abc"}"#;
        let parsed = parse(raw);
        assert_eq!(parsed.text, raw);
        assert_eq!(parsed.session_id, None);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let parsed = parse(r#"{"result":"ok","session_id":"s1","cost_usd":0.01,"turns":3}"#);
        assert_eq!(parsed.text, "ok");
        assert_eq!(parsed.session_id, Some("s1".to_string()));
    }
}
