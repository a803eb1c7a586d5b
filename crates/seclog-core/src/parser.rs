//! Parsing of raw security log lines.
//!
//! Recognized layout:
//!
//! ```text
//! [2025-01-15 10:42:07] production.WARNING: Failed login {"ip":"10.0.0.4"}
//! ```
//!
//! Lines that do not follow it (blank lines, stack trace continuations,
//! garbage) yield no record and never abort a read.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{LogLevel, LogRecord, RecordId, DATETIME_FORMAT};

static LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\] ([^\s.]+)\.(\w+): (.*)$")
        .unwrap_or_else(|_| unreachable!())
});

/// Parser turning log lines into [`LogRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogParser;

impl LogParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses one line, returning `None` if it carries no record.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<LogRecord> {
        let line = line.trim_end_matches(['\r', '\n']);
        let captures = LINE_REGEX.captures(line)?;

        let datetime =
            NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), DATETIME_FORMAT).ok()?;
        let environment = captures.get(2)?.as_str().to_string();
        let level = LogLevel::parse(captures.get(3)?.as_str());
        let (message, context) = split_context(captures.get(4)?.as_str());

        Some(LogRecord {
            id: RecordId::derive(&datetime, &message),
            datetime,
            environment,
            level,
            message,
            context,
        })
    }

    /// Parses every line of a text blob, keeping line order.
    #[must_use]
    pub fn parse_content(&self, content: &str) -> Vec<LogRecord> {
        content
            .lines()
            .filter_map(|line| self.parse_line(line))
            .collect()
    }
}

/// Splits a trailing JSON object off a message.
///
/// The context starts at the first `{` whose remainder decodes as an
/// object. If none does, the message is returned untouched.
fn split_context(raw: &str) -> (String, serde_json::Map<String, serde_json::Value>) {
    if raw.ends_with('}') {
        for (start, _) in raw.match_indices('{') {
            if let Ok(serde_json::Value::Object(context)) =
                serde_json::from_str::<serde_json::Value>(&raw[start..])
            {
                return (raw[..start].trim_end().to_string(), context);
            }
        }
    }
    (raw.to_string(), serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use test_case::test_case;

    fn parse(line: &str) -> Option<LogRecord> {
        LogParser::new().parse_line(line)
    }

    #[test]
    fn parses_plain_line() {
        let record = parse("[2025-01-15 10:42:07] production.INFO: User logged in");
        let record = record.as_ref();

        let expected = NaiveDate::from_ymd_opt(2025, 1, 15).and_then(|d| d.and_hms_opt(10, 42, 7));
        assert_eq!(record.map(|r| r.datetime), expected);
        assert_eq!(record.map(|r| r.environment.as_str()), Some("production"));
        assert_eq!(record.map(|r| &r.level), Some(&LogLevel::Info));
        assert_eq!(record.map(|r| r.message.as_str()), Some("User logged in"));
        assert!(record.is_some_and(|r| r.context.is_empty()));
    }

    #[test]
    fn strips_trailing_context() {
        let record = parse(r#"[2025-01-15 10:42:07] local.WARNING: Failed login {"ip":"10.0.0.4","attempts":3}"#);

        assert_eq!(record.as_ref().map(|r| r.message.as_str()), Some("Failed login"));
        let context = record.map(|r| r.context).unwrap_or_default();
        assert_eq!(context.get("ip"), Some(&serde_json::json!("10.0.0.4")));
        assert_eq!(context.get("attempts"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn nested_context_is_kept_whole() {
        let record = parse(r#"[2025-01-15 10:42:07] local.ERROR: Denied {"user":{"id":7},"roles":["a"]}"#);
        let context = record.map(|r| r.context).unwrap_or_default();
        assert_eq!(context.get("user"), Some(&serde_json::json!({"id": 7})));
        assert_eq!(context.get("roles"), Some(&serde_json::json!(["a"])));
    }

    #[test]
    fn braces_in_message_before_context() {
        let record = parse(r#"[2025-01-15 10:42:07] local.INFO: Route {id} hit {"id":5}"#);
        assert_eq!(record.as_ref().map(|r| r.message.as_str()), Some("Route {id} hit"));
        assert_eq!(
            record.map(|r| r.context).unwrap_or_default().get("id"),
            Some(&serde_json::json!(5))
        );
    }

    #[test]
    fn malformed_context_leaves_message_untouched() {
        let line = "[2025-01-15 10:42:07] local.INFO: Broken {\"ip\": }";
        let record = parse(line);
        assert_eq!(
            record.as_ref().map(|r| r.message.as_str()),
            Some("Broken {\"ip\": }")
        );
        assert!(record.is_some_and(|r| r.context.is_empty()));
    }

    #[test]
    fn non_object_json_is_not_context() {
        let record = parse("[2025-01-15 10:42:07] local.INFO: Values [1,2]");
        assert_eq!(record.map(|r| r.message), Some("Values [1,2]".to_string()));
    }

    #[test]
    fn unknown_level_is_preserved() {
        let record = parse("[2025-01-15 10:42:07] production.EMERGENCY: Disk gone");
        assert_eq!(
            record.map(|r| r.level),
            Some(LogLevel::Other("EMERGENCY".to_string()))
        );
    }

    #[test]
    fn id_is_computed_after_context_strip() {
        let with = parse(r#"[2025-01-15 10:42:07] a.INFO: Same {"k":1}"#);
        let without = parse("[2025-01-15 10:42:07] b.INFO: Same");
        assert_eq!(with.map(|r| r.id), without.map(|r| r.id));
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let record = parse("[2025-01-15 10:42:07] production.INFO: Done\r");
        assert_eq!(record.map(|r| r.message), Some("Done".to_string()));
    }

    #[test_case("" ; "blank")]
    #[test_case("   " ; "whitespace")]
    #[test_case("#0 /var/www/app/Http/Kernel.php(12): handle()" ; "stack frame")]
    #[test_case("[2025-01-15] production.INFO: no time" ; "missing time")]
    #[test_case("[2025-01-15 10:42:07] productionINFO: no dot" ; "missing dot")]
    #[test_case("[2025-13-15 10:42:07] production.INFO: bad month" ; "bad month")]
    #[test_case("[2025-01-15 25:00:00] production.INFO: bad hour" ; "bad hour")]
    #[test_case("2025-01-15 10:42:07 production.INFO: no brackets" ; "no brackets")]
    fn malformed_lines_yield_nothing(line: &str) {
        assert!(parse(line).is_none());
    }

    #[test]
    fn parse_content_skips_malformed_lines() {
        let content = "\
[2025-01-15 10:00:00] production.INFO: one
garbage line

[2025-01-15 10:00:01] production.ERROR: two
Stack trace:
[2025-01-15 10:00:02] production.DEBUG: three
";
        let records = LogParser::new().parse_content(content);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "one");
        assert_eq!(records[2].message, "three");
    }

    proptest! {
        #[test]
        fn valid_lines_round_trip(
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
            env in "[a-z][a-z0-9_-]{0,11}",
            level in prop::sample::select(vec!["DEBUG", "INFO", "NOTICE", "WARNING", "ERROR", "CRITICAL", "ALERT"]),
            message in "[A-Za-z0-9 ,:;()=_-]{0,60}[A-Za-z0-9]",
            key in "[a-z]{1,8}",
            value in any::<i64>(),
        ) {
            let datetime = NaiveDate::from_ymd_opt(2025, 3, day)
                .and_then(|d| d.and_hms_opt(hour, minute, second));
            prop_assume!(datetime.is_some());
            let datetime = datetime.unwrap_or_default();

            let line = format!(
                "[{}] {env}.{level}: {message} {{\"{key}\":{value}}}",
                datetime.format(DATETIME_FORMAT)
            );
            let record = LogParser::new().parse_line(&line);
            prop_assert!(record.is_some());
            let record = record.unwrap_or_else(|| unreachable!());

            prop_assert_eq!(record.datetime, datetime);
            prop_assert_eq!(&record.environment, &env);
            prop_assert_eq!(record.level.as_str(), level);
            prop_assert_eq!(&record.message, &message);
            prop_assert_eq!(record.context.get(&key), Some(&serde_json::json!(value)));
        }
    }
}
