//! Exchange - exchange の種別と routing key の導出規則

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::names::{ExchangeName, QueueName, is_blank};

/// ExchangeKind は exchange が routing key をどう照合するかを表す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Direct,
    Topic,
    Fanout,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Fanout => "fanout",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exchange kind '{0}' (expected direct, topic or fanout)")]
pub struct UnknownExchangeKind(pub String);

impl FromStr for ExchangeKind {
    type Err = UnknownExchangeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ExchangeKind::Direct),
            "topic" => Ok(ExchangeKind::Topic),
            "fanout" => Ok(ExchangeKind::Fanout),
            other => Err(UnknownExchangeKind(other.to_string())),
        }
    }
}

/// A validated exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub name: ExchangeName,
    pub kind: ExchangeKind,
    pub routing_key: RoutingKeyTemplate,
}

/// RoutingKeyTemplate は queue ごとの routing key を導出するテンプレート
///
/// # 書式
/// - `{exchange}` と `{queue}` のみ置換される
/// - デフォルトは `{exchange}.{queue}`（例: `alpha.default`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutingKeyTemplate(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("routing key template is blank")]
    Blank,

    #[error("unknown placeholder '{{{0}}}' (expected {{exchange}} or {{queue}})")]
    UnknownPlaceholder(String),

    #[error("unbalanced braces in routing key template")]
    Unbalanced,
}

impl RoutingKeyTemplate {
    pub const DEFAULT: &'static str = "{exchange}.{queue}";

    pub fn parse(s: &str) -> Result<Self, TemplateError> {
        if is_blank(s) {
            return Err(TemplateError::Blank);
        }

        let mut rest = s;
        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(TemplateError::Unbalanced);
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or(TemplateError::Unbalanced)?;
            let placeholder = &after[..close];
            if placeholder.contains('{') {
                return Err(TemplateError::Unbalanced);
            }
            if placeholder != "exchange" && placeholder != "queue" {
                return Err(TemplateError::UnknownPlaceholder(placeholder.to_string()));
            }
            rest = &after[close + 1..];
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 置換は 1 パスで行う（名前に含まれる `{queue}` などは再置換しない）
    pub fn render(&self, exchange: &ExchangeName, queue: &QueueName) -> String {
        let mut out =
            String::with_capacity(self.0.len() + exchange.as_str().len() + queue.as_str().len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            match &after[..close] {
                "exchange" => out.push_str(exchange.as_str()),
                "queue" => out.push_str(queue.as_str()),
                other => {
                    out.push('{');
                    out.push_str(other);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

impl Default for RoutingKeyTemplate {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::direct("direct", ExchangeKind::Direct)]
    #[case::topic("topic", ExchangeKind::Topic)]
    #[case::fanout("fanout", ExchangeKind::Fanout)]
    fn kind_parses_known_values(#[case] input: &str, #[case] expected: ExchangeKind) {
        assert_eq!(input.parse::<ExchangeKind>(), Ok(expected));
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn kind_rejects_unknown_value() {
        let err = "headers".parse::<ExchangeKind>().unwrap_err();
        assert_eq!(err, UnknownExchangeKind("headers".to_string()));
    }

    #[test]
    fn default_template_derives_exchange_dot_queue() {
        let t = RoutingKeyTemplate::default();
        let key = t.render(&ExchangeName::new("alpha"), &QueueName::new("default"));
        assert_eq!(key, "alpha.default");
    }

    #[test]
    fn custom_template_renders_both_placeholders() {
        let t = RoutingKeyTemplate::parse("tasks.{queue}@{exchange}").unwrap();
        let key = t.render(&ExchangeName::new("beta"), &QueueName::new("another_1"));
        assert_eq!(key, "tasks.another_1@beta");
    }

    #[rstest]
    #[case::exchange_holds_placeholder("x{queue}", "q", "x{queue}.q")]
    #[case::queue_holds_placeholder("alpha", "{exchange}", "alpha.{exchange}")]
    #[case::both_hold_placeholders("{queue}", "{exchange}", "{queue}.{exchange}")]
    fn placeholders_inside_names_are_not_substituted_again(
        #[case] exchange: &str,
        #[case] queue: &str,
        #[case] expected: &str,
    ) {
        let key = RoutingKeyTemplate::default()
            .render(&ExchangeName::new(exchange), &QueueName::new(queue));
        assert_eq!(key, expected);
    }

    #[test]
    fn literal_template_is_allowed() {
        let t = RoutingKeyTemplate::parse("static.key").unwrap();
        let key = t.render(&ExchangeName::new("beta"), &QueueName::new("q"));
        assert_eq!(key, "static.key");
    }

    #[rstest]
    #[case::blank("  ", TemplateError::Blank)]
    #[case::unknown("{exchange}.{task}", TemplateError::UnknownPlaceholder("task".into()))]
    #[case::unclosed("{exchange", TemplateError::Unbalanced)]
    #[case::stray_close("exchange}", TemplateError::Unbalanced)]
    #[case::nested("{{queue}}", TemplateError::Unbalanced)]
    fn invalid_templates_are_rejected(#[case] input: &str, #[case] expected: TemplateError) {
        assert_eq!(RoutingKeyTemplate::parse(input), Err(expected));
    }
}
