//! Compiler for a practical subset of Rego
//!
//! Policies written as Rego text are parsed into [`ParsedRegoRule`]s and
//! lowered into [`LocalRegoRule`]s that evaluate in-process with the same
//! condition trees as YAML policies. The accepted shapes are:
//!
//! - `package <dotted.name>`
//! - `<head>[msg] { ... }`, `<head> contains msg if { ... }`, `<head> { ... }`
//!   and object heads such as `<head>[{"msg": msg, ...}] { ... }`; the
//!   opening brace may sit on the following line
//! - `input.<path> <op> <literal>` and `<literal> <op> input.<path>`
//!   for `== != > >= < <=`
//! - `not input.<path>`, bare `input.<path>`
//! - `contains(input.<path>, <literal>)`
//! - `re_match("<pattern>", input.<path>)` (also `regex.match`)
//! - `count(input.<path>) <op> <n>`
//! - `msg := "<literal>"` and `msg := sprintf("<format>", [...])`
//!
//! Anything else inside a rule body is kept in `unparsed_lines`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::condition::SizeOp;
use crate::{Condition, Rule, RuleAction, Severity};

/// Severity/action pairing for each supported rule head
///
/// Heads outside this table are parsed but not lowered.
pub const HEAD_MAPPINGS: &[(&str, Severity, RuleAction)] = &[
    ("deny", Severity::Critical, RuleAction::Deny),
    ("violation", Severity::High, RuleAction::Deny),
    ("warn", Severity::Medium, RuleAction::Warn),
    ("require_approval", Severity::High, RuleAction::RequireApproval),
    ("approval", Severity::High, RuleAction::RequireApproval),
    ("notify", Severity::Low, RuleAction::Notify),
];

/// Look up the severity/action pairing for a rule head
pub fn head_mapping(head: &str) -> Option<(Severity, RuleAction)> {
    HEAD_MAPPINGS
        .iter()
        .find(|(name, _, _)| *name == head)
        .map(|(_, severity, action)| (*severity, *action))
}

/// What the compiler understood from one rule block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRegoRule {
    pub package: String,

    /// Rule head name (`deny`, `warn`, ...)
    pub rule_head: String,

    pub conditions: Vec<Condition>,

    /// Literal message or verbatim `sprintf` format string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Body statements that were not translated
    pub unparsed_lines: Vec<String>,
}

/// A rule lowered from Rego text, ready for local evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRegoRule {
    pub id: String,
    pub package: String,
    #[serde(default)]
    pub description: String,
    pub condition: Condition,
    pub severity: Severity,
    pub action: RuleAction,
    pub message: String,
}

impl From<LocalRegoRule> for Rule {
    fn from(rule: LocalRegoRule) -> Self {
        Rule {
            id: rule.id,
            description: rule.description,
            condition: rule.condition,
            severity: rule.severity,
            action: rule.action,
            message: rule.message,
        }
    }
}

/// Parse Rego text into rule blocks
///
/// Never fails: malformed or empty text yields an empty list.
pub fn parse_rego_subset(text: &str) -> Vec<ParsedRegoRule> {
    let mut parser = Parser::default();
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Lower parsed rules into locally evaluable rules
///
/// Several conditions combine under `and`; a single condition is used as is.
/// A rule with no translated conditions is skipped, since an empty `and`
/// would match every input.
pub fn rego_to_local_rules(parsed: &[ParsedRegoRule]) -> Vec<LocalRegoRule> {
    let mut counters: std::collections::HashMap<(&str, &str), usize> = Default::default();
    let mut rules = Vec::new();

    for rule in parsed {
        let Some((severity, action)) = head_mapping(&rule.rule_head) else {
            debug!(
                package = %rule.package,
                head = %rule.rule_head,
                "Rule head has no severity mapping, not lowering"
            );
            continue;
        };

        if rule.conditions.is_empty() {
            warn!(
                package = %rule.package,
                head = %rule.rule_head,
                untranslated = rule.unparsed_lines.len(),
                "Rego rule has no translatable conditions, not lowering"
            );
            continue;
        }

        let n = counters
            .entry((rule.package.as_str(), rule.rule_head.as_str()))
            .or_insert(0);
        *n += 1;

        let id = if rule.package.is_empty() {
            format!("{}_{}", rule.rule_head, n)
        } else {
            format!("{}.{}_{}", rule.package, rule.rule_head, n)
        };

        let condition = match rule.conditions.as_slice() {
            [single] => single.clone(),
            many => Condition::and(many.to_vec()),
        };

        let description = if rule.unparsed_lines.is_empty() {
            format!("{} rule from package {}", rule.rule_head, rule.package)
        } else {
            warn!(
                rule = %id,
                untranslated = rule.unparsed_lines.len(),
                "Rego rule lowered with untranslated statements"
            );
            format!(
                "{} rule from package {} ({} statement(s) not translated)",
                rule.rule_head,
                rule.package,
                rule.unparsed_lines.len()
            )
        };

        let message = rule
            .message
            .clone()
            .unwrap_or_else(|| format!("{} matched {}", id, rule.rule_head));

        rules.push(LocalRegoRule {
            id,
            package: rule.package.clone(),
            description,
            condition,
            severity,
            action,
            message,
        });
    }

    rules
}

/// Where the line scanner currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    #[default]
    OutsideRule,
    InBody,
    InNestedLiteral,
}

#[derive(Debug)]
struct RuleBuilder {
    head: String,
    msg_var: Option<String>,
    conditions: Vec<Condition>,
    message: Option<String>,
    unparsed: Vec<String>,
}

#[derive(Debug, Default)]
struct Parser {
    package: String,
    state: ParserState,
    depth: usize,
    current: Option<RuleBuilder>,

    /// Head seen on a line of its own, waiting for `{`
    pending_head: Option<(String, Option<String>)>,
    statement: String,
    rules: Vec<ParsedRegoRule>,
}

impl Parser {
    fn feed_line(&mut self, line: &str) {
        let line = strip_comment(line);
        match self.state {
            ParserState::OutsideRule => self.outside(line),
            ParserState::InBody | ParserState::InNestedLiteral => self.body(line),
        }
    }

    fn outside(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if let Some((head, msg_var)) = self.pending_head.take() {
            if let Some(rest) = trimmed.strip_prefix('{') {
                self.open_rule(head, msg_var, rest);
                return;
            }
            if head_mapping(&head).is_some() {
                warn!(head = %head, "Rego rule head without a body, skipped");
            }
        }

        if let Some(caps) = patterns().package.captures(trimmed) {
            self.package = caps[1].to_string();
            return;
        }

        if let Some(caps) = patterns().head.captures(trimmed) {
            let head = caps[1].to_string();
            let msg_var = caps
                .get(2)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .or_else(|| caps.get(3).and_then(|obj| object_msg_var(obj.as_str())));
            let end = caps.get(0).map_or(0, |m| m.end());

            if caps.get(5).is_some_and(|opener| opener.as_str() == "{") {
                self.open_rule(head, msg_var, &trimmed[end..]);
            } else {
                self.pending_head = Some((head, msg_var));
            }
            return;
        }

        if let Some(caps) = patterns().leading_ident.captures(trimmed) {
            if head_mapping(&caps[1]).is_some() {
                warn!(line = %trimmed, "Unrecognised Rego rule head, skipped");
            }
        }
        // imports, defaults and other top-level declarations are not rules
    }

    fn open_rule(&mut self, head: String, msg_var: Option<String>, rest: &str) {
        self.current = Some(RuleBuilder {
            head,
            msg_var,
            conditions: Vec::new(),
            message: None,
            unparsed: Vec::new(),
        });
        self.depth = 1;
        self.state = ParserState::InBody;
        self.statement.clear();
        self.body(rest);
    }

    fn body(&mut self, line: &str) {
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (idx, ch) in line.char_indices() {
            if let Some(q) = quote {
                self.statement.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' && q == '"' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
                continue;
            }

            match ch {
                '"' | '`' => {
                    quote = Some(ch);
                    self.statement.push(ch);
                }
                '{' | '[' | '(' => {
                    self.depth += 1;
                    self.state = ParserState::InNestedLiteral;
                    self.statement.push(ch);
                }
                '}' if self.depth <= 1 => {
                    self.flush_statement();
                    self.close_rule();
                    let rest = &line[idx + ch.len_utf8()..];
                    self.outside(rest);
                    return;
                }
                '}' | ']' | ')' => {
                    // a stray `]` or `)` never closes the rule block
                    if self.depth > 1 {
                        self.depth -= 1;
                    }
                    if self.depth == 1 {
                        self.state = ParserState::InBody;
                    }
                    self.statement.push(ch);
                }
                ';' if self.depth == 1 => self.flush_statement(),
                _ => self.statement.push(ch),
            }
        }

        if self.state == ParserState::InBody {
            self.flush_statement();
        } else {
            // nested literal continues on the next line
            self.statement.push(' ');
        }
    }

    fn flush_statement(&mut self) {
        let statement = std::mem::take(&mut self.statement);
        let statement = statement.trim();
        if statement.is_empty() {
            return;
        }
        if let Some(rule) = self.current.as_mut() {
            rule.absorb(statement);
        }
    }

    fn close_rule(&mut self) {
        self.state = ParserState::OutsideRule;
        self.depth = 0;
        if let Some(rule) = self.current.take() {
            self.rules.push(ParsedRegoRule {
                package: self.package.clone(),
                rule_head: rule.head,
                conditions: rule.conditions,
                message: rule.message,
                unparsed_lines: rule.unparsed,
            });
        }
    }

    fn finish(mut self) -> Vec<ParsedRegoRule> {
        if let Some(rule) = self.current.take() {
            warn!(head = %rule.head, "Unterminated Rego rule block discarded");
        }
        if let Some((head, _)) = self.pending_head.take() {
            warn!(head = %head, "Rego rule head without a body, skipped");
        }
        let untranslated: usize = self.rules.iter().map(|r| r.unparsed_lines.len()).sum();
        debug!(
            package = %self.package,
            rules = self.rules.len(),
            untranslated,
            "Parsed Rego policy text"
        );
        self.rules
    }
}

impl RuleBuilder {
    fn absorb(&mut self, statement: &str) {
        if let Some(message) = self.parse_message(statement) {
            self.message = Some(message);
        } else if let Some(condition) = parse_condition(statement) {
            self.conditions.push(condition);
        } else {
            self.unparsed.push(statement.to_string());
        }
    }

    fn parse_message(&self, statement: &str) -> Option<String> {
        let caps = patterns().assign.captures(statement)?;
        let var = self.msg_var.as_deref().unwrap_or("msg");
        if &caps[1] != var {
            return None;
        }
        let rhs = caps[2].trim();

        if let Some(lit) = patterns().string_literal.captures(rhs) {
            return unquote(&lit[0]);
        }
        if let Some(fmt) = patterns().sprintf.captures(rhs) {
            return unquote(&fmt[1]);
        }
        None
    }
}

fn parse_condition(statement: &str) -> Option<Condition> {
    let p = patterns();

    if let Some(caps) = p.not_input.captures(statement) {
        return Some(Condition::FieldNotExists {
            field: input_path(&caps[1])?,
        });
    }

    if let Some(caps) = p.contains.captures(statement) {
        return Some(Condition::FieldContains {
            field: input_path(&caps[1])?,
            value: parse_literal(&caps[2])?,
        });
    }

    if let Some(caps) = p.re_match.captures(statement) {
        let pattern = caps[1].to_string();
        let pattern = if pattern.starts_with('`') {
            pattern.trim_matches('`').to_string()
        } else {
            unquote(&pattern)?
        };
        return Some(Condition::FieldMatches {
            field: input_path(&caps[2])?,
            pattern,
        });
    }

    if let Some(caps) = p.count.captures(statement) {
        let op = match &caps[2] {
            "==" => SizeOp::Eq,
            "!=" => SizeOp::Ne,
            ">" => SizeOp::Gt,
            ">=" => SizeOp::Gte,
            "<" => SizeOp::Lt,
            _ => SizeOp::Lte,
        };
        return Some(Condition::FieldSize {
            field: input_path(&caps[1])?,
            op,
            value: caps[3].parse().ok()?,
        });
    }

    if let Some(caps) = p.compare.captures(statement) {
        return comparison(&caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = p.compare_reversed.captures(statement) {
        let flipped = match &caps[2] {
            ">" => "<",
            ">=" => "<=",
            "<" => ">",
            "<=" => ">=",
            other => other,
        };
        return comparison(&caps[3], flipped, &caps[1]);
    }

    if p.bare_input.is_match(statement) {
        return Some(Condition::FieldExists {
            field: input_path(statement)?,
        });
    }

    None
}

fn comparison(path: &str, op: &str, literal: &str) -> Option<Condition> {
    let field = input_path(path)?;
    let value = parse_literal(literal)?;
    let number = value.as_f64();

    Some(match op {
        "==" => Condition::FieldEquals { field, value },
        "!=" => Condition::FieldNotEquals { field, value },
        ">" => Condition::FieldGt { field, value: number? },
        ">=" => Condition::FieldGte { field, value: number? },
        "<" => Condition::FieldLt { field, value: number? },
        "<=" => Condition::FieldLte { field, value: number? },
        _ => return None,
    })
}

/// Convert `input.a["b"][0]` into the dot-path `a.b.0`
///
/// A leading `changeRequest` segment is dropped so the same policy text
/// addresses the change request both locally and on a remote service.
fn input_path(expr: &str) -> Option<String> {
    let rest = expr.trim().strip_prefix("input")?;
    let mut segments: Vec<String> = Vec::new();
    let mut consumed = 0;

    for caps in patterns().segment.captures_iter(rest) {
        let whole = caps.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        if let Some(ident) = caps.get(1) {
            segments.push(ident.as_str().to_string());
        } else if let Some(quoted) = caps.get(2) {
            segments.push(unquote(quoted.as_str())?);
        } else if let Some(index) = caps.get(3) {
            segments.push(index.as_str().to_string());
        }
    }

    if consumed != rest.len() || segments.is_empty() {
        return None;
    }
    if segments.len() > 1 && segments[0] == "changeRequest" {
        segments.remove(0);
    }
    Some(segments.join("."))
}

/// Variable bound to the `"msg"` key of an object-valued head
fn object_msg_var(object: &str) -> Option<String> {
    patterns().object_msg.captures(object).map(|caps| caps[1].to_string())
}

fn parse_literal(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok().filter(|v: &Value| {
        matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)
    })
}

fn unquote(quoted: &str) -> Option<String> {
    match serde_json::from_str::<Value>(quoted).ok()? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Drop a trailing `# comment`, ignoring `#` inside strings
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' && q == '"' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '`' => quote = Some(ch),
                '#' => return &line[..idx],
                _ => {}
            },
        }
    }
    line
}

struct Patterns {
    package: Regex,
    head: Regex,
    leading_ident: Regex,
    object_msg: Regex,
    assign: Regex,
    string_literal: Regex,
    sprintf: Regex,
    not_input: Regex,
    contains: Regex,
    re_match: Regex,
    count: Regex,
    compare: Regex,
    compare_reversed: Regex,
    bare_input: Regex,
    segment: Regex,
}

const INPUT: &str = r#"input(?:\.[A-Za-z_][A-Za-z0-9_\-]*|\["(?:[^"\\]|\\.)*"\]|\[\d+\])+"#;
const LITERAL: &str = r#""(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null"#;
const STRING: &str = r#""(?:[^"\\]|\\.)*""#;
const OP: &str = r"==|!=|>=|<=|>|<";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: String| Regex::new(&pattern).expect("rego pattern is valid");
        Patterns {
            package: re(r"^package\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*$".to_string()),
            head: re(
                r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?:\[\s*([A-Za-z_][A-Za-z0-9_]*)\s*\]|\[\s*(\{.*?\})\s*\]|\s+contains\s+([A-Za-z_][A-Za-z0-9_]*))?\s*(?:if\b\s*)?(\{|$)"
                    .to_string(),
            ),
            leading_ident: re(r"^([A-Za-z_][A-Za-z0-9_]*)".to_string()),
            object_msg: re(r#""msg"\s*:\s*([A-Za-z_][A-Za-z0-9_]*)"#.to_string()),
            assign: re(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?::=|=)\s*([^=].*)$".to_string()),
            string_literal: re(format!("^{}$", STRING)),
            sprintf: re(format!(r"^sprintf\(\s*({})\s*,", STRING)),
            not_input: re(format!(r"^not\s+({})$", INPUT)),
            contains: re(format!(r"^contains\(\s*({})\s*,\s*({})\s*\)$", INPUT, LITERAL)),
            re_match: re(format!(
                r"^(?:re_match|regex\.match)\(\s*({}|`[^`]*`)\s*,\s*({})\s*\)$",
                STRING, INPUT
            )),
            count: re(format!(r"^count\(\s*({})\s*\)\s*({})\s*(\d+)$", INPUT, OP)),
            compare: re(format!(r"^({})\s*({})\s*({})$", INPUT, OP, LITERAL)),
            compare_reversed: re(format!(r"^({})\s*({})\s*({})$", LITERAL, OP, INPUT)),
            bare_input: re(format!("^{}$", INPUT)),
            segment: re(r#"\.([A-Za-z_][A-Za-z0-9_\-]*)|\[("(?:[^"\\]|\\.)*")\]|\[(\d+)\]"#.to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TWO_RULES: &str = r#"
package infra.guardrails

import future.keywords

# Block public buckets
deny[msg] {
    input.resource.type == "storage"
    input.resource.public == true
    tags := {"team": "platform", "nested": {"deny[x]": "{"}}
    msg := sprintf("bucket %s must not be public", [input.resource.name])
}

warn[msg] {
    not input.resource.tags.owner
    msg := "resource has no owner tag"
}
"#;

    #[test]
    fn test_two_blocks_with_nested_literal() {
        let rules = parse_rego_subset(TWO_RULES);
        assert_eq!(rules.len(), 2);

        let deny = &rules[0];
        assert_eq!(deny.package, "infra.guardrails");
        assert_eq!(deny.rule_head, "deny");
        assert_eq!(
            deny.conditions,
            vec![
                Condition::field_equals("resource.type", "storage"),
                Condition::field_equals("resource.public", true),
            ]
        );
        assert_eq!(deny.message.as_deref(), Some("bucket %s must not be public"));
        assert_eq!(deny.unparsed_lines.len(), 1);
        assert!(deny.unparsed_lines[0].starts_with("tags := {"));

        let warn = &rules[1];
        assert_eq!(warn.rule_head, "warn");
        assert_eq!(
            warn.conditions,
            vec![Condition::FieldNotExists {
                field: "resource.tags.owner".to_string()
            }]
        );
        assert_eq!(warn.message.as_deref(), Some("resource has no owner tag"));
        assert!(warn.unparsed_lines.is_empty());
    }

    #[test]
    fn test_multiline_nested_literal() {
        let text = r#"
package p

deny[msg] {
    allowed := {
        "us-east-1",
        "eu-west-1"
    }
    input.region == "ap-south-1"
    msg := "region not allowed"
}

notify[msg] {
    input.action == "delete"
    msg := "delete requested"
}
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].unparsed_lines.len(), 1);
        assert_eq!(rules[0].conditions.len(), 1);
        assert_eq!(rules[1].rule_head, "notify");
    }

    #[test]
    fn test_recognized_statement_shapes() {
        let text = r#"
package shapes
deny[msg] {
    input.cost.monthlyDelta > 500
    input.risk.score >= 7.5
    input.replicas < 2
    input.replicas <= 1
    input.environment != "dev"
    100 < input.cost.total
    input.resource.encrypted
    contains(input.resource.name, "prod")
    re_match("^db-[0-9]+$", input.resource.id)
    regex.match(`^arn:`, input.resource.arn)
    count(input.resource.ports) > 0
    input.resource.tags["cost-center"] == "42"
    input.changeRequest.action == "update"
    msg := "shapes"
}
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert!(rule.unparsed_lines.is_empty(), "{:?}", rule.unparsed_lines);

        assert_eq!(
            rule.conditions,
            vec![
                Condition::field_gt("cost.monthlyDelta", 500.0),
                Condition::FieldGte { field: "risk.score".into(), value: 7.5 },
                Condition::FieldLt { field: "replicas".into(), value: 2.0 },
                Condition::FieldLte { field: "replicas".into(), value: 1.0 },
                Condition::FieldNotEquals { field: "environment".into(), value: json!("dev") },
                Condition::field_gt("cost.total", 100.0),
                Condition::field_exists("resource.encrypted"),
                Condition::FieldContains { field: "resource.name".into(), value: json!("prod") },
                Condition::FieldMatches { field: "resource.id".into(), pattern: "^db-[0-9]+$".into() },
                Condition::FieldMatches { field: "resource.arn".into(), pattern: "^arn:".into() },
                Condition::FieldSize { field: "resource.ports".into(), op: SizeOp::Gt, value: 0 },
                Condition::field_equals("resource.tags.cost-center", "42"),
                Condition::field_equals("action", "update"),
            ]
        );
    }

    #[test]
    fn test_unrecognized_statements_are_kept() {
        let text = r#"
package p
deny[msg] {
    some i
    input.resource.rules[i].cidr == "0.0.0.0/0"
    input.size > "big"
    msg := concat(", ", ["a", "b"])
}
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].conditions.is_empty());
        assert!(rules[0].message.is_none());
        assert_eq!(
            rules[0].unparsed_lines,
            vec![
                "some i",
                r#"input.resource.rules[i].cidr == "0.0.0.0/0""#,
                r#"input.size > "big""#,
                r#"msg := concat(", ", ["a", "b"])"#,
            ]
        );
    }

    #[test]
    fn test_single_line_and_modern_syntax() {
        let text = r#"package p
deny contains msg if { input.public == true; msg := "public" }
warn[msg] { input.x == 1; msg := "x # not a comment" } # trailing comment
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].message.as_deref(), Some("public"));
        assert_eq!(rules[1].message.as_deref(), Some("x # not a comment"));
    }

    #[test]
    fn test_empty_and_malformed_input() {
        assert!(parse_rego_subset("").is_empty());
        assert!(parse_rego_subset("package only").is_empty());
        assert!(parse_rego_subset("this is not rego at all").is_empty());
        assert!(parse_rego_subset("package p\ndeny[msg] {\n input.a == 1\n").is_empty());
    }

    #[test]
    fn test_lowering_unwraps_single_condition() {
        let rules = parse_rego_subset(TWO_RULES);
        let local = rego_to_local_rules(&rules);
        assert_eq!(local.len(), 2);

        let deny = &local[0];
        assert_eq!(deny.id, "infra.guardrails.deny_1");
        assert_eq!(deny.action, RuleAction::Deny);
        assert_eq!(deny.severity, Severity::Critical);
        assert!(matches!(&deny.condition, Condition::And { conditions } if conditions.len() == 2));

        let warn = &local[1];
        assert_eq!(warn.action, RuleAction::Warn);
        assert_eq!(warn.severity, Severity::Medium);
        assert_eq!(
            warn.condition,
            Condition::FieldNotExists {
                field: "resource.tags.owner".to_string()
            }
        );
    }

    #[test]
    fn test_lowering_skips_unmapped_heads() {
        let text = r#"
package p
is_prod { input.environment == "production" }
notify[msg] { input.action == "delete"; msg := "delete" }
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 2);

        let local = rego_to_local_rules(&rules);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].action, RuleAction::Notify);
        assert_eq!(local[0].severity, Severity::Low);
    }

    #[test]
    fn test_rule_without_translated_conditions_is_not_lowered() {
        let text = r#"
package network
deny[msg] {
    some i
    input.resource.rules[i].cidr == "0.0.0.0/0"
    msg := "open ingress"
}
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].conditions.is_empty());
        assert_eq!(rules[0].unparsed_lines.len(), 2);

        assert!(rego_to_local_rules(&rules).is_empty());
    }

    #[test]
    fn test_object_valued_head() {
        let text = r#"
package tagging
deny[{"msg": msg, "severity": "high", "meta": {"owner": "sec"}}] {
    input.resource.public == true
    msg := "public resource"
}
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_head, "deny");
        assert_eq!(rules[0].conditions, vec![Condition::field_equals("resource.public", true)]);
        assert_eq!(rules[0].message.as_deref(), Some("public resource"));
        assert!(rules[0].unparsed_lines.is_empty());
    }

    #[test]
    fn test_brace_on_next_line() {
        let text = r#"
package style
deny[msg]
{
    input.action == "delete"
    msg := "no deletes"
}

warn contains note if
{
    input.environment == "dev"
    note := "dev change"
}

violation[msg]
input.unrelated == 1
"#;
        let rules = parse_rego_subset(text);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].rule_head, "deny");
        assert_eq!(rules[0].conditions, vec![Condition::field_equals("action", "delete")]);
        assert_eq!(rules[0].message.as_deref(), Some("no deletes"));
        assert_eq!(rules[1].rule_head, "warn");
        assert_eq!(rules[1].message.as_deref(), Some("dev change"));
    }

    #[test]
    fn test_head_mapping_table() {
        assert_eq!(head_mapping("deny"), Some((Severity::Critical, RuleAction::Deny)));
        assert_eq!(head_mapping("warn"), Some((Severity::Medium, RuleAction::Warn)));
        assert_eq!(head_mapping("allow"), None);
    }

    #[test]
    fn test_lowered_rule_converts_to_rule() {
        let local = rego_to_local_rules(&parse_rego_subset(TWO_RULES));
        let rule: Rule = local[1].clone().into();
        assert_eq!(rule.id, "infra.guardrails.warn_1");
        assert_eq!(rule.message, "resource has no owner tag");
    }
}
