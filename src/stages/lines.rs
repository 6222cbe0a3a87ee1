//! Stages that reorder, select or reduce items.

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::registry::Arity;
use crate::value::WorkingValue;
use argh::FromArgs;
use regex::Regex;
use std::cmp::Ordering;
use std::str::FromStr;

/// Where a key is taken from within an item.
#[derive(Debug, Clone)]
enum Column {
    /// The whole item.
    Whole,
    /// Zero-based field after splitting on runs of spaces and tabs.
    Field(usize),
    /// The `value` group of the first match.
    Capture(Regex),
}

impl Column {
    fn parse(raw: &str) -> Result<Self, String> {
        if let Ok(n) = raw.parse::<usize>() {
            return match n {
                0 => Err("column numbers start at 1".to_string()),
                n => Ok(Column::Field(n - 1)),
            };
        }

        let unquoted = strip_quotes(raw)
            .replace("\\t", "\t")
            .replace("\\n", "\n")
            .replace("\\r", "\r");
        let re = Regex::new(&unquoted).map_err(|e| format!("bad column pattern: {}", e))?;
        if !re.capture_names().any(|name| name == Some("value")) {
            return Err(format!(
                "column pattern '{}' has no (?P<value>...) group",
                unquoted
            ));
        }
        Ok(Column::Capture(re))
    }

    fn extract<'a>(&self, item: &'a str) -> Result<&'a str, String> {
        match self {
            Column::Whole => Ok(item),
            Column::Field(n) => split_fields(item)
                .get(*n)
                .copied()
                .ok_or_else(|| format!("no column {} in '{}'", n + 1, item)),
            Column::Capture(re) => re
                .captures(item)
                .and_then(|caps| caps.name("value"))
                .map(|m| m.as_str())
                .ok_or_else(|| format!("pattern '{}' does not match '{}'", re.as_str(), item)),
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// Split on runs of spaces and tabs; leading or trailing runs yield empty fields.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_separator = false;
    for (i, c) in line.char_indices() {
        let is_separator = c == ' ' || c == '\t';
        if is_separator && !in_separator {
            fields.push(&line[start..i]);
            in_separator = true;
        } else if !is_separator && in_separator {
            start = i;
            in_separator = false;
        }
    }
    fields.push(if in_separator { "" } else { &line[start..] });
    fields
}

/// How a key string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Text,
    Int,
    Float,
    /// Hexadecimal integer, optional `0x` prefix.
    Int16,
}

#[derive(Debug, Clone, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn parse(kind: KeyKind, raw: &str) -> Result<Self, String> {
        let s = raw.trim();
        let parsed = match kind {
            KeyKind::Int | KeyKind::Text => s.parse::<i64>().map(Number::Int).ok(),
            KeyKind::Float => s.parse::<f64>().map(Number::Float).ok(),
            KeyKind::Int16 => parse_hex(s).map(Number::Int),
        };
        parsed.ok_or_else(|| format!("'{}' is not a valid {} number", raw, kind_name(kind)))
    }

    fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

fn parse_hex(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    // One sign only; from_str_radix would accept a second.
    if digits.starts_with(['+', '-']) {
        return None;
    }
    let value = i64::from_str_radix(digits, 16).ok()?;
    if negative { value.checked_neg() } else { Some(value) }
}

fn kind_name(kind: KeyKind) -> &'static str {
    match kind {
        KeyKind::Text => "text",
        KeyKind::Int => "int",
        KeyKind::Float => "float",
        KeyKind::Int16 => "int16",
    }
}

/// Options shared by `--sort` and `--sum` for locating and reading keys.
#[derive(Debug, Clone)]
struct KeyRule {
    column: Column,
    kind: KeyKind,
    strip: bool,
    ignore_errors: bool,
}

impl Default for KeyRule {
    fn default() -> Self {
        Self {
            column: Column::Whole,
            kind: KeyKind::Text,
            strip: false,
            ignore_errors: false,
        }
    }
}

impl KeyRule {
    /// Consume a flag this rule understands. Returns `false` for anything else.
    fn accept(&mut self, flag: &str) -> Result<bool, String> {
        match flag {
            "int" => self.kind = KeyKind::Int,
            "float" => self.kind = KeyKind::Float,
            "int16" => self.kind = KeyKind::Int16,
            "strip" => self.strip = true,
            "ignore_error_lines" => self.ignore_errors = true,
            _ => match flag.strip_prefix("column=") {
                Some(raw) => self.column = Column::parse(raw)?,
                None => return Ok(false),
            },
        }
        Ok(true)
    }
}

fn flag_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Asc,
    Desc,
}

/// Parsed `--sort` flags, e.g. `desc,int,column=2`.
#[derive(Debug, Clone)]
pub struct SortFlags {
    order: Order,
    rule: KeyRule,
}

impl FromStr for SortFlags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = SortFlags {
            order: Order::Asc,
            rule: KeyRule::default(),
        };
        for token in flag_tokens(s) {
            match token {
                "asc" => flags.order = Order::Asc,
                "desc" => flags.order = Order::Desc,
                "none" => {}
                other => {
                    if !flags.rule.accept(other)? {
                        return Err(format!("unknown sort flag '{}'", other));
                    }
                }
            }
        }
        Ok(flags)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Text(String),
    Number(f64),
}

impl SortKey {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            // Keys of one sort always share a variant.
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Less,
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Greater,
        }
    }
}

impl SortFlags {
    fn key(&self, item: &str) -> Result<SortKey, String> {
        let rule = &self.rule;
        let raw = rule.column.extract(item);
        let key = match rule.kind {
            KeyKind::Text => raw.map(|s| {
                let s = if rule.strip { s.trim() } else { s };
                SortKey::Text(s.to_string())
            }),
            kind => raw
                .and_then(|s| Number::parse(kind, s))
                .map(|n| SortKey::Number(n.as_f64())),
        };
        match key {
            Ok(key) => Ok(key),
            Err(_) if rule.ignore_errors => Ok(self.fallback_key()),
            Err(e) => Err(e),
        }
    }

    /// Key for an unreadable item: text sorts first, numbers sort last.
    fn fallback_key(&self) -> SortKey {
        match (self.rule.kind, self.order) {
            (KeyKind::Text, _) => SortKey::Text(String::new()),
            (_, Order::Desc) => SortKey::Number(f64::NEG_INFINITY),
            _ => SortKey::Number(f64::INFINITY),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Sort items.
pub struct Sort {
    #[argh(positional)]
    /// comma-separated flags: asc, desc, int, float, int16, strip, ignore_error_lines, column=N|REGEX.
    pub flags: SortFlags,
}

impl StageOp for Sort {
    const FLAG: &'static str = "--sort";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "FLAGS";
    const SUMMARY: &'static str = "Sort items (asc, desc, int, float, int16, column=N, ...)";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let mut keyed = value
            .into_iter()
            .map(|item| self.flags.key(&item).map(|key| (key, item)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StageError::Policy)?;

        match self.flags.order {
            Order::Asc => keyed.sort_by(|a, b| a.0.compare(&b.0)),
            Order::Desc => keyed.sort_by(|a, b| b.0.compare(&a.0)),
        }
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }
}

/// Parsed `--sum` flags, e.g. `int,column=3`.
#[derive(Debug, Clone)]
pub struct SumFlags {
    precision: usize,
    rule: KeyRule,
}

impl FromStr for SumFlags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = SumFlags {
            precision: 6,
            rule: KeyRule {
                kind: KeyKind::Float,
                ..KeyRule::default()
            },
        };
        for token in flag_tokens(s) {
            if token == "none" {
                continue;
            }
            if let Some(digits) = token.strip_prefix("float=") {
                flags.rule.kind = KeyKind::Float;
                flags.precision = digits
                    .parse()
                    .map_err(|_| format!("invalid float precision '{}'", digits))?;
                continue;
            }
            if token == "strip" || !flags.rule.accept(token)? {
                return Err(format!("unknown sum flag '{}'", token));
            }
        }
        Ok(flags)
    }
}

impl SumFlags {
    fn number(&self, item: &str) -> Result<Number, String> {
        let number = self
            .rule
            .column
            .extract(item)
            .and_then(|raw| Number::parse(self.rule.kind, raw));
        match number {
            Ok(n) => Ok(n),
            Err(_) if self.rule.ignore_errors => Ok(match self.rule.kind {
                KeyKind::Float => Number::Float(0.0),
                _ => Number::Int(0),
            }),
            Err(e) => Err(e),
        }
    }

    fn total(&self, items: &[String]) -> Result<String, String> {
        match self.rule.kind {
            KeyKind::Float | KeyKind::Text => {
                let mut sum = 0.0;
                for item in items {
                    sum += self.number(item)?.as_f64();
                }
                Ok(format!("{:.*}", self.precision, sum))
            }
            kind => {
                let mut sum: i64 = 0;
                for item in items {
                    let n = match self.number(item)? {
                        Number::Int(n) => n,
                        Number::Float(f) => f as i64,
                    };
                    sum = sum
                        .checked_add(n)
                        .ok_or_else(|| "integer sum overflows".to_string())?;
                }
                Ok(match kind {
                    KeyKind::Int16 if sum < 0 => format!("-{:x}", sum.unsigned_abs()),
                    KeyKind::Int16 => format!("{:x}", sum),
                    _ => sum.to_string(),
                })
            }
        }
    }
}

#[derive(FromArgs, Debug)]
/// Sum numeric items.
pub struct Sum {
    #[argh(positional)]
    /// comma-separated flags: float, float=N, int, int16, ignore_error_lines, column=N|REGEX.
    pub flags: SumFlags,
}

impl StageOp for Sum {
    const FLAG: &'static str = "--sum";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "FLAGS";
    const SUMMARY: &'static str = "Replace the items with their numeric sum";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let total = self.flags.total(value.items()).map_err(StageError::Policy)?;
        Ok(WorkingValue::single(total))
    }
}

#[derive(FromArgs, Debug)]
/// Keep only the first item.
pub struct First {}

impl StageOp for First {
    const FLAG: &'static str = "--first";
    const SUMMARY: &'static str = "Keep only the first item";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.into_iter().take(1).collect())
    }
}

#[derive(FromArgs, Debug)]
/// Keep only the last item.
pub struct Last {}

impl StageOp for Last {
    const FLAG: &'static str = "--last";
    const SUMMARY: &'static str = "Keep only the last item";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.into_iter().last().into_iter().collect())
    }
}

#[derive(FromArgs, Debug)]
/// Reverse the order of items.
pub struct Reverse {}

impl StageOp for Reverse {
    const FLAG: &'static str = "--reverse";
    const SUMMARY: &'static str = "Reverse the order of items";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.into_iter().rev().collect())
    }
}

#[derive(FromArgs, Debug)]
/// Collapse runs of identical items.
pub struct Unique {}

impl StageOp for Unique {
    const FLAG: &'static str = "--unique";
    const SUMMARY: &'static str = "Collapse consecutive duplicate items";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let mut items = value.into_items();
        items.dedup();
        Ok(items.into())
    }
}

#[derive(FromArgs, Debug)]
/// Replace the items with their count.
pub struct Count {}

impl StageOp for Count {
    const FLAG: &'static str = "--count";
    const SUMMARY: &'static str = "Replace the items with their count";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(WorkingValue::single(value.len().to_string()))
    }
}

/// Resolve `[from, to)` against `len`: negative indices count from the end,
/// `to == 0` means the end, out-of-range indices are clamped.
fn slice_bounds(len: usize, from: i64, to: i64) -> (usize, usize) {
    let resolve = |i: i64| -> usize {
        if i < 0 {
            len.saturating_sub(usize::try_from(i.unsigned_abs()).unwrap_or(usize::MAX))
        } else {
            usize::try_from(i).unwrap_or(usize::MAX).min(len)
        }
    };
    let start = resolve(from);
    let end = if to == 0 { len } else { resolve(to) };
    (start, end.max(start))
}

#[derive(FromArgs, Debug)]
/// Keep a range of items.
pub struct Include {
    #[argh(positional)]
    /// first index to keep, negative counts from the end.
    pub from: i64,

    #[argh(positional)]
    /// index after the last one to keep; 0 means the end.
    pub to: i64,
}

impl StageOp for Include {
    const FLAG: &'static str = "--include";
    const ARITY: Arity = Arity::Exactly(2);
    const PARAMS: &'static str = "FROM TO";
    const SUMMARY: &'static str = "Keep items FROM..TO (zero-based, TO=0 is the end)";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let (start, end) = slice_bounds(value.len(), self.from, self.to);
        let mut items = value.into_items();
        items.truncate(end);
        Ok(items.split_off(start).into())
    }
}

#[derive(FromArgs, Debug)]
/// Drop a range of items.
pub struct Exclude {
    #[argh(positional)]
    /// first index to drop, negative counts from the end.
    pub from: i64,

    #[argh(positional)]
    /// index after the last one to drop; 0 means the end.
    pub to: i64,
}

impl StageOp for Exclude {
    const FLAG: &'static str = "--exclude";
    const ARITY: Arity = Arity::Exactly(2);
    const PARAMS: &'static str = "FROM TO";
    const SUMMARY: &'static str = "Drop items FROM..TO (zero-based, TO=0 is the end)";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let (start, end) = slice_bounds(value.len(), self.from, self.to);
        let mut items = value.into_items();
        items.drain(start..end);
        Ok(items.into())
    }
}
