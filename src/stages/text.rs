//! Item-wise string transforms.

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::registry::Arity;
use crate::value::WorkingValue;
use argh::FromArgs;
use regex::Regex;

fn single(mut chars: impl Iterator<Item = char>) -> Option<char> {
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

/// The (lower, upper) pair `c` belongs to, when case mapping is one-to-one.
///
/// Characters whose mapping expands (`ß` -> `SS`) or leaves the pair
/// (`ſ` -> `S` -> `s`) have no pair and are never converted.
fn case_pair(c: char) -> Option<(char, char)> {
    let lower = single(c.to_lowercase())?;
    let upper = single(c.to_uppercase())?;
    let closed = single(lower.to_uppercase()) == Some(upper)
        && single(upper.to_lowercase()) == Some(lower);
    closed.then_some((lower, upper))
}

pub(crate) fn fold_lower(item: &str) -> String {
    item.chars()
        .map(|c| case_pair(c).map_or(c, |(lower, _)| lower))
        .collect()
}

pub(crate) fn fold_upper(item: &str) -> String {
    item.chars()
        .map(|c| case_pair(c).map_or(c, |(_, upper)| upper))
        .collect()
}

/// Compile a user-supplied regular expression.
pub(crate) fn compile(pattern: &str) -> Result<Regex, StageError> {
    Regex::new(pattern).map_err(|e| StageError::pattern(pattern, e))
}

#[derive(FromArgs, Debug)]
/// Convert every item to lower case.
pub struct Lower {}

impl StageOp for Lower {
    const FLAG: &'static str = "--lower";
    const SHORT: Option<&'static str> = Some("-l");
    const SUMMARY: &'static str = "Convert every item to lower case";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.map_items(|item| fold_lower(&item)))
    }
}

#[derive(FromArgs, Debug)]
/// Convert every item to upper case.
pub struct Upper {}

impl StageOp for Upper {
    const FLAG: &'static str = "--upper";
    const SHORT: Option<&'static str> = Some("-u");
    const SUMMARY: &'static str = "Convert every item to upper case";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.map_items(|item| fold_upper(&item)))
    }
}

#[derive(FromArgs, Debug)]
/// Keep items matching a regular expression.
pub struct Filter {
    #[argh(positional)]
    /// the pattern to search for in each item.
    pub pattern: String,
}

impl StageOp for Filter {
    const FLAG: &'static str = "--filter";
    const SHORT: Option<&'static str> = Some("-f");
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "REGEX";
    const SUMMARY: &'static str = "Keep items containing a match of REGEX";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let re = compile(&self.pattern)?;
        Ok(value.into_iter().filter(|item| re.is_match(item)).collect())
    }
}

#[derive(FromArgs, Debug)]
/// Drop items matching a regular expression.
pub struct FilterOut {
    #[argh(positional)]
    /// the pattern to search for in each item.
    pub pattern: String,
}

impl StageOp for FilterOut {
    const FLAG: &'static str = "--filter-out";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "REGEX";
    const SUMMARY: &'static str = "Drop items containing a match of REGEX";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let re = compile(&self.pattern)?;
        Ok(value.into_iter().filter(|item| !re.is_match(item)).collect())
    }
}

#[derive(FromArgs, Debug)]
/// Replace every match of a regular expression.
pub struct Sub {
    #[argh(positional)]
    /// the pattern to replace.
    pub pattern: String,

    #[argh(positional)]
    /// replacement text; $1, ${name} and \1 refer to capture groups.
    pub replacement: String,
}

impl StageOp for Sub {
    const FLAG: &'static str = "--sub";
    const SHORT: Option<&'static str> = Some("-s");
    const ARITY: Arity = Arity::Exactly(2);
    const PARAMS: &'static str = "REGEX REPLACEMENT";
    const SUMMARY: &'static str = "Replace all matches of REGEX in every item";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let re = compile(&self.pattern)?;
        let replacement = expand_backrefs(&self.replacement);
        Ok(value.map_items(|item| re.replace_all(&item, replacement.as_str()).into_owned()))
    }
}

/// Rewrite `\N` group references into the `${N}` form `regex` understands.
fn expand_backrefs(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(|d| d.is_ascii_digit()) {
            out.push_str("${");
            while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                out.push(d);
            }
            out.push('}');
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(FromArgs, Debug)]
/// Drop blank items.
pub struct NoEmpty {}

impl StageOp for NoEmpty {
    const FLAG: &'static str = "--noempty";
    const SUMMARY: &'static str = "Drop empty and whitespace-only items";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .collect())
    }
}
