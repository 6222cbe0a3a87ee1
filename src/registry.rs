//! Flag table: the single source of truth for every recognised flag.
//!
//! Entries are generated from the closed stage set in [`crate::stages`], so a
//! flag can never exist without a stage behind it.

use crate::command::{StageOp, parse_stage};
use crate::config::STOP_ON_ERROR_FLAG;
use crate::error::StageError;
use crate::stages::{Stage, flag_registry};

/// How many command-line values a flag consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Boolean flag, e.g. `--lower`.
    None,
    /// Exactly N values, e.g. `--sub REGEX SUB`.
    Exactly(usize),
    /// Every value up to a terminator, e.g. `--exec cmd args ;`.
    Until(&'static str),
}

/// A single flag definition.
#[derive(Debug, Clone)]
pub struct FlagDef {
    pub long: &'static str,
    pub short: Option<&'static str>,
    pub arity: Arity,
    pub params: &'static str,
    pub description: &'static str,
    build: fn(&str, &[String]) -> Result<Stage, StageError>,
}

impl FlagDef {
    pub fn of<T: StageOp>() -> Self {
        Self {
            long: T::FLAG,
            short: T::SHORT,
            arity: T::ARITY,
            params: T::PARAMS,
            description: T::SUMMARY,
            build: parse_stage::<T>,
        }
    }

    /// Check if this definition matches the given argument string.
    pub fn matches(&self, arg: &str) -> bool {
        arg == self.long || self.short == Some(arg)
    }

    /// Turn the collected parameter values into a stage.
    pub fn build(&self, params: &[String]) -> Result<Stage, StageError> {
        (self.build)(self.long, params)
    }

    fn usage_name(&self) -> String {
        let mut name = match self.short {
            Some(short) => format!("{}|{}", self.long, short),
            None => self.long.to_string(),
        };
        if !self.params.is_empty() {
            name.push(' ');
            name.push_str(self.params);
        }
        name
    }
}

/// Usage text listing every flag in registry order.
pub fn help_text(program: &str) -> String {
    let registry = flag_registry();
    let mut rows: Vec<(String, &str)> = registry
        .iter()
        .map(|def| (def.usage_name(), def.description))
        .collect();
    rows.push((
        format!("{} true|false", STOP_ON_ERROR_FLAG),
        "Abort on the first failure (default true)",
    ));

    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut out = format!("Usage: {} [COMMANDS]\nCommands run left to right:\n", program);
    for (name, description) in rows {
        out.push_str(&format!("  {:<width$}  {}\n", name, description, width = width));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_unique() {
        let registry = flag_registry();
        let mut names: Vec<&str> = registry
            .iter()
            .flat_map(|d| std::iter::once(d.long).chain(d.short))
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate flag in registry");
    }

    #[test]
    fn test_params_match_arity() {
        for def in flag_registry() {
            match def.arity {
                Arity::None => assert!(def.params.is_empty(), "{}", def.long),
                Arity::Exactly(n) => {
                    assert_eq!(def.params.split_whitespace().count(), n, "{}", def.long)
                }
                Arity::Until(term) => assert!(def.params.ends_with(term), "{}", def.long),
            }
        }
    }

    #[test]
    fn test_matches_long_and_short() {
        let registry = flag_registry();
        let def = registry.iter().find(|d| d.long == "--in").unwrap();
        assert!(def.matches("--in"));
        assert!(def.matches("-i"));
        assert!(!def.matches("--input"));
    }

    #[test]
    fn test_help_lists_every_flag() {
        let help = help_text("platform_utils");
        for def in flag_registry() {
            assert!(help.contains(def.long), "missing {}", def.long);
        }
        assert!(help.contains(STOP_ON_ERROR_FLAG));
    }
}
