//! Turns the command line into a [`Pipeline`].
//!
//! Flags are matched against the registry in the order given; each
//! occurrence becomes one stage, so reordering flags reorders the pipeline.

use crate::config::{ErrorPolicy, STOP_ON_ERROR_FLAG};
use crate::error::StageError;
use crate::pipeline::{Pipeline, PipelineStep};
use crate::registry::{Arity, FlagDef};
use crate::stages::flag_registry;
use tracing::debug;

/// Everything one command line asks for.
#[derive(Debug)]
pub struct Invocation {
    pub pipeline: Pipeline,
    pub policy: ErrorPolicy,
}

/// Build the pipeline and error policy from `args` (program name excluded).
pub fn build(args: &[String]) -> Result<Invocation, StageError> {
    if args.is_empty() {
        return Err(StageError::NoCommands);
    }

    let registry = flag_registry();
    let mut policy = ErrorPolicy::default();
    let mut steps = Vec::new();
    let mut rest = args;

    while let Some((arg, tail)) = rest.split_first() {
        rest = tail;
        let (name, inline) = split_inline(arg);

        if name == STOP_ON_ERROR_FLAG {
            let (values, tail) = take_values(STOP_ON_ERROR_FLAG, "true|false", Arity::Exactly(1), inline, rest)?;
            rest = tail;
            policy = values[0].parse().map_err(|reason| StageError::InvalidValue {
                flag: STOP_ON_ERROR_FLAG.to_string(),
                reason,
            })?;
            continue;
        }

        let def = find_flag(&registry, name).ok_or_else(|| StageError::UnknownArgument(arg.clone()))?;
        let (params, tail) = take_values(def.long, def.params, def.arity, inline, rest)?;
        rest = tail;

        let stage = def.build(&params)?;
        let invocation = std::iter::once(def.long)
            .chain(params.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(%invocation, "parsed stage");
        steps.push(PipelineStep { stage, invocation });
    }

    Ok(Invocation {
        pipeline: Pipeline::new(steps),
        policy,
    })
}

fn find_flag<'a>(registry: &'a [FlagDef], name: &str) -> Option<&'a FlagDef> {
    registry.iter().find(|def| def.matches(name))
}

/// `--flag=value` → (`--flag`, Some(`value`)). Short aliases never carry inline values.
fn split_inline(arg: &str) -> (&str, Option<&str>) {
    if arg.starts_with("--") {
        if let Some((name, value)) = arg.split_once('=') {
            return (name, Some(value));
        }
    }
    (arg, None)
}

/// Collect the values a flag consumes, returning them and the unconsumed rest.
fn take_values<'a>(
    flag: &str,
    params: &str,
    arity: Arity,
    inline: Option<&str>,
    rest: &'a [String],
) -> Result<(Vec<String>, &'a [String]), StageError> {
    let mut values: Vec<String> = inline.map(str::to_string).into_iter().collect();

    match arity {
        Arity::None => {
            if values.is_empty() {
                Ok((values, rest))
            } else {
                Err(StageError::InvalidValue {
                    flag: flag.to_string(),
                    reason: "takes no value".to_string(),
                })
            }
        }
        Arity::Exactly(n) => {
            let needed = n.saturating_sub(values.len());
            if rest.len() < needed {
                return Err(StageError::MissingValue {
                    flag: flag.to_string(),
                    expected: params.to_string(),
                });
            }
            let (taken, rest) = rest.split_at(needed);
            values.extend(taken.iter().cloned());
            Ok((values, rest))
        }
        Arity::Until(terminator) => {
            let end = rest
                .iter()
                .position(|a| a == terminator)
                .ok_or_else(|| StageError::MissingValue {
                    flag: flag.to_string(),
                    expected: format!("{} terminated by '{}'", params, terminator),
                })?;
            values.extend(rest[..end].iter().cloned());
            Ok((values, &rest[end + 1..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn invocations(list: &[&str]) -> Vec<String> {
        build(&args(list))
            .unwrap()
            .pipeline
            .steps()
            .iter()
            .map(|s| s.invocation.clone())
            .collect()
    }

    #[test]
    fn test_flags_become_stages_in_order() {
        assert_eq!(
            invocations(&["--in", "a", "-i", "b", "--upper", "--print"]),
            ["--in a", "--in b", "--upper", "--print"]
        );
        assert_eq!(
            invocations(&["--print", "--in", "a"]),
            ["--print", "--in a"]
        );
    }

    #[test]
    fn test_empty_argv_is_no_commands() {
        let err = build(&[]).unwrap_err();
        assert!(matches!(err, StageError::NoCommands));
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_unknown_flag_names_token() {
        let err = build(&args(&["--in", "x", "--bogus"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown argument '--bogus'");
    }

    #[test]
    fn test_missing_value() {
        let err = build(&args(&["--sub", "a"])).unwrap_err();
        assert!(matches!(err, StageError::MissingValue { .. }));
        assert_eq!(err.to_string(), "--sub expects REGEX REPLACEMENT");
    }

    #[test]
    fn test_values_may_look_like_flags() {
        assert_eq!(invocations(&["--in", "--print"]), ["--in --print"]);
        assert_eq!(invocations(&["--include", "-2", "0"]), ["--include -2 0"]);
    }

    #[test]
    fn test_inline_values() {
        assert_eq!(
            invocations(&["--in=a=b", "--sub=a", "b", "--sort=desc"]),
            ["--in a=b", "--sub a b", "--sort desc"]
        );
        let err = build(&args(&["--upper=x"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_until_terminator() {
        assert_eq!(
            invocations(&["--exec", "ls", "-l", ";", "--print"]),
            ["--exec ls -l", "--print"]
        );
        let err = build(&args(&["--exec", "ls", "-l"])).unwrap_err();
        assert!(err.to_string().contains("terminated by ';'"), "{}", err);
    }

    #[test]
    fn test_stoponerror_is_not_a_stage_and_last_wins() {
        let inv = build(&args(&["--stoponerror", "false", "--in", "x", "--stoponerror=TRUE "])).unwrap();
        assert_eq!(inv.pipeline.len(), 1);
        assert!(inv.policy.stop_on_error);

        let inv = build(&args(&["--in", "x", "--stoponerror", "False"])).unwrap();
        assert!(!inv.policy.stop_on_error);

        let err = build(&args(&["--stoponerror", "maybe"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_invalid_typed_value_fails_at_build() {
        let err = build(&args(&["--sort", "sideways"])).unwrap_err();
        assert!(matches!(err, StageError::InvalidValue { .. }));
        let err = build(&args(&["--include", "one", "2"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
}
