//! The closed set of pipeline stages.
//!
//! Every stage is a small `argh`-parsed struct implementing [`StageOp`]. The
//! `stage_set!` invocation below is the only place a stage is registered: it
//! generates the [`Stage`] enum, its dispatch and the flag table.

mod exec;
mod fs;
mod input;
mod lines;
mod output;
mod path;
mod text;

pub use exec::{Assignment, ChildStderr, ChildStdout, Env, Exec, ForEach};
pub use fs::{EnsureDir, EnsureDirs, Exists, Glob, PrintValid, Symlink, Touch, Validity};
pub use input::{
    CygwinVersion, In, MingwVersion, Platform, PlatformExec, PlatformId, PlatformOpen, ReadFile,
    Timestamp,
};
pub use lines::{
    Count, Exclude, First, Include, Last, Reverse, Sort, SortFlags, Sum, SumFlags, Unique,
};
pub use output::{Append, Help, Out, Print};
pub use path::{Basename, Dirname, EnvPath, PlatformPath, ShellList};
pub use text::{Filter, FilterOut, Lower, NoEmpty, Sub, Upper};

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::registry::FlagDef;
use crate::value::{ItemCount, WorkingValue};

macro_rules! stage_set {
    ($($variant:ident($op:ty)),+ $(,)?) => {
        /// One parsed stage, ready to run.
        #[derive(Debug)]
        pub enum Stage {
            $($variant($op),)+
        }

        $(
            impl From<$op> for Stage {
                fn from(op: $op) -> Self {
                    Stage::$variant(op)
                }
            }
        )+

        impl Stage {
            /// Long flag that selected this stage.
            pub fn flag(&self) -> &'static str {
                match self {
                    $(Stage::$variant(_) => <$op as StageOp>::FLAG,)+
                }
            }

            pub fn expected_items(&self) -> ItemCount {
                match self {
                    $(Stage::$variant(_) => <$op as StageOp>::ITEMS,)+
                }
            }

            pub fn apply(
                self,
                value: WorkingValue,
                ctx: &mut StageContext<'_>,
            ) -> Result<WorkingValue, StageError> {
                match self {
                    $(Stage::$variant(op) => op.apply(value, ctx),)+
                }
            }
        }

        /// Flag definitions in usage order.
        pub fn flag_registry() -> Vec<FlagDef> {
            vec![$(FlagDef::of::<$op>(),)+]
        }
    };
}

stage_set! {
    Help(Help),
    In(In),
    ReadFile(ReadFile),
    Platform(Platform),
    PlatformId(PlatformId),
    PlatformExec(PlatformExec),
    PlatformOpen(PlatformOpen),
    CygwinVersion(CygwinVersion),
    MingwVersion(MingwVersion),
    Timestamp(Timestamp),
    Exec(Exec),
    ForEach(ForEach),
    Env(Env),
    ChildStdout(ChildStdout),
    ChildStderr(ChildStderr),
    Lower(Lower),
    Upper(Upper),
    Filter(Filter),
    FilterOut(FilterOut),
    Sub(Sub),
    NoEmpty(NoEmpty),
    Sort(Sort),
    Sum(Sum),
    First(First),
    Last(Last),
    Reverse(Reverse),
    Unique(Unique),
    Count(Count),
    Include(Include),
    Exclude(Exclude),
    Dirname(Dirname),
    Basename(Basename),
    EnvPath(EnvPath),
    PlatformPath(PlatformPath),
    ShellList(ShellList),
    Glob(Glob),
    Exists(Exists),
    PrintValid(PrintValid),
    Touch(Touch),
    Symlink(Symlink),
    EnsureDir(EnsureDir),
    EnsureDirs(EnsureDirs),
    Print(Print),
    Out(Out),
    Append(Append),
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_stage;

    #[test]
    fn test_dispatch_reports_flag() {
        let stage = parse_stage::<Lower>("--lower", &[]).unwrap();
        assert_eq!(stage.flag(), "--lower");
        assert_eq!(stage.expected_items(), ItemCount::Any);

        let stage = parse_stage::<Symlink>("--symlink", &["link".to_string()]).unwrap();
        assert_eq!(stage.expected_items(), ItemCount::Exactly(1));
    }

    #[test]
    fn test_registry_covers_every_stage() {
        let registry = flag_registry();
        assert_eq!(registry.len(), 45);
        assert_eq!(registry[0].long, "--help");
        assert_eq!(registry.last().unwrap().long, "--append");
    }
}
