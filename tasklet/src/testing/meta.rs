use crate::outcome::Failure;

use std::any::type_name;
use std::fmt;
use std::time::Duration;

/// A kind of failure a test may expect.
#[derive(Clone, Copy)]
pub struct ErrorKind {
    name: &'static str,
    matches: fn(&Failure) -> bool,
}

fn failure_is<E>(failure: &Failure) -> bool
where
    E: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    failure.is::<E>()
}

impl ErrorKind {
    /// Failures created from an `E`.
    pub fn of<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            name: type_name::<E>(),
            matches: failure_is::<E>,
        }
    }

    /// The type name, for messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if `failure` is of this kind.
    pub fn matches(&self, failure: &Failure) -> bool {
        (self.matches)(failure)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ErrorKind {}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Failures that make a test pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExpectError {
    /// No failure is expected.
    #[default]
    None,

    /// Any failure passes the test.
    Any,

    /// Only failures of one of these kinds pass the test.
    Kinds(Vec<ErrorKind>),
}

impl ExpectError {
    /// Expects exactly one kind of failure.
    pub fn kind<E>() -> Self
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        ExpectError::Kinds(vec![ErrorKind::of::<E>()])
    }

    /// Returns `true` if some failure is expected.
    pub fn is_expected(&self) -> bool {
        match self {
            ExpectError::None => false,
            ExpectError::Any => true,
            ExpectError::Kinds(kinds) => !kinds.is_empty(),
        }
    }

    /// Returns `true` if `failure` is one of the expected failures.
    pub fn matches(&self, failure: &Failure) -> bool {
        match self {
            ExpectError::None => false,
            ExpectError::Any => true,
            ExpectError::Kinds(kinds) => kinds.iter().any(|k| k.matches(failure)),
        }
    }
}

/// Reporting metadata of a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMeta {
    /// Definition order, assigned when the test factory is built.
    pub id: u64,

    /// Simulated-time budget of the test body.
    pub timeout: Option<Duration>,

    pub expect_fail: bool,

    pub expect_error: ExpectError,

    pub skip: bool,

    pub stage: Option<u32>,
}

/// Position of a test relative to stages.
///
/// Staged tests come first, in numeric stage order; unstaged tests form
/// their own group after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageGroup {
    Staged(u32),
    Unstaged,
}

impl From<Option<u32>> for StageGroup {
    fn from(stage: Option<u32>) -> Self {
        match stage {
            Some(stage) => StageGroup::Staged(stage),
            None => StageGroup::Unstaged,
        }
    }
}

/// Deterministic ordering key for tests.
///
/// Compares by module, then stage group, then function name, then
/// definition order. Stages compare as numbers, so stage 2 runs before
/// stage 10.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub module: String,
    pub stage: StageGroup,
    pub name: String,
    pub id: u64,
}

impl SortKey {
    /// Builds the key for test `name` in `module`.
    pub fn new(module: &str, name: &str, meta: &TestMeta) -> Self {
        Self {
            module: module.to_string(),
            stage: meta.stage.into(),
            name: name.to_string(),
            id: meta.id,
        }
    }
}

impl fmt::Display for SortKey {
    /// `module.name` or `module.stage.name`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            StageGroup::Staged(stage) => write!(f, "{}.{}.{}", self.module, stage, self.name),
            StageGroup::Unstaged => write!(f, "{}.{}", self.module, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: u64, stage: Option<u32>) -> TestMeta {
        TestMeta {
            id,
            timeout: None,
            expect_fail: false,
            expect_error: ExpectError::None,
            skip: false,
            stage,
        }
    }

    #[test]
    fn staged_tests_sort_before_unstaged() {
        let a = SortKey::new("m", "a", &meta(0, None));
        let z = SortKey::new("m", "z", &meta(1, Some(3)));
        assert!(z < a);
    }

    #[test]
    fn definition_order_breaks_ties() {
        let first = SortKey::new("m", "same", &meta(4, Some(1)));
        let second = SortKey::new("m", "same", &meta(9, Some(1)));
        assert!(first < second);
    }

    #[test]
    fn module_dominates_stage() {
        let late_stage = SortKey::new("a", "t", &meta(0, Some(99)));
        let early_stage = SortKey::new("b", "t", &meta(1, Some(0)));
        assert!(late_stage < early_stage);
    }

    #[test]
    fn display_matches_dotted_name() {
        assert_eq!(SortKey::new("m", "t", &meta(0, Some(2))).to_string(), "m.2.t");
        assert_eq!(SortKey::new("m", "t", &meta(0, None)).to_string(), "m.t");
    }
}
