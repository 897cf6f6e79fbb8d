use std::{
    fmt::{Debug, Display, Formatter, Result},
    hash::Hash,
    panic::Location,
};

/// Source location captured with `#[track_caller]`.
///
/// Component definitions use it as their identity, update requests use it to
/// report where they were queued from.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Loc {
    location: &'static Location<'static>,
}

impl Loc {
    #[track_caller]
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            location: Location::caller(),
        }
    }

    #[inline(always)]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    #[inline(always)]
    pub fn line(&self) -> u32 {
        self.location.line()
    }
}

impl Default for Loc {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.location)
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}:{}", self.file(), self.line())
    }
}

impl Hash for Loc {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location.file().hash(state);
        self.location.line().hash(state);
        self.location.column().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_call_sites_differ() {
        let a = Loc::new();
        let b = Loc::new();
        assert_ne!(a, b);
        assert_eq!(a.file(), b.file());
        assert_eq!(a.line() + 1, b.line());
    }

    #[test]
    fn same_call_site_is_equal() {
        #[track_caller]
        fn here() -> Loc {
            Loc::new()
        }
        let locs: Vec<Loc> = (0..2).map(|_| here()).collect();
        assert_eq!(locs[0], locs[1]);
    }
}
