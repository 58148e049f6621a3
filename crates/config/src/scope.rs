//! Application identifiers and the set of apps a binding applies to.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Stable numeric identifier for a configured application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

/// The apps a node or edge is valid for.
///
/// `Global` matches every context, including "no configured app focused".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AppScope {
    /// Valid everywhere.
    #[default]
    Global,
    /// Valid only while one of these apps is focused.
    Apps(BTreeSet<AppId>),
}

impl AppScope {
    /// Scope for exactly one app.
    pub fn app(id: AppId) -> Self {
        Self::Apps(BTreeSet::from([id]))
    }

    /// Scope for `Some(id)`, or global for `None`.
    pub fn for_app(id: Option<AppId>) -> Self {
        id.map_or(Self::Global, Self::app)
    }

    /// An empty app set; matches nothing until unioned.
    pub fn none() -> Self {
        Self::Apps(BTreeSet::new())
    }

    /// True for [`AppScope::Global`].
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// True if this scope applies while `app` is focused.
    pub fn contains(&self, app: Option<AppId>) -> bool {
        match (self, app) {
            (Self::Global, _) => true,
            (Self::Apps(set), Some(id)) => set.contains(&id),
            (Self::Apps(_), None) => false,
        }
    }

    /// Widen this scope to also cover `other`. `Global` absorbs.
    pub fn union_with(&mut self, other: &Self) {
        match other {
            Self::Global => *self = Self::Global,
            Self::Apps(b) => {
                if let Self::Apps(a) = self {
                    a.extend(b.iter().copied());
                }
            }
        }
    }

    /// Every app named explicitly by this scope.
    pub fn apps(&self) -> impl Iterator<Item = AppId> + '_ {
        let set = match self {
            Self::Global => None,
            Self::Apps(s) => Some(s),
        };
        set.into_iter().flatten().copied()
    }
}
