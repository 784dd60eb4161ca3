//! Changes and actions, dispatched by their variant tag.

use std::fmt::Debug;
use std::hash::Hash;

/// A value belonging to a closed set of variants.
///
/// `kind` names the variant and is the key reducers and transformers are
/// registered under. Implementations are usually an exhaustive `match`:
///
/// ```
/// use knotline::Tagged;
///
/// #[derive(Debug, Clone)]
/// enum Change {
///     Load,
///     Loaded(String),
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum ChangeKind {
///     Load,
///     Loaded,
/// }
///
/// impl Tagged for Change {
///     type Kind = ChangeKind;
///
///     fn kind(&self) -> ChangeKind {
///         match self {
///             Change::Load => ChangeKind::Load,
///             Change::Loaded(_) => ChangeKind::Loaded,
///         }
///     }
/// }
/// ```
pub trait Tagged {
    /// Variant tag.
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Marker trait for changes.
///
/// Changes represent:
/// - External events (sensor readings, timers, user input)
/// - Results of performed actions (API responses)
/// - Commands submitted directly to the knot
pub trait Change: Tagged + Clone + Debug + Send + Sync + 'static {}

/// Marker trait for actions.
///
/// Actions are declarative requests for asynchronous work. They are emitted
/// by reducers and performed by action transformers, never by the reducer
/// itself.
pub trait Action: Tagged + Clone + Debug + Send + Sync + 'static {}
