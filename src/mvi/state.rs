//! Base trait for knot state.

/// Marker trait for state objects.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Comparable (PartialEq, used to suppress duplicate publications)
/// - Shareable across the reduce and observe contexts
pub trait State: Clone + PartialEq + Send + Sync + 'static {}
