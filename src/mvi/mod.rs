//! Model-View-Intent primitives the runtime is generic over.
//!
//! - **State**: the single value a knot tracks
//! - **Change**: something happened, reduced into the state
//! - **Action**: something should be performed, emitted by a reduction
//! - **Reducer**: pure function `(State, Change) -> Effect`

mod effect;
mod intent;
mod reducer;
mod state;

pub use effect::Effect;
pub use intent::{Action, Change, Tagged};
pub use reducer::Reducer;
pub use state::State;
