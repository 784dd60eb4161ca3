/// Result of one reduction: the new state and an optional action to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect<S, A> {
    pub state: S,
    pub action: Option<A>,
}

impl<S, A> Effect<S, A> {
    /// New state without an action.
    pub fn only(state: S) -> Self {
        Self {
            state,
            action: None,
        }
    }

    /// New state together with an action to perform.
    pub fn with(state: S, action: A) -> Self {
        Self {
            state,
            action: Some(action),
        }
    }

    pub fn into_parts(self) -> (S, Option<A>) {
        (self.state, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_carries_no_action() {
        let effect: Effect<u32, &str> = Effect::only(7);
        assert_eq!(effect.into_parts(), (7, None));
    }

    #[test]
    fn with_carries_action() {
        let effect = Effect::with(7, "fetch");
        assert_eq!(effect.state, 7);
        assert_eq!(effect.action, Some("fetch"));
    }
}
