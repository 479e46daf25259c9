use crate::{
    analysis::{CaptureKeyId, Context},
    trace,
};

/// Gives callees a context naming at most one closure argument, so contexts never nest.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClosureContextSelector;

impl ClosureContextSelector {
    pub fn new() -> Self {
        Self
    }

    /// `closures` pairs argument positions with the capture key flowing into them; position 0
    /// is the invoked function value. The lowest position carrying a closure wins.
    pub fn callee_context(&self, callee: &str, closures: &[(usize, CaptureKeyId)]) -> Context {
        let Some(&(argument, key)) = closures.iter().min_by_key(|(argument, _)| *argument) else {
            return Context::Everywhere;
        };

        trace::trace!("closure context for {}: {} at argument {}", callee, key, argument);
        Context::Closure { key, argument }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_without_closures_are_not_refined() {
        let selector = ClosureContextSelector::new();
        assert_eq!(selector.callee_context("f", &[]), Context::Everywhere);
    }

    #[test]
    fn only_the_first_closure_argument_is_used() {
        let selector = ClosureContextSelector::new();
        let context = selector.callee_context(
            "apply",
            &[(2, CaptureKeyId::new(7)), (1, CaptureKeyId::new(3))],
        );
        assert_eq!(
            context,
            Context::Closure {
                key: CaptureKeyId::new(3),
                argument: 1
            }
        );
    }

    #[test]
    fn the_same_closure_in_another_position_is_another_context() {
        let selector = ClosureContextSelector::new();
        let invoked = selector.callee_context("f", &[(0, CaptureKeyId::new(1))]);
        let passed = selector.callee_context("f", &[(1, CaptureKeyId::new(1))]);

        assert_ne!(invoked, passed);
        assert_eq!(invoked.function_key(), Some(CaptureKeyId::new(1)));
        assert_eq!(passed.function_key(), None);
        assert_eq!(selector.callee_context("g", &[(0, CaptureKeyId::new(1))]), invoked);
    }
}
