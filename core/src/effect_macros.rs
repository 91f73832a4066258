//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when a reducer needs to hand a small
//! piece of async work (clearing a session) to the runtime.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use soundwave_core::async_effect;
///
/// async_effect! {
///     session.clear();
///     None
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;

    #[derive(Clone, Debug)]
    enum TestAction {
        Persisted,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Persisted)
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

}
