/// Outcome of offering a key to a component.
///
/// Views try their components first and only fall through to their own
/// bindings on `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed without anything for the view to act on
  Handled,
  /// Consumed, and the view should react to `T`
  Event(T),
  /// Not for this component
  NotHandled,
}

impl<T> KeyResult<T> {
  /// Whether the component took the key, with or without an event
  pub fn is_consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_consumed() {
    assert!(KeyResult::<()>::Handled.is_consumed());
    assert!(KeyResult::Event("filter").is_consumed());
    assert!(!KeyResult::<()>::NotHandled.is_consumed());
  }
}
