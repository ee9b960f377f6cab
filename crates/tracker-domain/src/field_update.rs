/// Represents a field update operation for partial updates
///
/// This type provides a clear, three-state pattern for updating optional fields:
/// - `NoChange`: Field keeps its existing value
/// - `Set(value)`: Field is updated to the provided value
/// - `Clear`: Field is cleared (set to None)
///
/// # Example
///
/// ```
/// use tracker_domain::FieldUpdate;
///
/// let goal_update = FieldUpdate::Set("Stabilise ingestion".to_string());
/// let assignee_update: FieldUpdate<String> = FieldUpdate::Clear;
/// let points_update: FieldUpdate<u8> = FieldUpdate::NoChange;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Do not modify this field (keep existing value)
    NoChange,
    /// Set the field to the provided value
    Set(T),
    /// Clear the field (set to None)
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::NoChange
    }
}

impl<T> FieldUpdate<T> {
    /// Apply this update to an optional field
    ///
    /// # Example
    ///
    /// ```
    /// use tracker_domain::FieldUpdate;
    ///
    /// let mut assignee = Some("alice".to_string());
    /// FieldUpdate::Set("bob".to_string()).apply_to(&mut assignee);
    /// assert_eq!(assignee, Some("bob".to_string()));
    ///
    /// FieldUpdate::Clear.apply_to(&mut assignee);
    /// assert_eq!(assignee, None);
    /// ```
    pub fn apply_to(self, field: &mut Option<T>) {
        match self {
            FieldUpdate::NoChange => {}
            FieldUpdate::Set(value) => *field = Some(value),
            FieldUpdate::Clear => *field = None,
        }
    }

    /// Check if this represents a change (not NoChange)
    pub fn is_change(&self) -> bool {
        !matches!(self, FieldUpdate::NoChange)
    }
}

impl<T> FieldUpdate<T> {
    /// Build from transport flags: a value sets, `clear` clears, neither
    /// leaves the field alone.
    pub fn from_flags(value: Option<T>, clear: bool) -> Self {
        match (value, clear) {
            (_, true) => FieldUpdate::Clear,
            (Some(value), false) => FieldUpdate::Set(value),
            (None, false) => FieldUpdate::NoChange,
        }
    }

    /// The value being set, if any.
    pub fn set_value(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }
}
