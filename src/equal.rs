//! Coerced-form value model and the structural equality used by every
//! parameter cell.
//!
//! Query parameters are untyped text on the wire; projections give them
//! types. To decide whether a projected value changed, both sides are taken
//! back to their coerced form — [`ParamValue`] — and compared structurally:
//! lists pairwise, everything else by textual form. This is also the form
//! the write-back coordinator hands to the navigation sink, where a list
//! serializes to a repeated parameter.

use std::fmt::Display;

/// Coerced form of a projected query-parameter value.
#[derive(Clone, Debug)]
pub enum ParamValue {
    /// Explicit absence. Writing this form removes the key from the URL.
    ///
    /// Its textual form is `"null"`, so `Absent` compares equal to the
    /// literal text `"null"` — a sharp edge inherited from stringified
    /// comparison, kept and documented rather than papered over.
    Absent,
    /// A scalar, held by its textual form.
    Text(String),
    /// An ordered sequence of values.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Coerce any displayable scalar into its `Text` form.
    pub fn text(value: impl Display) -> Self {
        ParamValue::Text(value.to_string())
    }

    /// Build a `List` from anything iterable.
    pub fn list(values: impl IntoIterator<Item = ParamValue>) -> Self {
        ParamValue::List(values.into_iter().collect())
    }

    /// The URL representation of this value: the ordered raw strings for the
    /// key, or `None` when the key should be removed.
    ///
    /// A list flattens to one string per leaf, which the sink emits as a
    /// repeated parameter.
    pub fn url_values(&self) -> Option<Vec<String>> {
        match self {
            ParamValue::Absent => None,
            ParamValue::Text(s) => Some(vec![s.clone()]),
            ParamValue::List(values) => {
                let mut flat = Vec::with_capacity(values.len());
                flatten_into(values, &mut flat);
                Some(flat)
            }
        }
    }
}

fn flatten_into(values: &[ParamValue], out: &mut Vec<String>) {
    for value in values {
        match value {
            ParamValue::List(inner) => flatten_into(inner, out),
            leaf => out.push(leaf_text(leaf).to_owned()),
        }
    }
}

/// Textual form of a non-list value.
fn leaf_text(value: &ParamValue) -> &str {
    match value {
        ParamValue::Absent => "null",
        ParamValue::Text(s) => s,
        // Unreachable by construction (callers match lists first); kept total
        // so the oracle can never panic.
        ParamValue::List(_) => "",
    }
}

/// Structural equality over coerced forms.
///
/// - two lists: equal iff same length and elements pairwise equal,
///   recursively (two empty lists are equal);
/// - a list and a non-list: unequal, whatever the contents;
/// - otherwise: equal iff the textual forms are identical.
///
/// Pure and total; never panics.
pub fn coerced_equal(a: &ParamValue, b: &ParamValue) -> bool {
    match (a, b) {
        (ParamValue::List(x), ParamValue::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(xv, yv)| coerced_equal(xv, yv))
        }
        (ParamValue::List(_), _) | (_, ParamValue::List(_)) => false,
        (x, y) => leaf_text(x) == leaf_text(y),
    }
}

impl PartialEq for ParamValue {
    /// `==` on `ParamValue` *is* the coerced equality.
    fn eq(&self, other: &Self) -> bool {
        coerced_equal(self, other)
    }
}

/// Conversion of a typed projected value into its coerced form.
///
/// Implemented for the primitive projection targets; a custom target needs
/// one line:
///
/// ```ignore
/// impl ToParamValue for Sort {
///     fn to_param_value(&self) -> ParamValue {
///         ParamValue::text(self)   // via Display
///     }
/// }
/// ```
pub trait ToParamValue {
    /// The coerced form of `self`.
    fn to_param_value(&self) -> ParamValue;
}

/// Comparator closure for cells of projected values: equality of the coerced
/// forms, so a freshly built list with the same contents is not a change.
pub(crate) fn param_comparator<T: ToParamValue>() -> impl Fn(&T, &T) -> bool {
    |a, b| coerced_equal(&a.to_param_value(), &b.to_param_value())
}

impl ToParamValue for ParamValue {
    fn to_param_value(&self) -> ParamValue {
        self.clone()
    }
}

impl ToParamValue for String {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::Text(self.clone())
    }
}

impl ToParamValue for str {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::Text(self.to_owned())
    }
}

impl ToParamValue for bool {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::text(self)
    }
}

impl ToParamValue for char {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::text(self)
    }
}

macro_rules! impl_to_param_value_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToParamValue for $ty {
                fn to_param_value(&self) -> ParamValue {
                    ParamValue::text(self)
                }
            }
        )*
    };
}

// Floats render via Display: `3.0` becomes "3" and `f64::NAN` becomes "NaN",
// so NaN compares equal to itself under the textual discipline.
impl_to_param_value_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl<T: ToParamValue> ToParamValue for Option<T> {
    fn to_param_value(&self) -> ParamValue {
        match self {
            Some(value) => value.to_param_value(),
            None => ParamValue::Absent,
        }
    }
}

impl<T: ToParamValue> ToParamValue for Vec<T> {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::List(self.iter().map(ToParamValue::to_param_value).collect())
    }
}

impl<T: ToParamValue> ToParamValue for [T] {
    fn to_param_value(&self) -> ParamValue {
        ParamValue::List(self.iter().map(ToParamValue::to_param_value).collect())
    }
}

impl<T: ToParamValue + ?Sized> ToParamValue for &T {
    fn to_param_value(&self) -> ParamValue {
        (**self).to_param_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> ParamValue {
        ParamValue::List(values.iter().map(|v| ParamValue::text(v)).collect())
    }

    #[test]
    fn leaves_compare_by_textual_form() {
        assert!(coerced_equal(&3i64.to_param_value(), &"3".to_param_value()));
        assert!(coerced_equal(&3.0f64.to_param_value(), &"3".to_param_value()));
        assert!(coerced_equal(&true.to_param_value(), &"true".to_param_value()));
        assert!(!coerced_equal(&"3".to_param_value(), &"4".to_param_value()));
    }

    #[test]
    fn nan_equals_itself_textually() {
        let nan = f64::NAN.to_param_value();
        assert!(coerced_equal(&nan, &nan.clone()));
        assert!(coerced_equal(&nan, &"NaN".to_param_value()));
    }

    #[test]
    fn absent_is_the_null_leaf() {
        assert!(coerced_equal(&ParamValue::Absent, &"null".to_param_value()));
        assert!(!coerced_equal(&ParamValue::Absent, &"".to_param_value()));
        assert!(coerced_equal(
            &None::<String>.to_param_value(),
            &ParamValue::Absent
        ));
    }

    #[test]
    fn lists_compare_pairwise() {
        assert!(coerced_equal(&texts(&[]), &texts(&[])));
        assert!(coerced_equal(&texts(&["a", "b"]), &texts(&["a", "b"])));
        assert!(!coerced_equal(&texts(&["a", "b"]), &texts(&["b", "a"])));
        assert!(!coerced_equal(&texts(&["a"]), &texts(&["a", "a"])));
    }

    #[test]
    fn shape_mismatch_short_circuits() {
        assert!(!coerced_equal(&texts(&[]), &"".to_param_value()));
        assert!(!coerced_equal(&texts(&["a"]), &"a".to_param_value()));
        assert!(!coerced_equal(&texts(&[]), &ParamValue::Absent));
    }

    #[test]
    fn nested_lists_recurse() {
        let a = ParamValue::list([texts(&["x"]), texts(&["y", "z"])]);
        let b = ParamValue::list([texts(&["x"]), texts(&["y", "z"])]);
        let c = ParamValue::list([texts(&["x"]), texts(&["y"])]);
        assert!(coerced_equal(&a, &b));
        assert!(!coerced_equal(&a, &c));
    }

    #[test]
    fn url_values_flatten_and_remove() {
        assert_eq!(ParamValue::Absent.url_values(), None);
        assert_eq!(
            ParamValue::text("x").url_values(),
            Some(vec!["x".to_string()])
        );
        assert_eq!(
            texts(&["a", "b"]).url_values(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            vec![1u32, 2, 3].to_param_value().url_values(),
            Some(vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
        assert_eq!(texts(&[]).url_values(), Some(Vec::new()));
    }

    #[test]
    fn vec_round_trips_through_coerced_form() {
        let a = vec!["a".to_string(), "b".to_string()];
        let b = vec!["a".to_string(), "b".to_string()];
        // Distinct allocations, same coerced form.
        assert!(coerced_equal(&a.to_param_value(), &b.to_param_value()));
    }
}
