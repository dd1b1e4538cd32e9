//! value representation
//!
//! The variable store holds the following data types
//! - string (utf-8)
//! - int (signed, currently: i64 - may change)
//! - real (currently: f64 - may change)
//! - string/int/real lists (ordered, finite)
//! - container (tree of the above plus booleans, order-preserving objects)
//!
//! Additionally:
//! - there is no `null` value. A JSON `null` inside a container is dropped at
//!   conversion time and a top-level `null` is rejected by the store loader.
//! - lists and containers are the *iterable* types; iterating a container
//!   visits one level of its natural order and keeps only primitive children
//!   (booleans become the strings `true`/`false`, composites are skipped).
//!
use serde::{ser::SerializeMap, Serializer};

/// A single element a variable can be bound to for one combination
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Real(f64),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::String(value) => f.write_str(value),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Real(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Real(value)
    }
}

/// Tree-structured "any collection" value
///
/// The engine never looks deeper than one level into one of these; see
/// [Rval::iterable_elements].
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Container>),
    Object(indexmap::IndexMap<String, Container>),
}

impl Container {
    /// The scalar form of a primitive child, or `None` for composites
    fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Container::Boolean(value) => {
                Some(Scalar::String(if *value { "true" } else { "false" }.to_string()))
            }
            Container::Integer(value) => Some(Scalar::Int(*value)),
            Container::Decimal(value) => Some(Scalar::Real(*value)),
            Container::String(value) => Some(Scalar::String(value.clone())),
            Container::Array(_) | Container::Object(_) => None,
        }
    }
}

/// What a variable holds in the store
#[derive(Debug, Clone, PartialEq)]
pub enum Rval {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Container(Container),
}

/// Type tag reported by the store next to each value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Int,
    Real,
    StringList,
    IntList,
    RealList,
    Container,
}

impl DataType {
    /// Iterable types fan a promise out into one evaluation per element
    pub fn is_iterable(self) -> bool {
        matches!(
            self,
            DataType::StringList | DataType::IntList | DataType::RealList | DataType::Container
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::String => f.write_str("string"),
            DataType::Int => f.write_str("int"),
            DataType::Real => f.write_str("real"),
            DataType::StringList => f.write_str("slist"),
            DataType::IntList => f.write_str("ilist"),
            DataType::RealList => f.write_str("rlist"),
            DataType::Container => f.write_str("data"),
        }
    }
}

impl Rval {
    pub fn data_type(&self) -> DataType {
        match self {
            Rval::Scalar(Scalar::String(_)) => DataType::String,
            Rval::Scalar(Scalar::Int(_)) => DataType::Int,
            Rval::Scalar(Scalar::Real(_)) => DataType::Real,
            Rval::List(elements) => {
                if !elements.is_empty() && elements.iter().all(|e| matches!(e, Scalar::Int(_))) {
                    DataType::IntList
                } else if !elements.is_empty()
                    && elements
                        .iter()
                        .all(|e| matches!(e, Scalar::Int(_) | Scalar::Real(_)))
                {
                    DataType::RealList
                } else {
                    DataType::StringList
                }
            }
            Rval::Container(_) => DataType::Container,
        }
    }

    /// Materialize an iterable into an owned, ordered element sequence
    ///
    /// Containers contribute one level of primitive children; composite
    /// children are skipped, not flattened. The result is a deep copy: the
    /// caller may keep it while the store mutates underneath.
    ///
    /// # Panic
    /// Panics when called on a scalar. The caller must classify with
    /// [DataType::is_iterable] first; getting here with a scalar means a
    /// collaborator lied about the type.
    pub fn iterable_elements(&self) -> Vec<Scalar> {
        match self {
            Rval::List(elements) => elements.clone(),
            Rval::Container(container) => match container {
                Container::Array(children) => {
                    children.iter().filter_map(Container::as_scalar).collect()
                }
                Container::Object(children) => {
                    children.values().filter_map(Container::as_scalar).collect()
                }
                primitive => primitive.as_scalar().into_iter().collect(),
            },
            Rval::Scalar(_) => {
                panic!("iterable_elements called on a scalar. This should never happen. Please report this.")
            }
        }
    }
}

impl From<Scalar> for Rval {
    fn from(value: Scalar) -> Self {
        Rval::Scalar(value)
    }
}

impl From<serde_json::Value> for Container {
    /// `null` children are dropped; the caller rejects top-level `null`
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(value) => Container::Boolean(value),
            Value::Number(number) => number_to_container(&number),
            Value::String(value) => Container::String(value),
            Value::Array(children) => Container::Array(
                children
                    .into_iter()
                    .filter(|child| !child.is_null())
                    .map(Into::into)
                    .collect(),
            ),
            Value::Object(children) => Container::Object(
                children
                    .into_iter()
                    .filter(|(_, child)| !child.is_null())
                    .map(|(key, child)| (key, child.into()))
                    .collect(),
            ),
            Value::Null => {
                panic!("null value found. This should never happen. Please report this.")
            }
        }
    }
}

fn number_to_container(number: &serde_json::Number) -> Container {
    if let Some(int) = number.as_i64() {
        return Container::Integer(int);
    }

    Container::Decimal(
        number
            .as_f64()
            .expect("a numeric value that is not an integer must be a float"),
    )
}

fn number_to_scalar(number: &serde_json::Number) -> Scalar {
    if let Some(int) = number.as_i64() {
        return Scalar::Int(int);
    }

    Scalar::Real(
        number
            .as_f64()
            .expect("a numeric value that is not an integer must be a float"),
    )
}

impl From<serde_json::Value> for Rval {
    /// Conversion rules for variable definitions
    ///
    /// - primitives become scalars (a bare boolean becomes the string
    ///   `true`/`false`)
    /// - an array of primitives becomes a typed list; numbers stay numeric,
    ///   anything mixed with strings or booleans is stringified
    /// - an array with composite children, and every object, becomes a
    ///   container
    ///
    /// Top-level `null` must be rejected by the caller beforehand.
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(value) => {
                Rval::Scalar(Scalar::String(if value { "true" } else { "false" }.to_string()))
            }
            Value::Number(number) => Rval::Scalar(number_to_scalar(&number)),
            Value::String(value) => Rval::Scalar(Scalar::String(value)),
            Value::Array(children) => {
                let children: Vec<_> = children.into_iter().filter(|c| !c.is_null()).collect();

                if children.iter().any(|c| c.is_array() || c.is_object()) {
                    return Rval::Container(Container::Array(
                        children.into_iter().map(Into::into).collect(),
                    ));
                }

                if children.iter().all(serde_json::Value::is_number) {
                    return Rval::List(
                        children
                            .iter()
                            .map(|c| number_to_scalar(c.as_number().expect("checked above")))
                            .collect(),
                    );
                }

                Rval::List(
                    children
                        .into_iter()
                        .map(|c| match c {
                            Value::String(s) => Scalar::String(s),
                            Value::Bool(b) => {
                                Scalar::String(if b { "true" } else { "false" }.to_string())
                            }
                            Value::Number(n) => Scalar::String(n.to_string()),
                            _ => unreachable!("composite children handled above"),
                        })
                        .collect(),
                )
            }
            Value::Object(_) => Rval::Container(value.into()),
            Value::Null => {
                panic!("null value found. This should never happen. Please report this.")
            }
        }
    }
}

impl serde::ser::Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Scalar::String(value) => serializer.serialize_str(value),
            Scalar::Int(value) => serializer.serialize_i64(*value),
            Scalar::Real(value) => serializer.serialize_f64(*value),
        }
    }
}

impl serde::ser::Serialize for Container {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Container::Boolean(value) => serializer.serialize_bool(*value),
            Container::Integer(value) => serializer.serialize_i64(*value),
            Container::Decimal(value) => serializer.serialize_f64(*value),
            Container::String(value) => serializer.serialize_str(value),
            Container::Array(value) => value.serialize(serializer),
            Container::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_primitives_become_scalars() {
        assert_eq!(
            Rval::from(serde_json::json!("pkg")),
            Rval::Scalar(Scalar::String("pkg".into()))
        );
        assert_eq!(Rval::from(serde_json::json!(3)), Rval::Scalar(Scalar::Int(3)));
        assert_eq!(
            Rval::from(serde_json::json!(2.5)),
            Rval::Scalar(Scalar::Real(2.5))
        );
        assert_eq!(
            Rval::from(serde_json::json!(true)),
            Rval::Scalar(Scalar::String("true".into()))
        );
    }

    #[test]
    fn uniform_arrays_become_typed_lists() {
        assert_eq!(
            Rval::from(serde_json::json!([1, 2, 3])).data_type(),
            DataType::IntList
        );
        assert_eq!(
            Rval::from(serde_json::json!([1, 2.5])).data_type(),
            DataType::RealList
        );
        assert_eq!(
            Rval::from(serde_json::json!(["a", "b"])).data_type(),
            DataType::StringList
        );
    }

    #[test]
    fn mixed_arrays_are_stringified() {
        assert_eq!(
            Rval::from(serde_json::json!(["a", 1, true])),
            Rval::List(vec![
                Scalar::String("a".into()),
                Scalar::String("1".into()),
                Scalar::String("true".into()),
            ])
        );
    }

    #[test]
    fn objects_and_nested_arrays_become_containers() {
        assert_eq!(
            Rval::from(serde_json::json!({"a": 1})).data_type(),
            DataType::Container
        );
        assert_eq!(
            Rval::from(serde_json::json!([[1], [2]])).data_type(),
            DataType::Container
        );
    }

    #[test]
    fn container_iteration_keeps_one_level_of_primitives() {
        // serde_json objects arrive sorted by key: nested, port, ratio, tls
        let container = Rval::from(serde_json::json!({
            "port": 80,
            "tls": true,
            "nested": {"skipped": 1},
            "ratio": 0.5,
        }));

        assert_eq!(
            container.iterable_elements(),
            vec![
                Scalar::Int(80),
                Scalar::Real(0.5),
                Scalar::String("true".into()),
            ]
        );
    }

    #[test]
    fn null_children_are_dropped() {
        assert_eq!(
            Rval::from(serde_json::json!(["a", null, "b"])),
            Rval::List(vec![Scalar::String("a".into()), Scalar::String("b".into())])
        );
    }

    #[test]
    fn list_elements_are_deep_copied() {
        let list = Rval::List(vec![Scalar::Int(1), Scalar::Int(2)]);
        let elements = list.iterable_elements();
        drop(list);
        assert_eq!(elements, vec![Scalar::Int(1), Scalar::Int(2)]);
    }
}
