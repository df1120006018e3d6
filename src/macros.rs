/// Builds a [`Value`](crate::Value) from a JSON-like literal.
///
/// Object keys must be literals; any other leaf is converted with
/// `Value::from`.
///
/// # Examples
///
/// ```rust
/// use polycodec::{value, Value};
///
/// let v = value!({"id": 1, "tags": ["x"], "gone": null});
/// let map = v.as_map().unwrap();
/// assert_eq!(map.get("id"), Some(&Value::Int(1)));
/// assert_eq!(map.get("gone"), Some(&Value::Nil));
/// ```
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Nil
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::Array(::std::vec::Vec::new())
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::Array(::std::vec![$($crate::value!($elem)),*])
    };

    ({}) => {
        $crate::Value::Map($crate::ValueMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut map = $crate::ValueMap::new();
        $(
            map.insert($key, $crate::value!($value));
        )*
        $crate::Value::Map(map)
    }};

    ($other:expr) => {
        $crate::Value::from($other)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Value, ValueMap};

    #[test]
    fn test_value_macro_primitives() {
        assert_eq!(value!(null), Value::Nil);
        assert_eq!(value!(true), Value::Bool(true));
        assert_eq!(value!(false), Value::Bool(false));
        assert_eq!(value!(42), Value::Int(42));
        assert_eq!(value!(3.5), Value::Float(3.5));
        assert_eq!(value!("hello"), Value::String("hello".to_string()));
        let n = 7_u8;
        assert_eq!(value!(n), Value::Uint(7));
    }

    #[test]
    fn test_value_macro_arrays() {
        assert_eq!(value!([]), Value::Array(vec![]));
        let arr = value!([1, "two", [null]]);
        assert_eq!(
            arr,
            Value::Array(vec![
                Value::Int(1),
                Value::from("two"),
                Value::Array(vec![Value::Nil]),
            ])
        );
    }

    #[test]
    fn test_value_macro_maps_keep_order() {
        assert_eq!(value!({}), Value::Map(ValueMap::new()));
        let obj = value!({
            "name": "widget",
            "count": 7,
        });
        let map = obj.as_map().unwrap();
        assert_eq!(map.len(), 2);
        let keys: Vec<_> = map.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, ["name", "count"]);
        assert_eq!(map.get("count"), Some(&Value::Int(7)));
    }
}
