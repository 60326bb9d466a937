//! Cache keys built from an operation identity and its arguments.
//!
//! Every component is written with a type tag and, for variable-length
//! content, a byte-length prefix:
//!
//! | value          | encoding              |
//! |----------------|-----------------------|
//! | `Null`         | `n`                   |
//! | `Bool`         | `b0` / `b1`           |
//! | `Int`/`Float`  | `i{len}:{text}` / `f{len}:{text}` |
//! | `String`       | `s{len}:{text}`       |
//! | `Bytes`        | `x{len}:{hex}`        |
//! | `Array`        | `a{count}:` + items   |
//! | `Map`          | `m{count}:` + `s`-encoded key, value pairs |
//!
//! The encoding is prefix-free, so two different argument lists can never
//! produce the same key, whatever characters their values contain.

use std::fmt::{self, Write as _};

use cutpoint_core::{OperationId, Value};

/// Opaque, collision-free cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a call to `operation` with `arguments`, in call order.
    #[must_use]
    pub fn for_invocation(operation: &OperationId, arguments: &[Value]) -> Self {
        let mut key = String::new();
        write_text(&mut key, 's', &operation.service);
        write_text(&mut key, 's', &operation.method);
        let _ = write!(key, "a{}:", arguments.len());
        for argument in arguments {
            write_value(&mut key, argument);
        }
        Self(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_text(out: &mut String, tag: char, text: &str) {
    let _ = write!(out, "{tag}{}:{text}", text.len());
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push('n'),
        Value::Bool(b) => out.push_str(if *b { "b1" } else { "b0" }),
        Value::Int(i) => write_text(out, 'i', &i.to_string()),
        Value::Float(f) => write_text(out, 'f', &f.to_string()),
        Value::String(s) => write_text(out, 's', s),
        Value::Bytes(_) => write_text(out, 'x', &value.render()),
        Value::Array(items) => {
            let _ = write!(out, "a{}:", items.len());
            for item in items {
                write_value(out, item);
            }
        }
        Value::Map(entries) => {
            let _ = write!(out, "m{}:", entries.len());
            for (k, v) in entries {
                write_text(out, 's', k);
                write_value(out, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn op() -> OperationId {
        OperationId::new("Wallet", "create_guid")
    }

    #[test]
    fn identical_calls_share_a_key() {
        let a = CacheKey::for_invocation(&op(), &[Value::from("Joey"), Value::from(91_i64)]);
        let b = CacheKey::for_invocation(&op(), &[Value::from("Joey"), Value::from(91_i64)]);
        assert_eq!(a, b);
    }

    #[test]
    fn argument_order_matters() {
        let a = CacheKey::for_invocation(&op(), &[Value::from("a"), Value::from("b")]);
        let b = CacheKey::for_invocation(&op(), &[Value::from("b"), Value::from("a")]);
        assert_ne!(a, b);
    }

    #[test]
    fn separator_inside_values_does_not_collide() {
        // Joined with "-" both of these render as "a-b-c".
        let a = CacheKey::for_invocation(&op(), &[Value::from("a-b"), Value::from("c")]);
        let b = CacheKey::for_invocation(&op(), &[Value::from("a"), Value::from("b-c")]);
        assert_ne!(a, b);
    }

    #[test]
    fn null_differs_from_empty_string() {
        let a = CacheKey::for_invocation(&op(), &[Value::Null]);
        let b = CacheKey::for_invocation(&op(), &[Value::from("")]);
        assert_ne!(a, b);
    }

    #[test]
    fn operation_identity_is_part_of_the_key() {
        let args = [Value::from("Joey")];
        let a = CacheKey::for_invocation(&OperationId::new("Wallet", "create_guid"), &args);
        let b = CacheKey::for_invocation(&OperationId::new("Walle", "tcreate_guid"), &args);
        assert_ne!(a, b);
    }

    #[test]
    fn nested_arrays_keep_their_structure() {
        let a = CacheKey::for_invocation(&op(), &[Value::Array(vec![Value::from("a, b")])]);
        let b = CacheKey::for_invocation(
            &op(),
            &[Value::Array(vec![Value::from("a"), Value::from("b")])],
        );
        assert_ne!(a, b);
    }

    fn arb_argument() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            "[a-c:\\-0-9]{0,6}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn key_is_injective_over_argument_lists(
            a in prop::collection::vec(arb_argument(), 0..5),
            b in prop::collection::vec(arb_argument(), 0..5),
        ) {
            let key_a = CacheKey::for_invocation(&op(), &a);
            let key_b = CacheKey::for_invocation(&op(), &b);
            prop_assert_eq!(a == b, key_a == key_b);
        }
    }
}
