//! src/layout.rs
//!
//! Argument layouts: how the running item and a stage's bound extra
//! arguments are arranged into the call of the user function.
//!
//! | layout        | call made                         |
//! |---------------|-----------------------------------|
//! | `ItemFirst`   | `f(item, args..)`                 |
//! | `ItemLast`    | `f(args.., item)`                 |
//! | `Splat`       | `f(item.0, item.1, .., args..)`   |
//! | `SplatLast`   | `f(args.., item.0, item.1, ..)`   |
//! | `Keywords`    | `f(args.., kwargs)`               |
//!
//! A layout is chosen with `Loop::next_call_with` and applies to the next
//! registered stage only.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::call::Concat;
use crate::error::LoopError;

/// Keyword arguments, keyed by name.
pub type Kwargs = serde_json::Map<String, Value>;

/// Arranges `(item, args)` into the argument tuple of a stage function.
pub trait Layout<T, A>: Clone + Send + Sync + 'static {
    type Args;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args>;
}

/// `f(item, args..)`. The default layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFirst;

/// `f(args.., item)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemLast;

/// `f(item.0, item.1, .., args..)`: the item is a tuple spread over the
/// leading parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Splat;

/// `f(args.., item.0, item.1, ..)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplatLast;

impl<T, A> Layout<T, A> for ItemFirst
where
    (T,): Concat<A>,
{
    type Args = <(T,) as Concat<A>>::Output;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args> {
        Ok((item,).concat(args))
    }
}

impl<T, A> Layout<T, A> for ItemLast
where
    A: Concat<(T,)>,
{
    type Args = <A as Concat<(T,)>>::Output;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args> {
        Ok(args.concat((item,)))
    }
}

impl<T, A> Layout<T, A> for Splat
where
    T: Concat<A>,
{
    type Args = <T as Concat<A>>::Output;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args> {
        Ok(item.concat(args))
    }
}

impl<T, A> Layout<T, A> for SplatLast
where
    A: Concat<T>,
{
    type Args = <A as Concat<T>>::Output;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args> {
        Ok(args.concat(item))
    }
}

/// Keyword unpacking: the item's fields become keyword arguments, merged
/// with the keywords bound here, and passed as one trailing [`Kwargs`]
/// parameter after the positional args.
///
/// The item must serialize to a key/value record. A key present both in
/// the item and in the bound keywords is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords {
    bound: Kwargs,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds one keyword argument passed on every call.
    pub fn bind(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bound.insert(key.into(), value.into());
        self
    }

    fn merge<T: Serialize>(&self, item: T) -> Result<Kwargs> {
        let mut kwargs = match serde_json::to_value(item)? {
            Value::Object(map) => map,
            other => return Err(LoopError::NotAMapping(kind_of(&other).to_string()).into()),
        };

        for (key, value) in &self.bound {
            if kwargs.contains_key(key) {
                return Err(LoopError::DuplicateKeyword(key.clone()).into());
            }
            kwargs.insert(key.clone(), value.clone());
        }
        Ok(kwargs)
    }
}

impl<T, A> Layout<T, A> for Keywords
where
    T: Serialize,
    A: Concat<(Kwargs,)>,
{
    type Args = <A as Concat<(Kwargs,)>>::Output;

    fn arrange(&self, item: T, args: A) -> Result<Self::Args> {
        let kwargs = self.merge(item)?;
        Ok(args.concat((kwargs,)))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::loop_error;
    use serde_json::json;

    #[test]
    fn test_positional_layouts() -> Result<()> {
        assert_eq!(ItemFirst.arrange(1, ("a", 'b'))?, (1, "a", 'b'));
        assert_eq!(ItemLast.arrange(1, ("a", 'b'))?, ("a", 'b', 1));
        assert_eq!(Splat.arrange((1, 2), ("a",))?, (1, 2, "a"));
        assert_eq!(SplatLast.arrange((1, 2), ("a",))?, ("a", 1, 2));
        assert_eq!(ItemFirst.arrange(5, ())?, (5,));
        Ok(())
    }

    #[test]
    fn test_keywords_merge_item_and_bound() -> Result<()> {
        let layout = Keywords::new().bind("scale", 10);
        let (prefix, kwargs) = layout.arrange(json!({"x": 1, "y": 2}), ("p",))?;

        assert_eq!(prefix, "p");
        assert_eq!(kwargs.get("x"), Some(&json!(1)));
        assert_eq!(kwargs.get("y"), Some(&json!(2)));
        assert_eq!(kwargs.get("scale"), Some(&json!(10)));
        Ok(())
    }

    #[test]
    fn test_keywords_reject_duplicate_key() {
        let layout = Keywords::new().bind("x", 10);
        let err = layout.arrange(json!({"x": 1}), ()).unwrap_err();
        assert_eq!(
            loop_error(&err),
            Some(&LoopError::DuplicateKeyword("x".to_string()))
        );
    }

    #[test]
    fn test_keywords_reject_non_mapping() {
        let err = Keywords::new().arrange(3, ()).unwrap_err();
        assert!(matches!(loop_error(&err), Some(LoopError::NotAMapping(_))));
        assert!(err.to_string().contains("a number"));
    }
}
