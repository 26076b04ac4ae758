//! The attribute-addressable key/value bag used as the top-level evaluation scope.

use ahash::AHashMap;

use crate::value::Value;

/// An ordered-by-insertion-intent name -> value mapping. Globals are usually small and built
/// once per call, then looked up from repeatedly during a single pack/unpack pass; `ahash`'s
/// non-cryptographic hasher is a better fit for that kind of small, hot table than `std`'s
/// DoS-resistant default or hand-rolling an insertion-order vector.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: AHashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut ctx = Context::new();
        ctx.set("version", 3i64);
        assert_eq!(ctx.get("version"), Some(&Value::Int(3)));
        assert_eq!(ctx.get("missing"), None);
    }
}
