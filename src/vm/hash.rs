/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::{name_map::NameMap, value::Value};

/// Script hash: ordered string keys with a parallel value segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HashData {
    pub keys: NameMap,
    pub values: Vec<Value>,
}

impl HashData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys
            .get_index(key)
            .and_then(|ix| self.values.get(ix as usize))
    }

    pub fn set(&mut self, key: &str, value: Value) {
        let ix = self.keys.add(key) as usize;
        if ix >= self.values.len() {
            self.values.resize(ix + 1, Value::Null);
        }
        self.values[ix] = value;
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut hash = HashData::new();
        hash.set("b", Value::Int(2));
        hash.set("a", Value::Int(1));
        hash.set("b", Value::Int(3));
        assert_eq!(hash.len(), 2);
        assert_eq!(hash.get("b"), Some(&Value::Int(3)));
        assert_eq!(hash.get("c"), None);
        assert_eq!(hash.keys.iter().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
