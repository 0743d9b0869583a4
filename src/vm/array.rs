/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use super::value::Value;

/// Multi-dimensional script array. `content` is row-major and always holds
/// exactly `dimension_product()` values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayData {
    pub dimensions: Vec<u32>,
    pub content: Vec<Value>,
}

impl ArrayData {
    /// Array of the given shape filled with nulls. `None` if the element
    /// count does not fit in `usize`.
    pub fn new(dimensions: Vec<u32>) -> Option<Self> {
        let mut array = Self {
            dimensions,
            content: Vec::new(),
        };
        array.content = vec![Value::Null; array.checked_dimension_product()?];
        Some(array)
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of elements, or `None` on overflow. An array without
    /// dimensions has none.
    pub fn checked_dimension_product(&self) -> Option<usize> {
        if self.dimensions.is_empty() {
            return Some(0);
        }
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
    }

    /// Number of elements, saturating at `usize::MAX`.
    pub fn dimension_product(&self) -> usize {
        self.checked_dimension_product().unwrap_or(usize::MAX)
    }

    /// Linear index of an element, or `None` if out of range.
    pub fn index_of(&self, indexes: &[u32]) -> Option<usize> {
        if indexes.len() != self.dimensions.len() {
            return None;
        }
        let mut linear = 0usize;
        for (&ix, &dim) in indexes.iter().zip(self.dimensions.iter()) {
            if ix >= dim {
                return None;
            }
            linear = linear * dim as usize + ix as usize;
        }
        Some(linear)
    }

    pub fn get(&self, indexes: &[u32]) -> Option<&Value> {
        self.index_of(indexes).and_then(|ix| self.content.get(ix))
    }

    pub fn set(&mut self, indexes: &[u32], value: Value) -> bool {
        match self.index_of(indexes) {
            Some(ix) => {
                self.content[ix] = value;
                true
            }
            None => false,
        }
    }

    /// Change dimensions, keeping every element whose index tuple is valid
    /// in both the old and the new shape. Returns false, leaving the array
    /// unchanged, if the new shape is too large.
    pub fn resize(&mut self, dimensions: Vec<u32>) -> bool {
        let mut resized = match ArrayData::new(dimensions) {
            Some(array) => array,
            None => return false,
        };
        if resized.dimensions.len() == self.dimensions.len() {
            let mut indexes = vec![0u32; self.dimensions.len()];
            for value in self.content.drain(..) {
                if let Some(ix) = resized.index_of(&indexes) {
                    resized.content[ix] = value;
                }
                for (ix, &dim) in indexes.iter_mut().zip(self.dimensions.iter()).rev() {
                    *ix += 1;
                    if *ix < dim {
                        break;
                    }
                    *ix = 0;
                }
            }
        }
        *self = resized;
        true
    }
}
