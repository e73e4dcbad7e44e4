use std::iter::FromIterator;
use std::slice::Iter;

use num_traits::Float;

#[derive(Clone, Debug, PartialEq)]
pub struct Array1<T> {
    data: Vec<T>,
}

impl<T> Array1<T> {
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.data.iter()
    }

    pub fn select(&self, indices: &[usize]) -> Array1<T>
    where
        T: Clone,
    {
        indices.iter().map(|&idx| self.data[idx].clone()).collect()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Float> Array1<T> {
    /// Arithmetic mean, `None` for an empty array.
    pub fn mean(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let sum = self.data.iter().fold(T::zero(), |acc, &v| acc + v);
        T::from(self.len()).map(|n| sum / n)
    }
}

impl<T> FromIterator<T> for Array1<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Array1::from_vec(iter.into_iter().collect())
    }
}
