use ndarray::{Array1, Array2};
use tokenizers::Tokenizer;

use super::error::ClassifierError;

/// Turns a single text into token ids.
///
/// Implemented for [`tokenizers::Tokenizer`]; tests and callers with their
/// own vocabulary can supply any other implementation.
pub trait TokenEncoder: Send + Sync {
    /// Encodes `text` into an ordered sequence of token ids.
    ///
    /// # Errors
    /// - `TokenizerError` if the text cannot be encoded
    fn encode(&self, text: &str) -> Result<Vec<u32>, ClassifierError>;
}

impl TokenEncoder for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ClassifierError> {
        (**self).encode(text, false)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to encode {:?}: {}", text, e)))
    }
}

/// Anything that can be classified as a batch of texts.
///
/// A lone string is a batch of one.
pub trait IntoBatch {
    fn into_batch(self) -> Vec<String>;
}

impl IntoBatch for &str {
    fn into_batch(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoBatch for String {
    fn into_batch(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoBatch for &String {
    fn into_batch(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<S: AsRef<str>> IntoBatch for Vec<S> {
    fn into_batch(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>> IntoBatch for &Vec<S> {
    fn into_batch(self) -> Vec<String> {
        self.as_slice().into_batch()
    }
}

impl<S: AsRef<str>> IntoBatch for &[S] {
    fn into_batch(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> IntoBatch for [S; N] {
    fn into_batch(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

/// Sparse model input for a batch of texts.
///
/// Every token of every input gets one row in `indices` holding its
/// `(example, position)` coordinate and one entry in `values` holding its
/// id. Rows run in input order, then position order.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBatch {
    /// `[total_tokens, 2]` coordinates
    pub indices: Array2<i32>,
    /// `[total_tokens]` token ids, parallel to `indices`
    pub values: Array1<i32>,
    /// Number of examples in the batch
    pub batch_size: usize,
}

impl SparseBatch {
    /// Tokenizes every input with `encoder` and lays the result out sparsely.
    ///
    /// # Errors
    /// - `ValidationError` if `inputs` is empty
    /// - `TokenizerError` if any input fails to encode; the whole batch is aborted
    pub fn encode<E>(encoder: &E, inputs: &[String]) -> Result<Self, ClassifierError>
    where
        E: TokenEncoder + ?Sized,
    {
        if inputs.is_empty() {
            return Err(ClassifierError::ValidationError("Input batch cannot be empty".into()));
        }

        let encodings = inputs.iter()
            .map(|text| encoder.encode(text))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_encodings(&encodings)
    }

    /// Builds the index and value tables from per-input token ids.
    ///
    /// # Errors
    /// - `TokenizerError` if a token id or coordinate does not fit in `i32`
    pub fn from_encodings(encodings: &[Vec<u32>]) -> Result<Self, ClassifierError> {
        let total_tokens: usize = encodings.iter().map(Vec::len).sum();
        let mut coords = Vec::with_capacity(total_tokens * 2);
        let mut values = Vec::with_capacity(total_tokens);

        for (example, ids) in encodings.iter().enumerate() {
            let example = to_i32(example, "Example index")?;
            for (position, &id) in ids.iter().enumerate() {
                coords.push(example);
                coords.push(to_i32(position, "Token position")?);
                values.push(i32::try_from(id)
                    .map_err(|_| ClassifierError::TokenizerError(format!("Invalid token ID encountered: {}", id)))?);
            }
        }

        let indices = Array2::from_shape_vec((total_tokens, 2), coords)
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to create indices array: {}", e)))?;

        Ok(Self {
            indices,
            values: Array1::from_vec(values),
            batch_size: encodings.len(),
        })
    }

    pub fn total_tokens(&self) -> usize {
        self.values.len()
    }
}

fn to_i32(value: usize, what: &str) -> Result<i32, ClassifierError> {
    i32::try_from(value)
        .map_err(|_| ClassifierError::TokenizerError(format!("{} exceeds system limits: {}", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct CharEncoder;

    impl TokenEncoder for CharEncoder {
        fn encode(&self, text: &str) -> Result<Vec<u32>, ClassifierError> {
            if text.contains('\u{fffd}') {
                return Err(ClassifierError::TokenizerError("unknown character".into()));
            }
            Ok(text.chars().map(|c| c as u32).collect())
        }
    }

    #[test]
    fn test_fixed_encodings_layout() {
        let batch = SparseBatch::from_encodings(&[vec![1, 2], vec![3]]).unwrap();
        assert_eq!(batch.indices, array![[0, 0], [0, 1], [1, 0]]);
        assert_eq!(batch.values, array![1, 2, 3]);
        assert_eq!(batch.batch_size, 2);
    }

    #[test]
    fn test_table_lengths_match_token_count() {
        let encodings = vec![vec![5, 6, 7], vec![], vec![8], vec![9, 10]];
        let batch = SparseBatch::from_encodings(&encodings).unwrap();
        assert_eq!(batch.indices.nrows(), 6);
        assert_eq!(batch.values.len(), 6);
        assert_eq!(batch.total_tokens(), 6);
        assert_eq!(batch.batch_size, 4);
    }

    #[test]
    fn test_coordinates_are_ordered_without_gaps() {
        let encodings = vec![vec![1; 4], vec![2; 1], vec![3; 3]];
        let batch = SparseBatch::from_encodings(&encodings).unwrap();

        let rows: Vec<(i32, i32)> = batch.indices.outer_iter()
            .map(|row| (row[0], row[1]))
            .collect();
        let expected: Vec<(i32, i32)> = encodings.iter().enumerate()
            .flat_map(|(i, ids)| (0..ids.len()).map(move |j| (i as i32, j as i32)))
            .collect();
        assert_eq!(rows, expected);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_encode_single_batch() {
        let batch = SparseBatch::encode(&CharEncoder, &"ab".into_batch()).unwrap();
        assert_eq!(batch.values, array![97, 98]);
        assert_eq!(batch.indices, array![[0, 0], [0, 1]]);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let result = SparseBatch::encode(&CharEncoder, &[]);
        assert!(matches!(result, Err(ClassifierError::ValidationError(_))));
    }

    #[test]
    fn test_tokenizer_failure_aborts_batch() {
        let inputs = vec!["fine".to_string(), "bad \u{fffd}".to_string()];
        let result = SparseBatch::encode(&CharEncoder, &inputs);
        assert!(matches!(result, Err(ClassifierError::TokenizerError(_))));
    }

    #[test]
    fn test_oversized_token_id() {
        let result = SparseBatch::from_encodings(&[vec![u32::MAX]]);
        assert!(matches!(result, Err(ClassifierError::TokenizerError(_))));
    }

    #[test]
    fn test_into_batch_variants() {
        assert_eq!("one".into_batch(), vec!["one"]);
        assert_eq!(String::from("one").into_batch(), vec!["one"]);
        assert_eq!(vec!["a", "b"].into_batch(), vec!["a", "b"]);
        assert_eq!(["a", "b", "c"].into_batch().len(), 3);
        let owned = vec![String::from("x")];
        assert_eq!(owned.as_slice().into_batch(), vec!["x"]);
        assert_eq!((&owned).into_batch(), vec!["x"]);
        assert_eq!(owned.len(), 1);
    }
}
