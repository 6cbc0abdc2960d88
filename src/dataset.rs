//! In-memory materialized datasets.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::GranaryError;
use crate::table::{Example, Schema, Value};

/// A fully materialized table: a schema plus its rows.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub schema: Schema,
    rows: Vec<Example>,
}

impl Dataset {
    pub fn new(schema: Schema, rows: Vec<Example>) -> Self {
        Self { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Example> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.rows.iter()
    }

    /// All values of one column, in row order. Rows missing the column
    /// contribute `Null`.
    pub fn column(&self, name: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&Value::Null))
            .collect()
    }

    /// Shuffles rows in place. A seed makes the order deterministic.
    pub fn shuffle(&mut self, seed: Option<u64>) {
        if let Some(seed) = seed {
            let mut rng = StdRng::seed_from_u64(seed);
            self.rows.shuffle(&mut rng);
        } else {
            let mut rng = rand::rng();
            self.rows.shuffle(&mut rng);
        }
    }

    /// Picks rows by index into a new dataset.
    pub fn select(&self, indices: &[usize]) -> Result<Dataset, GranaryError> {
        let mut rows = Vec::with_capacity(indices.len());
        for &index in indices {
            let row = self
                .rows
                .get(index)
                .ok_or(GranaryError::IndexOutOfRange {
                    index,
                    len: self.rows.len(),
                })?;
            rows.push(row.clone());
        }
        Ok(Dataset::new(self.schema.clone(), rows))
    }

    /// Shuffles, then splits off a test fraction.
    ///
    /// Both sides are non-empty for any valid fraction on a dataset of at
    /// least two rows: the test side gets `ceil(n * fraction)`, capped at
    /// `n - 1`.
    pub fn train_test_split(
        &self,
        test_fraction: f64,
        seed: Option<u64>,
    ) -> Result<(Dataset, Dataset), GranaryError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(GranaryError::InvalidSplitParams {
                message: "test fraction must be in the interval (0.0, 1.0)".to_string(),
            });
        }
        if self.rows.len() < 2 {
            return Err(GranaryError::InvalidSplitParams {
                message: "need at least two rows to split".to_string(),
            });
        }

        let mut shuffled = self.clone();
        shuffled.shuffle(seed);

        let n = shuffled.rows.len();
        let test_size = ((n as f64 * test_fraction).ceil() as usize)
            .max(1)
            .min(n - 1);

        let test_rows = shuffled.rows.split_off(n - test_size);
        let test = Dataset::new(self.schema.clone(), test_rows);
        Ok((shuffled, test))
    }
}
