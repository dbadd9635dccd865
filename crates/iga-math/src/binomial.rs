/// Pascal's triangle up to a fixed row, used by degree elevation.
#[derive(Debug, Clone)]
pub struct BinomialTable {
    rows: Vec<Vec<f64>>,
}

impl BinomialTable {
    pub fn new(max_n: usize) -> Self {
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);
        for n in 0..=max_n {
            let mut row = vec![1.0; n + 1];
            for k in 1..n {
                row[k] = rows[n - 1][k - 1] + rows[n - 1][k];
            }
            rows.push(row);
        }
        Self { rows }
    }

    /// `n` choose `k`; zero when `k > n`.
    pub fn get(&self, n: usize, k: usize) -> f64 {
        self.rows
            .get(n)
            .and_then(|row| row.get(k))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn max_n(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}
