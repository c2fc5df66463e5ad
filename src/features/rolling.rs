//! Rolling-window statistics over game logs.

/// Mean and sample variance of a window of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    /// Sample variance (n - 1 denominator). With a single observation the
    /// spread is unknown and the mean is used, as for a Poisson count.
    pub variance: f64,
    pub count: usize,
}

/// Summarise a slice of values. Returns `None` for an empty slice.
pub fn window_stats(values: &[f64]) -> Option<WindowStats> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        mean.max(0.0)
    };
    Some(WindowStats {
        mean,
        variance,
        count: n,
    })
}

/// Mean of at most the first `n` values (most recent first).
pub fn head_mean(values: &[f64], n: usize) -> Option<f64> {
    let take = values.len().min(n);
    if take == 0 {
        return None;
    }
    Some(values[..take].iter().sum::<f64>() / take as f64)
}
