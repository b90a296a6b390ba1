/// Compute accuracy: fraction of correct predictions.
pub fn accuracy(y_true: &[i64], y_pred: &[i64]) -> f64 {
    assert_eq!(y_true.len(), y_pred.len(), "Length mismatch");
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}
