use canopy_ml_core::{Float, Tensor};

/// Mean Squared Error.
pub fn mse<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>) -> f64 {
    assert_eq!(y_true.numel(), y_pred.numel());
    let n = y_true.numel();
    let sum: f64 = y_true
        .data()
        .iter()
        .zip(y_pred.data().iter())
        .map(|(&t, &p)| {
            let d = (t - p).to_f64();
            d * d
        })
        .sum();
    sum / n as f64
}

/// Root Mean Squared Error.
pub fn rmse<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>) -> f64 {
    mse(y_true, y_pred).sqrt()
}

/// Mean Absolute Error.
pub fn mae<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>) -> f64 {
    assert_eq!(y_true.numel(), y_pred.numel());
    let n = y_true.numel();
    let sum: f64 = y_true
        .data()
        .iter()
        .zip(y_pred.data().iter())
        .map(|(&t, &p)| (t - p).to_f64().abs())
        .sum();
    sum / n as f64
}

/// R² (coefficient of determination).
///
/// Multi-output targets score each column separately and average the results
/// uniformly. A constant target column scores 0.
pub fn r2_score<T: Float>(y_true: &Tensor<T>, y_pred: &Tensor<T>) -> f64 {
    assert_eq!(y_true.shape_vec(), y_pred.shape_vec(), "Shape mismatch");
    let n_outputs = if y_true.ndim() == 2 {
        y_true.shape().dims()[1]
    } else {
        1
    };
    let sum: f64 = (0..n_outputs)
        .map(|j| {
            let t: Vec<f64> = y_true
                .data()
                .iter()
                .skip(j)
                .step_by(n_outputs)
                .map(|v| v.to_f64())
                .collect();
            let p: Vec<f64> = y_pred
                .data()
                .iter()
                .skip(j)
                .step_by(n_outputs)
                .map(|v| v.to_f64())
                .collect();
            r2_single(&t, &p)
        })
        .sum();
    sum / n_outputs as f64
}

fn r2_single(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean_true: f64 = y_true.iter().sum::<f64>() / n;

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let d = t - p;
            d * d
        })
        .sum();

    let ss_tot: f64 = y_true
        .iter()
        .map(|&t| {
            let d = t - mean_true;
            d * d
        })
        .sum();

    if ss_tot < 1e-15 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse() {
        let y_true: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0, 3.0]);
        let y_pred: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0, 3.0]);
        assert!(mse(&y_true, &y_pred).abs() < 1e-10);
    }

    #[test]
    fn test_rmse() {
        let y_true: Tensor<f64> = Tensor::from_slice(&[0.0, 0.0]);
        let y_pred: Tensor<f64> = Tensor::from_slice(&[3.0, 4.0]);
        // MSE = 12.5
        assert!((rmse(&y_true, &y_pred) - 12.5_f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_mae() {
        let y_true: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0, 3.0]);
        let y_pred: Tensor<f64> = Tensor::from_slice(&[1.5, 2.5, 3.5]);
        assert!((mae(&y_true, &y_pred) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_r2_perfect() {
        let y_true: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let y_pred: Tensor<f64> = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert!((r2_score(&y_true, &y_pred) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_r2_constant_target() {
        let y_true: Tensor<f64> = Tensor::from_slice(&[5.0, 5.0, 5.0]);
        let y_pred: Tensor<f64> = Tensor::from_slice(&[4.0, 5.0, 6.0]);
        assert!(r2_score(&y_true, &y_pred).abs() < 1e-10);
    }

    #[test]
    fn test_r2_multi_output_uniform_average() {
        let y_true: Tensor<f64> =
            Tensor::from_vec2d(&[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]]).unwrap();
        let y_pred: Tensor<f64> =
            Tensor::from_vec2d(&[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 28.0]]).unwrap();
        // Column 0 scores 1.0; column 1 scores 1 - 4/200 = 0.98.
        assert!((r2_score(&y_true, &y_pred) - 0.99).abs() < 1e-10);
    }
}
