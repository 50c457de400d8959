//! Classification metrics
//!
//! Accuracy, macro precision/recall/F1, macro one-vs-rest ROC AUC and log
//! loss computed from class indices and a probability matrix whose columns
//! follow the class index order.

use ndarray::{Array2, ArrayView1};

use crate::ml_integration::metadata::ClassificationMetrics;

/// Probabilities are clipped into `[EPS, 1 - EPS]` before taking logs
const EPS: f64 = 1e-15;

/// Evaluate predictions against the truth
pub fn evaluate(
    truth: ArrayView1<usize>,
    predicted: ArrayView1<usize>,
    probabilities: &Array2<f64>,
    n_classes: usize,
) -> ClassificationMetrics {
    let (precision, recall, f1_score) = macro_scores(truth, predicted, n_classes);

    ClassificationMetrics {
        accuracy: accuracy(truth, predicted),
        precision,
        recall,
        f1_score,
        roc_auc: roc_auc_ovr(truth, probabilities, n_classes),
        log_loss: log_loss(truth, probabilities),
        training_time_ms: 0,
    }
}

pub fn accuracy(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// Macro (precision, recall, F1) over classes seen in truth or predictions
pub fn macro_scores(
    truth: ArrayView1<usize>,
    predicted: ArrayView1<usize>,
    n_classes: usize,
) -> (f64, f64, f64) {
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_ = vec![0usize; n_classes];
    let mut seen = vec![false; n_classes];

    for (&t, &p) in truth.iter().zip(predicted.iter()) {
        seen[t] = true;
        seen[p] = true;
        if t == p {
            tp[t] += 1;
        } else {
            fp[p] += 1;
            fn_[t] += 1;
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut f1_sum = 0.0;
    let mut classes = 0usize;

    for class in (0..n_classes).filter(|&c| seen[c]) {
        let precision = ratio(tp[class], tp[class] + fp[class]);
        let recall = ratio(tp[class], tp[class] + fn_[class]);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        precision_sum += precision;
        recall_sum += recall;
        f1_sum += f1;
        classes += 1;
    }

    if classes == 0 {
        return (0.0, 0.0, 0.0);
    }
    let n = classes as f64;
    (precision_sum / n, recall_sum / n, f1_sum / n)
}

/// Binary AUC via the rank statistic; tied scores share their average rank
fn binary_auc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(positives)
        .filter(|(_, &p)| p)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Macro one-vs-rest ROC AUC over classes with both positives and negatives
pub fn roc_auc_ovr(
    truth: ArrayView1<usize>,
    probabilities: &Array2<f64>,
    n_classes: usize,
) -> Option<f64> {
    let aucs: Vec<f64> = (0..n_classes.min(probabilities.ncols()))
        .filter_map(|class| {
            let positives: Vec<bool> = truth.iter().map(|&t| t == class).collect();
            let scores: Vec<f64> = probabilities.column(class).to_vec();
            binary_auc(&scores, &positives)
        })
        .collect();

    if aucs.is_empty() {
        None
    } else {
        Some(aucs.iter().sum::<f64>() / aucs.len() as f64)
    }
}

/// Mean negative log-likelihood of the true class
pub fn log_loss(truth: ArrayView1<usize>, probabilities: &Array2<f64>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let total: f64 = truth
        .iter()
        .enumerate()
        .map(|(row, &class)| {
            let p = probabilities
                .get([row, class])
                .copied()
                .unwrap_or(0.0)
                .clamp(EPS, 1.0 - EPS);
            -p.ln()
        })
        .sum();
    total / truth.len() as f64
}

/// One-hot probability rows for classifiers without calibrated scores
pub fn one_hot(predicted: ArrayView1<usize>, n_classes: usize) -> Array2<f64> {
    let mut probabilities = Array2::<f64>::zeros((predicted.len(), n_classes));
    for (row, &class) in predicted.iter().enumerate() {
        if class < n_classes {
            probabilities[[row, class]] = 1.0;
        }
    }
    probabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_perfect_predictions() {
        let truth: Array1<usize> = array![0, 1, 2, 1];
        let probabilities = one_hot(truth.view(), 3);
        let metrics = evaluate(truth.view(), truth.view(), &probabilities, 3);

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.roc_auc, Some(1.0));
        assert!(metrics.log_loss < 1e-10);
    }

    #[test]
    fn test_macro_scores_by_hand() {
        // class 0: tp=1 fp=1 fn=0, class 1: tp=1 fp=0 fn=1
        let truth: Array1<usize> = array![0, 1, 1];
        let predicted: Array1<usize> = array![0, 0, 1];
        let (precision, recall, f1) = macro_scores(truth.view(), predicted.view(), 2);
        assert!((precision - 0.75).abs() < 1e-12);
        assert!((recall - 0.75).abs() < 1e-12);
        let f1_0 = 2.0 * 0.5 * 1.0 / 1.5;
        let f1_1 = 2.0 * 1.0 * 0.5 / 1.5;
        assert!((f1 - (f1_0 + f1_1) / 2.0).abs() < 1e-12);
        assert!((accuracy(truth.view(), predicted.view()) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_handles_ties_and_missing_classes() {
        let truth: Array1<usize> = array![0, 0, 1, 1];
        let probabilities = array![
            [0.6, 0.4, 0.0],
            [0.5, 0.5, 0.0],
            [0.5, 0.5, 0.0],
            [0.2, 0.8, 0.0]
        ];
        // class 2 has no positives and is skipped; classes 0 and 1 both score 0.875
        let auc = roc_auc_ovr(truth.view(), &probabilities, 3).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);

        let single: Array1<usize> = array![1, 1];
        assert_eq!(roc_auc_ovr(single.view(), &one_hot(single.view(), 2), 1), None);
    }

    #[test]
    fn test_log_loss_is_clipped() {
        let truth: Array1<usize> = array![0];
        let probabilities = array![[0.0, 1.0]];
        let loss = log_loss(truth.view(), &probabilities);
        assert!(loss.is_finite());
        assert!((loss - (-(1e-15f64).ln())).abs() < 1e-9);
    }
}
