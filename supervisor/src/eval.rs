use convnet::data::{Batch, DataLoader, Dataset};
use convnet::loss::Nll;
use convnet::model::predictions;
use convnet::{Mode, Net};
use log::info;
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;

/// What a test pass measured.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Top-1 accuracy in percent.
    pub accuracy_pct: f32,
    /// Negative log-likelihood averaged over the whole split.
    pub avg_loss: f32,
    pub correct: usize,
    pub total: usize,
}

/// Scores `params` over `dataset`.
///
/// Batches run in parallel; every rayon thread works on its own clone of
/// the network so inference caches never cross threads. Dropout is inert
/// in eval mode, which makes the result deterministic for a given buffer.
pub fn evaluate(net: &Net, params: &[f32], dataset: &Dataset, batch_size: usize) -> EvalReport {
    let mut loader = DataLoader::new(dataset, batch_size, false);
    // Order is fixed when shuffling is off; the generator goes unused.
    let mut rng = StdRng::seed_from_u64(0);
    let batches: Vec<Batch> = loader.epoch(&mut rng).collect();

    let nll = Nll::new();
    let (loss_sum, correct) = batches
        .into_par_iter()
        .map_init(
            || net.clone(),
            |net, batch| {
                let logp = net.forward(params, &batch.images, Mode::Eval);
                let loss = nll.loss_sum(logp.view(), &batch.labels);
                let correct = predictions(logp.view())
                    .into_iter()
                    .zip(&batch.labels)
                    .filter(|&(predicted, &label)| predicted == label as usize)
                    .count();
                (loss, correct)
            },
        )
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    let total = dataset.len();
    let report = EvalReport {
        accuracy_pct: if total == 0 {
            0.0
        } else {
            100.0 * correct as f32 / total as f32
        },
        avg_loss: if total == 0 {
            0.0
        } else {
            loss_sum / total as f32
        },
        correct,
        total,
    };

    info!(
        "test set: average loss: {:.4}, accuracy: {}/{} ({:.0}%)",
        report.avg_loss, report.correct, report.total, report.accuracy_pct
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_add_up_on_a_synthetic_split() {
        let dataset = Dataset::synthetic(24, 3).unwrap();
        let net = Net::new(7);
        let params = convnet::init::init_params(
            &convnet::layout::ParamLayout::mnist_cnn(),
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();

        let report = evaluate(&net, &params, &dataset, 10);

        assert_eq!(report.total, 24);
        assert!(report.correct <= report.total);
        assert!((0.0..=100.0).contains(&report.accuracy_pct));
        assert!(report.avg_loss >= 0.0);
    }

    #[test]
    fn the_same_buffer_scores_the_same_twice() {
        let dataset = Dataset::synthetic(16, 5).unwrap();
        let net = Net::new(1);
        let params = convnet::init::init_params(
            &convnet::layout::ParamLayout::mnist_cnn(),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();

        let first = evaluate(&net, &params, &dataset, 8);
        let second = evaluate(&net, &params, &dataset, 8);
        assert_eq!(first, second);
    }

    #[test]
    fn an_empty_split_reports_zeros() {
        let dataset = Dataset::new(Vec::new(), Vec::new());
        let net = Net::new(1);
        let params = vec![0.0; convnet::PARAM_COUNT];

        let report = evaluate(&net, &params, &dataset, 4);

        assert_eq!(report.total, 0);
        assert_eq!(report.correct, 0);
        assert_eq!(report.accuracy_pct, 0.0);
        assert_eq!(report.avg_loss, 0.0);
    }
}
