use evloc_classifiers::math::Array2;
use evloc_classifiers::models::TreeBooster;
use evloc_classifiers::{
    train_kfold, Dataset, Features, FoldSource, ImportanceMode, KFoldOptions, ModelConfig,
    RoundLimits, TrainConfig,
};

fn main() {
    env_logger::init();

    // 40 samples, 3 features; the label follows the first feature
    let n = 40;
    let mut data = Vec::with_capacity(n * 3);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let label = (i % 2) as f32;
        data.extend([label + (i % 5) as f32 * 0.15, (i % 3) as f32, (i % 11) as f32 * 0.1]);
        labels.push(label);
    }
    let x = Array2::from_shape_vec((n, 3), data).expect("failed to create feature matrix");
    let names = vec!["signal".to_string(), "phase".to_string(), "drift".to_string()];
    let features = Features::with_names(x, names).expect("feature names must match columns");
    let dataset = Dataset::new(features, labels).expect("labels must be 0/1");

    let config = TrainConfig::new(
        RoundLimits {
            early_stopping_rounds: 5,
            max_rounds: 50,
            log_every: 10,
        },
        ModelConfig {
            max_depth: 3,
            ..ModelConfig::default()
        },
    );
    let options = KFoldOptions {
        stratify: Some(dataset.classes()),
        importance_mode: ImportanceMode::Every,
        ..KFoldOptions::default()
    };

    let result = train_kfold(&TreeBooster, &config, &dataset, None, FoldSource::Count(4), &options)
        .expect("cross-validation failed");

    println!("SCORES: {:?} MEAN: {}", result.scores, result.mean_score());
    println!("OOF first 10 = {:?}", &result.oof[..10]);
}
