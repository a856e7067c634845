mod common;

use common::{CONFIG, ConstantModel, loader, ten_examples};
use machine_learning::{
    MlErr,
    arch::{Model, PoseNet},
};
use pose_orchestra::{
    TrainErr,
    training::{self, History},
};

#[test]
fn constant_model_accuracy_is_the_class_share() {
    let ds = ten_examples();
    let mut model = ConstantModel::new(3, 0);
    let mut history = History::new();

    let summary = training::evaluate(&mut model, &mut loader(&ds, 4), &mut history).unwrap();

    assert_eq!(summary.correct, 3);
    assert_eq!(summary.total, 10);
    assert_eq!(summary.accuracy, 0.3);
    assert!(!model.is_training());
    assert_eq!(history.test_acc(), vec![0.3]);
}

#[test]
fn average_loss_ignores_the_batch_partition() {
    let ds = ten_examples();
    let mut model = PoseNet::new(CONFIG, 5).unwrap();

    let losses: Vec<f32> = [1, 3, 4, 10, 1000]
        .into_iter()
        .map(|bs| {
            let mut history = History::new();
            training::evaluate(&mut model, &mut loader(&ds, bs), &mut history)
                .unwrap()
                .loss
        })
        .collect();

    for loss in &losses[1..] {
        assert!((loss - losses[0]).abs() <= 1e-5 * losses[0].abs().max(1.));
    }
}

#[test]
fn evaluation_never_mutates_the_parameters() {
    let ds = ten_examples();
    let mut model = PoseNet::new(CONFIG, 1).unwrap();
    let before: Vec<f32> = model.parameters().iter().flat_map(|p| p.values.to_vec()).collect();

    training::evaluate(&mut model, &mut loader(&ds, 3), &mut History::new()).unwrap();

    let after: Vec<f32> = model.parameters().iter().flat_map(|p| p.values.to_vec()).collect();
    assert_eq!(before, after);
}

#[test]
fn a_failed_pass_keeps_the_committed_epochs() {
    let ds = ten_examples();
    let mut model = ConstantModel::new(3, 1);
    let mut history = History::new();

    training::evaluate(&mut model, &mut loader(&ds, 5), &mut history).unwrap();

    // Scores fewer classes than the labels need.
    let mut narrow = ConstantModel::new(2, 0);
    let err = training::evaluate(&mut narrow, &mut loader(&ds, 5), &mut history).unwrap_err();

    assert!(matches!(
        err,
        TrainErr::Ml(MlErr::LabelOutOfRange { label: 2, classes: 2 })
    ));
    assert_eq!(history.len(), 1);
    assert_eq!(history.test_acc(), vec![0.4]);
}

#[test]
fn confusion_matrix_counts_every_example() {
    let ds = ten_examples();
    let model = ConstantModel::new(3, 2);

    let matrix = training::confusion_matrix(&model, &mut loader(&ds, 4)).unwrap();

    assert_eq!(matrix.sum(), 10);
    assert_eq!(matrix.column(2).to_vec(), vec![3, 4, 3]);
}
