use pose_orchestra::training::{PlateauConfig, PlateauScheduler, SchedulerState};
use proptest::collection::vec;
use proptest::prelude::*;

fn run(config: PlateauConfig, lr: f32, losses: &[f32]) -> Vec<f32> {
    let mut scheduler = PlateauScheduler::new(config, lr).unwrap();
    losses.iter().map(|&m| scheduler.step(m)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_lr_never_increases_nor_drops_below_the_floor(
        losses in vec(any::<f32>(), 0..300),
        factor in 0.05f32..0.95,
        patience in 0usize..8,
        cooldown in 0usize..4,
    ) {
        let config = PlateauConfig {
            factor,
            patience,
            cooldown,
            ..PlateauConfig::default()
        };
        let lrs = run(config, 0.01, &losses);

        let mut previous = 0.01;
        for lr in lrs {
            prop_assert!(lr <= previous, "lr went from {} up to {}", previous, lr);
            prop_assert!(lr >= config.min_lr, "lr {} below the floor", lr);
            previous = lr;
        }
    }

    #[test]
    fn prop_same_losses_same_rates(losses in vec(0.0f32..100.0, 0..100)) {
        let config = PlateauConfig::default();
        prop_assert_eq!(run(config, 0.01, &losses), run(config, 0.01, &losses));
    }
}

#[test]
fn six_bad_epochs_reduce_once_and_the_seventh_cools_down() {
    let mut scheduler = PlateauScheduler::new(PlateauConfig::new(0.5), 0.01).unwrap();
    scheduler.step(10.0);

    let reductions = (0..6)
        .filter(|_| {
            let before = scheduler.lr();
            scheduler.step(10.0) < before
        })
        .count();
    assert_eq!(reductions, 1);
    assert_eq!(scheduler.lr(), 0.005);
    assert_eq!(scheduler.state(), SchedulerState::Cooldown(1));

    assert_eq!(scheduler.step(10.0), 0.005);
    assert_eq!(scheduler.state(), SchedulerState::Tracking);
}

#[test]
fn improvement_resets_the_patience() {
    let mut scheduler = PlateauScheduler::new(PlateauConfig::default(), 0.01).unwrap();
    let losses = [10., 10., 10., 10., 10., 9., 9., 9., 9., 9.];

    for loss in losses {
        scheduler.step(loss);
    }

    assert_eq!(scheduler.lr(), 0.01);
    assert_eq!(scheduler.num_bad_epochs(), 4);
}
