use std::path::Path;

use ndarray::Array2;
use plotters::prelude::*;

use crate::{Result, TrainErr, training::History};

const SIZE: (u32, u32) = (640, 1080);

fn plot_err<E: std::fmt::Display>(e: E) -> TrainErr {
    TrainErr::Plot(e.to_string())
}

/// Renders the loss curves, the accuracy curve and the confusion matrix as stacked panels.
///
/// # Arguments
/// * `path` - Where the SVG file is written.
/// * `history` - The committed epochs.
/// * `confusion` - Counts of true classes (rows) against predicted classes (columns).
pub fn render(path: &Path, history: &History, confusion: &Array2<usize>) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let panels = root.split_evenly((3, 1));
    draw_loss(&panels[0], history)?;
    draw_accuracy(&panels[1], history)?;
    draw_confusion(&panels[2], confusion)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn epochs_range(history: &History) -> std::ops::Range<f32> {
    0.0..history.len().saturating_sub(1).max(1) as f32
}

fn draw_loss<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    history: &History,
) -> Result<()> {
    let train = history.train_loss();
    let test = history.test_loss();

    let top = train
        .iter()
        .chain(&test)
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON);

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Loss", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 35)
        .build_cartesian_2d(epochs_range(history), 0.0..top * 1.05)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .draw()
        .map_err(plot_err)?;

    for (series, name, color) in [(&train, "Train", RED), (&test, "Test", BLUE)] {
        chart
            .draw_series(LineSeries::new(
                series.iter().enumerate().map(|(i, &v)| (i as f32, v)),
                color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(name)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

fn draw_accuracy<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    history: &History,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Model accuracy", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 35)
        .build_cartesian_2d(epochs_range(history), 0.0f32..1.05)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc("Accuracy")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            history
                .test_acc()
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i as f32, v)),
            BLUE.stroke_width(2),
        ))
        .map_err(plot_err)?;

    if let Some((x, y)) = history.best_accuracy() {
        let text = format!("x={x}, y={y:.3}");
        chart
            .draw_series(std::iter::once(Text::new(
                text,
                (x as f32, y),
                ("sans-serif", 14),
            )))
            .map_err(plot_err)?;
    }

    Ok(())
}

fn draw_confusion<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    confusion: &Array2<usize>,
) -> Result<()> {
    let classes = confusion.nrows().max(1);

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Confusion matrix", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 40)
        .set_label_area_size(LabelAreaPosition::Bottom, 35)
        .build_cartesian_2d(0..classes, 0..classes)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Predicted")
        .y_desc("True")
        .disable_mesh()
        .draw()
        .map_err(plot_err)?;

    let max = confusion.iter().copied().max().unwrap_or(0).max(1) as f64;

    chart
        .draw_series(confusion.indexed_iter().map(|((row, col), &count)| {
            // True classes go top to bottom.
            let y = classes - 1 - row;
            Rectangle::new([(col, y), (col + 1, y + 1)], heat(count as f64 / max).filled())
        }))
        .map_err(plot_err)?;

    Ok(())
}

/// Maps `[0, 1]` from dark purple to yellow.
fn heat(v: f64) -> RGBColor {
    let v = v.clamp(0., 1.);
    let lerp = |a: f64, b: f64| (a + (b - a) * v).round() as u8;

    RGBColor(lerp(68., 253.), lerp(1., 231.), lerp(84., 37.))
}
