use std::error::Error;
use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

use motionlog_shared::decoder::Channel;
use motionlog_shared::protocol::Phase;
use motionlog_shared::SampleSeries;

const SIZE: (u32, u32) = (1000, 600);
const MARKER_SIZE: i32 = 4;

const TITLE: &str = "X and Y Values (Before and After) Over Time";
const X_DESC: &str = "Block Number (Time)";
const Y_DESC: &str = "Decimal Value (Signed)";

fn channel_color(channel: Channel) -> RGBColor {
    match channel {
        Channel::BeforeX => BLUE,
        Channel::BeforeY => RED,
        Channel::AfterX => GREEN,
        Channel::AfterY => MAGENTA,
    }
}

/// Render the four sample channels against block number as a PNG
pub fn render(series: &SampleSeries, path: &Path) -> Result<(), Box<dyn Error>> {
    let (x_range, y_range) = axis_ranges(series).ok_or("no complete samples to plot")?;

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .draw()?;

    for &channel in Channel::ALL.iter() {
        let points: Vec<(i64, i64)> = series
            .points(channel)
            .map(|(block, value)| (i64::from(block), i64::from(value)))
            .collect();
        let color = channel_color(channel);
        let style = color.stroke_width(2);

        let line = match channel.phase() {
            Phase::Before => chart.draw_series(LineSeries::new(points.clone(), style))?,
            Phase::After => chart.draw_series(DashedLineSeries::new(points.clone(), 8, 5, style))?,
        };
        line.label(channel.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));

        let fill = color.filled();
        match channel {
            Channel::BeforeX => {
                chart.draw_series(points.iter().map(|&p| Circle::new(p, MARKER_SIZE, fill)))?;
            }
            Channel::BeforeY => {
                chart.draw_series(points.iter().map(|&p| {
                    EmptyElement::at(p)
                        + Rectangle::new([(-MARKER_SIZE, -MARKER_SIZE), (MARKER_SIZE, MARKER_SIZE)], fill)
                }))?;
            }
            Channel::AfterX => {
                chart.draw_series(
                    points.iter().map(|&p| TriangleMarker::new(p, MARKER_SIZE + 1, fill)),
                )?;
            }
            Channel::AfterY => {
                chart.draw_series(points.iter().map(|&p| Cross::new(p, MARKER_SIZE, style)))?;
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}

/// Block and value ranges with some headroom, None without samples
fn axis_ranges(series: &SampleSeries) -> Option<(Range<i64>, Range<i64>)> {
    let blocks = series.samples().iter().map(|s| i64::from(s.block));
    let x_min = blocks.clone().min()?;
    let x_max = blocks.max()?;

    let values = Channel::ALL
        .iter()
        .flat_map(|&channel| series.values(channel))
        .map(i64::from);
    let y_min = values.clone().min()?;
    let y_max = values.max()?;

    let y_pad = ((y_max - y_min) / 20).max(1);

    Some((x_min - 1..x_max + 1, y_min - y_pad..y_max + y_pad))
}
