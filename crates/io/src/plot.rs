// Diagnostic plot: one scatter panel per band, deviation vs row index.
//
// Rendered as standalone SVG. Each panel shows the zero line and both
// tolerance lines so flagged points stand out against the band limits.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use repricer_engine::{Band, Dataset, Pass};

use crate::error::IoError;

const COLUMNS: usize = 2;
const PANEL_WIDTH: f64 = 520.0;
const PANEL_HEIGHT: f64 = 340.0;
const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 52.0;
const POINT_RADIUS: f64 = 3.0;

const ZERO_COLOR: &str = "black";
const UPPER_COLOR: &str = "red";
const LOWER_COLOR: &str = "blue";
const POINT_COLOR: &str = "steelblue";
const FLAGGED_COLOR: &str = "darkorange";

/// `<folder>/before correction.svg` or `<folder>/after correction.svg`.
pub fn plot_path(folder: &Path, pass: Pass) -> PathBuf {
    folder.join(format!("{pass}.svg"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    index: usize,
    deviation: f64,
    flagged: bool,
}

/// Points of one band for the given pass. `index` is the item's row in the
/// whole dataset, not its position within the band.
fn band_points(dataset: &Dataset, band: Band, pass: Pass) -> Vec<Point> {
    dataset
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.band() == Some(band))
        .filter_map(|(index, item)| item.evaluation(pass).map(|e| (index, e)))
        .map(|(index, e)| Point {
            index,
            deviation: e.deviation,
            flagged: e.flagged,
        })
        .collect()
}

/// Bands that hold at least one evaluated item, in band order.
pub fn plotted_bands(dataset: &Dataset, pass: Pass) -> Vec<Band> {
    Band::ALL
        .iter()
        .copied()
        .filter(|&band| !band_points(dataset, band, pass).is_empty())
        .collect()
}

pub fn write_plot(path: &Path, dataset: &Dataset, pass: Pass) -> Result<usize, IoError> {
    let bands = plotted_bands(dataset, pass);
    let svg = render_plot(dataset, pass)?;
    std::fs::write(path, svg).map_err(|e| IoError::write(path, e))?;
    Ok(bands.len())
}

pub fn render_plot(dataset: &Dataset, pass: Pass) -> Result<String, IoError> {
    let bands = plotted_bands(dataset, pass);
    let rows = bands.len().div_ceil(COLUMNS).max(1);
    let width = PANEL_WIDTH * COLUMNS as f64;
    let height = PANEL_HEIGHT * rows as f64;

    let mut svg = Svg::new();
    svg.decl()?;
    svg.open(
        "svg",
        &[
            ("xmlns", "http://www.w3.org/2000/svg".into()),
            ("width", num(width)),
            ("height", num(height)),
            ("viewBox", format!("0 0 {} {}", num(width), num(height))),
            ("font-family", "sans-serif".into()),
        ],
    )?;
    svg.element("title", &[], &format!("Percentage Diff {pass}"))?;
    svg.empty(
        "rect",
        &[
            ("width", num(width)),
            ("height", num(height)),
            ("fill", "white".into()),
        ],
    )?;

    if bands.is_empty() {
        svg.element(
            "text",
            &[
                ("x", num(width / 2.0)),
                ("y", num(height / 2.0)),
                ("text-anchor", "middle".into()),
            ],
            "no items to plot",
        )?;
    }

    for (slot, &band) in bands.iter().enumerate() {
        let origin_x = (slot % COLUMNS) as f64 * PANEL_WIDTH;
        let origin_y = (slot / COLUMNS) as f64 * PANEL_HEIGHT;
        let points = band_points(dataset, band, pass);
        draw_panel(&mut svg, origin_x, origin_y, band, &points)?;
    }

    svg.close("svg")?;
    svg.finish()
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

struct Scale {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Scale {
    fn new(origin_x: f64, origin_y: f64, tolerance: f64, points: &[Point]) -> Self {
        let (lo, hi) = points.iter().fold((-tolerance, tolerance), |(lo, hi), p| {
            (lo.min(p.deviation), hi.max(p.deviation))
        });
        let pad = (hi - lo) * 0.08;
        let first = points.iter().map(|p| p.index).min().unwrap_or(0);
        let last = points.iter().map(|p| p.index).max().unwrap_or(0);
        Self {
            left: origin_x + MARGIN_LEFT,
            top: origin_y + MARGIN_TOP,
            width: PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
            height: PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
            x_min: first as f64,
            x_max: last.max(first + 1) as f64,
            y_min: lo - pad,
            y_max: hi + pad,
        }
    }

    fn x(&self, index: usize) -> f64 {
        self.left + self.width * (index as f64 - self.x_min) / (self.x_max - self.x_min)
    }

    fn y(&self, deviation: f64) -> f64 {
        self.top + self.height * (self.y_max - deviation) / (self.y_max - self.y_min)
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

fn draw_panel(svg: &mut Svg, origin_x: f64, origin_y: f64, band: Band, points: &[Point]) -> Result<(), IoError> {
    let tolerance = band.tolerance();
    let scale = Scale::new(origin_x, origin_y, tolerance, points);

    svg.open("g", &[("class", "panel".into()), ("data-band", band.label().into())])?;

    svg.element(
        "text",
        &[
            ("x", num(origin_x + PANEL_WIDTH / 2.0)),
            ("y", num(origin_y + MARGIN_TOP / 2.0 + 4.0)),
            ("text-anchor", "middle".into()),
            ("font-size", "14".into()),
            ("font-weight", "bold".into()),
        ],
        &format!("Percentage Diff for {} Category", band.label()),
    )?;

    svg.empty(
        "rect",
        &[
            ("x", num(scale.left)),
            ("y", num(scale.top)),
            ("width", num(scale.width)),
            ("height", num(scale.height)),
            ("fill", "none".into()),
            ("stroke", "#999".into()),
        ],
    )?;

    for (value, color) in [(0.0, ZERO_COLOR), (tolerance, UPPER_COLOR), (-tolerance, LOWER_COLOR)] {
        let y = scale.y(value);
        svg.empty(
            "line",
            &[
                ("x1", num(scale.left)),
                ("y1", num(y)),
                ("x2", num(scale.right())),
                ("y2", num(y)),
                ("stroke", color.into()),
                ("stroke-dasharray", "6 4".into()),
            ],
        )?;
        svg.element(
            "text",
            &[
                ("x", num(scale.left - 6.0)),
                ("y", num(y + 4.0)),
                ("text-anchor", "end".into()),
                ("font-size", "10".into()),
            ],
            &percent(value),
        )?;
    }

    for point in points {
        let fill = if point.flagged { FLAGGED_COLOR } else { POINT_COLOR };
        svg.empty(
            "circle",
            &[
                ("cx", num(scale.x(point.index))),
                ("cy", num(scale.y(point.deviation))),
                ("r", num(POINT_RADIUS)),
                ("fill", fill.into()),
            ],
        )?;
    }

    // Axis labels
    svg.element(
        "text",
        &[
            ("x", num(scale.left + scale.width / 2.0)),
            ("y", num(scale.bottom() + 32.0)),
            ("text-anchor", "middle".into()),
            ("font-size", "11".into()),
        ],
        "Item index",
    )?;
    let label_x = origin_x + 16.0;
    let label_y = scale.top + scale.height / 2.0;
    svg.element(
        "text",
        &[
            ("x", num(label_x)),
            ("y", num(label_y)),
            ("text-anchor", "middle".into()),
            ("font-size", "11".into()),
            ("transform", format!("rotate(-90 {} {})", num(label_x), num(label_y))),
        ],
        "Percentage Diff",
    )?;

    draw_legend(svg, &scale, tolerance)?;
    svg.close("g")
}

fn draw_legend(svg: &mut Svg, scale: &Scale, tolerance: f64) -> Result<(), IoError> {
    let entries = [
        (ZERO_COLOR, "zero".to_string()),
        (UPPER_COLOR, format!("+{}", percent(tolerance))),
        (LOWER_COLOR, format!("-{}", percent(tolerance))),
    ];
    let x = scale.right() - 96.0;
    for (row, (color, label)) in entries.iter().enumerate() {
        let y = scale.top + 14.0 + row as f64 * 14.0;
        svg.empty(
            "line",
            &[
                ("x1", num(x)),
                ("y1", num(y - 4.0)),
                ("x2", num(x + 22.0)),
                ("y2", num(y - 4.0)),
                ("stroke", (*color).into()),
                ("stroke-dasharray", "6 4".into()),
            ],
        )?;
        svg.element(
            "text",
            &[("x", num(x + 28.0)), ("y", num(y)), ("font-size", "10".into())],
            label,
        )?;
    }
    Ok(())
}

fn num(v: f64) -> String {
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn percent(v: f64) -> String {
    format!("{:.0}%", v * 100.0)
}

// ---------------------------------------------------------------------------
// XML writer
// ---------------------------------------------------------------------------

struct Svg {
    writer: Writer<Vec<u8>>,
}

impl Svg {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), IoError> {
        self.writer
            .write_event(event)
            .map_err(|e| IoError::Render(e.to_string()))
    }

    fn decl(&mut self) -> Result<(), IoError> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn start<'a>(name: &'a str, attrs: &[(&str, String)]) -> BytesStart<'a> {
        let mut elem = BytesStart::new(name);
        for (key, value) in attrs {
            elem.push_attribute((*key, value.as_str()));
        }
        elem
    }

    fn open(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), IoError> {
        self.emit(Event::Start(Self::start(name, attrs)))
    }

    fn close(&mut self, name: &str) -> Result<(), IoError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), IoError> {
        self.emit(Event::Empty(Self::start(name, attrs)))
    }

    fn element(&mut self, name: &str, attrs: &[(&str, String)], text: &str) -> Result<(), IoError> {
        self.open(name, attrs)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String, IoError> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| IoError::Render(e.to_string()))
    }
}
