use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use continuum::{
    ContinuumError, ContinuumHull, GeneratorKind, GeneratorParams, Point, Spectrum,
    SpectrumGenerator,
};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Continuum removal for 1-D spectra", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the continuum hull of a spectrum and write the normalized spectrum
    Normalize(NormalizeArgs),
    /// Write a synthetic spectrum as x,y CSV
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct GeneratorArgs {
    /// Generator parameters as JSON (overrides the generator flags)
    #[arg(long, value_hint = ValueHint::FilePath)]
    params: Option<PathBuf>,

    /// Synthetic spectrum shape
    #[arg(long, value_enum, default_value_t = GeneratorOpt::Bell)]
    generator: GeneratorOpt,

    /// Number of synthetic samples
    #[arg(long, default_value_t = 40)]
    count: usize,

    /// Random walk amplitude for the bell curve
    #[arg(long, default_value_t = 0.2)]
    walk_range: f64,

    /// Left edge of the uniform bounding box
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    x_left: f64,

    /// Right edge of the uniform bounding box
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    x_right: f64,

    /// Bottom edge of the uniform bounding box
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    y_bottom: f64,

    /// Top edge of the uniform bounding box
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    y_top: f64,

    /// RNG seed for reproducible spectra
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser, Debug)]
struct NormalizeArgs {
    /// Spectrum CSV with an `x,y` header (synthetic spectrum when omitted)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    #[command(flatten)]
    generator: GeneratorArgs,

    /// Output CSV path for the normalized spectrum (`-` for stdout)
    #[arg(short, long, default_value = "normalized.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output CSV path for the hull vertices
    #[arg(long, value_hint = ValueHint::FilePath)]
    hull_output: Option<PathBuf>,

    /// Output PNG figure path (defaults next to CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    generator: GeneratorArgs,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "spectrum.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum GeneratorOpt {
    Bell,
    Uniform,
}

impl From<GeneratorOpt> for GeneratorKind {
    fn from(value: GeneratorOpt) -> Self {
        match value {
            GeneratorOpt::Bell => GeneratorKind::BellCurve,
            GeneratorOpt::Uniform => GeneratorKind::Uniform,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Normalize(args) => args.verbose,
        Command::Generate(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Normalize(args) => handle_normalize(args),
        Command::Generate(args) => handle_generate(args),
    }
}

fn handle_normalize(args: NormalizeArgs) -> Result<()> {
    let mut original = load_spectrum(args.input.as_deref(), &args.generator)?;
    info!("Loaded spectrum with {} samples", original.len());

    let t_hull = Instant::now();
    let mut hull = ContinuumHull::new();
    let normalized = hull
        .normalize_spectrum(&mut original)
        .context("continuum removal failed")?;
    info!(
        "Continuum hull: {} vertices over {} samples ({:.2} ms)",
        hull.hull_points().len(),
        original.len(),
        t_hull.elapsed().as_secs_f64() * 1000.0
    );

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_normalized_rows(&original, &normalized, stdout.lock())?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        write_normalized_rows(&original, &normalized, file)?;
        info!("Wrote normalized CSV: {}", args.output.display());
    }

    if let Some(path) = args.hull_output.as_ref() {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_point_rows(hull.hull_points(), file)?;
        info!("Wrote hull CSV: {}", path.display());
    }

    if args.no_plot {
        return Ok(());
    }

    let png_path = args.png.clone().or_else(|| {
        if args.output.as_os_str() == "-" {
            None
        } else {
            let mut path = args.output.clone();
            path.set_extension("png");
            Some(path)
        }
    });
    let charts = ChartData::new(&original, &hull, &normalized);
    if let Some(path) = png_path.as_ref() {
        match render_chart_guard(&charts, path, ChartKind::Png) {
            Ok(()) => info!("Wrote plot: {}", path.display()),
            Err(err) => warn!("Skipping PNG render ({}): {}", path.display(), err),
        }
    }
    if let Some(path) = args.svg.as_ref() {
        match render_chart_guard(&charts, path, ChartKind::Svg) {
            Ok(()) => info!("Wrote plot: {}", path.display()),
            Err(err) => warn!("Skipping SVG render ({}): {}", path.display(), err),
        }
    }

    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<()> {
    let spectrum = generate_spectrum(&args.generator)?;
    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_point_rows(spectrum.points(), stdout.lock())?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        write_point_rows(spectrum.points(), file)?;
        info!(
            "Wrote {} samples: {}",
            spectrum.len(),
            args.output.display()
        );
    }
    Ok(())
}

fn load_spectrum(input: Option<&Path>, generator: &GeneratorArgs) -> Result<Spectrum> {
    match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            read_spectrum_csv(file).with_context(|| format!("failed to read {}", path.display()))
        }
        None => generate_spectrum(generator),
    }
}

fn generator_params(args: &GeneratorArgs) -> Result<GeneratorParams> {
    if let Some(path) = args.params.as_ref() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut params: GeneratorParams = serde_json::from_str(&data)
            .with_context(|| format!("invalid generator params in {}", path.display()))?;
        if args.seed.is_some() {
            params.seed = args.seed;
        }
        return Ok(params);
    }

    let mut params = GeneratorParams::default();
    params.kind = args.generator.into();
    params.count = args.count;
    params.walk_range = args.walk_range;
    params.x_left = args.x_left;
    params.x_right = args.x_right;
    params.y_bottom = args.y_bottom;
    params.y_top = args.y_top;
    params.seed = args.seed;
    Ok(params)
}

fn generate_spectrum(args: &GeneratorArgs) -> Result<Spectrum> {
    let params = generator_params(args)?;
    debug!(?params, "generating synthetic spectrum");
    if params.count == 0 {
        return Err(anyhow!("--count must be greater than zero"));
    }
    let spectrum = SpectrumGenerator::new(params.seed).generate(&params)?;
    Ok(spectrum)
}

/// Read `x,y` rows. The header row is required; extra columns are ignored.
fn read_spectrum_csv<R: Read>(reader: R) -> Result<Spectrum> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut spectrum = Spectrum::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let line = row + 2;
        let x = parse_field(record.get(0), "x", line)?;
        let y = parse_field(record.get(1), "y", line)?;
        spectrum.add_point(Point::new(x, y))?;
    }
    Ok(spectrum)
}

fn parse_field(field: Option<&str>, name: &str, line: usize) -> Result<f64, ContinuumError> {
    let raw = field.ok_or_else(|| {
        ContinuumError::TypeMismatch(format!("line {}: missing {} column", line, name))
    })?;
    raw.parse::<f64>().map_err(|_| {
        ContinuumError::TypeMismatch(format!("line {}: {} = {:?} is not a number", line, name, raw))
    })
}

fn write_point_rows<W: Write>(points: &[Point], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["x", "y"])?;
    for point in points {
        writer.write_record([point.x.to_string(), point.y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_normalized_rows<W: Write>(
    original: &Spectrum,
    normalized: &Spectrum,
    writer: W,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["x", "y", "normalized_y"])?;
    for (point, scaled) in original.points().iter().zip(normalized.points()) {
        writer.write_record([
            point.x.to_string(),
            point.y.to_string(),
            format!("{:.6}", scaled.y),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

struct ChartData {
    original: Vec<(f64, f64)>,
    hull: Vec<(f64, f64)>,
    normalized: Vec<(f64, f64)>,
}

impl ChartData {
    fn new(original: &Spectrum, hull: &ContinuumHull, normalized: &Spectrum) -> Self {
        let pairs = |xs: Vec<f64>, ys: Vec<f64>| xs.into_iter().zip(ys).collect::<Vec<_>>();
        Self {
            original: pairs(original.x_values(), original.y_values()),
            hull: pairs(hull.hull_x(), hull.hull_y()),
            normalized: pairs(normalized.x_values(), normalized.y_values()),
        }
    }
}

enum ChartKind {
    Png,
    Svg,
}

fn render_chart_guard(charts: &ChartData, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_chart(charts, path, kind).map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(charts: &ChartData, path: &Path, kind: ChartKind) -> Result<()> {
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, (1280, 960)).into_drawing_area();
            draw_chart(root, charts)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (1280, 960)).into_drawing_area();
            draw_chart(root, charts)
        }
    }
}

fn axis_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad)..(hi + pad)
}

fn draw_chart<DB>(root: DrawingArea<DB, plotters::coord::Shift>, charts: &ChartData) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(480);
    let title_font = FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Normal);

    let x_range = axis_range(charts.original.iter().map(|p| p.0));
    let y_range = axis_range(
        charts
            .original
            .iter()
            .chain(charts.hull.iter())
            .map(|p| p.1),
    );
    let mut top = ChartBuilder::on(&upper)
        .caption("The original spectrum and continuum hull", title_font.clone())
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_range.clone(), y_range)?;
    top.configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_label_formatter(&|v| format!("{:.2}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .draw()?;

    let spectrum_color = RGBColor(31, 119, 180);
    let hull_color = RGBColor(255, 127, 14);
    top.draw_series(LineSeries::new(
        charts.original.iter().copied(),
        &spectrum_color,
    ))?
    .label("Spectrum")
    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], spectrum_color));
    top.draw_series(LineSeries::new(charts.hull.iter().copied(), &hull_color))?
        .label("Continuum hull")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], hull_color));
    top.draw_series(
        charts
            .hull
            .iter()
            .map(|&(x, y)| Cross::new((x, y), 5, hull_color.stroke_width(2))),
    )?;
    top.configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    let y_norm = axis_range(charts.normalized.iter().map(|p| p.1));
    let mut bottom = ChartBuilder::on(&lower)
        .caption("The normalized spectrum", title_font)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_range, y_norm)?;
    bottom
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_label_formatter(&|v| format!("{:.2}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .draw()?;
    bottom.draw_series(LineSeries::new(
        charts.normalized.iter().copied(),
        &spectrum_color,
    ))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_csv_and_flags_bad_rows() {
        let spectrum = read_spectrum_csv("x,y\n0,1\n 0.5 , 1.2\n1,2\n".as_bytes()).unwrap();
        assert_eq!(spectrum.x_values(), vec![0.0, 0.5, 1.0]);
        assert!(!spectrum.is_sorted());

        let err = read_spectrum_csv("x,y\n0,abc\n".as_bytes()).unwrap_err();
        let inner = err.downcast_ref::<ContinuumError>().unwrap();
        assert!(matches!(inner, ContinuumError::TypeMismatch(_)));

        let err = read_spectrum_csv("x,y\nNaN,1\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ContinuumError>(),
            Some(ContinuumError::TypeMismatch(_))
        ));
    }

    #[test]
    fn writes_normalized_rows() {
        let mut original = read_spectrum_csv("x,y\n2,1\n0,1\n1,2\n0.5,1.2\n".as_bytes()).unwrap();
        let mut hull = ContinuumHull::new();
        let normalized = hull.normalize_spectrum(&mut original).unwrap();
        let mut out = Vec::new();
        write_normalized_rows(&original, &normalized, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "x,y,normalized_y");
        assert_eq!(lines[2], "0.5,1.2,0.800000");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn input_flag_belongs_to_normalize_only() {
        let cli = Cli::try_parse_from(["continuum", "normalize", "--input", "data.csv"]).unwrap();
        match cli.command {
            Command::Normalize(args) => {
                assert_eq!(args.input, Some(PathBuf::from("data.csv")));
            }
            Command::Generate(_) => panic!("expected normalize"),
        }

        assert!(Cli::try_parse_from(["continuum", "generate", "--input", "data.csv"]).is_err());
        assert!(Cli::try_parse_from(["continuum", "generate", "--count", "5"]).is_ok());
    }

    #[test]
    fn uniform_box_defaults_to_unit_square() {
        let cli = Cli::try_parse_from(["continuum", "generate", "--generator", "uniform"]).unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let params = generator_params(&args.generator).unwrap();
        assert_eq!(params.kind, GeneratorKind::Uniform);
        assert_eq!(
            (params.x_left, params.x_right, params.y_bottom, params.y_top),
            (0.0, 1.0, 0.0, 1.0)
        );
    }

    #[test]
    fn extra_csv_columns_are_ignored() {
        let spectrum = read_spectrum_csv("x,y\n0,1,foo\n1,2\n2,1,bar,baz\n".as_bytes()).unwrap();
        assert_eq!(spectrum.x_values(), vec![0.0, 1.0, 2.0]);
        assert_eq!(spectrum.y_values(), vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn axis_range_pads_degenerate_span() {
        let range = axis_range([1.0, 1.0].into_iter());
        assert!(range.start < 1.0 && range.end > 1.0);
        assert_eq!(axis_range(std::iter::empty()), 0.0..1.0);
    }
}
