// file: src/output/plot.rs
// description: renders experiment output series into plot files
// reference: named plotters fed by output processors

use crate::error::{NeronetError, Result};
use crate::models::Experiment;
use crate::output::reader::{OutputData, OutputReader};
use crate::parser::split_args;
use crate::utils::Validator;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const BUILTIN_MODULE: &str = "neronet.plotters";

/// An argument handed to a plotter: an output series or a plain word.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotArgument {
    Series { name: String, values: Value },
    Literal(String),
}

/// Draws plot data to `destination`. The returned feedback is handed back
/// on the next call for the same plot, letting plotters keep state between
/// redraws.
pub trait Plotter: Send + Sync {
    fn plot(
        &self,
        destination: &Path,
        feedback: Option<Value>,
        data: &[PlotArgument],
    ) -> Result<Option<Value>>;
}

/// Writes every series as a column of a CSV file.
pub struct CsvPlotter;

impl Plotter for CsvPlotter {
    fn plot(
        &self,
        destination: &Path,
        _feedback: Option<Value>,
        data: &[PlotArgument],
    ) -> Result<Option<Value>> {
        let series: Vec<(&str, Vec<&Value>)> = data
            .iter()
            .filter_map(|arg| match arg {
                PlotArgument::Series { name, values } => Some((name.as_str(), values_of(values))),
                PlotArgument::Literal(_) => None,
            })
            .collect();

        let rows = series.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
        let mut writer = csv::Writer::from_path(destination)?;
        writer.write_record(series.iter().map(|(name, _)| *name))?;
        for row in 0..rows {
            writer.write_record(
                series
                    .iter()
                    .map(|(_, values)| values.get(row).map(|v| cell(v)).unwrap_or_default()),
            )?;
        }
        writer.flush().map_err(|source| NeronetError::FileOperation {
            path: destination.to_path_buf(),
            source,
        })?;
        Ok(None)
    }
}

/// Line chart of numeric series as SVG. Literal arguments form the title.
pub struct SvgPlotter {
    pub width: f64,
    pub height: f64,
}

const COLORS: [&str; 6] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];
const MARGIN: f64 = 40.0;

impl Default for SvgPlotter {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 400.0,
        }
    }
}

impl Plotter for SvgPlotter {
    fn plot(
        &self,
        destination: &Path,
        feedback: Option<Value>,
        data: &[PlotArgument],
    ) -> Result<Option<Value>> {
        let mut title = Vec::new();
        let mut series = Vec::new();
        for arg in data {
            match arg {
                PlotArgument::Series { name, values } => {
                    let points: Vec<f64> =
                        values_of(values).iter().filter_map(|v| v.as_f64()).collect();
                    series.push((name.as_str(), points));
                }
                PlotArgument::Literal(word) => title.push(word.as_str()),
            }
        }

        if series.iter().all(|(_, points)| points.is_empty()) {
            return Err(NeronetError::Validation("nothing numeric to plot".to_string()));
        }

        let all = series.iter().flat_map(|(_, points)| points.iter().copied());
        let (min, max) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let span = if max > min { max - min } else { 1.0 };
        let longest = series.iter().map(|(_, p)| p.len()).max().unwrap_or(1).max(2);
        let plot_w = self.width - 2.0 * MARGIN;
        let plot_h = self.height - 2.0 * MARGIN;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="14">{}</text>"#,
            MARGIN,
            MARGIN / 2.0,
            escape(&title.join(" "))
        );
        let _ = writeln!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#999"/>"##,
            MARGIN, MARGIN, plot_w, plot_h
        );

        for (index, (name, points)) in series.iter().enumerate() {
            let color = COLORS[index % COLORS.len()];
            let coords: Vec<String> = points
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let x = MARGIN + plot_w * i as f64 / (longest - 1) as f64;
                    let y = MARGIN + plot_h * (1.0 - (v - min) / span);
                    format!("{:.1},{:.1}", x, y)
                })
                .collect();
            let _ = writeln!(
                svg,
                r#"<polyline fill="none" stroke="{}" points="{}"/>"#,
                color,
                coords.join(" ")
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{}" font-size="12" fill="{}">{}</text>"#,
                self.width - MARGIN - 120.0,
                MARGIN + 16.0 * (index as f64 + 1.0),
                color,
                escape(name)
            );
        }
        svg.push_str("</svg>\n");

        fs::write(destination, svg).map_err(|source| NeronetError::FileOperation {
            path: destination.to_path_buf(),
            source,
        })?;

        let redraws = feedback
            .as_ref()
            .and_then(|f| f.get("redraws"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(Some(json!({ "redraws": redraws + 1, "min": min, "max": max })))
    }
}

pub struct PlotterRegistry {
    plotters: HashMap<String, Arc<dyn Plotter>>,
}

impl PlotterRegistry {
    pub fn empty() -> Self {
        Self {
            plotters: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(BUILTIN_MODULE, "csv", Arc::new(CsvPlotter));
        registry.register(BUILTIN_MODULE, "svg", Arc::new(SvgPlotter::default()));
        registry
    }

    pub fn register(&mut self, module: &str, function: &str, plotter: Arc<dyn Plotter>) {
        self.plotters.insert(format!("{} {}", module, function), plotter);
    }

    pub fn get(&self, module: &str, function: &str) -> Option<Arc<dyn Plotter>> {
        self.plotters.get(&format!("{} {}", module, function)).cloned()
    }
}

impl Default for PlotterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Resolves plot definitions of the form
/// `<module> <function> <output file> [args...]` and runs the plotter.
pub struct PlotRenderer {
    reader: OutputReader,
    plotters: Arc<PlotterRegistry>,
}

impl PlotRenderer {
    pub fn new(reader: OutputReader, plotters: Arc<PlotterRegistry>) -> Self {
        Self { reader, plotters }
    }

    pub fn plot(
        &self,
        experiment: &Experiment,
        plot_name: &str,
        feedback: Option<Value>,
    ) -> Result<(PathBuf, Option<Value>)> {
        let id = experiment.id.as_str();
        let spec = experiment
            .plot
            .get(plot_name)
            .ok_or_else(|| NeronetError::plot(id, format!("no plot named {} defined", plot_name)))?;

        let words = split_args(spec);
        let [module, function, output_file, plot_args @ ..] = words.as_slice() else {
            return Err(NeronetError::plot(id, "couldn't parse plot arguments"));
        };

        let plotter = self.plotters.get(module, function).ok_or_else(|| {
            NeronetError::plot(id, format!("couldn't import {} from {}", function, module))
        })?;

        Validator::validate_file_name(plot_name)
            .map_err(|e| NeronetError::plot(id, e.to_string()))?;

        let output = self.reader.read(experiment, output_file)?;
        let data = plot_arguments(plot_args, &output);

        let results_dir = experiment.results_dir(self.reader.data_dir());
        fs::create_dir_all(&results_dir)?;
        let destination = results_dir.join(plot_name);
        debug!("{}: plotting {} with {} {}", id, destination.display(), module, function);

        let feedback = plotter.plot(&destination, feedback, &data).map_err(|e| {
            NeronetError::plot(
                id,
                format!(
                    "couldn't plot {}, maybe something is wrong with the plot function? ({})",
                    plot_name, e
                ),
            )
        })?;
        Ok((destination, feedback))
    }

    pub fn plot_outputs(&self, experiment: &Experiment) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(experiment.plot.len());
        for plot_name in experiment.plot.keys() {
            let (path, _) = self.plot(experiment, plot_name, None)?;
            info!("{}: wrote plot {}", experiment.id, path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn plot_arguments(args: &[String], output: &OutputData) -> Vec<PlotArgument> {
    args.iter()
        .map(|arg| match output.get(arg) {
            Some(values) => PlotArgument::Series {
                name: arg.clone(),
                values: values.clone(),
            },
            None => PlotArgument::Literal(arg.clone()),
        })
        .collect()
}

fn values_of(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
