// file: src/output/mod.rs
// description: output processing and plotting module exports
// reference: internal module structure

pub mod plot;
pub mod processor;
pub mod reader;

pub use plot::{CsvPlotter, PlotArgument, PlotRenderer, Plotter, PlotterRegistry, SvgPlotter};
pub use processor::{
    CsvProcessor, FileProcessor, JsonProcessor, KeyValueProcessor, LineProcessor, OutputRecord,
    ProcessorRegistry, RegexProcessor,
};
pub use reader::{OutputData, OutputReader};
