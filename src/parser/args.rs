// file: src/parser/args.rs
// description: quote-aware word splitting for processor and plot definitions
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD: Regex = Regex::new(
        r#""((?:[^"\\]|\\.)*)"|'([^']*)'|(\S+)"#
    ).expect("WORD regex is valid");
}

/// Splits a processor or plot definition into words. Single and double
/// quotes group words and are removed; `\"` inside double quotes is a literal quote.
pub fn split_args(spec: &str) -> Vec<String> {
    WORD.captures_iter(spec)
        .filter_map(|caps| {
            if let Some(double) = caps.get(1) {
                Some(double.as_str().replace("\\\"", "\"").replace("\\\\", "\\"))
            } else if let Some(single) = caps.get(2) {
                Some(single.as_str().to_string())
            } else {
                caps.get(3).map(|bare| bare.as_str().to_string())
            }
        })
        .collect()
}

/// Module, function and remaining arguments of a processor or plot definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    pub module: String,
    pub function: String,
    pub args: Vec<String>,
}

impl CallSpec {
    pub fn parse(spec: &str) -> Option<Self> {
        let mut words = split_args(spec).into_iter();
        let module = words.next()?;
        let function = words.next()?;
        Some(Self {
            module,
            function,
            args: words.collect(),
        })
    }

    pub fn key(&self) -> String {
        format!("{} {}", self.module, self.function)
    }
}
