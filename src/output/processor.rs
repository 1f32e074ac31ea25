// file: src/output/processor.rs
// description: named output processors turning experiment output files into data
// reference: https://docs.rs/regex

use crate::error::{NeronetError, Result};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const BUILTIN_MODULE: &str = "neronet.processors";

/// Values extracted from a single output line.
pub type OutputRecord = BTreeMap<String, Value>;

/// Reads one line of an output file at a time.
pub trait LineProcessor: Send + Sync {
    fn process_line(&self, line: &str, args: &[String]) -> Result<OutputRecord>;
}

/// Reads an output file as a whole. Must produce a JSON object.
pub trait FileProcessor: Send + Sync {
    fn process_file(&self, content: &str, args: &[String]) -> Result<Value>;
}

/// `<name> <number>` rows. With arguments, only the listed names are kept.
/// Rows whose value is not a number are skipped.
pub struct KeyValueProcessor;

impl LineProcessor for KeyValueProcessor {
    fn process_line(&self, line: &str, args: &[String]) -> Result<OutputRecord> {
        let mut record = OutputRecord::new();
        let mut words = line.split_whitespace();
        if let (Some(name), Some(value), None) = (words.next(), words.next(), words.next())
            && (args.is_empty() || args.iter().any(|arg| arg == name))
            && let Some(number) = parse_number(value)
        {
            record.insert(name.to_string(), number);
        }
        Ok(record)
    }
}

/// Named capture groups of the pattern given as first argument.
#[derive(Default)]
pub struct RegexProcessor {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl RegexProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, pattern: &str) -> Result<Regex> {
        let mut compiled = self
            .compiled
            .lock()
            .map_err(|_| NeronetError::Validation("regex cache poisoned".to_string()))?;
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| NeronetError::Validation(format!("invalid pattern: {}", e)))?;
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl LineProcessor for RegexProcessor {
    fn process_line(&self, line: &str, args: &[String]) -> Result<OutputRecord> {
        let pattern = args.first().ok_or_else(|| {
            NeronetError::Validation("regex processor needs a pattern argument".to_string())
        })?;
        let regex = self.pattern(pattern)?;

        let mut record = OutputRecord::new();
        if let Some(captures) = regex.captures(line) {
            for name in regex.capture_names().flatten() {
                if let Some(value) = captures.name(name) {
                    record.insert(name.to_string(), parse_scalar(value.as_str()));
                }
            }
        }
        Ok(record)
    }
}

pub struct JsonProcessor;

impl FileProcessor for JsonProcessor {
    fn process_file(&self, content: &str, _args: &[String]) -> Result<Value> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Header row names the columns; each column becomes a list. The optional
/// first argument is a single byte delimiter.
pub struct CsvProcessor;

impl FileProcessor for CsvProcessor {
    fn process_file(&self, content: &str, args: &[String]) -> Result<Value> {
        let delimiter = match args.first().map(String::as_bytes) {
            None => b',',
            Some([byte]) => *byte,
            Some(_) => {
                return Err(NeronetError::Validation(format!(
                    "csv delimiter must be a single byte, got '{}'",
                    args[0]
                )));
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); header.len()];
        for row in reader.records() {
            let row = row?;
            for (column, cell) in columns.iter_mut().zip(row.iter()) {
                column.push(parse_scalar(cell));
            }
        }

        let object = header
            .into_iter()
            .zip(columns)
            .map(|(name, values)| (name, Value::Array(values)))
            .collect::<Map<String, Value>>();
        Ok(Value::Object(object))
    }
}

/// Processors addressable as `<module> <function>`.
pub struct ProcessorRegistry {
    line: HashMap<String, Arc<dyn LineProcessor>>,
    file: HashMap<String, Arc<dyn FileProcessor>>,
}

impl ProcessorRegistry {
    pub fn empty() -> Self {
        Self {
            line: HashMap::new(),
            file: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_line(BUILTIN_MODULE, "key_value", Arc::new(KeyValueProcessor));
        registry.register_line(BUILTIN_MODULE, "regex", Arc::new(RegexProcessor::new()));
        registry.register_file(BUILTIN_MODULE, "json", Arc::new(JsonProcessor));
        registry.register_file(BUILTIN_MODULE, "csv", Arc::new(CsvProcessor));
        registry
    }

    pub fn register_line(&mut self, module: &str, function: &str, processor: Arc<dyn LineProcessor>) {
        debug!("Registering line processor {} {}", module, function);
        self.line.insert(format!("{} {}", module, function), processor);
    }

    pub fn register_file(&mut self, module: &str, function: &str, processor: Arc<dyn FileProcessor>) {
        debug!("Registering file processor {} {}", module, function);
        self.file.insert(format!("{} {}", module, function), processor);
    }

    pub fn line(&self, key: &str) -> Option<Arc<dyn LineProcessor>> {
        self.line.get(key).cloned()
    }

    pub fn file(&self, key: &str) -> Option<Arc<dyn FileProcessor>> {
        self.file.get(key).cloned()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Integers, then floats, then plain text.
pub fn parse_scalar(text: &str) -> Value {
    parse_number(text).unwrap_or_else(|| Value::String(text.to_string()))
}

/// Integer or finite float.
pub fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_value_lines() {
        let processor = KeyValueProcessor;
        let record = processor.process_line("loss 0.25\n", &[]).unwrap();
        assert_eq!(record.get("loss"), Some(&json!(0.25)));

        let filtered = processor
            .process_line("epoch 3", &["loss".to_string()])
            .unwrap();
        assert!(filtered.is_empty());

        assert!(processor.process_line("Starting training now", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_key_value_skips_non_numeric_rows() {
        let processor = KeyValueProcessor;
        assert!(processor.process_line("nothing useful", &[]).unwrap().is_empty());
        assert!(processor.process_line("status nan", &[]).unwrap().is_empty());

        let record = processor.process_line("epoch 12", &[]).unwrap();
        assert_eq!(record.get("epoch"), Some(&json!(12)));
    }

    #[test]
    fn test_regex_named_captures() {
        let processor = RegexProcessor::new();
        let args = vec![r"epoch (?P<epoch>\d+): loss=(?P<loss>[\d.]+)".to_string()];

        let record = processor.process_line("epoch 4: loss=0.5", &args).unwrap();
        assert_eq!(record.get("epoch"), Some(&json!(4)));
        assert_eq!(record.get("loss"), Some(&json!(0.5)));

        assert!(processor.process_line("warming up", &args).unwrap().is_empty());
        assert!(processor.process_line("x", &[]).is_err());
        assert!(processor.process_line("x", &["(".to_string()]).is_err());
    }

    #[test]
    fn test_json_file() {
        let value = JsonProcessor
            .process_file(r#"{"accuracy": 0.9}"#, &[])
            .unwrap();
        assert_eq!(value, json!({"accuracy": 0.9}));
        assert!(JsonProcessor.process_file("not json", &[]).is_err());
    }

    #[test]
    fn test_csv_columns() {
        let value = CsvProcessor
            .process_file("epoch,loss\n1,0.9\n2,0.5\n", &[])
            .unwrap();
        assert_eq!(value, json!({"epoch": [1, 2], "loss": [0.9, 0.5]}));

        let tabbed = CsvProcessor
            .process_file("a;b\nx;y\n", &[";".to_string()])
            .unwrap();
        assert_eq!(tabbed, json!({"a": ["x"], "b": ["y"]}));

        assert!(CsvProcessor.process_file("a,b\n1\n", &[]).is_err());
        assert!(CsvProcessor.process_file("a,b\n1,2\n", &["::".to_string()]).is_err());
    }

    #[test]
    fn test_csv_quoted_cells() {
        let value = CsvProcessor
            .process_file("name,score\n\"smith, j\",1\n\"say \"\"hi\"\"\",2\n", &[])
            .unwrap();
        assert_eq!(
            value,
            json!({"name": ["smith, j", "say \"hi\""], "score": [1, 2]})
        );
    }

    #[test]
    fn test_csv_empty_file() {
        assert_eq!(CsvProcessor.process_file("", &[]).unwrap(), json!({}));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProcessorRegistry::default();
        assert!(registry.line("neronet.processors key_value").is_some());
        assert!(registry.file("neronet.processors csv").is_some());
        assert!(registry.line("neronet.processors csv").is_none());
        assert!(ProcessorRegistry::empty().file("neronet.processors json").is_none());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("3"), json!(3));
        assert_eq!(parse_scalar("3.5"), json!(3.5));
        assert_eq!(parse_scalar("nan"), json!("nan"));
        assert_eq!(parse_scalar("done"), json!("done"));
        assert_eq!(parse_number("done"), None);
        assert_eq!(parse_number("-2"), Some(json!(-2)));
    }
}
