use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;

use derive_builder::Builder;
use getset::Getters;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::data_dictionary::*;
use crate::dictionary_errors::*;
use crate::report::{Report, Section};

const ENUM_SEPARATOR: char = '|';
const VALUE_SEPARATOR: char = ':';
const REQUIRED_COLUMNS: [&str; 6] =
    ["msg_type", "msg_name", "tag_number", "field_name", "required", "format"];

/// Root attributes and message category stamped on a generated dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Builder)]
#[builder(setter(into), build_fn(skip))]
#[getset(get = "pub")]
pub struct GenerateOptions {
    fix_type: String,
    major: String,
    minor: String,
    servicepack: String,
    msgcat: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            fix_type: "FIX".to_string(),
            major: "4".to_string(),
            minor: "4".to_string(),
            servicepack: "0".to_string(),
            msgcat: "app".to_string(),
        }
    }
}

impl GenerateOptions {
    fn root_attributes(&self) -> Attributes {
        [
            ("type", &self.fix_type),
            ("major", &self.major),
            ("minor", &self.minor),
            ("servicepack", &self.servicepack),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

impl GenerateOptionsBuilder {
    /// Unset values fall back to `GenerateOptions::default()`.
    pub fn build(&self) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        GenerateOptions {
            fix_type: self.fix_type.clone().unwrap_or(defaults.fix_type),
            major: self.major.clone().unwrap_or(defaults.major),
            minor: self.minor.clone().unwrap_or(defaults.minor),
            servicepack: self.servicepack.clone().unwrap_or(defaults.servicepack),
            msgcat: self.msgcat.clone().unwrap_or(defaults.msgcat),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    msg_type: String,
    msg_name: String,
    tag_number: String,
    field_name: String,
    required: String,
    format: String,
    #[serde(default)]
    enum_values: String,
}

#[derive(Debug)]
struct MessageDraft {
    name: String,
    members: Vec<Member>,
    tags: HashSet<u32>,
}

#[derive(Debug, Default)]
struct Generator {
    messages: IndexMap<String, MessageDraft>,
    fields: IndexMap<u32, FieldDef>,
    tags_by_name: HashMap<String, u32>,
    report: Report,
}

impl Generator {
    fn add_row(&mut self, line: u64, row: CsvRow) -> DResult<()> {
        let msg_type = non_empty(line, "msg_type", &row.msg_type)?;
        let msg_name = non_empty(line, "msg_name", &row.msg_name)?;
        let field_name = non_empty(line, "field_name", &row.field_name)?;
        let field_type = non_empty(line, "format", &row.format)?.to_ascii_uppercase();
        let tag = row.tag_number.parse::<u32>().map_err(|e| {
            DictError::malformed_row(line, format!("tag_number '{}': {}", row.tag_number, e))
        })?;
        let required = parse_required(line, &row.required)?;
        let values = parse_enum_values(line, tag, &row.enum_values)?;

        if let Some(draft) = self.messages.get(msg_type) {
            if draft.name != msg_name {
                self.report.conflict(
                    Section::Messages,
                    msg_type,
                    format!(
                        "line {}: named {} but first seen as {}, row skipped",
                        line, msg_name, draft.name
                    ),
                );
                return Ok(());
            }
        }

        let candidate = FieldDef::new(tag, field_name, &field_type, values);
        match self.fields.get(&tag) {
            Some(existing) if existing.same_definition(&candidate) => {
                self.report.duplicate(
                    Section::Fields,
                    tag,
                    format!("line {}: {} already defined", line, existing),
                );
            }
            Some(existing) => {
                self.report.conflict(
                    Section::Fields,
                    tag,
                    format!("line {}: {} conflicts with {}, row skipped", line, candidate, existing),
                );
                return Ok(());
            }
            None => {
                if let Some(other) = self.tags_by_name.get(field_name) {
                    self.report.conflict(
                        Section::Fields,
                        tag,
                        format!(
                            "line {}: name {} already belongs to tag {}, row skipped",
                            line, field_name, other
                        ),
                    );
                    return Ok(());
                }
                self.tags_by_name.insert(field_name.to_string(), tag);
                self.fields.insert(tag, candidate);
            }
        }

        let draft = self.messages.entry(msg_type.to_string()).or_insert_with(|| MessageDraft {
            name: msg_name.to_string(),
            members: Vec::new(),
            tags: HashSet::new(),
        });
        if draft.tags.insert(tag) {
            draft.members.push(Member::field(field_name, required));
        } else {
            debug!(msg_type, tag, line, "field already referenced by message");
        }
        Ok(())
    }

    fn finish(self, options: &GenerateOptions) -> (FixDictionary, Report) {
        let mut dd = FixDictionary::new(options.root_attributes());
        for (msg_type, draft) in self.messages {
            let message = Message::new(&draft.name, &msg_type, options.msgcat(), draft.members);
            dd.messages.insert(msg_type, message);
        }
        dd.fields = self.fields;
        info!(messages = dd.messages.len(), fields = dd.fields.len(), "custom dictionary generated");
        (dd, self.report)
    }
}

/// Builds a custom dictionary from csv rows. Rows are grouped into messages
/// by `msg_type` and every distinct `tag_number` gets one field definition.
pub fn generate<R: io::Read>(
    input: R, options: &GenerateOptions,
) -> DResult<(FixDictionary, Report)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DictError::malformed_row(1, format!("missing column {}", column)));
        }
    }

    let mut generator = Generator::default();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|e| DictError::malformed_row(line, e.to_string()))?;
        generator.add_row(line, row)?;
    }
    Ok(generator.finish(options))
}

pub fn generate_file<P: AsRef<Path>, Q: AsRef<Path>>(
    csv_path: P, output: Q, options: &GenerateOptions,
) -> DResult<Report> {
    let csv_path = csv_path.as_ref();
    let file = File::open(csv_path).map_err(|e| DictError::from_io(csv_path.to_path_buf(), e))?;
    let (dd, report) = generate(file, options)?;
    dd.save(&output)?;
    info!(output = %output.as_ref().display(), "FIX xml generated");
    report.log_summary("generate");
    Ok(report)
}

fn non_empty<'a>(line: u64, column: &str, value: &'a str) -> DResult<&'a str> {
    if value.is_empty() {
        Err(DictError::malformed_row(line, format!("empty {}", column)))
    } else {
        Ok(value)
    }
}

fn parse_required(line: u64, raw: &str) -> DResult<bool> {
    match raw.to_ascii_uppercase().as_str() {
        "Y" => Ok(true),
        "N" => Ok(false),
        _ => Err(DictError::malformed_row(line, format!("required must be Y or N, got '{}'", raw))),
    }
}

/// `value:description` pairs joined by `|`. Delimiters cannot be escaped,
/// so any extra `:` or an empty side is rejected.
fn parse_enum_values(line: u64, tag: u32, raw: &str) -> DResult<Vec<FieldValue>> {
    let mut values: Vec<FieldValue> = Vec::new();
    if raw.trim().is_empty() {
        return Ok(values);
    }
    for part in raw.split(ENUM_SEPARATOR) {
        let mut pieces = part.split(VALUE_SEPARATOR).map(str::trim);
        let (value, description) = match (pieces.next(), pieces.next(), pieces.next()) {
            (Some(v), Some(d), None) if !v.is_empty() && !d.is_empty() => (v, d),
            _ => {
                return Err(DictError::malformed_row(
                    line,
                    format!("invalid enum format for tag {}: '{}'", tag, part),
                ))
            }
        };
        if values.iter().any(|v| v.value() == value) {
            return Err(DictError::malformed_row(
                line,
                format!("enum value {} repeated for tag {}", value, tag),
            ));
        }
        values.push(FieldValue::new(value, description));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FindingKind;
    use assert_matches::*;

    const HEADER: &str = "msg_type,msg_name,tag_number,field_name,required,format,enum_values\n";

    fn run(rows: &str) -> DResult<(FixDictionary, Report)> {
        let csv = format!("{}{}", HEADER, rows);
        generate(csv.as_bytes(), &GenerateOptions::default())
    }

    fn field_refs(dd: &FixDictionary) -> usize {
        dd.messages().values().map(|m| m.members().len()).sum()
    }

    #[test]
    fn test_messages_and_fields() {
        let rows = "\
C01,CustomOrder,20001,CustomOrderID,Y,string,
C01,CustomOrder,20002,CustomSide,N,char,1:BUY|2:SELL
C01,CustomOrder,55,Symbol,Y,STRING,
C02,CustomCancel,20010,CancelCode,Y,INT,
";
        let (dd, report) = run(rows).unwrap();
        assert!(report.is_empty());
        assert_eq!(2, dd.messages().len());
        assert_eq!(4, dd.fields().len());
        assert_eq!(4, field_refs(&dd));
        assert_eq!("FIX.4.4", dd.begin_string());

        let order = dd.message("C01").unwrap();
        assert_eq!("CustomOrder", order.name());
        assert_eq!(Some(&"app".to_string()), order.attributes().get("msgcat"));
        let names: Vec<&str> = order.members().iter().map(|m| m.name().as_str()).collect();
        assert_eq!(vec!["CustomOrderID", "CustomSide", "Symbol"], names);
        assert!(order.members()[0].required());
        assert!(!order.members()[1].required());

        let side = dd.field(20002).unwrap();
        assert_eq!("CHAR", side.field_type());
        assert_eq!(2, side.values().len());
        assert_eq!("SELL", side.values()[1].description());
        dd.check_references().unwrap();
    }

    #[test]
    fn test_shared_tag_defined_once() {
        let rows = "\
C01,CustomOrder,55,Symbol,Y,STRING,
C02,CustomCancel,55,Symbol,N,STRING,
C03,CustomQuote,55,Symbol,Y,STRING,
";
        let (dd, report) = run(rows).unwrap();
        assert_eq!(3, dd.messages().len());
        assert_eq!(1, dd.fields().len());
        assert_eq!(3, field_refs(&dd));
        assert_eq!(2, report.duplicates().count());
        assert_eq!(0, report.conflicts().count());
    }

    #[test]
    fn test_conflicting_tag_skips_row() {
        let rows = "\
C01,CustomOrder,55,Symbol,Y,STRING,
C02,CustomCancel,55,Ticker,Y,STRING,
C02,CustomCancel,20010,CancelCode,Y,INT,
";
        let (dd, report) = run(rows).unwrap();
        assert_eq!("Symbol", dd.field(55).unwrap().name());
        assert_eq!(1, dd.message("C02").unwrap().members().len());
        let conflicts: Vec<_> = report.conflicts().collect();
        assert_eq!(1, conflicts.len());
        assert_eq!(Section::Fields, conflicts[0].section());
        assert_eq!("55", conflicts[0].key());
    }

    #[test]
    fn test_name_bound_to_other_tag() {
        let rows = "\
C01,CustomOrder,55,Symbol,Y,STRING,
C01,CustomOrder,20055,Symbol,Y,STRING,
";
        let (dd, report) = run(rows).unwrap();
        assert_eq!(1, dd.fields().len());
        assert_eq!(1, report.conflicts().count());
    }

    #[test]
    fn test_repeated_tag_in_message() {
        let rows = "\
C01,CustomOrder,55,Symbol,Y,STRING,
C01,CustomOrder,55,Symbol,Y,STRING,
";
        let (dd, report) = run(rows).unwrap();
        assert_eq!(1, dd.message("C01").unwrap().members().len());
        assert_eq!(FindingKind::Duplicate, report.findings()[0].kind());
    }

    #[test]
    fn test_message_name_mismatch() {
        let rows = "\
C01,CustomOrder,20001,CustomOrderID,Y,STRING,
C01,OtherName,20002,CustomSide,Y,CHAR,
";
        let (dd, report) = run(rows).unwrap();
        assert_eq!(1, dd.message("C01").unwrap().members().len());
        assert!(dd.field(20002).is_none());
        assert_eq!(Section::Messages, report.conflicts().next().unwrap().section());
    }

    #[test]
    fn test_malformed_enum_values() {
        let missing_colon = "C01,CustomOrder,20002,CustomSide,N,CHAR,1:BUY|2\n";
        assert_matches!(run(missing_colon), Err(DictError::MalformedRow { line: 2, .. }));

        let extra_colon = "C01,CustomOrder,20002,CustomSide,N,CHAR,1:BUY:NOW\n";
        assert_matches!(run(extra_colon), Err(DictError::MalformedRow { .. }));

        let empty_part = "C01,CustomOrder,20002,CustomSide,N,CHAR,1:BUY||2:SELL\n";
        assert_matches!(run(empty_part), Err(DictError::MalformedRow { .. }));

        let repeated = "C01,CustomOrder,20002,CustomSide,N,CHAR,1:BUY|1:SELL\n";
        assert_matches!(run(repeated), Err(DictError::MalformedRow { .. }));
    }

    #[test]
    fn test_enum_values_trimmed() {
        let values = parse_enum_values(2, 54, " 1 : BUY | 2 : SELL ").unwrap();
        assert_eq!(2, values.len());
        assert_eq!("1", values[0].value());
        assert_eq!("SELL", values[1].description());
        assert!(parse_enum_values(2, 54, "  ").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_cells() {
        let bad_tag = "C01,CustomOrder,abc,CustomOrderID,Y,STRING,\n";
        assert_matches!(run(bad_tag), Err(DictError::MalformedRow { line: 2, .. }));

        let bad_required = "C01,CustomOrder,20001,CustomOrderID,maybe,STRING,\n";
        assert_matches!(run(bad_required), Err(DictError::MalformedRow { .. }));

        let empty_name = "C01,CustomOrder,20001,,Y,STRING,\n";
        assert_matches!(run(empty_name), Err(DictError::MalformedRow { .. }));

        let short_row = "C01,CustomOrder,20001\n";
        assert_matches!(run(short_row), Err(DictError::Csv(_)));
    }

    #[test]
    fn test_missing_column() {
        let csv = "msg_type,msg_name,tag_number,field_name,required\nC01,A,1,B,Y\n";
        let result = generate(csv.as_bytes(), &GenerateOptions::default());
        assert_matches!(result, Err(DictError::MalformedRow { line: 1, reason }) if reason.contains("format"));
    }

    #[test]
    fn test_enum_column_optional() {
        let csv = "msg_type,msg_name,tag_number,field_name,required,format\nC01,A,20001,B,Y,int\n";
        let (dd, _) = generate(csv.as_bytes(), &GenerateOptions::default()).unwrap();
        assert!(dd.field(20001).unwrap().values().is_empty());
    }

    #[test]
    fn test_options_builder() {
        let options = GenerateOptionsBuilder::default().minor("2").msgcat("admin").build();
        assert_eq!("2", options.minor());
        assert_eq!("admin", options.msgcat());
        assert_eq!("FIX", options.fix_type());

        let (dd, _) = generate(
            format!("{}C01,A,20001,B,Y,INT,\n", HEADER).as_bytes(),
            &options,
        )
        .unwrap();
        assert_eq!("FIX.4.2", dd.begin_string());
        assert_eq!(Some(&"admin".to_string()), dd.message("C01").unwrap().attributes().get("msgcat"));
    }

    #[test]
    fn test_missing_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = generate_file(
            dir.path().join("absent.csv"),
            dir.path().join("out.xml"),
            &GenerateOptions::default(),
        );
        assert_matches!(result, Err(DictError::MissingFile { .. }));
    }
}
