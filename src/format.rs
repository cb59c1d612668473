//! Report exporters: text table, CSV, XML and JSON.

use crate::batch::ScanResult;
use crate::report::ModuleExportReport;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

/// Output format for a set of scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Table,
    Csv,
    Xml,
    Json,
}

impl Format {
    /// Guess the format from a file extension. Unknown extensions give `None`.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xml" => Some(Self::Xml),
            "json" => Some(Self::Json),
            "txt" => Some(Self::Table),
            _ => None,
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Render every successfully decoded report. Files that failed or had no
/// exports are left out; callers report them separately.
pub fn render<W: Write>(format: Format, results: &[ScanResult], out: &mut W) -> io::Result<()> {
    match format {
        Format::Table => write_table(results, out),
        Format::Csv => write_csv(results, out),
        Format::Xml => write_xml(results, out),
        Format::Json => write_json(results, out),
    }
}

fn decoded(results: &[ScanResult]) -> impl Iterator<Item = (&ScanResult, &ModuleExportReport)> {
    results.iter().filter_map(|r| r.report().map(|rep| (r, rep)))
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub fn write_table<W: Write>(results: &[ScanResult], out: &mut W) -> io::Result<()> {
    for (result, report) in decoded(results) {
        writeln!(out, "{}: {}", result.path.display(), report)?;
        writeln!(
            out,
            "  arch: {} ({})",
            report.machine.name(),
            if report.is_64bit() { "PE32+" } else { "PE32" }
        )?;
        writeln!(out, "  {:<8} {:<12} Name", "Ordinal", "EntryPoint")?;
        for func in &report.functions {
            writeln!(
                out,
                "  {:<8} {:<12} {}",
                func.ordinal,
                func.entry_point.to_string(),
                func.name
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

const CSV_COLUMNS: [&str; 8] = [
    "File",
    "x86",
    "x64",
    "Module",
    "EntryPoint",
    "Ordinal",
    "Name",
    "Path",
];

fn csv_field<W: Write>(out: &mut W, field: &str) -> io::Result<()> {
    if field.contains([';', '"', '\r', '\n']) {
        write!(out, "\"{}\";", field.replace('"', "\"\""))
    } else {
        write!(out, "{field};")
    }
}

/// Semicolon separated, every field terminated by `;`, CRLF line endings.
pub fn write_csv<W: Write>(results: &[ScanResult], out: &mut W) -> io::Result<()> {
    write!(out, "# DLL export list\r\n#\r\n")?;
    for column in CSV_COLUMNS {
        csv_field(out, column)?;
    }
    write!(out, "\r\n")?;

    for (result, report) in decoded(results) {
        let file = result.file_name();
        let path = result.path.display().to_string();
        for func in &report.functions {
            csv_field(out, &file)?;
            csv_field(out, bool_text(report.is_32bit()))?;
            csv_field(out, bool_text(report.is_64bit()))?;
            csv_field(out, &report.module_name)?;
            csv_field(out, &func.entry_point.to_string())?;
            csv_field(out, &func.ordinal.to_string())?;
            csv_field(out, &func.name)?;
            csv_field(out, &path)?;
            write!(out, "\r\n")?;
        }
    }
    Ok(())
}

/// Escape text for XML element content.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // Not representable in XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {
                escaped.push_str(&format!("\\x{:02X}", c as u32))
            }
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn write_xml<W: Write>(results: &[ScanResult], out: &mut W) -> io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
    writeln!(out, "<ArrayOfDllExportList>")?;
    for (_, report) in decoded(results) {
        writeln!(out, "  <DllExportList>")?;
        writeln!(
            out,
            "    <ModuleName>{}</ModuleName>",
            escape_xml(&report.module_name)
        )?;
        writeln!(out, "    <OrdinalBase>{}</OrdinalBase>", report.ordinal_base)?;
        writeln!(
            out,
            "    <FunctionsCount>{}</FunctionsCount>",
            report.function_count
        )?;
        writeln!(out, "    <NamesCount>{}</NamesCount>", report.name_count)?;
        writeln!(out, "    <x86>{}</x86>", report.is_32bit())?;
        writeln!(out, "    <x64>{}</x64>", report.is_64bit())?;
        writeln!(out, "    <Functions>")?;
        for func in &report.functions {
            writeln!(out, "      <ExportFunction>")?;
            writeln!(out, "        <Name>{}</Name>", escape_xml(&func.name))?;
            writeln!(
                out,
                "        <EntryPoint>{}</EntryPoint>",
                escape_xml(&func.entry_point.to_string())
            )?;
            writeln!(out, "        <Ordinal>{}</Ordinal>", func.ordinal)?;
            writeln!(out, "        <Address>{}</Address>", func.address)?;
            writeln!(out, "      </ExportFunction>")?;
        }
        writeln!(out, "    </Functions>")?;
        writeln!(out, "  </DllExportList>")?;
    }
    writeln!(out, "</ArrayOfDllExportList>")
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    path: String,
    #[serde(flatten)]
    report: &'a ModuleExportReport,
}

pub fn write_json<W: Write>(results: &[ScanResult], out: &mut W) -> io::Result<()> {
    let reports: Vec<FileReport<'_>> = decoded(results)
        .map(|(result, report)| FileReport {
            file: result.file_name(),
            path: result.path.display().to_string(),
            report,
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &reports)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ScanOutcome;
    use crate::builder::DllBuilder;
    use crate::decoder::decode_bytes;
    use crate::Error;
    use std::path::PathBuf;

    fn results() -> Vec<ScanResult> {
        let dll = DllBuilder::new()
            .module_name("a&b.dll")
            .export("Foo", 0x1000)
            .forward("Bar", "KERNEL32.Sleep")
            .build();
        vec![
            ScanResult {
                path: PathBuf::from("dir/a.dll"),
                outcome: ScanOutcome::Exports(decode_bytes(&dll).unwrap()),
            },
            ScanResult {
                path: PathBuf::from("dir/broken.dll"),
                outcome: ScanOutcome::Failed(Error::EmptyFile),
            },
        ]
    }

    fn render_string(format: Format) -> String {
        let mut buf = Vec::new();
        render(format, &results(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<Format>().unwrap(), Format::Csv);
        assert!("yaml".parse::<Format>().is_err());
        assert_eq!(Format::from_extension(Path::new("out.XML")), Some(Format::Xml));
        assert_eq!(Format::from_extension(Path::new("out.json")), Some(Format::Json));
        assert_eq!(Format::from_extension(Path::new("out")), None);
    }

    #[test]
    fn test_csv() {
        let csv = render_string(Format::Csv);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert!(lines[0].starts_with('#'));
        assert!(lines.contains(&"File;x86;x64;Module;EntryPoint;Ordinal;Name;Path;"));

        let rows: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| l.starts_with("a.dll;"))
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&"a.dll;True;False;a&b.dll;0x00001000;1;Foo;dir/a.dll;"));
        assert!(rows.iter().any(|r| r.contains(";KERNEL32.Sleep;")));
        assert!(!csv.contains("broken.dll"));
    }

    #[test]
    fn test_csv_quotes_separators() {
        let mut buf = Vec::new();
        csv_field(&mut buf, "a;b").unwrap();
        csv_field(&mut buf, "plain").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"a;b\";plain;");
    }

    #[test]
    fn test_xml() {
        let xml = render_string(Format::Xml);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains("<ModuleName>a&amp;b.dll</ModuleName>"));
        assert!(xml.contains("<FunctionsCount>2</FunctionsCount>"));
        assert!(xml.contains("<x86>true</x86>"));
        assert!(xml.contains("<x64>false</x64>"));
        assert!(xml.contains("<EntryPoint>0x00001000</EntryPoint>"));
        assert!(xml.contains("<EntryPoint>KERNEL32.Sleep</EntryPoint>"));
        assert_eq!(xml.matches("<ExportFunction>").count(), 2);
        assert!(xml.trim_end().ends_with("</ArrayOfDllExportList>"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("<a href=\"x\">'&'</a>"), "&lt;a href=&quot;x&quot;&gt;&apos;&amp;&apos;&lt;/a&gt;");
        assert_eq!(escape_xml("a\u{1}b"), "a\\x01b");
    }

    #[test]
    fn test_json() {
        let json = render_string(Format::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["file"], "a.dll");
        assert_eq!(arr[0]["module_name"], "a&b.dll");
        assert_eq!(arr[0]["functions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_table() {
        let table = render_string(Format::Table);
        assert!(table.contains("a&b.dll (2 functions with 2 names from ordinal base 1)"));
        assert!(table.contains("Foo"));
        assert!(table.contains("0x00001000"));
    }
}
