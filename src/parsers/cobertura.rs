/// Parser for Cobertura XML coverage reports (as written by coverage.py's
/// `coverage xml`, gcovr, cargo-llvm-cov, ...).
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
use std::collections::{BTreeMap, HashMap};
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{DiffCovError, Result};
use crate::model::*;
use crate::parsers::Parser;

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse_cobertura(input)
    }
}

fn parse_cobertura(input: &[u8]) -> Result<CoverageData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();

    // Several <class> elements may share one filename (one per Python class,
    // or per Java inner class); merge them in first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut files: HashMap<String, BTreeMap<u32, u64>> = HashMap::new();
    let mut current: Option<String> = None;

    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => {
                return Err(DiffCovError::Xml {
                    source: e,
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                // Self-closing <source/> has no text and no End event.
                b"source" => in_source = is_start_event,
                b"class" => {
                    let attrs = attr_map(e);
                    if let Some(filename) = attrs.get("filename") {
                        let path = resolve_source_path(filename, &sources);
                        if !files.contains_key(&path) {
                            order.push(path.clone());
                            files.insert(path.clone(), BTreeMap::new());
                        }
                        current = Some(path);
                    }
                }
                b"line" => {
                    if let Some(lines) = current.as_ref().and_then(|p| files.get_mut(p)) {
                        record_line(lines, &attr_map(e));
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        sources.push(text.to_string());
                    }
                    in_source = false;
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"class" => current = None,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    let mut data = CoverageData::new();
    for path in order {
        let lines = files.remove(&path).unwrap_or_default();
        let mut file = FileCoverage::new(path);
        file.lines = lines
            .into_iter()
            .map(|(line_number, hit_count)| LineCoverage {
                line_number,
                hit_count,
            })
            .collect();
        data.files.push(file);
    }
    Ok(data)
}

/// Record one `<line number=".." hits=".."/>` element. Lines may be listed
/// under both `<method>` and `<class>`; the highest hit count wins.
fn record_line(lines: &mut BTreeMap<u32, u64>, attrs: &HashMap<String, String>) {
    let Some(line_number) = attrs.get("number").and_then(|n| n.parse::<u32>().ok()) else {
        return;
    };
    let hit_count = attrs
        .get("hits")
        .and_then(|h| h.parse::<u64>().ok())
        .unwrap_or(0);
    let entry = lines.entry(line_number).or_insert(0);
    *entry = (*entry).max(hit_count);
}

/// Resolve a filename against the list of `<source>` prefixes.
///
/// - If the filename is already absolute, return it as-is.
/// - Otherwise, prepend the first non-empty source prefix.
/// - If no non-empty sources exist, return the filename unchanged.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        return filename.to_string();
    }
    match sources.iter().map(|s| s.trim_end_matches('/')).find(|s| !s.is_empty()) {
        Some(base) => format!("{base}/{filename}"),
        None => filename.to_string(),
    }
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<coverage version="7.4.0" line-rate="0.6">
  <sources>
    <source>/home/user/project</source>
  </sources>
  <packages>
    <package name="app">
      <classes>
        <class name="views.py" filename="app/views.py" line-rate="0.5">
          <methods/>
          <lines>
            <line number="1" hits="1"/>
            <line number="2" hits="1"/>
            <line number="4" hits="0"/>
            <line number="5" hits="0"/>
          </lines>
        </class>
        <class name="models.py" filename="app/models.py" line-rate="1">
          <methods>
            <method name="save" signature="">
              <lines><line number="3" hits="0"/></lines>
            </method>
          </methods>
          <lines>
            <line number="3" hits="2"/>
          </lines>
        </class>
      </classes>
    </package>
  </packages>
</coverage>
"#;

    #[test]
    fn test_parse_cobertura() {
        let data = CoberturaParser.parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(data.files.len(), 2);

        let views = &data.files[0];
        assert_eq!(views.path, "/home/user/project/app/views.py");
        assert_eq!(views.lines.len(), 4);
        assert_eq!(views.lines[2].line_number, 4);
        assert_eq!(views.lines[2].hit_count, 0);
    }

    #[test]
    fn test_line_in_method_and_class_keeps_max_hits() {
        let data = CoberturaParser.parse(SAMPLE.as_bytes()).unwrap();
        let models = &data.files[1];
        assert_eq!(models.lines.len(), 1);
        assert_eq!(models.lines[0].hit_count, 2);
    }

    #[test]
    fn test_classes_sharing_a_file_are_merged() {
        let xml = r#"<coverage><packages><package><classes>
<class name="A" filename="m.py"><lines><line number="1" hits="1"/></lines></class>
<class name="B" filename="m.py"><lines><line number="7" hits="0"/></lines></class>
</classes></package></packages></coverage>"#;
        let data = CoberturaParser.parse(xml.as_bytes()).unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].path, "m.py");
        assert_eq!(data.files[0].lines.len(), 2);
    }

    #[test]
    fn test_resolve_source_path() {
        let sources = vec![String::new(), "/srv/app/".to_string()];
        assert_eq!(resolve_source_path("x.py", &sources), "/srv/app/x.py");
        assert_eq!(resolve_source_path("/abs/x.py", &sources), "/abs/x.py");
        assert_eq!(resolve_source_path("x.py", &[]), "x.py");
    }

    #[test]
    fn test_malformed_xml() {
        let result = CoberturaParser.parse(b"<coverage><packages></coverage>");
        assert!(result.is_err());
    }
}
