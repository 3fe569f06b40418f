//! Streaming SCARF reader.
//!
//! Walks an `AnalyzerReport` document with `quick-xml` and hands each
//! top-level payload (bug, metric, summaries) to a [`ScarfHandler`] as soon
//! as its element closes, so memory stays bounded by the largest single
//! element rather than the whole document.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::ScarfError;
use crate::models::scarf::{
    BugInstance, BugSummary, InitialInfo, Location, Method, Metric, MetricSummary,
};
use crate::parsers::ScarfHandler;

const ROOT: &str = "AnalyzerReport";

/// Element subtree captured below the root, released once dispatched.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, key: &str) -> bool {
        self.attr(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn text_of(&self, name: &str) -> String {
        self.child(name)
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default()
    }

    fn number_of(&self, name: &str) -> u32 {
        self.text_of(name).parse().unwrap_or(0)
    }
}

/// Read a SCARF document from a file.
pub fn read_file<H: ScarfHandler>(path: &Path, handler: &mut H) -> Result<(), ScarfError> {
    let file = File::open(path)?;
    read(BufReader::new(file), handler)
}

/// Read a SCARF document, invoking `handler` once per payload in document order.
///
/// Any syntax error, a missing or foreign root element, or a truncated
/// document fails the whole read.
pub fn read<R: BufRead, H: ScarfHandler>(source: R, handler: &mut H) -> Result<(), ScarfError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut open: Vec<Node> = Vec::new();
    let mut root_open = false;
    let mut root_closed = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let node = open_node(&e)?;
                if root_open {
                    open.push(node);
                } else {
                    start_root(node, root_closed, handler)?;
                    root_open = true;
                }
            }
            Event::Empty(e) => {
                let node = open_node(&e)?;
                if root_open {
                    close_node(node, &mut open, handler);
                } else {
                    start_root(node, root_closed, handler)?;
                    root_closed = true;
                }
            }
            Event::End(_) => {
                if let Some(node) = open.pop() {
                    close_node(node, &mut open, handler);
                } else if root_open {
                    root_open = false;
                    root_closed = true;
                } else {
                    return Err(ScarfError::Malformed("unbalanced closing tag".into()));
                }
            }
            Event::Text(t) => {
                if let Some(node) = open.last_mut() {
                    let raw = std::str::from_utf8(&t)?;
                    node.text.push_str(&unescape(raw)?);
                }
            }
            Event::CData(c) => {
                if let Some(node) = open.last_mut() {
                    node.text.push_str(std::str::from_utf8(&c)?);
                }
            }
            Event::GeneralRef(r) => {
                if let Some(node) = open.last_mut() {
                    let name = std::str::from_utf8(&r)?;
                    node.text.push_str(&unescape(&format!("&{name};"))?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if root_open || !open.is_empty() {
        return Err(ScarfError::Malformed(format!(
            "document ended before </{ROOT}>"
        )));
    }
    if !root_closed {
        return Err(ScarfError::Malformed(format!("missing {ROOT} element")));
    }
    Ok(())
}

fn unescape(raw: &str) -> Result<Cow<'_, str>, ScarfError> {
    quick_xml::escape::unescape(raw).map_err(|e| ScarfError::Malformed(e.to_string()))
}

fn open_node(e: &BytesStart<'_>) -> Result<Node, ScarfError> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = unescape(std::str::from_utf8(&attr.value)?)?.into_owned();
        attrs.push((key, value));
    }
    Ok(Node {
        name,
        attrs,
        ..Default::default()
    })
}

fn start_root<H: ScarfHandler>(
    node: Node,
    root_closed: bool,
    handler: &mut H,
) -> Result<(), ScarfError> {
    if root_closed {
        return Err(ScarfError::Malformed(format!(
            "unexpected <{}> after </{ROOT}>",
            node.name
        )));
    }
    if node.name != ROOT {
        return Err(ScarfError::Malformed(format!(
            "expected <{ROOT}> root element, found <{}>",
            node.name
        )));
    }
    handler.initial_info(InitialInfo {
        tool_name: node.attr("tool_name").unwrap_or_default().to_string(),
        tool_version: node.attr("tool_version").unwrap_or_default().to_string(),
        assessment_uuid: node.attr("uuid").unwrap_or_default().to_string(),
    });
    Ok(())
}

/// Attach a finished element to its parent, or dispatch it when it is a
/// direct child of the root.
fn close_node<H: ScarfHandler>(node: Node, open: &mut [Node], handler: &mut H) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => dispatch(node, handler),
    }
}

fn dispatch<H: ScarfHandler>(node: Node, handler: &mut H) {
    match node.name.as_str() {
        "BugInstance" => handler.bug(bug_instance(&node)),
        "Metric" => handler.metric(metric(&node)),
        "MetricSummaries" => {
            for summary in node.children_named("MetricSummary") {
                handler.metric_summary(metric_summary(summary));
            }
        }
        "BugSummary" => {
            for category in node.children_named("BugCategory") {
                handler.bug_summary(bug_summary(category));
            }
        }
        other => tracing::debug!(element = other, "Skipping unknown SCARF element"),
    }
}

fn bug_instance(node: &Node) -> BugInstance {
    let methods = node
        .child("Methods")
        .map(|m| {
            m.children_named("Method")
                .map(|n| Method {
                    id: n.attr("id").and_then(|v| v.trim().parse().ok()),
                    primary: n.flag("primary"),
                    name: n.text.trim().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let locations = node
        .child("BugLocations")
        .map(|l| l.children_named("Location").map(location).collect())
        .unwrap_or_default();

    BugInstance {
        id: node.attr("id").unwrap_or_default().trim().to_string(),
        class_name: node.text_of("ClassName"),
        methods,
        locations,
        message: node.text_of("BugMessage"),
        group: node.text_of("BugGroup"),
        code: node.text_of("BugCode"),
        rank: node.text_of("BugRank"),
        severity: node.text_of("BugSeverity"),
        resolution_suggestion: node.text_of("ResolutionSuggestion"),
        cwe_ids: node
            .children_named("CweId")
            .map(|c| c.text.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        build_id: node.text_of("BuildId"),
        report_file: node.text_of("AssessmentReportFile"),
    }
}

fn location(node: &Node) -> Location {
    Location {
        id: node.attr("id").and_then(|v| v.trim().parse().ok()),
        primary: node.flag("primary"),
        source_file: node.text_of("SourceFile"),
        start_line: node.number_of("StartLine"),
        end_line: node.number_of("EndLine"),
        start_column: node.number_of("StartColumn"),
        end_column: node.number_of("EndColumn"),
        explanation: node.text_of("Explanation"),
    }
}

fn metric(node: &Node) -> Metric {
    Metric {
        id: node.attr("id").unwrap_or_default().to_string(),
        source_file: node
            .child("Location")
            .map(|l| l.text_of("SourceFile"))
            .unwrap_or_default(),
        class_name: node.text_of("Class"),
        method: node.text_of("Method"),
        metric_type: node.text_of("Type"),
        value: node.text_of("Value"),
    }
}

fn metric_summary(node: &Node) -> MetricSummary {
    MetricSummary {
        metric_type: node.text_of("Type"),
        count: node.text_of("Count"),
        sum: node.text_of("Sum"),
        sum_of_squares: node.text_of("SumOfSquares"),
        average: node.text_of("Average"),
        standard_deviation: node.text_of("StandardDeviation"),
        max: node.text_of("Max"),
        min: node.text_of("Min"),
    }
}

fn bug_summary(node: &Node) -> BugSummary {
    let number = |key: &str| {
        node.attr(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    };
    BugSummary {
        group: node.attr("group").unwrap_or_default().to_string(),
        code: node.attr("code").unwrap_or_default().to_string(),
        count: number("count"),
        bytes: number("bytes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::ScarfResults;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AnalyzerReport tool_name="findbugs" tool_version="3.0.1" uuid="a-1">
  <BugInstance id="1">
    <ClassName>com.example.Db</ClassName>
    <Methods><Method id="1" primary="true">query</Method></Methods>
    <BugLocations>
      <Location id="1" primary="false">
        <SourceFile>src/Helper.java</SourceFile>
        <StartLine>3</StartLine>
        <EndLine>3</EndLine>
      </Location>
      <Location id="2" primary="true">
        <SourceFile>src/Db.java</SourceFile>
        <StartLine>42</StartLine>
        <EndLine>44</EndLine>
        <Explanation>query built here</Explanation>
      </Location>
    </BugLocations>
    <BugMessage>SQL built from &lt;untrusted&gt; input &amp; executed</BugMessage>
    <BugGroup>SECURITY</BugGroup>
    <BugCode>SQL_INJECTION</BugCode>
    <BugRank>3</BugRank>
    <BugSeverity>1</BugSeverity>
    <CweId>89</CweId>
  </BugInstance>
  <BugInstance id="2">
    <BugMessage><![CDATA[raw <text>]]></BugMessage>
    <BugSeverity>bogus</BugSeverity>
  </BugInstance>
  <Metric id="0">
    <Location><SourceFile>src/Db.java</SourceFile></Location>
    <Type>code-lines</Type>
    <Value>120</Value>
  </Metric>
  <MetricSummaries>
    <MetricSummary><Type>code-lines</Type><Count>1</Count><Sum>120</Sum></MetricSummary>
    <MetricSummary><Type>blank-lines</Type><Count>1</Count><Sum>7</Sum></MetricSummary>
  </MetricSummaries>
  <BugSummary>
    <BugCategory group="SECURITY" code="SQL_INJECTION" count="1" bytes="512"/>
    <BugCategory group="STYLE" code="DEAD_STORE" count="4" bytes="900"/>
  </BugSummary>
</AnalyzerReport>"#;

    #[test]
    fn reads_every_payload_type() {
        let results = ScarfResults::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(results.tool.as_deref(), Some("findbugs 3.0.1"));
        assert_eq!(results.platform, None);
        assert_eq!(results.bugs.len(), 2);
        assert_eq!(results.metrics.len(), 1);
        assert_eq!(results.metric_summaries.len(), 2);
        assert_eq!(results.bug_summaries.len(), 2);
        assert_eq!(results.bug_summaries[1].count, 4);
        assert_eq!(results.metric_summaries[1].metric_type, "blank-lines");
    }

    #[test]
    fn bug_fields_are_decoded() {
        let results = ScarfResults::from_reader(SAMPLE.as_bytes()).unwrap();
        let bug = &results.bugs[0];
        assert_eq!(bug.id, "1");
        assert_eq!(bug.class_name, "com.example.Db");
        assert_eq!(bug.methods[0].name, "query");
        assert!(bug.methods[0].primary);
        assert_eq!(bug.locations.len(), 2);
        assert_eq!(bug.message, "SQL built from <untrusted> input & executed");
        assert_eq!(bug.cwe_ids, vec!["89".to_string()]);

        let primary = bug.primary_location().unwrap();
        assert_eq!(primary.source_file, "src/Db.java");
        assert_eq!((primary.start_line, primary.end_line), (42, 44));
        assert_eq!(primary.explanation, "query built here");
    }

    #[test]
    fn cdata_text_is_kept_verbatim() {
        let results = ScarfResults::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(results.bugs[1].message, "raw <text>");
        assert!(results.bugs[1].locations.is_empty());
    }

    #[test]
    fn metric_location_is_read() {
        let results = ScarfResults::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(results.metrics[0].source_file, "src/Db.java");
        assert_eq!(results.metrics[0].value, "120");
    }

    #[test]
    fn truncated_document_fails() {
        let truncated = &SAMPLE[..SAMPLE.find("<Metric ").unwrap()];
        assert!(ScarfResults::from_reader(truncated.as_bytes()).is_err());
    }

    #[test]
    fn mismatched_tags_fail() {
        let doc = concat!(
            r#"<AnalyzerReport tool_name="x">"#,
            r#"<BugInstance id="1"></BugMessage></AnalyzerReport>"#
        );
        assert!(ScarfResults::from_reader(doc.as_bytes()).is_err());
    }

    #[test]
    fn foreign_root_fails() {
        let doc = r#"<BugCollection><BugInstance/></BugCollection>"#;
        let err = ScarfResults::from_reader(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ScarfError::Malformed(_)));
    }

    #[test]
    fn empty_input_fails() {
        assert!(ScarfResults::from_reader("".as_bytes()).is_err());
    }

    #[test]
    fn self_closing_root_is_an_empty_report() {
        let doc = r#"<AnalyzerReport tool_name="cppcheck" tool_version="1.75"/>"#;
        let results = ScarfResults::from_reader(doc.as_bytes()).unwrap();
        assert_eq!(results.tool.as_deref(), Some("cppcheck 1.75"));
        assert!(results.bugs.is_empty());
    }
}
