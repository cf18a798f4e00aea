use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

pub const NOT_FOUND: &str = "About the job section not found.";
pub const PARSE_ERROR: &str = "Error parsing description.";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[a-zA-Z][^>]*>").unwrap());

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "ul", "ol", "li", "br", "tr", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "footer", "blockquote", "pre",
];

/// Layout-coupled heuristics for finding the job description. Update these
/// when the site changes its markup; the extraction logic stays put.
#[derive(Debug, Clone)]
pub struct DescriptionRules {
    pub heading: &'static str,
    /// Classes of the container that follows the heading.
    pub markers: &'static [&'static str],
    /// Headings that end the description in the line scan.
    pub stops: &'static [&'static str],
}

impl Default for DescriptionRules {
    fn default() -> Self {
        Self {
            heading: "about the job",
            markers: &[
                "jobs-description__content",
                "jobs-box__html-content",
                "show-more-less-html__markup",
                "mt4",
            ],
            stops: &[
                "about the company",
                "job details",
                "qualifications",
                "skills",
                "education",
            ],
        }
    }
}

/// Isolate the "About the job" section from description HTML or plain text.
pub fn extract(input: &str) -> String {
    extract_with(input, &DescriptionRules::default())
}

pub fn extract_with(input: &str, rules: &DescriptionRules) -> String {
    match try_extract(input, rules) {
        Ok(text) => text,
        Err(e) => {
            warn!("Description parse failed: {}", e);
            PARSE_ERROR.to_string()
        }
    }
}

fn try_extract(input: &str, rules: &DescriptionRules) -> Result<String> {
    if !TAG_RE.is_match(input) {
        return Ok(scan_lines(input, rules));
    }

    let fragment = Html::parse_fragment(input);
    if let Some(text) = from_heading(&fragment, rules)? {
        return Ok(text);
    }

    debug!("No description heading/marker in markup, scanning text");
    Ok(scan_lines(&block_text(fragment.root_element()), rules))
}

/// Primary strategy: the first marker container after the heading.
fn from_heading(doc: &Html, rules: &DescriptionRules) -> Result<Option<String>> {
    let headings = parse_selector(HEADING_SELECTOR)?;
    let markers = parse_selector(
        &rules
            .markers
            .iter()
            .map(|class| format!(".{}", class))
            .collect::<Vec<_>>()
            .join(", "),
    )?;

    let Some(heading) = doc
        .select(&headings)
        .find(|h| h.text().collect::<String>().to_lowercase().contains(rules.heading))
    else {
        return Ok(None);
    };

    let mut after_heading = false;
    for node in doc.root_element().descendants() {
        if node.id() == heading.id() {
            after_heading = true;
            continue;
        }
        if !after_heading {
            continue;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if heading.descendants().any(|d| d.id() == el.id()) {
            continue;
        }
        if markers.matches(&el) {
            let text = block_text(el);
            return Ok(if text.is_empty() { None } else { Some(text) });
        }
    }

    Ok(None)
}

/// Fallback strategy: from the heading line up to the next stop heading.
fn scan_lines(text: &str, rules: &DescriptionRules) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let Some(start) = lines
        .iter()
        .position(|l| l.to_lowercase().contains(rules.heading))
    else {
        return NOT_FOUND.to_string();
    };

    let mut kept = vec![lines[start]];
    for line in &lines[start + 1..] {
        let lower = line.to_lowercase();
        if rules.stops.iter().any(|stop| lower.contains(stop)) {
            break;
        }
        if !line.is_empty() {
            kept.push(line);
        }
    }

    kept.join("\n")
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {:?}", css, e))
}

/// Element text with block boundaries turned into newlines.
fn block_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_block_text(el, &mut out);
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_block_text(el: ElementRef<'_>, out: &mut String) {
    let block = BLOCK_TAGS.contains(&el.value().name());
    if block {
        out.push('\n');
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.is_empty() {
                    continue;
                }
                if text.starts_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(&words.join(" "));
                if text.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_block_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_stops_at_qualifications() {
        let text = "Intro\nAbout the job\nDo great things\nQualifications\nBA required";
        assert_eq!(extract(text), "About the job\nDo great things");
    }

    #[test]
    fn fallback_is_idempotent() {
        let text = "Header\n  ABOUT THE JOB  \n\nShip code\n\nReview PRs\nAbout the company\nWe are big";
        let once = extract(text);
        assert_eq!(once, "ABOUT THE JOB\nShip code\nReview PRs");
        assert_eq!(extract(&once), once);
    }

    #[test]
    fn fallback_runs_to_end_without_stop() {
        assert_eq!(extract("about the job\nline one\nline two"), "about the job\nline one\nline two");
    }

    #[test]
    fn stop_headings_are_case_insensitive() {
        for stop in ["Job Details", "SKILLS", "Education", "About the Company"] {
            let text = format!("About the job\nWork\n{}\nMore", stop);
            assert_eq!(extract(&text), "About the job\nWork", "{}", stop);
        }
    }

    #[test]
    fn missing_section_sentinel() {
        assert_eq!(extract("Nothing useful here"), NOT_FOUND);
        assert_eq!(extract(""), NOT_FOUND);
        assert_eq!(extract("<div><p>Just a paragraph</p></div>"), NOT_FOUND);
    }

    #[test]
    fn heading_anchored_markup() {
        let html = r#"
            <div class="jobs-box__html-content" id="job-details">
              <h2 class="text-heading-large">About the job</h2>
              <div class="mt4">
                <p dir="ltr">We build <strong>fast</strong> things.</p>
                <ul><li>Write Rust</li><li>Review code</li></ul>
                Line one<br>Line two
              </div>
            </div>"#;
        assert_eq!(
            extract(html),
            "We build fast things.\nWrite Rust\nReview code\nLine one\nLine two"
        );
    }

    #[test]
    fn marker_must_follow_heading() {
        let html = r#"
            <div class="mt4"><p>Sidebar noise</p></div>
            <h2>About the job</h2>
            <div class="show-more-less-html__markup"><p>The real description</p></div>"#;
        assert_eq!(extract(html), "The real description");
    }

    #[test]
    fn markup_without_marker_falls_back_to_scan() {
        let html = "<h2>About the job</h2><p>Do great things</p><h3>Skills</h3><p>Rust</p>";
        assert_eq!(extract(html), "About the job\nDo great things");
    }

    #[test]
    fn invalid_marker_gives_parse_error() {
        let rules = DescriptionRules {
            markers: &["[[broken"],
            ..DescriptionRules::default()
        };
        assert_eq!(extract_with("<h2>About the job</h2><p>x</p>", &rules), PARSE_ERROR);
    }

    #[test]
    fn job_detail_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/job_detail.html").unwrap();
        let text = extract(&html);
        assert!(text.starts_with("Acme is hiring a Python Developer"), "{}", text);
        assert!(text.contains("Build scraping pipelines"));
        assert!(!text.contains("About the company"));
    }
}
