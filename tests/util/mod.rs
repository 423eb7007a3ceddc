//! Shared fixtures: in-memory providers that record every call, and a
//! tracing capture helper.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use blog_search::config::SearchConfig;
use blog_search::model::types::{Match, Metadata, keys};
use blog_search::search::embedder::{EmbedPurpose, Embedder, EmbedderError, EmbedderResult};
use blog_search::search::query::{FilterOp, FilterValue, Predicate, fields};
use blog_search::search::service::SearchService;
use blog_search::search::vector_index::{IndexError, IndexResult, VectorIndex};
use parking_lot::Mutex;

pub const CONTENT_NS: &str = "blaze-content-v3";
pub const FEED_NS: &str = "blaze-feeds-v2";

/// Embedder returning a vector derived from the text length.
#[derive(Default)]
pub struct FakeEmbedder {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, EmbedPurpose)>>,
}

#[allow(dead_code)]
impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl Embedder for FakeEmbedder {
    fn embed(&self, text: &str, purpose: EmbedPurpose) -> EmbedderResult<Vec<f32>> {
        self.calls.lock().push((text.to_string(), purpose));
        if self.fail {
            return Err(EmbedderError::Unavailable("fake outage".into()));
        }
        if text.is_empty() {
            return Err(EmbedderError::EmptyInput);
        }
        Ok(vec![text.len() as f32, 1.0])
    }

    fn id(&self) -> &str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall {
    Query {
        namespace: String,
        vector: Vec<f32>,
        filters: Vec<Predicate>,
        top_k: usize,
    },
    Fetch {
        id: String,
        namespace: String,
    },
}

/// Index holding fixed entries per namespace.
///
/// Equality predicates on the site fields are honoured; every other
/// predicate is recorded but not evaluated.
#[derive(Default)]
pub struct FakeIndex {
    pub entries: HashMap<String, Vec<Match>>,
    pub vectors: HashMap<String, Vec<f32>>,
    /// Site values whose filtered query fails.
    pub failing_sites: HashSet<String>,
    pub fail_all: bool,
    pub calls: Mutex<Vec<IndexCall>>,
}

#[allow(dead_code)]
impl FakeIndex {
    pub fn with_entries(mut self, namespace: &str, matches: Vec<Match>) -> Self {
        self.entries.entry(namespace.to_string()).or_default().extend(matches);
        self
    }

    pub fn with_vector(mut self, id: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(id.to_string(), vector);
        self
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    pub fn query_namespaces(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                IndexCall::Query { namespace, .. } => Some(namespace),
                IndexCall::Fetch { .. } => None,
            })
            .collect()
    }
}

fn site_value(p: &Predicate) -> Option<&str> {
    let is_site = p.field == fields::FEED_SITE || p.field == fields::CONTENT_SITE;
    match (&p.op, &p.value) {
        (FilterOp::Eq, FilterValue::Text(v)) if is_site => Some(v.as_str()),
        _ => None,
    }
}

impl VectorIndex for FakeIndex {
    fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filters: &[Predicate],
        top_k: usize,
    ) -> IndexResult<Vec<Match>> {
        self.calls.lock().push(IndexCall::Query {
            namespace: namespace.to_string(),
            vector: vector.to_vec(),
            filters: filters.to_vec(),
            top_k,
        });
        if self.fail_all {
            return Err(IndexError::Api {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let sites: Vec<(&str, &str)> = filters
            .iter()
            .filter_map(|p| site_value(p).map(|v| (p.field, v)))
            .collect();
        if let Some((_, site)) = sites.iter().find(|(_, v)| self.failing_sites.contains(*v)) {
            return Err(IndexError::Api {
                status: 500,
                body: format!("boom for {site}"),
            });
        }
        Ok(self
            .entries
            .get(namespace)
            .map(|all| {
                all.iter()
                    .filter(|m| {
                        sites
                            .iter()
                            .all(|(field, v)| m.metadata.string(field) == Some(*v))
                    })
                    .take(top_k)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_vector(&self, id: &str, namespace: &str) -> IndexResult<Vec<f32>> {
        self.calls.lock().push(IndexCall::Fetch {
            id: id.to_string(),
            namespace: namespace.to_string(),
        });
        self.vectors
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::VectorNotFound(id.to_string()))
    }
}

#[allow(dead_code)]
pub fn post(url: &str, site: &str, title: &str, published: &str) -> Match {
    Match {
        id: url.to_string(),
        score: 0.8,
        metadata: Metadata::new()
            .with(keys::TITLE, title)
            .with(keys::SUBTITLE, format!("about {title}"))
            .with(keys::PUBLISHED, published)
            .with(keys::CONTENT_BASE_URL, site),
    }
}

#[allow(dead_code)]
pub fn feed(rss_url: &str, site: &str, owner: &str) -> Match {
    Match {
        id: rss_url.to_string(),
        score: 0.9,
        metadata: Metadata::new()
            .with(keys::TITLE, format!("{owner}'s blog"))
            .with(keys::OWNER_NAME, owner)
            .with(keys::SHORT_SUMMARY, format!("{owner} writes"))
            .with(keys::FEED_BASE_URL, site),
    }
}

#[allow(dead_code)]
pub fn service(embedder: &Arc<FakeEmbedder>, index: &Arc<FakeIndex>) -> SearchService {
    SearchService::new(embedder.clone(), index.clone(), &SearchConfig::default())
        .expect("enrichment pool")
}

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Assert that `doc` is well-formed XML as the exporters emit it: balanced
/// tags, quoted attributes, and every `&` starting a known entity.
#[allow(dead_code)]
pub fn assert_well_formed_xml(doc: &str) {
    let mut rest = doc.trim_start();
    if let Some(after) = rest.strip_prefix("<?xml") {
        let end = after.find("?>").expect("unterminated XML declaration");
        rest = &after[end + 2..];
    }

    let mut open: Vec<&str> = Vec::new();
    let mut roots = 0;
    while !rest.is_empty() {
        let text_end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..text_end];
        assert!(
            !open.is_empty() || text.trim().is_empty(),
            "text outside the root element: {text:?}"
        );
        assert_escaped(text);
        rest = &rest[text_end..];
        if rest.is_empty() {
            break;
        }

        let tag_end = rest.find('>').expect("unterminated tag");
        let tag = &rest[1..tag_end];
        rest = &rest[tag_end + 1..];

        if let Some(name) = tag.strip_prefix('/') {
            assert_eq!(open.pop(), Some(name.trim()), "mismatched closing tag in:\n{doc}");
            continue;
        }
        let self_closing = tag.ends_with('/');
        let body = tag.trim_end_matches('/');
        let name = body.split_whitespace().next().expect("empty tag");
        assert!(
            name.chars().all(|c| c.is_ascii_alphanumeric() || c == ':'),
            "invalid element name {name:?}"
        );
        assert_attributes(&body[name.len()..]);
        if open.is_empty() {
            roots += 1;
        }
        if !self_closing {
            open.push(name);
        }
    }
    assert!(open.is_empty(), "unclosed elements: {open:?}");
    assert_eq!(roots, 1, "expected exactly one root element");
}

fn assert_attributes(mut attrs: &str) {
    loop {
        attrs = attrs.trim_start();
        if attrs.is_empty() {
            return;
        }
        let (name, after) = attrs.split_once("=\"").expect("attribute without quoted value");
        assert!(
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == ':'),
            "invalid attribute name {name:?}"
        );
        let (value, tail) = after.split_once('"').expect("unterminated attribute value");
        assert_escaped(value);
        assert!(
            tail.is_empty() || tail.starts_with(char::is_whitespace),
            "attributes must be separated by whitespace: {tail:?}"
        );
        attrs = tail;
    }
}

fn assert_escaped(text: &str) {
    const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"];
    assert!(!text.contains(['<', '>']), "raw markup in {text:?}");
    for (i, _) in text.match_indices('&') {
        assert!(
            ENTITIES.iter().any(|e| text[i..].starts_with(e)),
            "bare ampersand in {text:?}"
        );
    }
}

/// Split an RFC 4180 document into records, failing on malformed quoting.
#[allow(dead_code)]
pub fn parse_csv(doc: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut closed = false;
    let mut chars = doc.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    quoted = false;
                    closed = true;
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            ',' => {
                record.push(std::mem::take(&mut field));
                closed = false;
            }
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                closed = false;
            }
            '"' if field.is_empty() && !closed => quoted = true,
            _ => {
                assert!(!closed, "data after closing quote in {doc:?}");
                assert_ne!(c, '"', "stray quote in unquoted field in {doc:?}");
                field.push(c);
            }
        }
    }
    assert!(!quoted, "unterminated quoted field");
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
