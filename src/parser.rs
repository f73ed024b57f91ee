//! Streaming RSS/Atom parser.
//!
//! Walks the document once with `quick-xml`, turning every `item` (RSS) or
//! `entry` (Atom) element into a [`Headline`]. A document that is not
//! well-formed produces no headlines at all.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use quick_xml::encoding::Decoder;
use quick_xml::escape::unescape;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;
use tracing::debug;

use crate::headline::Headline;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("body is not valid {0}")]
    Encoding(&'static str),
    #[error("end tag without a matching start tag")]
    UnexpectedEndTag,
    #[error("{0} element(s) still open at end of document")]
    Unclosed(usize),
    #[error("more than one root element")]
    MultipleRoots,
    #[error("text outside the root element")]
    TextOutsideRoot,
    #[error("document has no root element")]
    NoRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
}

/// Text being collected for one recognised child of an item.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

impl Capture {
    fn new(field: Field, depth: usize) -> Self {
        Self {
            field,
            depth,
            text: String::new(),
        }
    }

    fn push(&mut self, depth: usize, text: &str) {
        // Descriptions keep only their own text; nested markup is dropped.
        if self.field == Field::Description && depth != self.depth {
            return;
        }
        self.text.push_str(text);
    }
}

struct HeadlineBuilder {
    depth: usize,
    title: String,
    link: String,
    description: String,
}

impl HeadlineBuilder {
    fn at(depth: usize) -> Self {
        Self {
            depth,
            title: String::new(),
            link: String::new(),
            description: String::new(),
        }
    }

    fn apply(&mut self, capture: Capture) {
        match capture.field {
            Field::Title => self.title = capture.text,
            Field::Link => {
                if !capture.text.is_empty() && self.link.is_empty() {
                    self.link = capture.text;
                }
            }
            Field::Description => self.description = clean_description(&capture.text),
        }
    }

    fn build(self, source_label: &str) -> Headline {
        Headline {
            title: self.title,
            link: self.link,
            description: self.description,
            source_label: source_label.to_string(),
        }
    }
}

/// Parse a feed body, returning an empty list when the XML is malformed.
pub fn parse(body: &[u8], source_label: &str) -> Vec<Headline> {
    match try_parse(body, source_label) {
        Ok(headlines) => headlines,
        Err(e) => {
            debug!("Dropping malformed feed '{}': {}", source_label, e);
            Vec::new()
        }
    }
}

pub fn try_parse(body: &[u8], source_label: &str) -> Result<Vec<Headline>, ParseError> {
    let transcoded = transcode_utf16(body)?;
    let body = transcoded.as_deref().unwrap_or(body);

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(false);

    let mut headlines = Vec::new();
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut seen_root = false;
    let mut item: Option<HeadlineBuilder> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                open_element(depth, &mut seen_root)?;
                depth += 1;
                on_start(&e, reader.decoder(), depth, &mut item, &mut capture)?;
            }
            Event::Empty(e) => {
                open_element(depth, &mut seen_root)?;
                depth += 1;
                on_start(&e, reader.decoder(), depth, &mut item, &mut capture)?;
                on_end(depth, &mut item, &mut capture, &mut headlines, source_label);
                depth -= 1;
            }
            Event::End(_) => {
                if depth == 0 {
                    return Err(ParseError::UnexpectedEndTag);
                }
                on_end(depth, &mut item, &mut capture, &mut headlines, source_label);
                depth -= 1;
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if depth == 0 {
                    if !text.trim().is_empty() {
                        return Err(ParseError::TextOutsideRoot);
                    }
                } else if let Some(capture) = capture.as_mut() {
                    capture.push(depth, &text);
                }
            }
            Event::CData(e) => {
                if depth == 0 {
                    return Err(ParseError::TextOutsideRoot);
                }
                let raw = e.into_inner();
                let text = reader
                    .decoder()
                    .decode(&raw)
                    .map_err(quick_xml::Error::from)?;
                if let Some(capture) = capture.as_mut() {
                    capture.push(depth, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(ParseError::Unclosed(depth));
    }
    if !seen_root {
        return Err(ParseError::NoRoot);
    }

    Ok(headlines)
}

/// Cut a description at its first `<`, dropping any markup that survived.
pub fn clean_description(raw: &str) -> String {
    match raw.find('<') {
        Some(index) => raw[..index].to_string(),
        None => raw.to_string(),
    }
}

/// quick-xml reads only ASCII-compatible encodings, so UTF-16 bodies are
/// converted up front. The copy starts with a UTF-8 BOM, which keeps the
/// reader from switching back to the encoding the declaration still names.
fn transcode_utf16(body: &[u8]) -> Result<Option<Vec<u8>>, ParseError> {
    let (encoding, bom_len) = match Encoding::for_bom(body) {
        Some((encoding, len)) if encoding == UTF_16LE || encoding == UTF_16BE => (encoding, len),
        Some(_) => return Ok(None),
        None => match body {
            [0x3C, 0x00, 0x3F, 0x00, ..] => (UTF_16LE, 0),
            [0x00, 0x3C, 0x00, 0x3F, ..] => (UTF_16BE, 0),
            _ => return Ok(None),
        },
    };

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(&body[bom_len..])
        .ok_or(ParseError::Encoding(encoding.name()))?;

    let mut utf8 = Vec::with_capacity(text.len() + 3);
    utf8.extend_from_slice(b"\xEF\xBB\xBF");
    utf8.extend_from_slice(text.as_bytes());
    Ok(Some(utf8))
}

fn open_element(depth: usize, seen_root: &mut bool) -> Result<(), ParseError> {
    if depth == 0 {
        if *seen_root {
            return Err(ParseError::MultipleRoots);
        }
        *seen_root = true;
    }
    Ok(())
}

fn on_start(
    element: &BytesStart<'_>,
    decoder: Decoder,
    depth: usize,
    item: &mut Option<HeadlineBuilder>,
    capture: &mut Option<Capture>,
) -> Result<(), ParseError> {
    if capture.is_some() {
        return Ok(());
    }

    let name = element.local_name();
    if item.is_none() {
        if matches!(name.as_ref(), b"item" | b"entry") {
            *item = Some(HeadlineBuilder::at(depth));
        }
        return Ok(());
    }
    let Some(builder) = item.as_mut() else {
        return Ok(());
    };

    match name.as_ref() {
        b"title" => *capture = Some(Capture::new(Field::Title, depth)),
        b"link" => {
            for attr in element.attributes() {
                let attr = attr?;
                if attr.key.local_name().as_ref() == b"href" {
                    let raw = decoder.decode(&attr.value).map_err(quick_xml::Error::from)?;
                    builder.link = unescape(&raw).map_err(quick_xml::Error::from)?.into_owned();
                }
            }
            *capture = Some(Capture::new(Field::Link, depth));
        }
        b"description" => *capture = Some(Capture::new(Field::Description, depth)),
        _ => {}
    }

    Ok(())
}

fn on_end(
    depth: usize,
    item: &mut Option<HeadlineBuilder>,
    capture: &mut Option<Capture>,
    headlines: &mut Vec<Headline>,
    source_label: &str,
) {
    if capture.as_ref().is_some_and(|c| c.depth == depth) {
        if let (Some(finished), Some(builder)) = (capture.take(), item.as_mut()) {
            builder.apply(finished);
        }
    }

    if item.as_ref().is_some_and(|b| b.depth == depth) {
        if let Some(builder) = item.take() {
            headlines.push(builder.build(source_label));
        }
    }
}
