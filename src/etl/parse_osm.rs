use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Attributes, Element, ElementKind};
use crate::errors::{Error, ErrorKind, Result};

enum ParserState {
    Top,
    /// Inside a node or way; counts open child elements.
    Element(Element, usize),
    /// Inside an element whose subtree is ignored, e.g. a relation.
    Skip(usize),
    Done,
}

/// Lazy, non-restartable stream of the `node` and `way` elements of an OSM XML document.
///
/// Relations and their members are skipped; wrapper elements such as `osm` and
/// `bounds` are looked through. Only the element currently being read is held
/// in memory.
pub struct ElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    state: ParserState,
}

fn parse_attributes(el: &BytesStart) -> Result<Attributes> {
    let mut attributes = Vec::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let key = str::from_utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Attributes(attributes))
}

fn add_child(element: &mut Element, el: &BytesStart) -> Result<()> {
    match el.name().as_ref() {
        b"tag" => element.tags.push(parse_attributes(el)?),
        b"nd" => element.nds.push(parse_attributes(el)?),
        _ => (),
    }
    Ok(())
}

impl<R: BufRead> ElementReader<R> {
    pub fn new(inner: R) -> ElementReader<R> {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);

        ElementReader {
            reader,
            buf: Vec::new(),
            state: ParserState::Top,
        }
    }

    fn read_next(&mut self) -> Result<Option<Element>> {
        if matches!(self.state, ParserState::Done) {
            return Ok(None);
        }
        loop {
            let event = self.reader.read_event_into(&mut self.buf)?;
            let state = std::mem::replace(&mut self.state, ParserState::Done);
            let (next_state, finished) = match (state, event) {
                (ParserState::Done, _) => return Ok(None),
                (ParserState::Top, Event::Eof) => (ParserState::Done, None),
                (ParserState::Element(element, _), Event::Eof) => {
                    return Err(Error::malformed(format!(
                        "document ends inside <{}>", element.kind.name()
                    )));
                },
                (ParserState::Skip(_), Event::Eof) => {
                    return Err(Error::malformed("document ends inside a skipped element"));
                },

                (ParserState::Top, Event::Start(e)) => {
                    match ElementKind::from_name(e.name().as_ref()) {
                        Some(kind) => (ParserState::Element(Element::new(kind, parse_attributes(&e)?), 0), None),
                        None if e.name().as_ref() == b"relation" => (ParserState::Skip(0), None),
                        None => (ParserState::Top, None),
                    }
                },
                (ParserState::Top, Event::Empty(e)) => {
                    match ElementKind::from_name(e.name().as_ref()) {
                        Some(kind) => (ParserState::Top, Some(Element::new(kind, parse_attributes(&e)?))),
                        None => (ParserState::Top, None),
                    }
                },

                (ParserState::Element(mut element, depth), Event::Start(e)) => {
                    add_child(&mut element, &e)?;
                    (ParserState::Element(element, depth + 1), None)
                },
                (ParserState::Element(mut element, depth), Event::Empty(e)) => {
                    add_child(&mut element, &e)?;
                    (ParserState::Element(element, depth), None)
                },
                (ParserState::Element(element, 0), Event::End(_)) => (ParserState::Top, Some(element)),
                (ParserState::Element(element, depth), Event::End(_)) => {
                    (ParserState::Element(element, depth - 1), None)
                },

                (ParserState::Skip(depth), Event::Start(_)) => (ParserState::Skip(depth + 1), None),
                (ParserState::Skip(0), Event::End(_)) => (ParserState::Top, None),
                (ParserState::Skip(depth), Event::End(_)) => (ParserState::Skip(depth - 1), None),

                // Text, comments, declarations and the like carry no data we keep.
                (state, _) => (state, None),
            };
            self.state = next_state;
            // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
            self.buf.clear();
            if finished.is_some() || matches!(self.state, ParserState::Done) {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementReader<R> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(element) => element.map(Ok),
            Err(err) => {
                self.state = ParserState::Done;
                Some(Err(err))
            },
        }
    }
}

/// Opens an OSM XML file for streaming, decompressing it when the name ends in `.xz`.
pub fn open_osm_reader(path: &Path) -> Result<ElementReader<Box<dyn BufRead>>> {
    let file = fs::File::open(path).map_err(|err| {
        Error::new(ErrorKind::Io, format!("could not open {}: {}", path.display(), err))
    })?;
    let file_reader = BufReader::new(file);
    let inner: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    Ok(ElementReader::new(inner))
}
