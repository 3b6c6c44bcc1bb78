// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;

use super::date::parse_rss_date_or_now;

/// A parsed RSS document: channel metadata plus items in document order
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    /// `itunes:summary`, used when `description` is empty
    pub summary: String,
    /// Channel `pubDate`, or the parse time when absent or unparsable
    pub last_updated: DateTime<Utc>,
    pub episodes: Vec<FeedItem>,
}

impl FeedDocument {
    /// Channel description, falling back to the iTunes summary
    pub fn description_or_summary(&self) -> &str {
        if self.description.is_empty() {
            &self.summary
        } else {
            &self.description
        }
    }
}

/// A single `<item>` as it appeared in the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub guid: Option<String>,
    /// Raw `pubDate` text; converted when the episode is built
    pub pub_date: Option<String>,
    pub duration: Option<String>,
    pub link: Option<String>,
    /// `enclosure@url`
    pub media_url: Option<String>,
    /// `enclosure@type`
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelField {
    Title,
    Description,
    Summary,
    PubDate,
}

impl ChannelField {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "itunes:summary" => Some(Self::Summary),
            "pubDate" => Some(Self::PubDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Description,
    Duration,
    Guid,
    PubDate,
    Link,
}

impl ItemField {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "itunes:duration" => Some(Self::Duration),
            "guid" => Some(Self::Guid),
            "pubDate" => Some(Self::PubDate),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Channel(ChannelField),
    Item(ItemField),
}

/// An open element; `target` is set when its text feeds a document field
struct Frame {
    name: String,
    target: Option<Field>,
    text: String,
}

/// Fold state for one document. Item fields always land on the most
/// recently opened `<item>`.
#[derive(Default)]
struct FeedAccumulator {
    title: String,
    description: String,
    summary: String,
    last_updated: Option<String>,
    items: Vec<FeedItem>,
}

impl FeedAccumulator {
    fn open(
        &mut self,
        name: &str,
        stack: &[Frame],
        element: &BytesStart<'_>,
        decoder: Decoder,
    ) -> Result<Option<Field>, ParseError> {
        let parent = stack.last().map(|frame| frame.name.as_str());
        let grandparent = stack
            .len()
            .checked_sub(2)
            .map(|index| stack[index].name.as_str());

        if parent == Some("item") && grandparent == Some("channel") {
            if name == "enclosure" {
                self.read_enclosure(element, decoder)?;
                return Ok(None);
            }
            return Ok(ItemField::from_tag(name).map(Field::Item));
        }

        if parent == Some("channel") {
            if name == "item" {
                self.items.push(FeedItem::default());
                return Ok(None);
            }
            return Ok(ChannelField::from_tag(name).map(Field::Channel));
        }

        Ok(None)
    }

    fn read_enclosure(
        &mut self,
        element: &BytesStart<'_>,
        decoder: Decoder,
    ) -> Result<(), ParseError> {
        let Some(item) = self.items.last_mut() else {
            return Ok(());
        };

        for attr in element.attributes() {
            let attr = attr?;
            let slot = match attr.key.as_ref() {
                b"url" => &mut item.media_url,
                b"type" => &mut item.mime_type,
                _ => continue,
            };
            *slot = Some(attr.decode_and_unescape_value(decoder)?.trim().to_string());
        }
        Ok(())
    }

    fn assign(&mut self, field: Field, text: String) {
        let text = text.trim().to_string();
        match field {
            Field::Channel(ChannelField::Title) => self.title = text,
            Field::Channel(ChannelField::Description) => self.description = text,
            Field::Channel(ChannelField::Summary) => self.summary = text,
            Field::Channel(ChannelField::PubDate) => self.last_updated = Some(text),
            Field::Item(field) => {
                let Some(item) = self.items.last_mut() else {
                    return;
                };
                let slot = match field {
                    ItemField::Title => &mut item.title,
                    ItemField::Description => &mut item.description,
                    ItemField::Duration => &mut item.duration,
                    ItemField::Guid => &mut item.guid,
                    ItemField::PubDate => &mut item.pub_date,
                    ItemField::Link => &mut item.link,
                };
                *slot = Some(text);
            }
        }
    }

    fn finish(self) -> FeedDocument {
        FeedDocument {
            title: self.title,
            description: self.description,
            summary: self.summary,
            last_updated: parse_rss_date_or_now(self.last_updated.as_deref()),
            episodes: self.items,
        }
    }
}

/// Parse RSS feed XML bytes into a FeedDocument
///
/// The document is read as a stream of events. Unknown elements are
/// skipped; only XML that is not well formed is an error.
pub fn parse_feed(xml_bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let mut reader = Reader::from_reader(xml_bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut feed = FeedAccumulator::default();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref element) => {
                let name = element_name(element);
                let target = feed.open(&name, &stack, element, reader.decoder())?;
                saw_root = true;
                stack.push(Frame {
                    name,
                    target,
                    text: String::new(),
                });
            }
            Event::Empty(ref element) => {
                let name = element_name(element);
                if let Some(target) = feed.open(&name, &stack, element, reader.decoder())? {
                    feed.assign(target, String::new());
                }
                saw_root = true;
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop()
                    && let Some(target) = frame.target
                {
                    feed.assign(target, frame.text);
                }
            }
            Event::Text(ref text) => append_text(&mut stack, &text.decode()?),
            Event::CData(ref data) => append_text(&mut stack, &data.decode()?),
            Event::GeneralRef(ref reference) => {
                append_text(&mut stack, &resolve_reference(reference)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(frame) = stack.pop() {
        return Err(ParseError::UnclosedElement(frame.name));
    }
    if !saw_root {
        return Err(ParseError::MissingRoot);
    }

    Ok(feed.finish())
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Text belongs to every capturing ancestor, like DOM `textContent`
fn append_text(stack: &mut [Frame], text: &str) {
    for frame in stack.iter_mut().filter(|frame| frame.target.is_some()) {
        frame.text.push_str(text);
    }
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, ParseError> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }

    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(resolved) => resolved.to_string(),
        // Leave HTML entities for the description cleaner
        None => format!("&{name};"),
    })
}
