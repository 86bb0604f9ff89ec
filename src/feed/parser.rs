use quick_xml::errors::IllFormedError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::feed::types::FeedItem;
use crate::util::{parse_timestamp, strip_tags, TimeParseError};

/// Errors that can occur while turning a fetched payload into items.
///
/// Either failure discards the whole feed: no items are returned for a
/// document that fails at any point.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not well-formed XML
    #[error("malformed feed from {url}: {source}")]
    Xml {
        url: String,
        #[source]
        source: quick_xml::Error,
    },
    /// Well-formed XML without a `<channel>` under the root element
    #[error("no <channel> element in feed from {url}")]
    NoChannel { url: String },
    /// An item's `<pubDate>` matched no known timestamp layout
    #[error("bad publish date in feed from {url}: {source}")]
    Timestamp {
        url: String,
        #[source]
        source: TimeParseError,
    },
}

impl DecodeError {
    /// URL of the feed that failed to decode.
    pub fn url(&self) -> &str {
        match self {
            DecodeError::Xml { url, .. }
            | DecodeError::NoChannel { url }
            | DecodeError::Timestamp { url, .. } => url,
        }
    }
}

// Element depths in an RSS 2.0 document. The root element's name is not checked.
const CHANNEL_DEPTH: usize = 2;
const CHANNEL_CHILD_DEPTH: usize = 3;
const ITEM_CHILD_DEPTH: usize = 4;

#[derive(Debug, Default)]
struct RawChannel {
    title: Option<String>,
    items: Vec<RawItem>,
}

#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    ChannelTitle,
    Title,
    Link,
    PubDate,
    Description,
}

/// Text of the element currently being read.
#[derive(Debug)]
struct OpenField {
    field: Field,
    depth: usize,
    text: String,
}

/// Walks the event stream and keeps the parts of the first `<channel>` that
/// become items.
///
/// Only unprefixed elements are read, so `<itunes:title>` or `<atom:link>`
/// never stand in for the RSS `<title>` or `<link>`. When an element repeats,
/// the first occurrence wins. Everything else is skipped.
#[derive(Debug, Default)]
struct ChannelReader {
    depth: usize,
    channel: Option<RawChannel>,
    channel_closed: bool,
    item: Option<RawItem>,
    open: Option<OpenField>,
}

impl ChannelReader {
    fn in_channel(&self) -> bool {
        self.channel.is_some() && !self.channel_closed
    }

    fn start(&mut self, name: QName<'_>) {
        self.depth += 1;
        if self.open.is_some() || name.prefix().is_some() {
            return;
        }

        let field = match (self.depth, name.local_name().as_ref()) {
            (CHANNEL_DEPTH, b"channel") if self.channel.is_none() => {
                self.channel = Some(RawChannel::default());
                None
            }
            (CHANNEL_CHILD_DEPTH, b"item") if self.in_channel() => {
                self.item = Some(RawItem::default());
                None
            }
            (CHANNEL_CHILD_DEPTH, b"title") if self.in_channel() => Some(Field::ChannelTitle),
            (ITEM_CHILD_DEPTH, local) if self.item.is_some() => match local {
                b"title" => Some(Field::Title),
                b"link" => Some(Field::Link),
                b"pubDate" => Some(Field::PubDate),
                b"description" => Some(Field::Description),
                _ => None,
            },
            _ => None,
        };

        if let Some(field) = field {
            self.open = Some(OpenField {
                field,
                depth: self.depth,
                text: String::new(),
            });
        }
    }

    fn text(&mut self, text: &str) {
        // Text of nested children is not part of the field
        let depth = self.depth;
        if let Some(open) = self.open.as_mut().filter(|open| open.depth == depth) {
            open.text.push_str(text);
        }
    }

    fn end(&mut self) {
        if self.open.as_ref().is_some_and(|open| open.depth == self.depth) {
            if let Some(open) = self.open.take() {
                self.store(open);
            }
        } else if self.depth == CHANNEL_CHILD_DEPTH && self.item.is_some() {
            if let (Some(item), Some(channel)) = (self.item.take(), self.channel.as_mut()) {
                channel.items.push(item);
            }
        } else if self.depth == CHANNEL_DEPTH && self.in_channel() {
            self.channel_closed = true;
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn store(&mut self, open: OpenField) {
        let slot = match open.field {
            Field::ChannelTitle => self.channel.as_mut().map(|c| &mut c.title),
            Field::Title => self.item.as_mut().map(|i| &mut i.title),
            Field::Link => self.item.as_mut().map(|i| &mut i.link),
            Field::PubDate => self.item.as_mut().map(|i| &mut i.pub_date),
            Field::Description => self.item.as_mut().map(|i| &mut i.description),
        };
        if let Some(slot) = slot {
            slot.get_or_insert(open.text);
        }
    }
}

/// Reads the first `<channel>` out of an XML payload.
///
/// Returns `Ok(None)` for well-formed XML with no channel.
fn read_channel(bytes: &[u8]) -> Result<Option<RawChannel>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    let mut state = ChannelReader::default();
    let mut root: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                state.start(e.name());
            }
            Event::Empty(e) => {
                state.start(e.name());
                state.end();
            }
            Event::End(_) => state.end(),
            Event::Text(e) => state.text(&e.unescape()?),
            Event::CData(e) => state.text(&e.decode()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if state.depth > 0 {
        let root = root.unwrap_or_default();
        return Err(IllFormedError::MissingEndTag(root).into());
    }

    Ok(state.channel)
}

/// Decodes an RSS payload into feed items.
///
/// Items are returned in document order. Titles and links are trimmed,
/// descriptions have markup tags stripped, and every item records `url` as
/// its source URL and the channel title as its source. Elements outside the
/// RSS vocabulary, namespaced ones included, are ignored.
///
/// # Errors
///
/// - [`DecodeError::Xml`] if `bytes` is not well-formed XML
/// - [`DecodeError::NoChannel`] if the root element has no `<channel>` child
/// - [`DecodeError::Timestamp`] on the first item whose date cannot be parsed;
///   items decoded before it are discarded
pub fn decode_feed(bytes: &[u8], url: &str) -> Result<Vec<FeedItem>, DecodeError> {
    let channel = read_channel(bytes)
        .map_err(|source| DecodeError::Xml {
            url: url.to_string(),
            source,
        })?
        .ok_or_else(|| DecodeError::NoChannel {
            url: url.to_string(),
        })?;

    let source = channel.title.unwrap_or_default().trim().to_string();

    let items = channel
        .items
        .into_iter()
        .map(|raw| {
            // Missing dates become "" and fail timestamp parsing
            let pub_date = raw.pub_date.unwrap_or_default();
            let publish_date =
                parse_timestamp(&pub_date).map_err(|source| DecodeError::Timestamp {
                    url: url.to_string(),
                    source,
                })?;

            Ok(FeedItem {
                title: raw.title.unwrap_or_default().trim().to_string(),
                source: source.clone(),
                source_url: url.to_string(),
                link: raw.link.unwrap_or_default().trim().to_string(),
                publish_date,
                description: strip_tags(&raw.description.unwrap_or_default()),
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    tracing::debug!(url = %url, items = items.len(), "Decoded feed");

    Ok(items)
}
