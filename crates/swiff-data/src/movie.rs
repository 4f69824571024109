//! Whole-movie parsing: header, library and root timeline.

use crate::error::{ParseError, ParseFailure, Result};
use crate::library::Library;
use crate::model::{transform_bounds, Definition, DisplayAction, Rgba, SpriteDefinition};
use crate::parser::{parse_control, parse_tag, ControlTag, TimelineBuilder};
use crate::reader::Reader;
use crate::tags::{TagCode, TagRecord, TagStream};
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: u8,
    pub file_length: u32,
    /// Stage rectangle in pixels.
    pub frame_size: Rect,
    /// Frames per second.
    pub frame_rate: f32,
    pub frame_count: u16,
}

#[derive(Debug, Clone)]
pub struct ParsedMovie {
    pub header: Header,
    pub library: Library,
    /// The root timeline, as a sprite with id 0.
    pub timeline: SpriteDefinition,
    pub background: Option<Rgba>,
    /// Every tag that failed to decode or referenced an unknown character,
    /// ordered by offset.
    pub failures: Vec<ParseFailure>,
}

const HEADER_LEN: usize = 8;

/// Parses an uncompressed movie.
///
/// Only an unusable header is an error. Failures inside the tag stream are
/// collected in [`ParsedMovie::failures`] and parsing resumes at the next tag.
pub fn parse_movie(bytes: &[u8]) -> Result<ParsedMovie> {
    if bytes.len() < HEADER_LEN {
        return Err(ParseError::InvalidHeader(format!(
            "{} byte(s) is too short for a movie header",
            bytes.len()
        )));
    }
    match &bytes[..3] {
        b"FWS" => {}
        b"CWS" | b"ZWS" => {
            return Err(ParseError::InvalidHeader(
                "compressed movies are not supported".into(),
            ))
        }
        other => {
            return Err(ParseError::InvalidHeader(format!(
                "unknown signature {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    }
    let version = bytes[3];
    let file_length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    let mut r = Reader::new(&bytes[HEADER_LEN..]);
    let header_fields = (|| -> Result<(Rect, f32, u16)> {
        let frame_size = r.read_rect()?;
        let frame_rate = r.read_u16()? as f32 / 256.0;
        let frame_count = r.read_u16()?;
        Ok((frame_size, frame_rate, frame_count))
    })();
    let (frame_size, frame_rate, frame_count) =
        header_fields.map_err(|e| ParseError::InvalidHeader(e.to_string()))?;
    let tags_at = HEADER_LEN + r.position();

    let contents = parse_tag_stream(&bytes[tags_at..], tags_at, Some(frame_count), frame_size);
    Ok(ParsedMovie {
        header: Header {
            version,
            file_length,
            frame_size,
            frame_rate,
            frame_count: contents.timeline.frame_count(),
        },
        library: contents.library,
        timeline: contents.timeline,
        background: contents.background,
        failures: contents.failures,
    })
}

/// Parses a bare tag stream with no movie header. The frame count is the
/// number of frames the stream shows.
pub fn parse_tags(bytes: &[u8]) -> ParsedMovie {
    let contents = parse_tag_stream(bytes, 0, None, Rect::ZERO);
    ParsedMovie {
        header: Header {
            version: 0,
            file_length: bytes.len() as u32,
            frame_size: Rect::ZERO,
            frame_rate: 0.0,
            frame_count: contents.timeline.frame_count(),
        },
        library: contents.library,
        timeline: contents.timeline,
        background: contents.background,
        failures: contents.failures,
    }
}

struct StreamContents {
    library: Library,
    timeline: SpriteDefinition,
    background: Option<Rgba>,
    failures: Vec<ParseFailure>,
}

/// First two body bytes of a definition tag.
fn peek_character_id(code: TagCode, body: &[u8]) -> Option<u16> {
    if code.is_definition() && body.len() >= 2 {
        Some(u16::from_le_bytes([body[0], body[1]]))
    } else {
        None
    }
}

fn peek_code(rest: &[u8]) -> TagCode {
    match rest {
        [lo, hi, ..] => TagCode::from_u16(u16::from_le_bytes([*lo, *hi]) >> 6),
        _ => TagCode::End,
    }
}

struct PendingDefinition {
    definition: Definition,
    record: TagRecord,
}

fn parse_tag_stream(
    bytes: &[u8],
    base_offset: usize,
    declared_frames: Option<u16>,
    frame_size: Rect,
) -> StreamContents {
    let mut failures = Vec::new();
    let mut definitions: BTreeMap<u16, PendingDefinition> = BTreeMap::new();
    let mut control_tags: Vec<(TagRecord, ControlTag)> = Vec::new();
    let mut background = None;
    let mut next_offset = base_offset;

    for item in TagStream::with_base_offset(bytes, base_offset) {
        let (record, body) = match item {
            Ok(tag) => tag,
            Err(error) => {
                failures.push(ParseFailure {
                    code: peek_code(&bytes[next_offset - base_offset..]),
                    offset: next_offset,
                    character_id: None,
                    error,
                });
                break;
            }
        };
        next_offset = record.body_offset + record.body_length;
        let fail = |error| ParseFailure {
            code: record.code,
            offset: record.header_offset,
            character_id: peek_character_id(record.code, body),
            error,
        };

        if record.code == TagCode::SetBackgroundColor {
            match Reader::new(body).read_rgb() {
                Ok(color) => background = Some(color),
                Err(error) => failures.push(fail(error)),
            }
            continue;
        }
        match parse_control(record.code, body) {
            Ok(Some(ControlTag::End)) => break,
            Ok(Some(tag)) => {
                control_tags.push((record, tag));
                continue;
            }
            Ok(None) => {}
            Err(error) => {
                failures.push(fail(error));
                continue;
            }
        }
        match parse_tag(&record, body) {
            Ok(Some(definition)) => {
                let id = definition.id();
                if definitions.contains_key(&id) {
                    failures.push(fail(ParseError::malformed(format!(
                        "duplicate definition of character {id}"
                    ))));
                } else {
                    definitions.insert(id, PendingDefinition { definition, record });
                }
            }
            Ok(None) => {}
            Err(error) => failures.push(fail(error)),
        }
    }

    drop_invalid_sprite_references(&mut definitions, &mut failures);
    resolve_sprite_bounds(&mut definitions);

    let mut timeline = TimelineBuilder::new();
    for (record, tag) in control_tags {
        if let ControlTag::Action(DisplayAction::Place(place)) = &tag {
            if let Some(id) = place.character_id.filter(|id| !definitions.contains_key(id)) {
                failures.push(ParseFailure {
                    code: record.code,
                    offset: record.header_offset,
                    character_id: Some(id),
                    error: ParseError::InvalidReference(id),
                });
                continue;
            }
        }
        timeline.push(tag);
    }
    let declared = declared_frames.unwrap_or_else(|| timeline.shown_frames());

    let library: Library = definitions
        .into_values()
        .map(|pending| pending.definition)
        .collect();
    failures.sort_by_key(|f| f.offset);

    StreamContents {
        library,
        timeline: SpriteDefinition {
            id: 0,
            bounds: frame_size,
            frames: timeline.finish(declared),
        },
        background,
        failures,
    }
}

/// Removes sprite placements of unknown characters and placements that close
/// a cycle of sprites nesting each other.
fn drop_invalid_sprite_references(
    definitions: &mut BTreeMap<u16, PendingDefinition>,
    failures: &mut Vec<ParseFailure>,
) {
    let known: HashSet<u16> = definitions.keys().copied().collect();
    let cyclic = cyclic_sprite_edges(definitions);
    for (id, pending) in definitions.iter_mut() {
        let record = pending.record;
        let Definition::Sprite(sprite) = &mut pending.definition else {
            continue;
        };
        for frame in &mut sprite.frames {
            frame.actions.retain(|action| {
                let DisplayAction::Place(place) = action else {
                    return true;
                };
                match place.character_id {
                    Some(child) if !known.contains(&child) || cyclic.contains(&(*id, child)) => {
                        failures.push(ParseFailure {
                            code: record.code,
                            offset: record.header_offset,
                            character_id: Some(*id),
                            error: ParseError::InvalidReference(child),
                        });
                        false
                    }
                    _ => true,
                }
            });
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Open,
    Done,
}

/// `(parent, child)` sprite edges that lead back to a sprite still being
/// visited. Sprites are walked depth-first in id order, so removing these
/// edges leaves the nesting graph acyclic.
fn cyclic_sprite_edges(definitions: &BTreeMap<u16, PendingDefinition>) -> HashSet<(u16, u16)> {
    let children: BTreeMap<u16, Vec<u16>> = definitions
        .iter()
        .filter_map(|(id, pending)| {
            let sprite = pending.definition.as_sprite()?;
            let mut placed: Vec<u16> = sprite
                .frames
                .iter()
                .flat_map(|frame| frame.actions.iter())
                .filter_map(|action| match action {
                    DisplayAction::Place(place) => place.character_id,
                    _ => None,
                })
                .collect();
            placed.sort_unstable();
            placed.dedup();
            Some((*id, placed))
        })
        .collect();

    let mut visits: HashMap<u16, Visit> = HashMap::new();
    let mut cyclic = HashSet::new();
    for &root in children.keys() {
        if visits.contains_key(&root) {
            continue;
        }
        visits.insert(root, Visit::Open);
        let mut stack = vec![(root, 0usize)];
        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let Some(child) = children.get(&node).and_then(|c| c.get(*next)).copied() else {
                visits.insert(node, Visit::Done);
                stack.pop();
                continue;
            };
            *next += 1;
            match visits.get(&child) {
                Some(Visit::Open) => {
                    cyclic.insert((node, child));
                }
                Some(Visit::Done) => {}
                None if children.contains_key(&child) => {
                    visits.insert(child, Visit::Open);
                    stack.push((child, 0));
                }
                None => {}
            }
        }
    }
    cyclic
}

fn resolve_sprite_bounds(definitions: &mut BTreeMap<u16, PendingDefinition>) {
    let mut resolved: BTreeMap<u16, Rect> = BTreeMap::new();
    let sprite_ids: Vec<u16> = definitions
        .iter()
        .filter(|(_, p)| matches!(p.definition, Definition::Sprite(_)))
        .map(|(id, _)| *id)
        .collect();
    for id in &sprite_ids {
        let mut visiting = HashSet::new();
        sprite_bounds(*id, definitions, &mut resolved, &mut visiting);
    }
    for id in sprite_ids {
        if let (Some(pending), Some(bounds)) = (definitions.get_mut(&id), resolved.get(&id)) {
            if let Definition::Sprite(sprite) = &mut pending.definition {
                sprite.bounds = *bounds;
            }
        }
    }
}

/// Union of the transformed bounds of every character a sprite places.
fn sprite_bounds(
    id: u16,
    definitions: &BTreeMap<u16, PendingDefinition>,
    resolved: &mut BTreeMap<u16, Rect>,
    visiting: &mut HashSet<u16>,
) -> Rect {
    if let Some(bounds) = resolved.get(&id) {
        return *bounds;
    }
    let Some(pending) = definitions.get(&id) else {
        return Rect::ZERO;
    };
    let sprite = match &pending.definition {
        Definition::Sprite(sprite) => sprite,
        other => return other.bounds(),
    };
    if !visiting.insert(id) {
        return Rect::ZERO;
    }
    let mut bounds: Option<Rect> = None;
    for frame in &sprite.frames {
        for action in &frame.actions {
            let DisplayAction::Place(place) = action else {
                continue;
            };
            let Some(child) = place.character_id else {
                continue;
            };
            let child_bounds = sprite_bounds(child, definitions, resolved, visiting);
            let placed = transform_bounds(place.matrix.unwrap_or(Affine::IDENTITY), child_bounds);
            bounds = Some(bounds.map_or(placed, |b| b.union(placed)));
        }
    }
    visiting.remove(&id);
    let bounds = bounds.unwrap_or(Rect::ZERO);
    resolved.insert(id, bounds);
    bounds
}
