//! Map grammers TL types to domain DTOs.
//!
//! Extracts text, media, forward origin, and the emoji -> count reaction
//! map from a raw message — every field is named explicitly, nothing is
//! passed through as an untyped map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grammers_client::tl;

use crate::domain::{FetchedMedia, FetchedMessage, ForwardOrigin, MediaKind};

/// Converts a raw `tl::enums::Message` into a `FetchedMessage`. Returns
/// `None` for service messages and empty placeholders, which carry no
/// content worth collecting.
pub fn message_to_fetched(msg: &tl::enums::Message) -> Option<FetchedMessage> {
    match msg {
        tl::enums::Message::Empty(_) => None,
        tl::enums::Message::Service(_) => None,
        tl::enums::Message::Message(m) => {
            let text = if m.message.is_empty() {
                None
            } else {
                Some(m.message.clone())
            };

            // Prefer edit_date when present so the "current" version carries the edit timestamp.
            let published_at = timestamp_to_utc(m.edit_date.unwrap_or(m.date));

            let forward_origin = m.fwd_from.as_ref().map(forward_origin_from_header);

            let media = extract_media(m.media.as_ref()).into_iter().collect();

            let reactions = m
                .reactions
                .as_ref()
                .map(extract_reaction_counts)
                .unwrap_or_default();

            Some(FetchedMessage {
                telegram_message_id: m.id as i64,
                published_at,
                text,
                language: None,
                media,
                forward_origin,
                view_count: m.views.unwrap_or(0) as i64,
                forward_count: m.forwards.unwrap_or(0) as i64,
                reply_count: reply_count(m),
                reactions,
            })
        }
    }
}

fn timestamp_to_utc(secs: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_else(Utc::now)
}

fn reply_count(m: &tl::types::Message) -> i64 {
    m.replies.as_ref().map(|r| r.replies as i64).unwrap_or(0)
}

fn forward_origin_from_header(hdr: &tl::enums::MessageFwdHeader) -> ForwardOrigin {
    let tl::enums::MessageFwdHeader::Header(h) = hdr;
    ForwardOrigin {
        channel_id: h.from_id.as_ref().and_then(|p| match p {
            tl::enums::Peer::Channel(c) => Some(c.channel_id as i64),
            _ => None,
        }),
        message_id: h.channel_post.map(|id| id as i64),
    }
}

fn extract_media(media: Option<&tl::enums::MessageMedia>) -> Option<FetchedMedia> {
    match media? {
        tl::enums::MessageMedia::Photo(p) => p.photo.as_ref().map(|_| FetchedMedia {
            kind: MediaKind::Photo,
            file_id: "photo".to_string(),
            size_bytes: None,
            mime_type: None,
            width: None,
            height: None,
            duration_secs: None,
        }),
        tl::enums::MessageMedia::Document(d) => d.document.as_ref().and_then(|doc| match doc {
            tl::enums::Document::Document(doc) => {
                let kind = if doc.mime_type.starts_with("video/") {
                    MediaKind::Video
                } else if doc.mime_type.starts_with("audio/") {
                    MediaKind::Audio
                } else if doc.mime_type == "video/mp4" || doc.mime_type == "image/gif" {
                    MediaKind::Animation
                } else {
                    MediaKind::Document
                };
                Some(FetchedMedia {
                    kind,
                    file_id: doc.id.to_string(),
                    size_bytes: Some(doc.size),
                    mime_type: Some(doc.mime_type.clone()),
                    width: None,
                    height: None,
                    duration_secs: None,
                })
            }
            _ => None,
        }),
        _ => None,
    }
}

/// Flattens the per-reaction result list into `emoji -> count`, never
/// collapsing distinct emoji into a single total.
fn extract_reaction_counts(reactions: &tl::enums::MessageReactions) -> BTreeMap<String, i64> {
    let mut out = BTreeMap::new();
    let tl::enums::MessageReactions::Reactions(r) = reactions;
    for result in &r.results {
        let tl::enums::ReactionCount::ReactionCount(rc) = result;
        if let tl::enums::Reaction::Emoji(e) = &rc.reaction {
            *out.entry(e.emoticon.clone()).or_insert(0) += rc.count as i64;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_media_handles_no_media() {
        assert!(extract_media(None).is_none());
    }
}
