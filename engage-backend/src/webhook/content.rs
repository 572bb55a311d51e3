//! Message payload classification and text extraction

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::MessageType;

/// Payload keys in classification order. The first key present wins.
const PAYLOAD_KINDS: &[(&str, MessageType)] = &[
    ("imageMessage", MessageType::Image),
    ("videoMessage", MessageType::Video),
    ("ptvMessage", MessageType::Video),
    ("audioMessage", MessageType::Audio),
    ("stickerMessage", MessageType::Sticker),
    ("documentMessage", MessageType::Document),
    ("documentWithCaptionMessage", MessageType::Document),
    ("pollCreationMessage", MessageType::Poll),
    ("pollCreationMessageV2", MessageType::Poll),
    ("pollCreationMessageV3", MessageType::Poll),
    ("listMessage", MessageType::List),
    ("listResponseMessage", MessageType::List),
    ("contactMessage", MessageType::Contact),
    ("contactsArrayMessage", MessageType::Contact),
    ("locationMessage", MessageType::Location),
    ("liveLocationMessage", MessageType::Location),
];

/// `messageType` hints that mean plain text
const TEXT_HINTS: &[&str] = &[
    "conversation",
    "extendedTextMessage",
    "buttonsResponseMessage",
    "templateButtonReplyMessage",
];

/// Envelopes that wrap the real payload under `.message`
const WRAPPERS: &[&str] = &[
    "ephemeralMessage",
    "viewOnceMessage",
    "viewOnceMessageV2",
    "viewOnceMessageV2Extension",
    "editedMessage",
];

static NULL: Value = Value::Null;

static VCARD_WAID: Lazy<Regex> = Lazy::new(|| Regex::new(r"waid=(\d+)").unwrap());
static VCARD_TEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^TEL[^:]*:([+\d][\d\s\-()]+)").unwrap());

/// Where to fetch the file of a media message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRef {
    pub url: Option<String>,
    pub mimetype: Option<String>,
    pub file_name: Option<String>,
    /// Inline payload when the provider is configured to send media as base64
    pub inline_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub message_type: MessageType,
    pub content: String,
    pub media: Option<MediaRef>,
}

/// Strip ephemeral / view-once wrappers
fn unwrap_payload(message: &Value) -> &Value {
    let mut current = message;
    // Wrappers nest at most a couple of levels
    for _ in 0..4 {
        let inner = WRAPPERS
            .iter()
            .find_map(|w| current.get(*w).and_then(|v| v.get("message")));
        match inner {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

/// Classify a message payload. A recognised `messageType` hint is trusted first.
pub fn classify(message_type_hint: Option<&str>, message: &Value) -> (MessageType, Option<&'static str>) {
    let message = unwrap_payload(message);

    if let Some(hint) = message_type_hint {
        if TEXT_HINTS.contains(&hint) {
            return (MessageType::Text, None);
        }
        if let Some((key, kind)) = PAYLOAD_KINDS.iter().find(|(k, _)| *k == hint) {
            return (*kind, Some(*key));
        }
    }

    PAYLOAD_KINDS
        .iter()
        .find(|(key, _)| message.get(*key).is_some())
        .map(|(key, kind)| (*kind, Some(*key)))
        .unwrap_or((MessageType::Text, None))
}

/// Classify and pull the human-readable content (and media reference) out of a payload
pub fn extract(message_type_hint: Option<&str>, raw: &Value) -> ExtractedContent {
    let (message_type, key) = classify(message_type_hint, raw);
    let message = unwrap_payload(raw);
    // The provider inlines `base64` next to the outermost wrapper, not inside it
    let inline_base64 = text_of(raw, "base64").or_else(|| text_of(message, "base64"));
    let node = key.and_then(|k| message.get(k)).unwrap_or(&NULL);

    let (content, media) = match message_type {
        MessageType::Text => (extract_text(message), None),
        MessageType::Image | MessageType::Video | MessageType::Audio | MessageType::Sticker => {
            let caption = text_of(node, "caption").unwrap_or_default();
            (caption, Some(media_ref(node, inline_base64)))
        }
        MessageType::Document => {
            // documentWithCaptionMessage nests a documentMessage one level down
            let doc = node
                .get("message")
                .and_then(|m| m.get("documentMessage"))
                .unwrap_or(node);
            let content = text_of(doc, "caption")
                .or_else(|| text_of(doc, "fileName"))
                .or_else(|| text_of(doc, "title"))
                .unwrap_or_default();
            (content, Some(media_ref(doc, inline_base64)))
        }
        MessageType::Poll => (extract_poll(node), None),
        MessageType::List => (extract_list(node), None),
        MessageType::Contact => (extract_contacts(node), None),
        MessageType::Location => (extract_location(node), None),
    };

    ExtractedContent {
        message_type,
        content,
        media,
    }
}

fn text_of(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_text(message: &Value) -> String {
    if let Some(text) = message.get("conversation").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(text) = message.get("extendedTextMessage").and_then(|m| text_of(m, "text")) {
        return text;
    }
    for key in ["buttonsResponseMessage", "templateButtonReplyMessage"] {
        if let Some(text) = message.get(key).and_then(|m| text_of(m, "selectedDisplayText")) {
            return text;
        }
    }
    if let Some(reaction) = message.get("reactionMessage").and_then(|m| text_of(m, "text")) {
        return reaction;
    }
    String::new()
}

fn media_ref(node: &Value, inline_base64: Option<String>) -> MediaRef {
    MediaRef {
        url: text_of(node, "url"),
        mimetype: text_of(node, "mimetype"),
        file_name: text_of(node, "fileName"),
        inline_base64,
    }
}

fn extract_poll(node: &Value) -> String {
    let name = text_of(node, "name").unwrap_or_default();
    let options: Vec<String> = node
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| opts.iter().filter_map(|o| text_of(o, "optionName")).collect())
        .unwrap_or_default();

    let mut lines = vec![name];
    lines.extend(options.into_iter().map(|o| format!("- {}", o)));
    lines.join("\n").trim().to_string()
}

fn extract_list(node: &Value) -> String {
    // listResponseMessage: the title is the row the contact picked
    let parts: Vec<String> = ["title", "description"]
        .iter()
        .filter_map(|k| text_of(node, k))
        .collect();
    if !parts.is_empty() {
        return parts.join("\n");
    }
    node.get("singleSelectReply")
        .and_then(|r| text_of(r, "selectedRowId"))
        .unwrap_or_default()
}

fn vcard_phone(vcard: &str) -> Option<String> {
    if let Some(caps) = VCARD_WAID.captures(vcard) {
        return Some(caps[1].to_string());
    }
    VCARD_TEL.captures(vcard).map(|caps| {
        caps[1].chars().filter(|c| c.is_ascii_digit()).collect()
    })
}

fn describe_contact(node: &Value) -> Option<String> {
    let name = text_of(node, "displayName");
    let phone = node.get("vcard").and_then(Value::as_str).and_then(vcard_phone);
    match (name, phone) {
        (Some(name), Some(phone)) => Some(format!("{} ({})", name, phone)),
        (Some(name), None) => Some(name),
        (None, Some(phone)) => Some(phone),
        (None, None) => None,
    }
}

fn extract_contacts(node: &Value) -> String {
    if let Some(contacts) = node.get("contacts").and_then(Value::as_array) {
        return contacts
            .iter()
            .filter_map(describe_contact)
            .collect::<Vec<_>>()
            .join(", ");
    }
    describe_contact(node).unwrap_or_default()
}

fn extract_location(node: &Value) -> String {
    let lat = node.get("degreesLatitude").and_then(Value::as_f64);
    let lng = node.get("degreesLongitude").and_then(Value::as_f64);
    let label = text_of(node, "name").or_else(|| text_of(node, "address"));

    match (label, lat, lng) {
        (Some(label), Some(lat), Some(lng)) => format!("{} ({}, {})", label, lat, lng),
        (None, Some(lat), Some(lng)) => format!("{}, {}", lat, lng),
        (Some(label), _, _) => label,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_media_keeps_top_level_base64() {
        let extracted = extract(
            None,
            &json!({
                "viewOnceMessageV2": {
                    "message": {
                        "imageMessage": {
                            "url": "https://mmg.whatsapp.net/v/t62/abc.enc",
                            "mimetype": "image/jpeg",
                            "caption": "só uma vez"
                        }
                    }
                },
                "base64": "aGVsbG8="
            }),
        );
        assert_eq!(extracted.message_type, MessageType::Image);
        assert_eq!(extracted.content, "só uma vez");
        let media = extracted.media.unwrap();
        assert_eq!(media.inline_base64.as_deref(), Some("aGVsbG8="));
        assert_eq!(media.mimetype.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_plain_and_extended_text() {
        let plain = extract(None, &json!({"conversation": "Olá!"}));
        assert_eq!(plain.message_type, MessageType::Text);
        assert_eq!(plain.content, "Olá!");

        let extended = extract(
            Some("extendedTextMessage"),
            &json!({"extendedTextMessage": {"text": "veja https://exemplo.com"}}),
        );
        assert_eq!(extended.content, "veja https://exemplo.com");
        assert!(extended.media.is_none());
    }

    #[test]
    fn test_image_with_caption_and_inline_base64() {
        let extracted = extract(
            None,
            &json!({
                "imageMessage": {"url": "https://mmg.whatsapp.net/x.enc", "mimetype": "image/jpeg", "caption": "foto"},
                "base64": "AAEC"
            }),
        );
        assert_eq!(extracted.message_type, MessageType::Image);
        assert_eq!(extracted.content, "foto");
        let media = extracted.media.unwrap();
        assert_eq!(media.url.as_deref(), Some("https://mmg.whatsapp.net/x.enc"));
        assert_eq!(media.mimetype.as_deref(), Some("image/jpeg"));
        assert_eq!(media.inline_base64.as_deref(), Some("AAEC"));
    }

    #[test]
    fn test_voice_note_is_audio() {
        let extracted = extract(
            Some("audioMessage"),
            &json!({"audioMessage": {"url": "https://x/a.enc", "mimetype": "audio/ogg; codecs=opus", "ptt": true}}),
        );
        assert_eq!(extracted.message_type, MessageType::Audio);
        assert_eq!(extracted.content, "");
    }

    #[test]
    fn test_document_with_caption_nesting() {
        let extracted = extract(
            None,
            &json!({"documentWithCaptionMessage": {"message": {"documentMessage": {
                "url": "https://x/d.enc", "mimetype": "application/pdf", "fileName": "boleto.pdf", "caption": "segue"
            }}}}),
        );
        assert_eq!(extracted.message_type, MessageType::Document);
        assert_eq!(extracted.content, "segue");
        assert_eq!(extracted.media.unwrap().file_name.as_deref(), Some("boleto.pdf"));

        let no_caption = extract(
            None,
            &json!({"documentMessage": {"url": "https://x/d.enc", "fileName": "contrato.pdf"}}),
        );
        assert_eq!(no_caption.content, "contrato.pdf");
    }

    #[test]
    fn test_poll() {
        let extracted = extract(
            None,
            &json!({"pollCreationMessageV3": {"name": "Melhor horário?", "options": [
                {"optionName": "Manhã"}, {"optionName": "Tarde"}
            ]}}),
        );
        assert_eq!(extracted.message_type, MessageType::Poll);
        assert_eq!(extracted.content, "Melhor horário?\n- Manhã\n- Tarde");
    }

    #[test]
    fn test_list_response() {
        let extracted = extract(
            Some("listResponseMessage"),
            &json!({"listResponseMessage": {"title": "Plano Premium", "singleSelectReply": {"selectedRowId": "premium"}}}),
        );
        assert_eq!(extracted.message_type, MessageType::List);
        assert_eq!(extracted.content, "Plano Premium");

        let row_only = extract(
            None,
            &json!({"listResponseMessage": {"singleSelectReply": {"selectedRowId": "premium"}}}),
        );
        assert_eq!(row_only.content, "premium");
    }

    #[test]
    fn test_contact_cards() {
        let single = extract(
            None,
            &json!({"contactMessage": {"displayName": "Joana", "vcard": "BEGIN:VCARD\nTEL;type=CELL;waid=5511977776666:+55 11 97777-6666\nEND:VCARD"}}),
        );
        assert_eq!(single.message_type, MessageType::Contact);
        assert_eq!(single.content, "Joana (5511977776666)");

        let many = extract(
            None,
            &json!({"contactsArrayMessage": {"contacts": [
                {"displayName": "A", "vcard": "BEGIN:VCARD\nTEL:+1 555 0100\nEND:VCARD"},
                {"displayName": "B"}
            ]}}),
        );
        assert_eq!(many.content, "A (15550100), B");
    }

    #[test]
    fn test_location() {
        let named = extract(
            None,
            &json!({"locationMessage": {"degreesLatitude": -23.55, "degreesLongitude": -46.63, "name": "Escritório"}}),
        );
        assert_eq!(named.message_type, MessageType::Location);
        assert_eq!(named.content, "Escritório (-23.55, -46.63)");

        let bare = extract(None, &json!({"liveLocationMessage": {"degreesLatitude": 1.5, "degreesLongitude": 2.0}}));
        assert_eq!(bare.content, "1.5, 2");
    }

    #[test]
    fn test_wrappers_are_unwrapped() {
        let extracted = extract(
            None,
            &json!({"ephemeralMessage": {"message": {"viewOnceMessageV2": {"message": {
                "imageMessage": {"url": "https://x/i.enc"}
            }}}}}),
        );
        assert_eq!(extracted.message_type, MessageType::Image);
    }

    #[test]
    fn test_hint_wins_over_payload_scan() {
        let (kind, _) = classify(Some("conversation"), &json!({"conversation": "x", "imageMessage": {}}));
        assert_eq!(kind, MessageType::Text);
        let (kind, key) = classify(Some("reactionMessage"), &json!({"stickerMessage": {}}));
        assert_eq!(kind, MessageType::Sticker);
        assert_eq!(key, Some("stickerMessage"));
    }
}
