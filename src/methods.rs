//! Immutable method descriptor table.
//!
//! One descriptor per upstream operation, carrying everything the pipeline
//! needs to drive a call without per-method code paths: parameter specs,
//! destination scoping, cache TTL, upload slots, and cross-field rules.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Parameter type constraint. Lenient by design: anything not listed here
/// passes through to the upstream call untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    String,
    /// Chat identifiers may be numeric or `@name` strings.
    StringOrInteger,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    Enumeration(&'static [&'static str]),
    Array { items: Option<&'static ParamKind> },
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn req(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: true }
}

const fn opt(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: false }
}

/// Shape of an uploadable parameter slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadShape {
    /// The value itself may be a file reference.
    Plain,
    /// Array of descriptor objects; the listed inner fields may carry
    /// file references.
    Array(&'static [&'static str]),
    /// Single descriptor object; the listed inner fields may carry file
    /// references.
    Object(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadSlot {
    pub name: &'static str,
    pub shape: UploadShape,
}

const fn slot(name: &'static str) -> UploadSlot {
    UploadSlot { name, shape: UploadShape::Plain }
}

/// Coarse grouping used by the `find` meta tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCategory {
    Identity,
    Messaging,
    Editing,
    ChatAdmin,
    Stickers,
    Files,
    Webhooks,
    Queries,
}

impl MethodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Messaging => "messaging",
            Self::Editing => "editing",
            Self::ChatAdmin => "chat_admin",
            Self::Stickers => "stickers",
            Self::Files => "files",
            Self::Webhooks => "webhooks",
            Self::Queries => "queries",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(Self::Identity),
            "messaging" => Some(Self::Messaging),
            "editing" => Some(Self::Editing),
            "chat_admin" => Some(Self::ChatAdmin),
            "stickers" => Some(Self::Stickers),
            "files" => Some(Self::Files),
            "webhooks" => Some(Self::Webhooks),
            "queries" => Some(Self::Queries),
            _ => None,
        }
    }
}

/// Static description of one upstream method.
#[derive(Debug, Clone, Copy)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub category: MethodCategory,
    pub params: &'static [ParamSpec],
    /// Subject to per-destination pacing when the call carries a
    /// destination id.
    pub destination_scoped: bool,
    pub cache_ttl: Option<Duration>,
    pub upload_slots: &'static [UploadSlot],
    /// Groups of fields where at least one group must be fully present.
    pub require_one_of: &'static [&'static [&'static str]],
}

impl MethodDescriptor {
    const fn new(
        name: &'static str,
        description: &'static str,
        category: MethodCategory,
        params: &'static [ParamSpec],
    ) -> Self {
        Self {
            name,
            description,
            category,
            params,
            destination_scoped: false,
            cache_ttl: None,
            upload_slots: &[],
            require_one_of: &[],
        }
    }

    const fn scoped(mut self) -> Self {
        self.destination_scoped = true;
        self
    }

    const fn cached(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl = Some(Duration::from_secs(ttl_secs));
        self
    }

    const fn uploads(mut self, slots: &'static [UploadSlot]) -> Self {
        self.upload_slots = slots;
        self
    }

    const fn one_of(mut self, groups: &'static [&'static [&'static str]]) -> Self {
        self.require_one_of = groups;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }

    pub fn optional(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| !p.required).map(|p| p.name)
    }

    pub fn is_cacheable(&self) -> bool {
        self.cache_ttl.is_some()
    }
}

const CHAT_ID: ParamSpec = req("chat_id", ParamKind::StringOrInteger);
const INT: ParamKind = ParamKind::Integer { min: None, max: None };
const STR: ParamKind = ParamKind::String;
const BOOL: ParamKind = ParamKind::Boolean;
const OBJ: ParamKind = ParamKind::Object;

const PARSE_MODE: ParamKind = ParamKind::Enumeration(&["Markdown", "MarkdownV2", "HTML"]);
static STRING_ITEM: ParamKind = ParamKind::String;
static OBJECT_ITEM: ParamKind = ParamKind::Object;

const EDIT_TARGET: &[&[&str]] = &[&["chat_id", "message_id"], &["inline_message_id"]];

use MethodCategory::*;

/// Every operation the gateway exposes.
pub static METHODS: &[MethodDescriptor] = &[
    // Identity and lookups. TTLs follow how fast each answer can drift.
    MethodDescriptor::new(
        "get_identity",
        "Basic account information for the bot itself",
        Identity,
        &[],
    )
    .cached(3600),
    MethodDescriptor::new(
        "get_webhook_info",
        "Current webhook registration and pending update count",
        Webhooks,
        &[],
    )
    .cached(60),
    MethodDescriptor::new(
        "get_chat",
        "Full information about a chat, channel, or user dialog",
        Identity,
        &[CHAT_ID],
    )
    .cached(120),
    MethodDescriptor::new(
        "get_sticker_set",
        "A sticker set by name",
        Stickers,
        &[req("name", STR)],
    )
    .cached(300),
    MethodDescriptor::new(
        "get_chat_member_count",
        "Number of members in a chat",
        Identity,
        &[CHAT_ID],
    ),
    MethodDescriptor::new(
        "get_chat_administrators",
        "Administrators of a chat",
        Identity,
        &[CHAT_ID],
    ),
    MethodDescriptor::new(
        "get_chat_member",
        "Membership information for one user in a chat",
        Identity,
        &[CHAT_ID, req("user_id", INT)],
    ),
    MethodDescriptor::new(
        "get_profile_photos",
        "Profile photos of a user",
        Files,
        &[
            req("user_id", INT),
            opt("offset", ParamKind::Integer { min: Some(0), max: None }),
            opt("limit", ParamKind::Integer { min: Some(1), max: Some(100) }),
        ],
    ),
    MethodDescriptor::new(
        "get_file",
        "File metadata and download path by file identifier",
        Files,
        &[req("file_id", STR)],
    ),
    // Sending. All destination-scoped: per-chat pacing applies.
    MethodDescriptor::new(
        "send_text",
        "Send a text message to a chat",
        Messaging,
        &[
            CHAT_ID,
            req("text", STR),
            opt("parse_mode", PARSE_MODE),
            opt("disable_notification", BOOL),
            opt("reply_to_message_id", INT),
            opt("reply_markup", OBJ),
        ],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_photo",
        "Send a photo from a local file, URL, or platform file id",
        Messaging,
        &[
            CHAT_ID,
            req("photo", STR),
            opt("caption", STR),
            opt("parse_mode", PARSE_MODE),
            opt("disable_notification", BOOL),
            opt("reply_markup", OBJ),
        ],
    )
    .scoped()
    .uploads(&[slot("photo")]),
    MethodDescriptor::new(
        "send_audio",
        "Send an audio track",
        Messaging,
        &[
            CHAT_ID,
            req("audio", STR),
            opt("caption", STR),
            opt("duration", INT),
            opt("performer", STR),
            opt("title", STR),
            opt("thumbnail", STR),
        ],
    )
    .scoped()
    .uploads(&[slot("audio"), slot("thumbnail")]),
    MethodDescriptor::new(
        "send_document",
        "Send a general file",
        Messaging,
        &[
            CHAT_ID,
            req("document", STR),
            opt("caption", STR),
            opt("parse_mode", PARSE_MODE),
            opt("thumbnail", STR),
            opt("disable_notification", BOOL),
        ],
    )
    .scoped()
    .uploads(&[slot("document"), slot("thumbnail")]),
    MethodDescriptor::new(
        "send_video",
        "Send a video",
        Messaging,
        &[
            CHAT_ID,
            req("video", STR),
            opt("caption", STR),
            opt("duration", INT),
            opt("width", INT),
            opt("height", INT),
            opt("thumbnail", STR),
            opt("supports_streaming", BOOL),
        ],
    )
    .scoped()
    .uploads(&[slot("video"), slot("thumbnail")]),
    MethodDescriptor::new(
        "send_animation",
        "Send an animation (GIF or silent video)",
        Messaging,
        &[
            CHAT_ID,
            req("animation", STR),
            opt("caption", STR),
            opt("duration", INT),
            opt("thumbnail", STR),
        ],
    )
    .scoped()
    .uploads(&[slot("animation"), slot("thumbnail")]),
    MethodDescriptor::new(
        "send_voice",
        "Send a voice note",
        Messaging,
        &[CHAT_ID, req("voice", STR), opt("caption", STR), opt("duration", INT)],
    )
    .scoped()
    .uploads(&[slot("voice")]),
    MethodDescriptor::new(
        "send_sticker",
        "Send a sticker",
        Messaging,
        &[CHAT_ID, req("sticker", STR), opt("disable_notification", BOOL)],
    )
    .scoped()
    .uploads(&[slot("sticker")]),
    MethodDescriptor::new(
        "send_location",
        "Send a point on the map",
        Messaging,
        &[
            CHAT_ID,
            req("latitude", ParamKind::Number { min: Some(-90.0), max: Some(90.0) }),
            req("longitude", ParamKind::Number { min: Some(-180.0), max: Some(180.0) }),
            opt("live_period", ParamKind::Integer { min: Some(60), max: Some(86_400) }),
        ],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_venue",
        "Send information about a venue",
        Messaging,
        &[
            CHAT_ID,
            req("latitude", ParamKind::Number { min: Some(-90.0), max: Some(90.0) }),
            req("longitude", ParamKind::Number { min: Some(-180.0), max: Some(180.0) }),
            req("title", STR),
            req("address", STR),
        ],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_contact",
        "Send a phone contact",
        Messaging,
        &[CHAT_ID, req("phone_number", STR), req("first_name", STR), opt("last_name", STR)],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_poll",
        "Send a native poll",
        Messaging,
        &[
            CHAT_ID,
            req("question", STR),
            req("options", ParamKind::Array { items: Some(&STRING_ITEM) }),
            opt("is_anonymous", BOOL),
            opt("type", ParamKind::Enumeration(&["regular", "quiz"])),
            opt("correct_option_id", INT),
        ],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_dice",
        "Send an animated die roll",
        Messaging,
        &[CHAT_ID, opt("emoji", ParamKind::Enumeration(&["🎲", "🎯", "🏀", "⚽", "🎳", "🎰"]))],
    )
    .scoped(),
    MethodDescriptor::new(
        "send_media_group",
        "Send a group of photos, videos, documents, or audios as an album",
        Messaging,
        &[CHAT_ID, req("media", ParamKind::Array { items: Some(&OBJECT_ITEM) })],
    )
    .scoped()
    .uploads(&[UploadSlot { name: "media", shape: UploadShape::Array(&["media", "thumbnail"]) }]),
    MethodDescriptor::new(
        "send_chat_action",
        "Show a typing or uploading status in a chat",
        Messaging,
        &[
            CHAT_ID,
            req(
                "action",
                ParamKind::Enumeration(&[
                    "typing",
                    "upload_photo",
                    "record_video",
                    "upload_video",
                    "record_voice",
                    "upload_voice",
                    "upload_document",
                    "choose_sticker",
                    "find_location",
                ]),
            ),
        ],
    ),
    MethodDescriptor::new(
        "forward_message",
        "Forward a message from one chat to another",
        Messaging,
        &[
            CHAT_ID,
            req("from_chat_id", ParamKind::StringOrInteger),
            req("message_id", INT),
            opt("disable_notification", BOOL),
        ],
    )
    .scoped(),
    MethodDescriptor::new(
        "copy_message",
        "Copy a message without a link to the original",
        Messaging,
        &[
            CHAT_ID,
            req("from_chat_id", ParamKind::StringOrInteger),
            req("message_id", INT),
            opt("caption", STR),
        ],
    )
    .scoped(),
    // Editing. The target is either chat_id+message_id or an inline id.
    MethodDescriptor::new(
        "edit_text",
        "Edit the text of a sent message",
        Editing,
        &[
            opt("chat_id", ParamKind::StringOrInteger),
            opt("message_id", INT),
            opt("inline_message_id", STR),
            req("text", STR),
            opt("parse_mode", PARSE_MODE),
            opt("reply_markup", OBJ),
        ],
    )
    .one_of(EDIT_TARGET),
    MethodDescriptor::new(
        "edit_caption",
        "Edit the caption of a media message",
        Editing,
        &[
            opt("chat_id", ParamKind::StringOrInteger),
            opt("message_id", INT),
            opt("inline_message_id", STR),
            opt("caption", STR),
            opt("parse_mode", PARSE_MODE),
        ],
    )
    .one_of(EDIT_TARGET),
    MethodDescriptor::new(
        "edit_media",
        "Replace the media of a message",
        Editing,
        &[
            opt("chat_id", ParamKind::StringOrInteger),
            opt("message_id", INT),
            opt("inline_message_id", STR),
            req("media", OBJ),
        ],
    )
    .one_of(EDIT_TARGET)
    .uploads(&[UploadSlot { name: "media", shape: UploadShape::Object(&["media", "thumbnail"]) }]),
    MethodDescriptor::new(
        "edit_reply_markup",
        "Edit only the inline keyboard of a message",
        Editing,
        &[
            opt("chat_id", ParamKind::StringOrInteger),
            opt("message_id", INT),
            opt("inline_message_id", STR),
            opt("reply_markup", OBJ),
        ],
    )
    .one_of(EDIT_TARGET),
    MethodDescriptor::new(
        "stop_poll",
        "Stop a poll and return its final results",
        Editing,
        &[CHAT_ID, req("message_id", INT)],
    ),
    MethodDescriptor::new(
        "delete_message",
        "Delete a message",
        Editing,
        &[CHAT_ID, req("message_id", INT)],
    ),
    // Chat administration.
    MethodDescriptor::new(
        "ban_member",
        "Ban a user from a group or channel",
        ChatAdmin,
        &[CHAT_ID, req("user_id", INT), opt("until_date", INT), opt("revoke_messages", BOOL)],
    ),
    MethodDescriptor::new(
        "unban_member",
        "Lift a ban",
        ChatAdmin,
        &[CHAT_ID, req("user_id", INT), opt("only_if_banned", BOOL)],
    ),
    MethodDescriptor::new(
        "restrict_member",
        "Restrict what a member may do in a chat",
        ChatAdmin,
        &[CHAT_ID, req("user_id", INT), req("permissions", OBJ), opt("until_date", INT)],
    ),
    MethodDescriptor::new(
        "promote_member",
        "Grant or revoke administrator rights",
        ChatAdmin,
        &[
            CHAT_ID,
            req("user_id", INT),
            opt("can_delete_messages", BOOL),
            opt("can_invite_users", BOOL),
            opt("can_pin_messages", BOOL),
            opt("can_promote_members", BOOL),
        ],
    ),
    MethodDescriptor::new(
        "set_chat_title",
        "Change the title of a chat",
        ChatAdmin,
        &[CHAT_ID, req("title", STR)],
    ),
    MethodDescriptor::new(
        "set_chat_description",
        "Change the description of a chat",
        ChatAdmin,
        &[CHAT_ID, opt("description", STR)],
    ),
    MethodDescriptor::new(
        "set_chat_permissions",
        "Set default member permissions for a group",
        ChatAdmin,
        &[CHAT_ID, req("permissions", OBJ)],
    ),
    MethodDescriptor::new(
        "set_chat_photo",
        "Set a new chat photo from a local file",
        ChatAdmin,
        &[CHAT_ID, req("photo", STR)],
    )
    .uploads(&[slot("photo")]),
    MethodDescriptor::new("delete_chat_photo", "Remove the chat photo", ChatAdmin, &[CHAT_ID]),
    MethodDescriptor::new(
        "pin_message",
        "Pin a message in a chat",
        ChatAdmin,
        &[CHAT_ID, req("message_id", INT), opt("disable_notification", BOOL)],
    ),
    MethodDescriptor::new(
        "unpin_message",
        "Unpin one message, or the most recent one",
        ChatAdmin,
        &[CHAT_ID, opt("message_id", INT)],
    ),
    MethodDescriptor::new("leave_chat", "Leave a group or channel", ChatAdmin, &[CHAT_ID]),
    // Stickers.
    MethodDescriptor::new(
        "upload_sticker_file",
        "Upload a sticker file for later use in sets",
        Stickers,
        &[
            req("user_id", INT),
            req("sticker", STR),
            req("sticker_format", ParamKind::Enumeration(&["static", "animated", "video"])),
        ],
    )
    .uploads(&[slot("sticker")]),
    MethodDescriptor::new(
        "create_sticker_set",
        "Create a new sticker set owned by a user",
        Stickers,
        &[
            req("user_id", INT),
            req("name", STR),
            req("title", STR),
            req("stickers", ParamKind::Array { items: Some(&OBJECT_ITEM) }),
        ],
    )
    .uploads(&[UploadSlot { name: "stickers", shape: UploadShape::Array(&["sticker"]) }]),
    MethodDescriptor::new(
        "add_sticker_to_set",
        "Add a sticker to an existing set",
        Stickers,
        &[req("user_id", INT), req("name", STR), req("sticker", OBJ)],
    )
    .uploads(&[UploadSlot { name: "sticker", shape: UploadShape::Object(&["sticker"]) }]),
    MethodDescriptor::new(
        "delete_sticker_from_set",
        "Delete a sticker from a set",
        Stickers,
        &[req("sticker", STR)],
    ),
    MethodDescriptor::new(
        "set_sticker_position",
        "Move a sticker within its set",
        Stickers,
        &[req("sticker", STR), req("position", ParamKind::Integer { min: Some(0), max: None })],
    ),
    // Webhook management.
    MethodDescriptor::new(
        "set_webhook",
        "Register an HTTPS endpoint to receive updates",
        Webhooks,
        &[
            req("url", STR),
            opt("secret_token", STR),
            opt("max_connections", ParamKind::Integer { min: Some(1), max: Some(100) }),
            opt("allowed_updates", ParamKind::Array { items: Some(&STRING_ITEM) }),
        ],
    ),
    MethodDescriptor::new(
        "delete_webhook",
        "Remove the webhook registration",
        Webhooks,
        &[opt("drop_pending_updates", BOOL)],
    ),
    // Inline and callback queries.
    MethodDescriptor::new(
        "answer_callback_query",
        "Answer a callback query from an inline keyboard",
        Queries,
        &[req("callback_query_id", STR), opt("text", STR), opt("show_alert", BOOL)],
    ),
    MethodDescriptor::new(
        "answer_inline_query",
        "Answer an inline query with a set of results",
        Queries,
        &[
            req("inline_query_id", STR),
            req("results", ParamKind::Array { items: Some(&OBJECT_ITEM) }),
            opt("cache_time", ParamKind::Integer { min: Some(0), max: None }),
        ],
    ),
];

/// Name-indexed view over [`METHODS`].
#[derive(Debug)]
pub struct MethodRegistry {
    by_name: HashMap<&'static str, &'static MethodDescriptor>,
}

impl MethodRegistry {
    pub fn get(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.by_name.get(name).copied()
    }

    pub fn all(&self) -> impl Iterator<Item = &'static MethodDescriptor> + '_ {
        METHODS.iter()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Ranked descriptor search for the `find` meta tool. Exact name match
    /// outranks a name substring, which outranks a description substring;
    /// ties resolve by table order so results are deterministic.
    pub fn search(
        &self,
        query: &str,
        category: Option<MethodCategory>,
        limit: usize,
    ) -> Vec<&'static MethodDescriptor> {
        let needle = query.to_ascii_lowercase();
        let mut scored: Vec<(u32, usize, &'static MethodDescriptor)> = METHODS
            .iter()
            .enumerate()
            .filter(|(_, m)| category.map_or(true, |c| m.category == c))
            .filter_map(|(order, m)| {
                let score = if m.name == needle {
                    3
                } else if m.name.contains(&needle) {
                    2
                } else if m.description.to_ascii_lowercase().contains(&needle) {
                    1
                } else {
                    return None;
                };
                Some((score, order, m))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(limit).map(|(_, _, m)| m).collect()
    }
}

/// The process-wide registry, built once.
pub fn registry() -> &'static MethodRegistry {
    static REGISTRY: OnceLock<MethodRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut by_name = HashMap::with_capacity(METHODS.len());
        for descriptor in METHODS {
            let previous = by_name.insert(descriptor.name, descriptor);
            debug_assert!(previous.is_none(), "duplicate method name {}", descriptor.name);
        }
        MethodRegistry { by_name }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_indexes_every_method_once() {
        let registry = registry();
        assert_eq!(registry.len(), METHODS.len());
        assert!(registry.get("send_text").is_some());
        assert!(registry.get("no_such_method").is_none());
    }

    #[test]
    fn cacheable_methods_carry_expected_ttls() {
        let registry = registry();
        let ttl = |name: &str| registry.get(name).unwrap().cache_ttl;
        assert_eq!(ttl("get_identity"), Some(Duration::from_secs(3600)));
        assert_eq!(ttl("get_webhook_info"), Some(Duration::from_secs(60)));
        assert_eq!(ttl("get_sticker_set"), Some(Duration::from_secs(300)));
        assert_eq!(ttl("get_chat"), Some(Duration::from_secs(120)));
        assert_eq!(ttl("send_text"), None);
    }

    #[test]
    fn sending_methods_are_destination_scoped() {
        let registry = registry();
        for name in ["send_text", "send_photo", "send_media_group", "forward_message"] {
            assert!(registry.get(name).unwrap().destination_scoped, "{name} should be scoped");
        }
        for name in ["get_identity", "set_webhook", "delete_message"] {
            assert!(!registry.get(name).unwrap().destination_scoped, "{name} is not scoped");
        }
    }

    #[test]
    fn required_and_optional_split_follows_specs() {
        let send_text = registry().get("send_text").unwrap();
        let required: Vec<_> = send_text.required().collect();
        assert_eq!(required, vec!["chat_id", "text"]);
        assert!(send_text.optional().any(|p| p == "parse_mode"));
    }

    #[test]
    fn edit_methods_declare_the_target_rule() {
        let edit_text = registry().get("edit_text").unwrap();
        assert_eq!(edit_text.require_one_of.len(), 2);
    }

    #[test]
    fn search_ranks_exact_name_first() {
        let results = registry().search("get_chat", None, 10);
        assert_eq!(results[0].name, "get_chat");
        assert!(results.len() > 1, "substring matches follow");
    }

    #[test]
    fn search_honours_category_and_limit() {
        let results = registry().search("send", Some(MethodCategory::Messaging), 5);
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|m| m.category == MethodCategory::Messaging));
    }

    #[test]
    fn search_with_no_match_is_empty() {
        assert!(registry().search("zzz_nothing", None, 10).is_empty());
    }
}
