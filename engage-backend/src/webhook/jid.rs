//! WhatsApp JID parsing and sender resolution

/// Addressing domain of a JID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JidKind {
    /// `<phone>@s.whatsapp.net` or legacy `<phone>@c.us`
    User,
    /// `<id>@g.us`
    Group,
    /// Privacy-preserving `<id>@lid`, no phone number
    Lid,
    /// `<id>@broadcast` lists
    Broadcast,
    /// `status@broadcast`
    Status,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jid<'a> {
    pub user: &'a str,
    pub server: &'a str,
}

impl<'a> Jid<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (user, server) = raw.trim().split_once('@')?;
        if user.is_empty() || server.is_empty() {
            return None;
        }
        Some(Self { user, server })
    }

    pub fn kind(&self) -> JidKind {
        match self.server {
            "s.whatsapp.net" | "c.us" => JidKind::User,
            "g.us" => JidKind::Group,
            "lid" => JidKind::Lid,
            "broadcast" if self.user == "status" => JidKind::Status,
            "broadcast" => JidKind::Broadcast,
            _ => JidKind::Other,
        }
    }

    /// Digits of the user part, without the `:device` suffix
    pub fn phone(&self) -> String {
        let user = self.user.split(':').next().unwrap_or(self.user);
        user.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

/// Who a message belongs to, for contact/conversation scoping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    Contact { phone: String },
    /// Group chat without a resolvable direct JID; the group is the contact
    Group { group_id: String },
    StatusBroadcast,
}

impl Sender {
    /// Key stored in `contacts.phone`
    pub fn contact_key(&self) -> Option<&str> {
        match self {
            Sender::Contact { phone } => Some(phone),
            Sender::Group { group_id } => Some(group_id),
            Sender::StatusBroadcast => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Sender::Group { .. })
    }
}

/// Resolve the sender from `remoteJid`, falling back to `remoteJidAlt` when the
/// primary JID is not a direct user JID (LID, broadcast list, group).
pub fn resolve_sender(remote_jid: Option<&str>, remote_jid_alt: Option<&str>) -> Option<Sender> {
    let primary = remote_jid.and_then(Jid::parse);
    let alternate = remote_jid_alt.and_then(Jid::parse);

    if let Some(jid) = primary {
        match jid.kind() {
            JidKind::Status => return Some(Sender::StatusBroadcast),
            JidKind::User => {
                let phone = jid.phone();
                if !phone.is_empty() {
                    return Some(Sender::Contact { phone });
                }
            }
            _ => {}
        }
    }

    if let Some(jid) = alternate.filter(|j| j.kind() == JidKind::User) {
        let phone = jid.phone();
        if !phone.is_empty() {
            return Some(Sender::Contact { phone });
        }
    }

    match primary {
        Some(jid) if jid.kind() == JidKind::Group => Some(Sender::Group {
            group_id: jid.user.to_string(),
        }),
        _ => None,
    }
}

/// Phone from any JID-ish string (`5511...@s.whatsapp.net`, bare digits)
pub fn phone_from_jid(raw: &str) -> Option<String> {
    let phone = match Jid::parse(raw) {
        Some(jid) if matches!(jid.kind(), JidKind::User) => jid.phone(),
        Some(jid) if matches!(jid.kind(), JidKind::Group) => jid.user.to_string(),
        Some(_) => return None,
        None => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
    };
    (!phone.is_empty()).then_some(phone)
}
