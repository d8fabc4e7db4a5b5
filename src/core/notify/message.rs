use crate::core::conversation::{ChatTurn, ConfirmedLead, NOT_SPECIFIED, UserInfo};

/// Longest conversation recap included in a voice lead message.
pub const MAX_RECAP_CHARS: usize = 3000;

/// Alert for a lead the text assistant has fully qualified.
pub fn format_confirmed_lead(lead: &ConfirmedLead) -> String {
    let position = if lead.location.starts_with("http") {
        format!("[Ouvrir la carte]({})", lead.location)
    } else {
        lead.location.clone()
    };

    format!(
        "🚨 *URGENCE DÉPANNAGE CONFIRMÉE*\n\n\
         👤 *Client:* {}\n\
         📱 *Tél:* `{}`\n\
         📍 *Position:* {}\n\
         🔧 *Problème:* {}\n\n\
         _Intervention requise immédiate._",
        lead.name, lead.phone, position, lead.issue
    )
}

/// Alert for a lead captured by the voice assistant, with a conversation recap.
pub fn format_voice_lead(user_info: &UserInfo, history: &[ChatTurn]) -> String {
    let mut message = String::from("🚨 **NOUVEAU LEAD VOICE ASSISTANT** 🚨\n\n");
    message.push_str(&format!(
        "👤 **Nom:** {}\n",
        user_info.name().unwrap_or(NOT_SPECIFIED)
    ));
    message.push_str(&format!(
        "📞 **Tél:** {}\n",
        user_info.phone().unwrap_or(NOT_SPECIFIED)
    ));

    match user_info.location {
        Some(location) => message.push_str(&format!("📍 **GPS:** {}\n", location.maps_link())),
        None => message.push_str("📍 **GPS:** Non disponible\n"),
    }

    if history.is_empty() {
        message.push_str("\n(Pas de conversation enregistrée)");
        return message;
    }

    message.push_str("\n💬 **RÉCAPITULATIF CONVERSATION:**\n");
    let recap = history
        .iter()
        .filter(|turn| !turn.is_system())
        .map(|turn| {
            let marker = if turn.role == "user" { "👤" } else { "🤖" };
            format!("{marker}: {}", turn.first_text())
        })
        .collect::<Vec<_>>()
        .join("\n");
    message.extend(recap.chars().take(MAX_RECAP_CHARS));

    message
}
