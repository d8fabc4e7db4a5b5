//! Conversation and lead types shared by the chat and notification paths.

use serde::{Deserialize, Serialize};

/// Placeholder used when a lead field is unknown.
pub const NOT_SPECIFIED: &str = "Non spécifié";

/// One turn of a text conversation, in the hosted model's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ChatPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPart {
    #[serde(default)]
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![ChatPart { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![ChatPart { text: text.into() }],
        }
    }

    pub fn is_model(&self) -> bool {
        self.role == "model"
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }

    /// Copy of the turn with the role folded to `model` or `user`.
    pub fn normalized(&self) -> Self {
        Self {
            role: if self.is_model() { "model" } else { "user" }.to_string(),
            parts: self.parts.clone(),
        }
    }

    pub fn first_text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or("")
    }
}

/// GPS position captured by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
}

impl GeoLocation {
    pub fn maps_link(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.lat, self.lng)
    }
}

/// Contact details entered in the lead capture form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
}

impl UserInfo {
    pub fn name(&self) -> Option<&str> {
        non_empty(self.name.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        non_empty(self.phone.as_deref())
    }
}

/// Details extracted by the model once it has everything it needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadExtraction {
    pub location: Option<String>,
    pub issue: Option<String>,
    pub phone: Option<String>,
}

/// A confirmed breakdown lead ready to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedLead {
    pub name: String,
    pub phone: String,
    /// Maps link when GPS was shared, otherwise the location the caller gave
    pub location: String,
    pub issue: String,
}

impl ConfirmedLead {
    /// Merge the model's extraction with what the caller typed in the form.
    ///
    /// Form data wins for phone and location; the name comes only from the form.
    pub fn merge(extraction: LeadExtraction, user_info: Option<&UserInfo>) -> Self {
        let location = user_info
            .and_then(|u| u.location)
            .map(|loc| loc.maps_link())
            .or(extraction.location)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());

        let phone = user_info
            .and_then(|u| u.phone())
            .map(str::to_string)
            .or(extraction.phone)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());

        let name = user_info
            .and_then(|u| u.name())
            .unwrap_or(NOT_SPECIFIED)
            .to_string();

        Self {
            name,
            phone,
            location,
            issue: extraction
                .issue
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
