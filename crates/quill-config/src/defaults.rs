//! Default values for configuration-backed projections.

use serde_json::{Value, json};

/// Key holding the about-page profile.
pub const ABOUT_PROFILE_KEY: &str = "about_profile";

/// Profile served when no `about_profile` entry is stored, and the template
/// used to fill fields missing from a stored one.
#[must_use]
pub fn default_about_profile() -> Value {
    json!({
        "name": "",
        "title": "",
        "avatar": "/images/avatar.png",
        "bio": ["", "", ""],
        "socialLinks": [
            {"name": "twitter", "url": ""},
            {"name": "linkedin", "url": ""},
            {"name": "github", "url": ""},
            {"name": "email", "url": ""}
        ],
        "skills": [
            {"category": "前端", "items": []},
            {"category": "后端", "items": []},
            {"category": "工具", "items": []}
        ],
        "experience": [],
        "education": [],
        "location": "",
        "website": "",
        "resumeUrl": "",
        "contacts": {"email": "", "phone": "", "wechat": ""},
        "interests": [],
        "languages": [],
        "projects": []
    })
}
