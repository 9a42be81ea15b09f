use std::fmt;

/// Chat export formats the service knows how to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// JSON export from a Discord chat exporter
    Discord,
    /// JSON export from Instagram's "download your information"
    Instagram,
    /// Plain text export, one `[date, time] author: message` per line
    WhatsApp,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 3] = [Self::Discord, Self::Instagram, Self::WhatsApp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "Discord",
            Self::Instagram => "Instagram",
            Self::WhatsApp => "WhatsApp",
        }
    }

    /// HTTP route that accepts uploads of this format
    pub fn route(self) -> &'static str {
        match self {
            Self::Discord => "/analyzeDiscord",
            Self::Instagram => "/analyzeInstagram",
            Self::WhatsApp => "/analyzeWhatsapp",
        }
    }

    /// Display name attached to the remote file upload
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Discord => "Discord Chat Data",
            Self::Instagram => "Instagram Chat Data",
            Self::WhatsApp => "WhatsApp Chat Data",
        }
    }

    /// JSON exports are enveloped in `<content>` tags before upload
    pub fn wraps_transcript(self) -> bool {
        matches!(self, Self::Discord | Self::Instagram)
    }

    pub fn mime_type(self) -> &'static str {
        "text/plain"
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analysis call, built by the HTTP layer and consumed by the pipeline
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source_format: SourceFormat,
    /// Name the client gave the uploaded file
    pub file_name: String,
    pub raw_transcript: Vec<u8>,
    /// The user's analysis instruction
    pub instruction: String,
    /// Accepted from the client but not used by normalization
    pub reference_timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_are_distinct() {
        let routes: std::collections::HashSet<_> =
            SourceFormat::ALL.iter().map(|f| f.route()).collect();
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn test_only_json_exports_are_wrapped() {
        assert!(SourceFormat::Discord.wraps_transcript());
        assert!(SourceFormat::Instagram.wraps_transcript());
        assert!(!SourceFormat::WhatsApp.wraps_transcript());
    }
}
