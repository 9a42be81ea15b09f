use std::borrow::Cow;

use crate::models::SourceFormat;

/// Turn an uploaded export into the text submitted to the model.
///
/// JSON exports are enveloped in `<content>` tags so the model can tell file
/// content from instructions. WhatsApp text goes through as is. Nothing is
/// parsed here; malformed exports only fail once the model looks at them.
pub fn ingest(raw: &[u8], format: SourceFormat) -> String {
    let text = decode(raw);
    if format.wraps_transcript() {
        format!("<content>\n{}\n</content>", text)
    } else {
        text.into_owned()
    }
}

/// Invalid UTF-8 sequences become U+FFFD rather than failing the request
fn decode(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(raw)
}
