use crate::models::SourceFormat;

use super::normalizer::MAX_CONTEXT_MESSAGES;

/// Most findings the model may report per request
pub const MAX_INSTANCES: usize = 10;

/// Fewest context messages the model is asked for on each side
pub const MIN_CONTEXT_MESSAGES: usize = 3;

const INSTAGRAM_SHAPE: &str = r#"The data will look like this:

<content>
{
  "participants": [{ "name": "username" }, ...],
  "messages": [
    {
      "sender_name": "username",
      "timestamp_ms": 1726329574750,
      "content": "message",
      "is_geoblocked_for_viewer": false
    },
    ...
  ],
  "title": "Chat Title",
  ...
}
</content>
"#;

const OUTPUT_FORMAT: &str = r#"[
  {
    "instance_ID": 1,
    "context-before": [
      // Messages before the flagged instance, oldest first
      {
        "time": timestamp,
        "author": "username",
        "message": "message content"
      }
    ],
    "flagged": [
      // The message that meets the criteria specified in the user prompt
      {
        "time": timestamp,
        "author": "username",
        "message": "message content"
      },
      // ONLY ONE FLAGGED MESSAGE, followed by your explanation
      {
        "time": 0,
        "author": "AI-ANALYZER",
        "message": "Explanation of why this message is flagged"
      }
    ],
    "context-after": [
      // Messages after the flagged instance, oldest first
      {
        "time": timestamp,
        "author": "username",
        "message": "message content"
      }
    ]
  }
]"#;

/// Build the system instruction sent alongside the uploaded transcript.
///
/// Pure function of its inputs: the same format and prompt always produce the
/// same text.
pub fn build_instruction(format: SourceFormat, user_prompt: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are a professional detective's assistant. ");
    prompt.push_str(&data_description(format));
    prompt.push('\n');

    prompt.push_str("Your task is to analyze the chat data based on the following prompt:\n\n");
    prompt.push_str(&format!("\"{}\"\n\n", user_prompt));

    prompt.push_str("**IMPORTANT INSTRUCTIONS:**\n\n");
    prompt.push_str(
        "- **ONLY OUTPUT THE JSON ARRAY** containing your findings based on the analysis of the provided chat data.\n",
    );
    prompt.push_str(
        "- Do **NOT** include any sample data, code fences, headers, footers, explanations, or any additional text.\n",
    );
    prompt.push_str(&format!(
        "- **Limit the number of messages in \"context-before\" and \"context-after\" to between {} and {} messages each.**\n",
        MIN_CONTEXT_MESSAGES, MAX_CONTEXT_MESSAGES
    ));
    prompt.push_str(&format!(
        "- **The MAXIMUM NUMBER OF INSTANCES YOU ARE ALLOWED TO LIST IS {}.**\n",
        MAX_INSTANCES
    ));
    prompt.push_str("- Ensure that your response is **valid JSON** and follows the exact structure provided.\n");
    prompt.push_str(attachment_rule(format));
    if format == SourceFormat::WhatsApp {
        prompt.push_str("- **Properly escape double quotes inside JSON strings as \\\".**\n");
    }
    prompt.push('\n');

    prompt.push_str("**Output Format (Do NOT include this in your output, it's for reference only):**\n\n");
    prompt.push_str(OUTPUT_FORMAT);
    prompt.push_str("\n\n");

    prompt.push_str("**Remember:**\n\n");
    prompt.push_str("- Do **NOT** include any sample data in your output.\n");
    prompt.push_str("- Do **NOT** wrap the output in Markdown or code fences.\n");
    prompt.push_str("- **ONLY OUTPUT THE JSON ARRAY** containing your findings.\n");

    prompt
}

fn data_description(format: SourceFormat) -> String {
    match format {
        SourceFormat::Discord => "You will be given Discord chat data in a text file containing JSON content wrapped within <content> tags.\n".to_string(),
        SourceFormat::Instagram => format!(
            "You will be given Instagram chat data in a text file containing JSON content wrapped within <content> tags.\n\n{}",
            INSTAGRAM_SHAPE
        ),
        SourceFormat::WhatsApp => {
            "You will be given WhatsApp chat data in the following format:\n\n[date, time] username: message\n".to_string()
        }
    }
}

fn attachment_rule(format: SourceFormat) -> &'static str {
    match format {
        SourceFormat::Instagram => {
            "- If a message has an attachment, describe the attachment in the \"message\" field (include its caption if it has one).\n"
        }
        _ => {
            "- If a message has an attachment (e.g., image, file), describe the attachment in the \"message\" field.\n"
        }
    }
}
