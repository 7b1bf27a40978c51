use std::fmt::Write;

use crate::types::{AggregatedContent, Thread};

/// Turns collected content into the single request sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    title: String,
    language: String,
    sections_min: u8,
    sections_max: u8,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("LocalLLaMA Community Newsletter", "English", 5, 7)
    }
}

impl PromptBuilder {
    pub fn new(title: impl Into<String>, language: impl Into<String>, sections_min: u8, sections_max: u8) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            sections_min: sections_min.min(sections_max),
            sections_max: sections_max.max(sections_min),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The system message sent ahead of every prompt.
    pub fn system_message(&self) -> String {
        format!(
            "You are a professional newsletter writer for the AI community. \
             Write the newsletter in {}, keeping technical terms in English where appropriate. \
             Use Markdown formatting and include every relevant link mentioned in the content. \
             Keep a professional but approachable tone, explaining technical concepts clearly.",
            self.language
        )
    }

    /// Same content in, same prompt out. Reads nothing but `content`.
    pub fn build(&self, content: &AggregatedContent) -> String {
        let mut prompt = String::new();
        let _ = write!(
            prompt,
            "Create a professional newsletter for r/{} based on today's top discussions ({}).\n\n\
             Content for analysis:\n",
            content.source_name,
            content.collection_date.format("%Y-%m-%d")
        );

        for thread in &content.threads {
            write_thread(&mut prompt, thread);
        }

        prompt.push_str(&self.instructions());
        prompt
    }

    fn instructions(&self) -> String {
        format!(
            r###"
Please write the newsletter following these guidelines:

1. **Title**: "{title}"
2. **Date**: Include the current date as a heading in the form "## [Current Date]"
3. **Structure**: Organize the content into {min} to {max} main themes
4. **For each theme**:
   - Open with a relevant emoji followed by an engaging introductory paragraph
   - Include specific numbers and relevant technical details
   - Reference users with the format "**u/username**"
   - Highlight key terms and statistics in **bold**
   - Include the relevant links mentioned in posts and comments
5. **Final Section**: Close with a section titled "Future Outlook"
6. **Formatting**: Use Markdown for all formatting and return it as plain text, without wrapping the output in a code block
7. **Focus**: Prioritize technical accuracy and practical insights
8. **Language**: Write in {language}, keeping technical terms in English where appropriate
9. **Signature**: End with a short note on where the information came from
"###,
            title = self.title,
            min = self.sections_min,
            max = self.sections_max,
            language = self.language,
        )
    }
}

fn write_thread(prompt: &mut String, thread: &Thread) {
    let _ = writeln!(prompt, "\nPost: {}", thread.title);
    let _ = writeln!(prompt, "Author: u/{}", thread.author);
    let _ = writeln!(prompt, "Score: {}", thread.popularity_score);
    let _ = writeln!(prompt, "Reddit link: {}", thread.canonical_url);
    if let Some(external) = &thread.external_url {
        let _ = writeln!(prompt, "External link: {}", external);
    }
    if let Some(body) = &thread.body_text {
        let _ = writeln!(prompt, "Content: {}", body);
    }

    prompt.push_str("\nTop comments:\n");
    for reply in &thread.replies {
        let _ = writeln!(prompt, "- u/{}: {}", reply.author, reply.body_text);
        let _ = writeln!(prompt, "  Score: {}", reply.popularity_score);
        if !reply.mentioned_urls.is_empty() {
            let _ = writeln!(prompt, "  Mentioned links: {}", reply.mentioned_urls.join(", "));
        }
    }
}
