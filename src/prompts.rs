//! Prompts for the vision-LLM boundary proposer.
//!
//! Kept in one place so prompt changes do not touch the retry and parsing
//! logic in [`crate::pipeline::llm`], and so tests can inspect them.
//!
//! Callers can override the system prompt via
//! [`crate::config::SliceConfig::system_prompt`].

/// Default system prompt asking for section boundaries of an email screenshot.
///
/// The model's answer is untrusted: the validator repairs every boundary it
/// returns. The prompt only needs to make the reply easy to parse.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert email designer. You are shown a full-length screenshot of a marketing email.

Your task is to split the email into its visual sections so each section can be exported as a separate image.

Follow these rules precisely:

1. WHAT IS A SECTION
   - A header/logo bar, a hero image, a product grid, a call-to-action block, a testimonial, a banner
   - Sections are stacked vertically and span the full width of the email

2. WHERE TO CUT
   - Cut in the gap BETWEEN sections, never through text, buttons, logos or product photos
   - Prefer background gaps and colour changes between sections
   - Do not cut inside the footer (unsubscribe links, address, legal text)

3. COORDINATES
   - Give y positions in pixels from the top of the image
   - The image dimensions are given in the user message

4. OUTPUT FORMAT
   - Output ONLY a JSON array of integers, sorted ascending, e.g. [0, 412, 980, 1630]
   - Do NOT add commentary or explanations
   - Do NOT wrap the array in code fences"#;

/// User message accompanying the screenshot.
pub fn boundary_request(width: u32, height: u32) -> String {
    format!(
        "The screenshot is {width} px wide and {height} px tall. \
         Return the y positions where the email should be cut into sections."
    )
}
