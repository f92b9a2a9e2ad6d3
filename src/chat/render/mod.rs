
use console::Style;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

const RULE_WIDTH: usize = 40;

/// Render model markdown as terminal text, styled when the terminal supports color
#[inline]
pub fn render_markdown(markdown: &str) -> String {
    render(markdown, console::colors_enabled())
}

/// Render markdown, with ANSI styling only when `styled` is set
#[inline]
pub fn render(markdown: &str, styled: bool) -> String {
    let mut out = String::new();
    let mut strong = 0_usize;
    let mut emphasis = 0_usize;
    let mut in_heading = false;
    let mut in_code_block = false;
    let mut lists: Vec<Option<u64>> = Vec::new();

    let base = Style::new().force_styling(styled);

    for event in Parser::new(markdown) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { .. } => {
                    separate_block(&mut out);
                    in_heading = true;
                }
                Tag::Paragraph => {
                    if lists.is_empty() {
                        separate_block(&mut out);
                    }
                }
                Tag::Strong => strong += 1,
                Tag::Emphasis => emphasis += 1,
                Tag::CodeBlock(_) => {
                    separate_block(&mut out);
                    in_code_block = true;
                }
                Tag::List(start) => {
                    if lists.is_empty() {
                        separate_block(&mut out);
                    }
                    lists.push(start);
                }
                Tag::Item => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                    match lists.last_mut() {
                        Some(Some(number)) => {
                            out.push_str(&number.to_string());
                            out.push_str(". ");
                            *number += 1;
                        }
                        _ => out.push_str("• "),
                    }
                }
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Heading(_) => {
                    in_heading = false;
                    out.push('\n');
                }
                TagEnd::Paragraph => out.push('\n'),
                TagEnd::Strong => strong = strong.saturating_sub(1),
                TagEnd::Emphasis => emphasis = emphasis.saturating_sub(1),
                TagEnd::CodeBlock => {
                    in_code_block = false;
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                TagEnd::Item => {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                TagEnd::List(_) => {
                    lists.pop();
                }
                _ => {}
            },
            Event::Text(text) => {
                let style = if in_code_block {
                    base.clone().dim()
                } else {
                    let mut style = base.clone();
                    if in_heading {
                        style = style.bold().cyan();
                    }
                    if strong > 0 {
                        style = style.bold();
                    }
                    if emphasis > 0 {
                        style = style.italic();
                    }
                    style
                };
                out.push_str(&style.apply_to(&*text).to_string());
            }
            Event::Code(code) => {
                out.push_str(&base.clone().yellow().apply_to(&*code).to_string());
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => {
                separate_block(&mut out);
                out.push_str(&base.clone().dim().apply_to("─".repeat(RULE_WIDTH)).to_string());
                out.push('\n');
            }
            _ => {}
        }
    }

    out.trim_end().to_string()
}

/// Leave exactly one blank line before the next block
fn separate_block(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}
