use super::error::InputError;
use super::section::InputSection;

/// Name of the synthetic section that holds the top level of every parsed input.
pub const ROOT_SECTION_NAME: &str = "CP2K_INPUT";

const COMMENT_MARKER: char = '!';
const SECTION_OPEN: char = '&';
const SECTION_CLOSE: &str = "&END";

/// Parses the text of a CP2K input file into a section tree.
///
/// Comments (everything after `!`) and blank lines are discarded, keyword lines are kept
/// verbatim apart from surrounding whitespace. Sections that are still open when the input
/// ends are closed implicitly.
///
/// # Errors
///
/// Returns [`InputError::UnbalancedSectionEnd`] for an `&END` without a matching opening
/// line and [`InputError::MissingSectionName`] for a bare `&`.
pub fn parse_input(text: &str) -> Result<InputSection, InputError> {
    let mut stack = vec![InputSection::new(ROOT_SECTION_NAME)];

    for (line_num, raw) in text.lines().enumerate() {
        let line_num = line_num + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if line.to_uppercase().starts_with(SECTION_CLOSE) {
            if stack.len() < 2 {
                return Err(InputError::UnbalancedSectionEnd { line: line_num });
            }
            close_top(&mut stack);
        } else if let Some(header) = line.strip_prefix(SECTION_OPEN) {
            let section = match header.split_once(char::is_whitespace) {
                Some((name, params)) => InputSection::with_parameters(name, params.trim()),
                None => InputSection::new(header),
            };
            if section.name().is_empty() {
                return Err(InputError::MissingSectionName { line: line_num });
            }
            stack.push(section);
        } else if let Some(top) = stack.last_mut() {
            top.push_keyword(line);
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop().unwrap_or_else(|| InputSection::new(ROOT_SECTION_NAME)))
}

fn strip_comment(line: &str) -> &str {
    line.split_once(COMMENT_MARKER)
        .map_or(line, |(content, _)| content)
}

fn close_top(stack: &mut Vec<InputSection>) {
    if let Some(section) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.push_subsection(section);
        }
    }
}
