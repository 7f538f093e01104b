use super::error::InputError;
use std::fmt;

/// Keyword that, when used as the first token of a line, sets the section parameter
/// instead of adding a keyword.
pub const SECTION_PARAMETERS_KEYWORD: &str = "_SECTION_PARAMETERS_";

const INDENT: &str = "   ";

/// A section of a CP2K input file.
///
/// Sections own their keyword lines and their child sections; insertion order is preserved
/// for both and is exactly the order in which they are serialized. Section names are
/// case-insensitive and stored in upper case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSection {
    name: String,
    parameters: Option<String>,
    keywords: Vec<String>,
    subsections: Vec<InputSection>,
}

impl InputSection {
    /// Creates an empty section with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            ..Default::default()
        }
    }

    /// Creates an empty section carrying a section parameter (e.g. `&KIND H`).
    pub fn with_parameters(name: &str, parameters: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            parameters: Some(parameters.to_string()),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> Option<&str> {
        self.parameters.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn subsections(&self) -> &[InputSection] {
        &self.subsections
    }

    /// Appends a keyword line without any duplicate checking.
    pub fn push_keyword(&mut self, line: impl Into<String>) {
        self.keywords.push(line.into());
    }

    /// Appends a child section and returns a mutable reference to it.
    pub fn push_subsection(&mut self, section: InputSection) -> &mut InputSection {
        self.subsections.push(section);
        let last = self.subsections.len() - 1;
        &mut self.subsections[last]
    }

    /// Adds a keyword line to the section addressed by `path`.
    ///
    /// The path is a `/`-separated, case-insensitive chain of section names starting below
    /// this section (e.g. `FORCE_EVAL/DFT/SCF`). Missing sections along the path are created.
    /// A line starting with [`SECTION_PARAMETERS_KEYWORD`] sets the parameter of the target
    /// section instead of being stored as a keyword.
    ///
    /// # Arguments
    ///
    /// * `path` - The section path relative to this section.
    /// * `line` - The raw keyword line.
    /// * `unique` - Whether a keyword with the same first token may already exist.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::AmbiguousSection`] if a path segment matches more than one child,
    /// [`InputError::DuplicateSectionParameter`] if the parameter is set twice, and
    /// [`InputError::DuplicateKeyword`] if `unique` is set and the keyword already exists.
    pub fn add_keyword(&mut self, path: &str, line: &str, unique: bool) -> Result<(), InputError> {
        let segments = split_path(path)?;
        let mut section = self;
        for segment in &segments {
            let index = match section.find_child(segment)? {
                Some(index) => index,
                None => {
                    section.subsections.push(InputSection::new(segment));
                    section.subsections.len() - 1
                }
            };
            section = &mut section.subsections[index];
        }
        section.insert_keyword(line, unique)
    }

    /// Looks up the section addressed by `path` without creating anything.
    ///
    /// Returns `Ok(None)` if any segment of the path does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::AmbiguousSection`] if a segment matches more than one child.
    pub fn get_subsection(&self, path: &str) -> Result<Option<&InputSection>, InputError> {
        let segments = split_path(path)?;
        let mut section = self;
        for segment in &segments {
            match section.find_child(segment)? {
                Some(index) => section = &section.subsections[index],
                None => return Ok(None),
            }
        }
        Ok(Some(section))
    }

    /// Mutable variant of [`InputSection::get_subsection`].
    pub fn get_subsection_mut(
        &mut self,
        path: &str,
    ) -> Result<Option<&mut InputSection>, InputError> {
        let segments = split_path(path)?;
        let mut section = self;
        for segment in &segments {
            match section.find_child(segment)? {
                Some(index) => section = &mut section.subsections[index],
                None => return Ok(None),
            }
        }
        Ok(Some(section))
    }

    /// Renders the section body as input file lines.
    ///
    /// Keywords come first, followed by each subsection wrapped in `&NAME` / `&END NAME`
    /// with its body indented one level deeper. The section itself is not wrapped, so
    /// calling this on the root yields a complete input file.
    pub fn serialize(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.write_body(0, &mut lines);
        lines
    }

    fn write_body(&self, depth: usize, out: &mut Vec<String>) {
        let indent = INDENT.repeat(depth);
        for keyword in &self.keywords {
            out.push(format!("{}{}", indent, keyword));
        }
        for section in &self.subsections {
            match section.parameters.as_deref().filter(|p| !p.is_empty()) {
                Some(params) => out.push(format!("{}&{} {}", indent, section.name, params)),
                None => out.push(format!("{}&{}", indent, section.name)),
            }
            section.write_body(depth + 1, out);
            out.push(format!("{}&END {}", indent, section.name));
        }
    }

    fn find_child(&self, name: &str) -> Result<Option<usize>, InputError> {
        let mut matches = self
            .subsections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name == name)
            .map(|(i, _)| i);
        match (matches.next(), matches.next()) {
            (Some(_), Some(_)) => Err(InputError::AmbiguousSection {
                name: name.to_string(),
            }),
            (first, _) => Ok(first),
        }
    }

    fn insert_keyword(&mut self, line: &str, unique: bool) -> Result<(), InputError> {
        let key = first_token(line).ok_or_else(|| InputError::EmptyKeyword {
            section: self.name.clone(),
        })?;

        if key == SECTION_PARAMETERS_KEYWORD {
            if self.parameters.is_some() {
                return Err(InputError::DuplicateSectionParameter {
                    section: self.name.clone(),
                });
            }
            let value = line
                .trim()
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");
            if value.is_empty() {
                return Err(InputError::EmptySectionParameter {
                    section: self.name.clone(),
                });
            }
            self.parameters = Some(value.to_string());
            return Ok(());
        }

        if unique
            && self
                .keywords
                .iter()
                .any(|existing| first_token(existing).as_deref() == Some(key.as_str()))
        {
            return Err(InputError::DuplicateKeyword {
                keyword: key,
                section: self.name.clone(),
            });
        }
        self.keywords.push(line.to_string());
        Ok(())
    }
}

impl fmt::Display for InputSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.serialize() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn first_token(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_uppercase)
}

fn split_path(path: &str) -> Result<Vec<String>, InputError> {
    path.split('/')
        .map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                Err(InputError::EmptyPathSegment {
                    path: path.to_string(),
                })
            } else {
                Ok(segment.to_uppercase())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_section_normalizes_name_to_upper_case() {
        let section = InputSection::new("force_eval");
        assert_eq!(section.name(), "FORCE_EVAL");
        assert_eq!(section.parameters(), None);
        assert!(section.keywords().is_empty());
        assert!(section.subsections().is_empty());
    }

    #[test]
    fn add_keyword_creates_intermediate_sections_once() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("FORCE_EVAL/DFT/SCF", "MAX_SCF 50", true)
            .unwrap();
        root.add_keyword("force_eval/dft", "CHARGE 1", true).unwrap();

        assert_eq!(root.subsections().len(), 1);
        let dft = root.get_subsection("FORCE_EVAL/DFT").unwrap().unwrap();
        assert_eq!(dft.keywords(), &["CHARGE 1".to_string()]);
        assert_eq!(dft.subsections().len(), 1);
        assert_eq!(dft.subsections()[0].name(), "SCF");
    }

    #[test]
    fn added_keyword_is_found_exactly_once() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A/B/C", "K1 1", true).unwrap();
        let section = root.get_subsection("a/b/c").unwrap().unwrap();
        assert_eq!(
            section.keywords().iter().filter(|k| *k == "K1 1").count(),
            1
        );
    }

    #[test]
    fn duplicate_unique_keyword_is_rejected() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A/B", "MAX_SCF 10", true).unwrap();
        let result = root.add_keyword("A/B", "max_scf 20", true);
        assert_eq!(
            result,
            Err(InputError::DuplicateKeyword {
                keyword: "MAX_SCF".to_string(),
                section: "B".to_string(),
            })
        );
    }

    #[test]
    fn non_unique_keywords_are_kept_in_order() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A/B", "MAX_SCF 10", true).unwrap();
        root.add_keyword("A/B", "MAX_SCF 20", false).unwrap();
        let b = root.get_subsection("A/B").unwrap().unwrap();
        assert_eq!(
            b.keywords(),
            &["MAX_SCF 10".to_string(), "MAX_SCF 20".to_string()]
        );
    }

    #[test]
    fn section_parameter_is_set_from_marker_line() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("FORCE_EVAL/DFT/XC/XC_FUNCTIONAL", "_SECTION_PARAMETERS_  PBE ", true)
            .unwrap();
        let xc = root
            .get_subsection("FORCE_EVAL/DFT/XC/XC_FUNCTIONAL")
            .unwrap()
            .unwrap();
        assert_eq!(xc.parameters(), Some("PBE"));
        assert!(xc.keywords().is_empty());
    }

    #[test]
    fn setting_section_parameter_twice_fails() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A", "_SECTION_PARAMETERS_ ON", true).unwrap();
        let result = root.add_keyword("A", "_SECTION_PARAMETERS_ OFF", false);
        assert_eq!(
            result,
            Err(InputError::DuplicateSectionParameter {
                section: "A".to_string()
            })
        );
    }

    #[test]
    fn section_parameter_line_without_value_fails() {
        let mut root = InputSection::new("CP2K_INPUT");
        let result = root.add_keyword("A", "_SECTION_PARAMETERS_", true);
        assert!(matches!(
            result,
            Err(InputError::EmptySectionParameter { .. })
        ));
    }

    #[test]
    fn empty_keyword_and_empty_path_segments_are_rejected() {
        let mut root = InputSection::new("CP2K_INPUT");
        assert!(matches!(
            root.add_keyword("A", "   ", true),
            Err(InputError::EmptyKeyword { .. })
        ));
        assert!(matches!(
            root.add_keyword("A//B", "K 1", true),
            Err(InputError::EmptyPathSegment { .. })
        ));
        assert!(matches!(
            root.get_subsection(""),
            Err(InputError::EmptyPathSegment { .. })
        ));
    }

    #[test]
    fn ambiguous_path_segment_is_rejected() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.push_subsection(InputSection::with_parameters("KIND", "H"));
        root.push_subsection(InputSection::with_parameters("KIND", "O"));

        assert_eq!(
            root.add_keyword("KIND", "BASIS_SET DZVP", true),
            Err(InputError::AmbiguousSection {
                name: "KIND".to_string()
            })
        );
        assert!(matches!(
            root.get_subsection("kind/element"),
            Err(InputError::AmbiguousSection { .. })
        ));
    }

    #[test]
    fn get_subsection_returns_none_for_missing_path() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A/B", "K 1", true).unwrap();
        assert_eq!(root.get_subsection("A/C").unwrap(), None);
        assert_eq!(root.get_subsection("X").unwrap(), None);
    }

    #[test]
    fn get_subsection_mut_allows_appending_children() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("FORCE_EVAL/SUBSYS/CELL", "PERIODIC XYZ", true)
            .unwrap();
        let subsys = root.get_subsection_mut("FORCE_EVAL/SUBSYS").unwrap().unwrap();
        let kind = subsys.push_subsection(InputSection::with_parameters("KIND", "H"));
        kind.push_keyword("BASIS_SET SZV");

        let subsys = root.get_subsection("FORCE_EVAL/SUBSYS").unwrap().unwrap();
        assert_eq!(subsys.subsections().len(), 2);
        assert_eq!(subsys.subsections()[1].parameters(), Some("H"));
    }

    #[test]
    fn serialize_puts_keywords_before_nested_sections() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("A", "K1 1", true).unwrap();
        root.add_keyword("A/B", "_SECTION_PARAMETERS_ X", true).unwrap();
        root.add_keyword("A/B", "K2 2", true).unwrap();
        root.add_keyword("A", "K3 3", true).unwrap();

        assert_eq!(
            root.serialize(),
            vec![
                "&A",
                "   K1 1",
                "   K3 3",
                "   &B X",
                "      K2 2",
                "   &END B",
                "&END A",
            ]
        );
    }

    #[test]
    fn serialize_of_root_keywords_is_not_wrapped() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.push_keyword("TOP 1");
        root.add_keyword("A", "K 1", true).unwrap();
        assert_eq!(root.serialize(), vec!["TOP 1", "&A", "   K 1", "&END A"]);
    }

    #[test]
    fn empty_parameters_are_not_rendered() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.push_subsection(InputSection::with_parameters("A", ""));
        assert_eq!(root.serialize(), vec!["&A", "&END A"]);
    }

    #[test]
    fn display_joins_serialized_lines() {
        let mut root = InputSection::new("CP2K_INPUT");
        root.add_keyword("GLOBAL", "PROJECT test", true).unwrap();
        assert_eq!(root.to_string(), "&GLOBAL\n   PROJECT test\n&END GLOBAL\n");
    }
}
