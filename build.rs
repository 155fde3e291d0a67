use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// The crate's own source trees. Nothing outside these directories is scanned.
const SOURCE_DIRS: &[&str] = &["rvfl", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: &[&str] = &[
    "FIXED", "CORRECTED", "FIX", "FIXES", "NEW", "CHANGED", "CHANGES", "CHANGE", "MODIFIED",
    "MODIFIES", "MODIFY", "UPDATED", "UPDATES", "UPDATE",
];

// A custom "Sink" for the grep searcher. It collects all matching lines
// from a single file to build a comprehensive error message.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
}

// A collector for forbidden comment content
struct ForbiddenCommentCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    check_stars_in_doc_comments: bool,
}

// A custom collector for checking if all alphabetic characters are uppercase
struct CustomUppercaseCollector {
    violations: Vec<String>,
    file_path: PathBuf,
}

// A custom collector for #[allow(dead_code)] attribute violations
struct DeadCodeCollector {
    violations: Vec<String>,
    file_path: PathBuf,
}

/// Formats the collected violations of one file, or `None` when the file is clean.
fn format_violations(
    file_path: &Path,
    violations: &[String],
    headline: &str,
    guidance: &[&str],
) -> Option<String> {
    if violations.is_empty() {
        return None;
    }

    let file_name = file_path.to_str().unwrap_or("?");
    let mut error_msg = format!(
        "\n❌ ERROR: Found {} {} in {}:\n",
        violations.len(),
        headline,
        file_name
    );
    for violation in violations {
        error_msg.push_str(&format!("   {violation}\n"));
    }
    error_msg.push('\n');
    for line in guidance {
        error_msg.push_str(line);
        error_msg.push('\n');
    }
    Some(error_msg)
}

impl ViolationCollector {
    fn new(file_path: &Path) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        format_violations(
            &self.file_path,
            &self.violations,
            "underscore-prefixed variables",
            &[
                "⚠️ Underscore-prefixed variable names are not allowed in this project.",
                "   Either use the variable (removing the underscore) or remove it completely.",
            ],
        )
    }
}

impl ForbiddenCommentCollector {
    fn new(file_path: &Path, check_stars_in_doc_comments: bool) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            check_stars_in_doc_comments,
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        let words = format!(
            "⚠️ Comments containing any of {} are STRICTLY FORBIDDEN in this project.",
            FORBIDDEN_WORDS.join(", ")
        );
        format_violations(
            &self.file_path,
            &self.violations,
            "forbidden comment patterns",
            &[
                words.as_str(),
                "   Remove them completely rather than commenting them out.",
                "   The '**' pattern is not allowed in regular comments (but is allowed in doc comments).",
            ],
        )
    }
}

impl CustomUppercaseCollector {
    fn new(file_path: &Path) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        format_violations(
            &self.file_path,
            &self.violations,
            "comments with all uppercase alphabetic characters",
            &[
                "⚠️ Comments where all alphabetic characters are uppercase are STRICTLY FORBIDDEN in this project.",
                "   STRONGLY CONSIDER deleting the comment completely.",
            ],
        )
    }
}

impl DeadCodeCollector {
    fn new(file_path: &Path) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        format_violations(
            &self.file_path,
            &self.violations,
            "#[allow(dead_code)] attributes",
            &[
                "⚠️ #[allow(dead_code)] attributes are STRICTLY FORBIDDEN in this project.",
                "   Either use the code (removing the attribute) or remove it completely.",
            ],
        )
    }
}

fn matched_line(mat: &SinkMatch) -> (u64, String) {
    let line_number = mat.line_number().unwrap_or(0);
    let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
    (line_number, line_text.to_string())
}

// The `matched` method is called by the searcher for every line that matches the regex.
impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let (line_number, line_text) = matched_line(mat);

        // Skip matches in comments and string literals
        let is_pure_comment = line_text.trim_start().starts_with("//")
            || (line_text.contains("/*")
                && !line_text.contains("*/match")
                && !line_text.contains("*/let"));
        let is_in_string = line_text.contains('"')
            && line_text
                .split('"')
                .enumerate()
                .any(|(i, part)| i % 2 == 1 && part.contains('_'));

        if !is_pure_comment && !is_in_string {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

impl Sink for ForbiddenCommentCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let (line_number, line_text) = matched_line(mat);

        // ** is allowed in doc comments, unless the line also carries a forbidden word
        let stars_only_in_doc = !self.check_stars_in_doc_comments
            && is_doc_comment(&line_text)
            && line_text.contains("**")
            && !FORBIDDEN_WORDS.iter().any(|word| line_text.contains(word));
        if !stars_only_in_doc {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

impl Sink for CustomUppercaseCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let (line_number, line_text) = matched_line(mat);
        let trimmed = line_text.trim_start();

        // Extract just the comment part (remove the // or /* prefix)
        let comment_text = if is_doc_comment(trimmed) {
            trimmed[3..].trim()
        } else if trimmed.starts_with("//") {
            trimmed[2..].trim()
        } else if let Some(idx) = line_text.find("/*") {
            match line_text[idx + 2..].find("*/") {
                Some(end) => line_text[idx + 2..idx + 2 + end].trim(),
                None => line_text[idx + 2..].trim(),
            }
        } else {
            return Ok(true);
        };

        let mut alpha_chars = comment_text.chars().filter(|c| c.is_alphabetic()).peekable();
        if alpha_chars.peek().is_some() && alpha_chars.all(|c| c.is_uppercase()) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

impl Sink for DeadCodeCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let (line_number, line_text) = matched_line(mat);
        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn main() {
    // Always rerun this script if the build script itself changes.
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let checks: [fn() -> Result<(), Box<dyn Error>>; 3] = [
        scan_for_underscore_prefixes,
        scan_for_forbidden_comment_patterns,
        scan_for_allow_dead_code,
    ];
    for check in checks {
        if let Err(e) = check() {
            // The `eprintln!` here is crucial for showing the error in `cargo`'s output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Every `.rs` file under the crate's source directories.
fn rust_sources() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

fn scan_for_underscore_prefixes() -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(r"\b(_[a-zA-Z0-9_]+)\b")?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(&path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn scan_for_forbidden_comment_patterns() -> Result<(), Box<dyn Error>> {
    // 1. Forbidden words in any comment, doc comments included
    let forbidden_words_pattern = format!(r"(//|/\*|///).*(?:{})", FORBIDDEN_WORDS.join("|"));
    // 2. ** in comments (doc comments are filtered by the collector)
    let stars_pattern = r"(//|/\*).*\*\*";
    // 3. Comments where all alphabetic characters are uppercase
    let all_caps_pattern = r"(//|/\*|///).*";

    let forbidden_matcher = RegexMatcher::new_line_matcher(&forbidden_words_pattern)?;
    let stars_matcher = RegexMatcher::new_line_matcher(stars_pattern)?;
    let all_caps_matcher = RegexMatcher::new_line_matcher(all_caps_pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ForbiddenCommentCollector::new(&path, true);
        searcher.search_path(&forbidden_matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }

        let mut collector = ForbiddenCommentCollector::new(&path, false);
        searcher.search_path(&stars_matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }

        let mut collector = CustomUppercaseCollector::new(&path);
        searcher.search_path(&all_caps_matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn scan_for_allow_dead_code() -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]")?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = DeadCodeCollector::new(&path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}
