//! Analysis seams - syntax checking and source analysis
//!
//! The pipeline consumes analyzers through these narrow traits. The
//! built-in implementations are deliberately heuristic; a deployment can
//! swap in real per-language tooling without touching the callers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use similar::TextDiff;
use walkdir::WalkDir;

/// Outcome of a language-aware syntax check
#[derive(Debug, Clone)]
pub struct SyntaxReport {
    pub ok: bool,
    pub language: String,
    pub issues: Vec<String>,
}

impl SyntaxReport {
    pub fn clean(language: impl Into<String>) -> Self {
        Self {
            ok: true,
            language: language.into(),
            issues: Vec::new(),
        }
    }
}

/// Language-aware syntax gate, dispatched on file extension
pub trait SyntaxChecker: Send + Sync {
    fn check(&self, path: &Path, source: &str) -> SyntaxReport;
}

/// One analysis finding
#[derive(Debug, Clone, serde::Serialize)]
pub struct Finding {
    pub file: String,
    pub message: String,
}

/// Files that look like copies of each other
#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateGroup {
    pub files: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FileComparison {
    pub similarity: f32,
    pub added_lines: usize,
    pub removed_lines: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ComplexityReport {
    pub lines: usize,
    pub functions: usize,
    pub branches: usize,
    /// branches per function, the crude hotspot signal
    pub score: f32,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CallGraph {
    /// (caller file, callee function)
    pub edges: Vec<(String, String)>,
}

/// Source analysis seam
pub trait Analyzer: Send + Sync {
    fn detect_duplicates(&self, root: &Path) -> Vec<DuplicateGroup>;
    fn compare_files(&self, a: &Path, b: &Path) -> std::io::Result<FileComparison>;
    fn dead_code(&self, root: &Path) -> Vec<Finding>;
    fn integration_gaps(&self, root: &Path) -> Vec<Finding>;
    fn call_graph(&self, root: &Path) -> CallGraph;
    fn complexity(&self, source: &str) -> ComplexityReport;
    fn architecture_consistency(&self, root: &Path) -> Vec<Finding>;
    /// Naming-convention gate used by planning: does `proposed` collide
    /// with an existing similarly-named file?
    fn name_conflict(&self, root: &Path, proposed: &str) -> Option<String>;
}

// === Built-in implementations ===

/// Delimiter-balance and parse-based syntax gate
pub struct BasicSyntaxChecker;

impl BasicSyntaxChecker {
    fn balanced(source: &str, line_comment: &str) -> Vec<String> {
        let mut issues = Vec::new();
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut in_string: Option<char> = None;
        let mut escaped = false;

        for (line_no, line) in source.lines().enumerate() {
            let mut chars = line.char_indices().peekable();
            while let Some((idx, c)) = chars.next() {
                if let Some(quote) = in_string {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        in_string = None;
                    }
                    continue;
                }
                if c == '"' || c == '\'' {
                    in_string = Some(c);
                    continue;
                }
                if !line_comment.is_empty() && line[idx..].starts_with(line_comment) {
                    break;
                }
                match c {
                    '(' | '[' | '{' => stack.push((c, line_no + 1)),
                    ')' | ']' | '}' => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        match stack.pop() {
                            Some((open, _)) if open == expected => {}
                            _ => issues.push(format!("unmatched '{}' at line {}", c, line_no + 1)),
                        }
                    }
                    _ => {}
                }
            }
            // Unterminated single-line string; reset rather than poison the rest
            in_string = None;
            escaped = false;
        }

        for (open, line) in stack {
            issues.push(format!("unclosed '{}' from line {}", open, line));
        }
        issues
    }
}

impl SyntaxChecker for BasicSyntaxChecker {
    fn check(&self, path: &Path, source: &str) -> SyntaxReport {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "json" => match serde_json::from_str::<serde_json::Value>(source) {
                Ok(_) => SyntaxReport::clean("json"),
                Err(e) => SyntaxReport {
                    ok: false,
                    language: "json".to_string(),
                    issues: vec![e.to_string()],
                },
            },
            "py" => {
                let issues = Self::balanced(source, "#");
                SyntaxReport {
                    ok: issues.is_empty(),
                    language: "python".to_string(),
                    issues,
                }
            }
            "rs" | "js" | "ts" | "c" | "h" | "cpp" | "java" | "go" => {
                let issues = Self::balanced(source, "//");
                SyntaxReport {
                    ok: issues.is_empty(),
                    language: ext.to_string(),
                    issues,
                }
            }
            // Unknown languages pass; the gate only blocks what it understands
            _ => SyntaxReport::clean(ext),
        }
    }
}

/// Regex-and-name heuristics over the source tree
pub struct BasicAnalyzer {
    /// Extensions considered source files
    source_exts: Vec<String>,
}

impl Default for BasicAnalyzer {
    fn default() -> Self {
        Self {
            source_exts: ["py", "rs", "js", "ts", "c", "cpp", "java", "go"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BasicAnalyzer {
    fn source_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| self.source_exts.iter().any(|s| s == x))
            })
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// Stem with copy-suffixes stripped: parser_v2, parser_new, parser_old,
    /// parser_copy all normalize to "parser"
    fn normalized_stem(path: &Path) -> String {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_lowercase();
        for suffix in ["_v2", "_v3", "_new", "_old", "_copy", "_final", "_fixed", "2"] {
            if let Some(base) = stem.strip_suffix(suffix)
                && !base.is_empty()
            {
                return base.to_string();
            }
        }
        stem
    }

    fn function_names(source: &str) -> Vec<String> {
        let re = Regex::new(r"(?m)^\s*(?:def|fn|function)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static regex");
        re.captures_iter(source).map(|c| c[1].to_string()).collect()
    }
}

impl Analyzer for BasicAnalyzer {
    fn detect_duplicates(&self, root: &Path) -> Vec<DuplicateGroup> {
        let mut by_stem: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in self.source_files(root) {
            let key = format!(
                "{}.{}",
                Self::normalized_stem(&path),
                path.extension().and_then(|e| e.to_str()).unwrap_or("")
            );
            by_stem.entry(key).or_default().push(path.display().to_string());
        }

        by_stem
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(stem, files)| DuplicateGroup {
                files,
                reason: format!("multiple files normalize to '{}'", stem),
            })
            .collect()
    }

    fn compare_files(&self, a: &Path, b: &Path) -> std::io::Result<FileComparison> {
        let left = std::fs::read_to_string(a)?;
        let right = std::fs::read_to_string(b)?;
        let diff = TextDiff::from_lines(&left, &right);

        let mut added = 0;
        let mut removed = 0;
        for change in diff.iter_all_changes() {
            match change.tag() {
                similar::ChangeTag::Insert => added += 1,
                similar::ChangeTag::Delete => removed += 1,
                similar::ChangeTag::Equal => {}
            }
        }

        Ok(FileComparison {
            similarity: diff.ratio(),
            added_lines: added,
            removed_lines: removed,
        })
    }

    fn dead_code(&self, root: &Path) -> Vec<Finding> {
        let files = self.source_files(root);
        let sources: Vec<(PathBuf, String)> = files
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok().map(|s| (p.clone(), s)))
            .collect();

        let mut findings = Vec::new();
        for (path, source) in &sources {
            for name in Self::function_names(source) {
                // Leading underscore is the conventional opt-out
                if name.starts_with('_') {
                    continue;
                }
                let uses: usize = sources
                    .iter()
                    .map(|(_, other)| other.matches(&name).count())
                    .sum();
                // One hit is the definition itself
                if uses <= 1 {
                    findings.push(Finding {
                        file: path.display().to_string(),
                        message: format!("function '{}' appears unused", name),
                    });
                }
            }
        }
        findings
    }

    fn integration_gaps(&self, root: &Path) -> Vec<Finding> {
        let re = Regex::new(r"(?m)^\s*(?:pass|raise NotImplementedError|todo!\(\)|unimplemented!\(\))\s*$")
            .expect("static regex");
        let mut findings = Vec::new();
        for path in self.source_files(root) {
            if let Ok(source) = std::fs::read_to_string(&path) {
                let stubs = re.find_iter(&source).count();
                if stubs > 0 {
                    findings.push(Finding {
                        file: path.display().to_string(),
                        message: format!("{} stub bodies awaiting implementation", stubs),
                    });
                }
            }
        }
        findings
    }

    fn call_graph(&self, root: &Path) -> CallGraph {
        let files = self.source_files(root);
        let sources: Vec<(PathBuf, String)> = files
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok().map(|s| (p.clone(), s)))
            .collect();

        let all_functions: Vec<String> = sources.iter().flat_map(|(_, s)| Self::function_names(s)).collect();

        let mut graph = CallGraph::default();
        for (path, source) in &sources {
            let own = Self::function_names(source);
            for callee in &all_functions {
                if own.contains(callee) {
                    continue;
                }
                if source.contains(&format!("{}(", callee)) {
                    graph.edges.push((path.display().to_string(), callee.clone()));
                }
            }
        }
        graph
    }

    fn complexity(&self, source: &str) -> ComplexityReport {
        let branch_re = Regex::new(r"(?m)^\s*(?:if|elif|else if|for|while|match|case|when)\b").expect("static regex");
        let lines = source.lines().count();
        let functions = Self::function_names(source).len();
        let branches = branch_re.find_iter(source).count();
        let score = if functions == 0 {
            branches as f32
        } else {
            branches as f32 / functions as f32
        };
        ComplexityReport {
            lines,
            functions,
            branches,
            score,
        }
    }

    fn architecture_consistency(&self, root: &Path) -> Vec<Finding> {
        self.detect_duplicates(root)
            .into_iter()
            .map(|group| Finding {
                file: group.files.join(", "),
                message: format!("naming drift: {}", group.reason),
            })
            .collect()
    }

    fn name_conflict(&self, root: &Path, proposed: &str) -> Option<String> {
        let proposed_path = Path::new(proposed);
        let proposed_stem = Self::normalized_stem(proposed_path);
        let proposed_ext = proposed_path.extension().and_then(|e| e.to_str()).unwrap_or("");

        for existing in self.source_files(root) {
            if existing.ends_with(proposed) {
                continue; // modifying the same file is not a conflict
            }
            let ext = existing.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext == proposed_ext && Self::normalized_stem(&existing) == proposed_stem {
                return Some(existing.display().to_string());
            }
        }
        None
    }
}
